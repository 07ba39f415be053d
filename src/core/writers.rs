//! Writers for multi-frame dataset outputs.
//!
//! This module provides functions for writing:
//! - Flat binary attribute dumps (`<attribute>.bin`, no header)
//! - The JSON descriptor of the written files
//! - A CSV manifest mapping each clustered row back to its source samples

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use super::binary::AttributeArray;
use super::descriptor::{Attribute, DataStructure};
use crate::processors::clustering::MultiFrameDataset;
use crate::processors::pairing::FrameWindows;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Descriptor serialization error.
    #[error("failed to serialize descriptor '{path}': {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates a buffered writer for the given path.
///
/// Parent directories are not created: the output directory must already exist.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

/// Write an attribute array as a flat row-major binary dump.
///
/// The file holds the raw elements in native byte order with no header, so it
/// can be decoded again given the element type and per-sample shape.
///
/// # Example
///
/// ```no_run
/// use multiframe_pipeline::core::binary::AttributeArray;
/// use multiframe_pipeline::core::writers::write_bin;
/// use ndarray::Array4;
/// use std::path::Path;
///
/// let ids = AttributeArray::from(Array4::<i32>::zeros((3, 1, 1, 1)));
/// write_bin(Path::new("output/ids.bin"), &ids).unwrap();
/// ```
pub fn write_bin(path: &Path, array: &AttributeArray) -> Result<()> {
    let mut writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();

    array.write_to(&mut writer).map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    debug!("Wrote {:?} {} -> {}", array.dim(), array.element_type(), path.display());
    Ok(())
}

/// Write every clustered attribute of `dataset` to `<output_dir>/<attribute>.bin`.
///
/// Returns the written paths in attribute order (images, sticks, frames, ratios).
pub fn write_clustered_attributes(
    output_dir: &Path,
    dataset: &MultiFrameDataset,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(Attribute::CLUSTERED.len());

    for attribute in Attribute::CLUSTERED {
        if let Some(array) = dataset.get(attribute) {
            let path = output_dir.join(attribute.bin_file_name());
            write_bin(&path, array)?;
            written.push(path);
        }
    }

    Ok(written)
}

/// Write a descriptor as pretty-printed JSON.
pub fn write_descriptor(path: &Path, descriptor: &DataStructure) -> Result<()> {
    let path_str = path.display().to_string();
    let content = descriptor
        .to_json_pretty()
        .map_err(|e| WriteError::Serialize {
            path: path_str.clone(),
            source: e,
        })?;

    let mut writer = create_buffered_writer(path)?;
    writeln!(writer, "{}", content).map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the window manifest to CSV.
///
/// Creates a CSV file with headers "row,track_id,current,previous". The
/// `previous` column lists the earlier sample indices separated by `;`,
/// immediately-previous first, matching the frame-slot order of the
/// clustered arrays.
pub fn write_windows_csv(path: &Path, windows: &FrameWindows) -> Result<()> {
    let writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);

    let path_str = path.display().to_string();

    // Write header
    csv_writer
        .write_record(["row", "track_id", "current", "previous"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    // Write data rows
    for (row, window) in windows.iter().enumerate() {
        let previous: Vec<String> = window.previous().map(|i| i.to_string()).collect();
        csv_writer
            .write_record(&[
                row.to_string(),
                window.track_id().to_string(),
                window.current().to_string(),
                previous.join(";"),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
