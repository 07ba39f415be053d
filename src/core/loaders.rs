//! Loaders for single-frame datasets.
//!
//! A single-frame dataset directory holds one headerless binary file per
//! attribute (matched by file stem, so `images`, `images.bin` and
//! `images.dat` all work) plus a `data_structure` JSON descriptor.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use super::binary::{decode, AttributeArray, DecodeError};
use super::descriptor::{Attribute, ConfigurationError, DataStructure, DESCRIPTOR_STEM};

/// Errors that can occur while loading a dataset.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("The path {} doesn't exist. Be sure to enter a valid one.", .0.display())]
    InvalidPath(PathBuf),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("failed to decode '{attribute}': {source}")]
    Decode {
        attribute: Attribute,
        #[source]
        source: DecodeError,
    },

    #[error("sample count mismatch: '{attribute}' has {found} samples, expected {expected}")]
    SampleCountMismatch {
        attribute: Attribute,
        expected: usize,
        found: usize,
    },

    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Check that `path` is an existing directory.
pub fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(LoaderError::InvalidPath(path.to_path_buf()))
    }
}

/// Validated input and output directories of one reorganization run.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl DatasetPaths {
    /// Validate both directories. The output directory is checked first and
    /// is never created implicitly.
    pub fn validate<P: AsRef<Path>, Q: AsRef<Path>>(input_dir: P, output_dir: Q) -> Result<Self> {
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();

        ensure_directory(output_dir)?;
        ensure_directory(input_dir)?;

        Ok(Self {
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
        })
    }

    #[inline]
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    #[inline]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Map every file stem in `directory` to its path.
///
/// Entries are visited in file-name order; when two files share a stem the
/// first one is kept.
pub fn index_files(directory: &Path) -> Result<HashMap<String, PathBuf>> {
    let entries = fs::read_dir(directory).map_err(|e| LoaderError::Io {
        path: directory.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut files: HashMap<String, PathBuf> = HashMap::with_capacity(paths.len());
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        if let Some(existing) = files.get(stem) {
            warn!(
                "Ignoring {}: stem '{}' already provided by {}",
                path.display(),
                stem,
                existing.display()
            );
            continue;
        }
        files.insert(stem.to_string(), path.clone());
    }

    Ok(files)
}

/// Read and decode one attribute's backing file.
pub fn load_attribute(
    files: &HashMap<String, PathBuf>,
    descriptor: &DataStructure,
    attribute: Attribute,
) -> Result<AttributeArray> {
    let spec = descriptor.spec(attribute)?;
    let path = files
        .get(attribute.name())
        .ok_or(ConfigurationError::MissingBackingFile(attribute))?;

    let bytes = fs::read(path).map_err(|e| LoaderError::Io {
        path: path.clone(),
        source: e,
    })?;

    let array = decode(&bytes, spec.element_type, spec.shape())
        .map_err(|source| LoaderError::Decode { attribute, source })?;

    debug!(
        "Decoded {} from {}: {:?} {}",
        attribute,
        path.display(),
        array.dim(),
        spec.element_type
    );

    Ok(array)
}

/// All attributes of a single-frame dataset, decoded into memory.
///
/// Every attribute holds the same number of samples.
#[derive(Debug, Clone)]
pub struct SingleFrameDataset {
    images: AttributeArray,
    sticks: AttributeArray,
    frames: AttributeArray,
    ratios: AttributeArray,
    ids: AttributeArray,
}

impl SingleFrameDataset {
    /// Load a dataset from a directory.
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if the directory does not exist
    /// - `Configuration` if the descriptor is missing or malformed, or an
    ///   attribute is undeclared or has no backing file
    /// - `Decode` if a file does not fit its declared shape
    /// - `SampleCountMismatch` if attributes disagree on the sample count
    pub fn load<P: AsRef<Path>>(input_dir: P) -> Result<Self> {
        let input_dir = input_dir.as_ref();
        ensure_directory(input_dir)?;

        let files = index_files(input_dir)?;
        let descriptor_path = files
            .get(DESCRIPTOR_STEM)
            .ok_or_else(|| ConfigurationError::MissingDescriptor(input_dir.to_path_buf()))?;
        let descriptor = DataStructure::from_json_file(descriptor_path)?;

        let dataset = Self::from_arrays(
            load_attribute(&files, &descriptor, Attribute::Images)?,
            load_attribute(&files, &descriptor, Attribute::Sticks)?,
            load_attribute(&files, &descriptor, Attribute::Frames)?,
            load_attribute(&files, &descriptor, Attribute::Ratios)?,
            load_attribute(&files, &descriptor, Attribute::Ids)?,
        )?;

        info!(
            "Loaded {} samples from {}",
            dataset.num_samples(),
            input_dir.display()
        );

        Ok(dataset)
    }

    /// Assemble a dataset from decoded arrays, checking the sample counts agree.
    pub fn from_arrays(
        images: AttributeArray,
        sticks: AttributeArray,
        frames: AttributeArray,
        ratios: AttributeArray,
        ids: AttributeArray,
    ) -> Result<Self> {
        let dataset = Self {
            images,
            sticks,
            frames,
            ratios,
            ids,
        };

        let expected = dataset.images.num_samples();
        for attribute in Attribute::ALL {
            let found = dataset.get(attribute).num_samples();
            if found != expected {
                return Err(LoaderError::SampleCountMismatch {
                    attribute,
                    expected,
                    found,
                });
            }
        }

        Ok(dataset)
    }

    /// Look up an attribute's array.
    pub fn get(&self, attribute: Attribute) -> &AttributeArray {
        match attribute {
            Attribute::Images => &self.images,
            Attribute::Sticks => &self.sticks,
            Attribute::Frames => &self.frames,
            Attribute::Ratios => &self.ratios,
            Attribute::Ids => &self.ids,
        }
    }

    /// Number of samples shared by every attribute.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.images.num_samples()
    }

    #[inline]
    pub fn ids(&self) -> &AttributeArray {
        &self.ids
    }
}
