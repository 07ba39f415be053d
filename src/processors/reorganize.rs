//! Reorganization of a single-frame dataset directory into multi-frame form.

use std::collections::HashSet;
use std::path::PathBuf;

use log::info;
use thiserror::Error;

use super::clustering::{cluster_dataset, select_current, ClusterError, MultiFrameDataset};
use super::pairing::{pair_frames, track_ids, PairingError};
use crate::config::{IdsOutput, ReorganizeConfig};
use crate::core::descriptor::{Attribute, AttributeSpec, DataStructure, DESCRIPTOR_FILE_NAME};
use crate::core::loaders::{DatasetPaths, LoaderError, SingleFrameDataset};
use crate::core::writers::{
    write_bin, write_clustered_attributes, write_descriptor, write_windows_csv, WriteError,
};

/// File name of the window manifest.
pub const MANIFEST_FILE_NAME: &str = "windows.csv";

/// Errors that can abort a reorganization run.
#[derive(Error, Debug)]
pub enum ReorganizeError {
    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result type for reorganization.
pub type Result<T> = std::result::Result<T, ReorganizeError>;

/// What a reorganization run produced.
#[derive(Debug, Clone)]
pub struct ReorganizeSummary {
    /// Samples in the single-frame input
    pub samples: usize,
    /// Distinct track ids in the input
    pub tracks: usize,
    /// Rows in every clustered output
    pub rows: usize,
    pub history_depth: usize,
    /// Every file written, in write order
    pub written: Vec<PathBuf>,
}

/// Pair and cluster an in-memory dataset without touching the disk.
pub fn build_multi_frame(
    dataset: &SingleFrameDataset,
    config: &ReorganizeConfig,
) -> Result<MultiFrameDataset> {
    let windows = pair_frames(dataset.ids(), config.history_depth, config.group_order)?;
    info!(
        "Formed {} windows of {} frames from {} samples",
        windows.len(),
        windows.frames_per_window(),
        dataset.num_samples()
    );

    Ok(cluster_dataset(dataset, windows)?)
}

/// Descriptor of the files a reorganization writes.
///
/// Clustered attributes keep their element type and height/width with the
/// channel count scaled by the frames per row. Ids keep their input spec.
pub fn output_descriptor(dataset: &SingleFrameDataset, multi: &MultiFrameDataset) -> DataStructure {
    let mut descriptor = DataStructure::new();

    for attribute in Attribute::CLUSTERED {
        if let Some(array) = multi.get(attribute) {
            descriptor.insert(
                attribute,
                AttributeSpec::new(array.element_type(), array.sample_shape()),
            );
        }
    }

    let ids = dataset.ids();
    descriptor.insert(
        Attribute::Ids,
        AttributeSpec::new(ids.element_type(), ids.sample_shape()),
    );

    descriptor
}

/// Reorganize the dataset in `paths.input_dir()` and write it to `paths.output_dir()`.
///
/// Writes `images.bin`, `sticks.bin`, `frames.bin`, `ratios.bin` and
/// `ids.bin`, plus the descriptor and manifest when enabled. The first error
/// aborts the run; files already written are left in place.
pub fn reorganize_dataset(
    paths: &DatasetPaths,
    config: &ReorganizeConfig,
) -> Result<ReorganizeSummary> {
    let dataset = SingleFrameDataset::load(paths.input_dir())?;
    let multi = build_multi_frame(&dataset, config)?;
    let output_dir = paths.output_dir();

    let mut written = write_clustered_attributes(output_dir, &multi)?;

    let ids_path = output_dir.join(Attribute::Ids.bin_file_name());
    match config.ids_output {
        IdsOutput::Passthrough => write_bin(&ids_path, dataset.ids())?,
        IdsOutput::PerWindow => write_bin(&ids_path, &select_current(dataset.ids(), multi.windows())?)?,
    }
    written.push(ids_path);

    if config.write_descriptor {
        let path = output_dir.join(DESCRIPTOR_FILE_NAME);
        write_descriptor(&path, &output_descriptor(&dataset, &multi))?;
        written.push(path);
    }

    if config.write_manifest {
        let path = output_dir.join(MANIFEST_FILE_NAME);
        write_windows_csv(&path, multi.windows())?;
        written.push(path);
    }

    let tracks = track_ids(dataset.ids())?
        .into_iter()
        .collect::<HashSet<_>>()
        .len();

    info!(
        "Wrote {} files with {} rows to {}",
        written.len(),
        multi.num_rows(),
        output_dir.display()
    );

    Ok(ReorganizeSummary {
        samples: dataset.num_samples(),
        tracks,
        rows: multi.num_rows(),
        history_depth: multi.windows().history_depth(),
        written,
    })
}
