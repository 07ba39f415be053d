//! Frame clustering: concatenating each sample with its track history.
//!
//! Every window from [`pairing`](super::pairing) becomes one output row. The
//! row holds the window's frames stacked along the channel axis in frame-slot
//! order: the current frame first, then the immediately-previous frame, and so
//! on back to the oldest. With the default history depth of 1 a row is
//! `[current, previous]`, doubling the channel count.
//!
//! # Example
//!
//! ```
//! use multiframe_pipeline::processors::clustering::cluster_frames;
//! use multiframe_pipeline::processors::pairing::{pair_track_ids, GroupOrder};
//! use ndarray::Array4;
//!
//! let frames = Array4::from_shape_vec((3, 1, 1, 1), vec![10u8, 11, 12]).unwrap();
//! let windows = pair_track_ids(&[1, 1, 1], 1, GroupOrder::AscendingId).unwrap();
//! let clustered = cluster_frames(&frames, &windows).unwrap();
//!
//! assert_eq!(clustered.dim(), (2, 1, 1, 2));
//! assert_eq!(clustered.iter().copied().collect::<Vec<_>>(), vec![11, 10, 12, 11]);
//! ```

use log::debug;
use ndarray::{concatenate, stack, Array3, Array4, ArrayView3, Axis};
use thiserror::Error;

use super::pairing::FrameWindows;
use crate::core::binary::{map_array, AttributeArray};
use crate::core::descriptor::Attribute;
use crate::core::loaders::SingleFrameDataset;

/// Errors that can occur while clustering frames.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("window references sample {index} but the array holds {samples} samples")]
    IndexOutOfBounds { index: usize, samples: usize },

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Result type for clustering operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Concatenate the frames of every window along the channel axis.
///
/// The output has one row per window, the source height and width, and the
/// channel count multiplied by the window length. No values are altered.
///
/// # Errors
///
/// Returns `IndexOutOfBounds` if a window refers past the end of `array`,
/// which only happens when the windows were built from a different dataset.
pub fn cluster_frames<T: Clone>(array: &Array4<T>, windows: &FrameWindows) -> Result<Array4<T>> {
    let (samples, height, width, channels) = array.dim();

    if let Some(index) = windows.max_index() {
        if index >= samples {
            return Err(ClusterError::IndexOutOfBounds { index, samples });
        }
    }

    if windows.is_empty() {
        let shape = (0, height, width, channels * windows.frames_per_window());
        return Ok(Array4::from_shape_vec(shape, Vec::new())?);
    }

    let mut rows: Vec<Array3<T>> = Vec::with_capacity(windows.len());
    for window in windows {
        let slots: Vec<ArrayView3<T>> = window
            .newest_first()
            .map(|index| array.index_axis(Axis(0), index))
            .collect();
        rows.push(concatenate(Axis(2), &slots)?);
    }

    let views: Vec<ArrayView3<T>> = rows.iter().map(|row| row.view()).collect();
    Ok(stack(Axis(0), &views)?)
}

/// [`cluster_frames`] for an array of any element type.
pub fn cluster_attribute(array: &AttributeArray, windows: &FrameWindows) -> Result<AttributeArray> {
    Ok(map_array!(array, a => cluster_frames(a, windows)?))
}

/// Gather the current sample of every window, one row per window.
///
/// Used for attributes that are carried along per row rather than
/// concatenated, such as track ids.
pub fn select_current(array: &AttributeArray, windows: &FrameWindows) -> Result<AttributeArray> {
    let samples = array.num_samples();
    if let Some(index) = windows.max_index() {
        if index >= samples {
            return Err(ClusterError::IndexOutOfBounds { index, samples });
        }
    }

    let currents: Vec<usize> = windows.iter().map(|w| w.current()).collect();
    Ok(map_array!(array, a => a.select(Axis(0), &currents)))
}

/// The clustered attributes of a dataset together with the windows they came from.
#[derive(Debug, Clone)]
pub struct MultiFrameDataset {
    images: AttributeArray,
    sticks: AttributeArray,
    frames: AttributeArray,
    ratios: AttributeArray,
    windows: FrameWindows,
}

impl MultiFrameDataset {
    /// Clustered array of an attribute. `Ids` is never clustered.
    pub fn get(&self, attribute: Attribute) -> Option<&AttributeArray> {
        match attribute {
            Attribute::Images => Some(&self.images),
            Attribute::Sticks => Some(&self.sticks),
            Attribute::Frames => Some(&self.frames),
            Attribute::Ratios => Some(&self.ratios),
            Attribute::Ids => None,
        }
    }

    #[inline]
    pub fn windows(&self) -> &FrameWindows {
        &self.windows
    }

    /// Number of clustered rows.
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.windows.len()
    }

    /// Frame slots per row.
    #[inline]
    pub fn frames_per_row(&self) -> usize {
        self.windows.frames_per_window()
    }
}

/// Cluster every clusterable attribute of `dataset` with the same windows.
pub fn cluster_dataset(
    dataset: &SingleFrameDataset,
    windows: FrameWindows,
) -> Result<MultiFrameDataset> {
    let cluster = |attribute: Attribute| -> Result<AttributeArray> {
        let clustered = cluster_attribute(dataset.get(attribute), &windows)?;
        debug!("Clustered {}: {:?}", attribute, clustered.dim());
        Ok(clustered)
    };

    let images = cluster(Attribute::Images)?;
    let sticks = cluster(Attribute::Sticks)?;
    let frames = cluster(Attribute::Frames)?;
    let ratios = cluster(Attribute::Ratios)?;

    Ok(MultiFrameDataset {
        images,
        sticks,
        frames,
        ratios,
        windows,
    })
}
