//! Temporal pairing of samples that belong to the same track.
//!
//! Samples are grouped by track id, keeping their original (chronological)
//! order inside each group. Each group of length `L` yields `L - k` windows
//! of `k + 1` consecutive indices, where `k` is the history depth. Groups
//! shorter than `k + 1` contribute nothing.
//!
//! # Example
//!
//! ```
//! use multiframe_pipeline::processors::pairing::{pair_track_ids, GroupOrder};
//!
//! let windows = pair_track_ids(&[5, 5, 5, 7, 7], 1, GroupOrder::AscendingId).unwrap();
//! let pairs: Vec<&[usize]> = windows.iter().map(|w| w.indices()).collect();
//! assert_eq!(pairs, vec![&[0, 1][..], &[1, 2][..], &[3, 4][..]]);
//! ```

use std::collections::{BTreeMap, HashMap};

use ndarray::Array4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::binary::{with_array, AttributeArray, Element, TrackId};

/// Errors that can occur while pairing frames.
#[derive(Error, Debug, PartialEq)]
pub enum PairingError {
    #[error("history depth must be at least 1")]
    InvalidHistoryDepth,

    #[error("ids must hold one value per sample, found {per_sample}")]
    NonScalarIds { per_sample: usize },

    #[error("id at sample {index} is not an integral value: {value}")]
    InvalidTrackId { index: usize, value: f64 },
}

/// Result type for pairing operations.
pub type Result<T> = std::result::Result<T, PairingError>;

/// Order in which track groups are emitted.
///
/// Only affects the row order of the output, never which frames are paired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    /// Groups sorted by ascending track id.
    #[default]
    AscendingId,
    /// Groups in the order their first sample appears.
    FirstAppearance,
}

/// All sample indices of one track, in original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackGroup {
    pub id: TrackId,
    pub indices: Vec<usize>,
}

/// `k + 1` consecutive sample indices of one track, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexWindow {
    track_id: TrackId,
    indices: Vec<usize>,
}

impl IndexWindow {
    #[inline]
    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    /// Indices ordered oldest to newest.
    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The most recent sample of the window.
    #[inline]
    pub fn current(&self) -> usize {
        self.indices[self.indices.len() - 1]
    }

    /// Earlier samples, immediately-previous first.
    pub fn previous(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices[..self.indices.len() - 1].iter().rev().copied()
    }

    /// Every index in frame-slot order: current, then previous frames.
    pub fn newest_first(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().rev().copied()
    }
}

/// Ordered windows produced by one pairing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameWindows {
    history_depth: usize,
    windows: Vec<IndexWindow>,
}

impl FrameWindows {
    #[inline]
    pub fn history_depth(&self) -> usize {
        self.history_depth
    }

    /// Frames concatenated per window (`history_depth + 1`).
    #[inline]
    pub fn frames_per_window(&self) -> usize {
        self.history_depth + 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&IndexWindow> {
        self.windows.get(row)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexWindow> {
        self.windows.iter()
    }

    /// Track id of every window, in row order.
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.windows.iter().map(IndexWindow::track_id).collect()
    }

    /// Largest sample index referenced by any window.
    pub fn max_index(&self) -> Option<usize> {
        self.windows.iter().map(IndexWindow::current).max()
    }
}

impl<'a> IntoIterator for &'a FrameWindows {
    type Item = &'a IndexWindow;
    type IntoIter = std::slice::Iter<'a, IndexWindow>;

    fn into_iter(self) -> Self::IntoIter {
        self.windows.iter()
    }
}

/// Partition sample indices by track id.
pub fn group_by_track(ids: &[TrackId], order: GroupOrder) -> Vec<TrackGroup> {
    match order {
        GroupOrder::AscendingId => {
            let mut groups: BTreeMap<TrackId, Vec<usize>> = BTreeMap::new();
            for (index, &id) in ids.iter().enumerate() {
                groups.entry(id).or_default().push(index);
            }
            groups
                .into_iter()
                .map(|(id, indices)| TrackGroup { id, indices })
                .collect()
        }
        GroupOrder::FirstAppearance => {
            let mut positions: HashMap<TrackId, usize> = HashMap::new();
            let mut groups: Vec<TrackGroup> = Vec::new();
            for (index, &id) in ids.iter().enumerate() {
                let position = *positions.entry(id).or_insert_with(|| {
                    groups.push(TrackGroup {
                        id,
                        indices: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[position].indices.push(index);
            }
            groups
        }
    }
}

/// Build the windows of `history_depth + 1` consecutive same-track indices.
pub fn pair_track_ids(
    ids: &[TrackId],
    history_depth: usize,
    order: GroupOrder,
) -> Result<FrameWindows> {
    if history_depth == 0 {
        return Err(PairingError::InvalidHistoryDepth);
    }

    let span = history_depth + 1;
    let windows = group_by_track(ids, order)
        .into_iter()
        .flat_map(|group| {
            let id = group.id;
            group
                .indices
                .windows(span)
                .map(|indices| IndexWindow {
                    track_id: id,
                    indices: indices.to_vec(),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(FrameWindows {
        history_depth,
        windows,
    })
}

/// Extract one track id per sample from a decoded ids array.
pub fn track_ids(ids: &AttributeArray) -> Result<Vec<TrackId>> {
    let per_sample = ids.sample_shape().elements();
    if per_sample != 1 {
        return Err(PairingError::NonScalarIds { per_sample });
    }

    with_array!(ids, a => collect_track_ids(a))
}

fn collect_track_ids<T: Element>(ids: &Array4<T>) -> Result<Vec<TrackId>> {
    ids.iter()
        .enumerate()
        .map(|(index, &value)| {
            value.to_track_id().ok_or(PairingError::InvalidTrackId {
                index,
                value: value.to_f64(),
            })
        })
        .collect()
}

/// Pair the samples of a decoded ids array.
pub fn pair_frames(
    ids: &AttributeArray,
    history_depth: usize,
    order: GroupOrder,
) -> Result<FrameWindows> {
    let ids = track_ids(ids)?;
    pair_track_ids(&ids, history_depth, order)
}
