//! Data processing modules.

pub mod clustering;
pub mod pairing;
pub mod reorganize;

// Re-export key types for convenience
pub use clustering::{cluster_dataset, cluster_frames, ClusterError, MultiFrameDataset};
pub use pairing::{pair_frames, pair_track_ids, FrameWindows, GroupOrder, IndexWindow, PairingError};
pub use reorganize::{reorganize_dataset, ReorganizeError, ReorganizeSummary};
