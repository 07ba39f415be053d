//! Core data types and I/O operations.

pub mod binary;
pub mod descriptor;
pub mod loaders;
pub mod writers;

pub use binary::{decode, AttributeArray, DecodeError, ElementType, SampleShape, TrackId};
pub use descriptor::{Attribute, ConfigurationError, DataStructure};
pub use loaders::{DatasetPaths, LoaderError, SingleFrameDataset};
pub use writers::{write_bin, write_descriptor, write_windows_csv, WriteError};
