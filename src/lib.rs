//! Reorganization of single-frame training data into multi-frame samples.
//!
//! This crate provides tools for:
//! - Loading a directory of flat binary attribute dumps described by a JSON descriptor
//! - Grouping samples by track id and forming sliding windows of consecutive frames
//! - Concatenating each window's frames along the channel axis and writing the result
//! - Rendering samples with their stick and face labels for visual validation
//!
//! # Example
//!
//! ```no_run
//! use multiframe_pipeline::config::ReorganizeConfig;
//! use multiframe_pipeline::core::loaders::DatasetPaths;
//! use multiframe_pipeline::processors::reorganize::reorganize_dataset;
//!
//! let paths = DatasetPaths::validate("training_data", "output").unwrap();
//! let summary = reorganize_dataset(&paths, &ReorganizeConfig::default()).unwrap();
//! println!("{} rows from {} samples", summary.rows, summary.samples);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{IdsOutput, PipelineConfig, ReorganizeConfig, VisualizationConfig};
pub use core::binary::{AttributeArray, ElementType};
pub use core::descriptor::Attribute;
pub use core::loaders::SingleFrameDataset;
pub use processors::clustering::MultiFrameDataset;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
