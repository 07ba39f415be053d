//! Dataset attributes and the `data_structure` descriptor.
//!
//! The descriptor is a JSON object mapping each attribute name to its element
//! type and per-sample shape:
//!
//! ```json
//! {
//!   "images": {"type": "uint8", "height": 80, "width": 80, "channels": 1},
//!   "ids":    {"type": "int32", "height": 1,  "width": 1,  "channels": 1}
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::binary::{ElementType, SampleShape};

/// File stem of the descriptor inside a dataset directory.
pub const DESCRIPTOR_STEM: &str = "data_structure";

/// File name used when writing a descriptor.
pub const DESCRIPTOR_FILE_NAME: &str = "data_structure.json";

/// Errors caused by a missing or inconsistent dataset description.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("descriptor '{}' not found in {}", DESCRIPTOR_STEM, .0.display())]
    MissingDescriptor(PathBuf),

    #[error("failed to read descriptor {}: {source}", .path.display())]
    UnreadableDescriptor {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed descriptor {}: {source}", .path.display())]
    MalformedDescriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("attribute '{0}' is not declared in the descriptor")]
    MissingAttribute(Attribute),

    #[error("no backing file for attribute '{0}'")]
    MissingBackingFile(Attribute),
}

/// The named data channels of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    Images,
    Sticks,
    Frames,
    Ratios,
    Ids,
}

impl Attribute {
    /// Every attribute a single-frame dataset carries.
    pub const ALL: [Attribute; 5] = [
        Attribute::Images,
        Attribute::Sticks,
        Attribute::Frames,
        Attribute::Ratios,
        Attribute::Ids,
    ];

    /// Attributes that are concatenated across frames when multi-framing.
    pub const CLUSTERED: [Attribute; 4] = [
        Attribute::Images,
        Attribute::Sticks,
        Attribute::Frames,
        Attribute::Ratios,
    ];

    /// Name used for descriptor keys and file stems.
    pub const fn name(self) -> &'static str {
        match self {
            Attribute::Images => "images",
            Attribute::Sticks => "sticks",
            Attribute::Frames => "frames",
            Attribute::Ratios => "ratios",
            Attribute::Ids => "ids",
        }
    }

    /// Output file name for the attribute's binary dump.
    pub fn bin_file_name(self) -> String {
        format!("{}.bin", self.name())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element type and per-sample shape of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl AttributeSpec {
    pub fn new(element_type: ElementType, shape: SampleShape) -> Self {
        Self {
            element_type,
            height: shape.height,
            width: shape.width,
            channels: shape.channels,
        }
    }

    pub fn shape(&self) -> SampleShape {
        SampleShape::new(self.height, self.width, self.channels)
    }
}

/// Parsed `data_structure` descriptor.
///
/// Entries for names outside [`Attribute`] are kept but never looked up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataStructure {
    entries: BTreeMap<String, AttributeSpec>,
}

impl DataStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a descriptor file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigurationError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigurationError::UnreadableDescriptor {
                path: path.to_path_buf(),
                source: e,
            })?;

        serde_json::from_str(&content).map_err(|e| ConfigurationError::MalformedDescriptor {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Look up the declared type and shape of an attribute.
    pub fn spec(&self, attribute: Attribute) -> Result<&AttributeSpec, ConfigurationError> {
        self.entries
            .get(attribute.name())
            .ok_or(ConfigurationError::MissingAttribute(attribute))
    }

    pub fn insert(&mut self, attribute: Attribute, spec: AttributeSpec) {
        self.entries.insert(attribute.name().to_string(), spec);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty-printed JSON form.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DESCRIPTOR: &str = r#"{
        "images": {"type": "uint8", "height": 80, "width": 80, "channels": 1},
        "sticks": {"type": "float32", "height": 1, "width": 9, "channels": 1},
        "frames": {"type": "int32", "height": 1, "width": 1, "channels": 1},
        "ratios": {"type": "float32", "height": 1, "width": 4, "channels": 1},
        "ids": {"type": "int32", "height": 1, "width": 1, "channels": 1},
        "extra": {"type": "float64", "height": 2, "width": 2, "channels": 2}
    }"#;

    #[test]
    fn test_parse_descriptor() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", DESCRIPTOR).unwrap();
        file.flush().unwrap();

        let descriptor = DataStructure::from_json_file(file.path()).unwrap();

        assert_eq!(descriptor.len(), 6);
        let images = descriptor.spec(Attribute::Images).unwrap();
        assert_eq!(images.element_type, ElementType::U8);
        assert_eq!(images.shape(), SampleShape::new(80, 80, 1));
        let sticks = descriptor.spec(Attribute::Sticks).unwrap();
        assert_eq!(sticks.width, 9);
    }

    #[test]
    fn test_missing_attribute() {
        let descriptor: DataStructure =
            serde_json::from_str(r#"{"images": {"type": "uint8", "height": 1, "width": 1, "channels": 1}}"#)
                .unwrap();

        match descriptor.spec(Attribute::Ratios) {
            Err(ConfigurationError::MissingAttribute(attr)) => assert_eq!(attr, Attribute::Ratios),
            other => panic!("Expected MissingAttribute, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_descriptor() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"images\": [1, 2, 3]").unwrap();
        file.flush().unwrap();

        let result = DataStructure::from_json_file(file.path());
        assert!(matches!(result, Err(ConfigurationError::MalformedDescriptor { .. })));
    }

    #[test]
    fn test_unsupported_type_is_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ids": {{"type": "complex128", "height": 1, "width": 1, "channels": 1}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let result = DataStructure::from_json_file(file.path());
        assert!(matches!(result, Err(ConfigurationError::MalformedDescriptor { .. })));
    }

    #[test]
    fn test_descriptor_json_round_trip() {
        let mut descriptor = DataStructure::new();
        descriptor.insert(
            Attribute::Frames,
            AttributeSpec::new(ElementType::I64, SampleShape::new(1, 1, 2)),
        );

        let json = descriptor.to_json_pretty().unwrap();
        assert!(json.contains("\"frames\""));
        assert!(json.contains("\"int64\""));

        let parsed: DataStructure = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn test_attribute_names() {
        assert_eq!(Attribute::Ids.to_string(), "ids");
        assert_eq!(Attribute::Images.bin_file_name(), "images.bin");
        assert!(!Attribute::CLUSTERED.contains(&Attribute::Ids));
    }
}
