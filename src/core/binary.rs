//! Flat binary attribute buffers and their 4-D array form.
//!
//! Attribute files are headerless dumps of a single element type in native
//! byte order, laid out row-major as (sample, height, width, channel). This
//! module turns such a buffer into a typed [`AttributeArray`] and back.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use bytemuck::Pod;
use ndarray::{s, Array4, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a tracked object, widened so every integral element type fits.
pub type TrackId = i128;

/// Errors that can occur while decoding a raw buffer.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("shape mismatch: {len} bytes is not a whole number of {element_type} elements")]
    PartialElement { len: usize, element_type: ElementType },

    #[error(
        "shape mismatch: {elements} elements cannot be split into samples of {height}x{width}x{channels}"
    )]
    ShapeMismatch {
        elements: usize,
        height: usize,
        width: usize,
        channels: usize,
    },

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Result type for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Element type name that is not part of the supported set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported element type '{0}'")]
pub struct UnsupportedElementType(pub String);

/// Element types an attribute file may hold.
///
/// Names follow NumPy dtype naming so descriptors written by NumPy tooling
/// parse unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ElementType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// Canonical (NumPy) name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::U64 => "uint64",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = UnsupportedElementType;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Big-endian dumps are rejected
        if trimmed.starts_with('>') {
            return Err(UnsupportedElementType(s.to_string()));
        }
        let code = trimmed.trim_start_matches(['<', '=', '|']);

        let element_type = match code {
            "uint8" | "u1" => Self::U8,
            "int8" | "i1" => Self::I8,
            "uint16" | "u2" => Self::U16,
            "int16" | "i2" => Self::I16,
            "uint32" | "u4" => Self::U32,
            "int32" | "i4" => Self::I32,
            "uint64" | "u8" => Self::U64,
            "int64" | "i8" | "int" => Self::I64,
            "float32" | "f4" | "single" => Self::F32,
            "float64" | "f8" | "float" | "double" => Self::F64,
            _ => return Err(UnsupportedElementType(s.to_string())),
        };
        Ok(element_type)
    }
}

impl TryFrom<String> for ElementType {
    type Error = UnsupportedElementType;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ElementType> for String {
    fn from(value: ElementType) -> Self {
        value.name().to_string()
    }
}

/// Per-sample shape of an attribute: (height, width, channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl SampleShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Number of elements in one sample.
    #[inline]
    pub fn elements(&self) -> usize {
        self.height * self.width * self.channels
    }
}

/// Scalar type that can back an attribute array.
pub trait Element: Pod + PartialEq + fmt::Debug {
    const TYPE: ElementType;

    /// Lossy widening used for plotting and diagnostics.
    fn to_f64(self) -> f64;

    /// Integral value of the element, if it has one.
    fn to_track_id(self) -> Option<TrackId>;
}

macro_rules! integer_elements {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn to_track_id(self) -> Option<TrackId> {
                    Some(self as TrackId)
                }
            }
        )*
    };
}

macro_rules! float_elements {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn to_track_id(self) -> Option<TrackId> {
                    (self.is_finite() && self.fract() == 0.0).then(|| self as TrackId)
                }
            }
        )*
    };
}

integer_elements!(u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32, i32 => I32, u64 => U64, i64 => I64);
float_elements!(f32 => F32, f64 => F64);

/// A decoded attribute: a (sample, height, width, channel) array of one element type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeArray {
    U8(Array4<u8>),
    I8(Array4<i8>),
    U16(Array4<u16>),
    I16(Array4<i16>),
    U32(Array4<u32>),
    I32(Array4<i32>),
    U64(Array4<u64>),
    I64(Array4<i64>),
    F32(Array4<f32>),
    F64(Array4<f64>),
}

/// Evaluate `$body` with `$inner` bound to the typed array inside an [`AttributeArray`].
macro_rules! with_array {
    ($array:expr, $inner:ident => $body:expr) => {
        match $array {
            $crate::core::binary::AttributeArray::U8($inner) => $body,
            $crate::core::binary::AttributeArray::I8($inner) => $body,
            $crate::core::binary::AttributeArray::U16($inner) => $body,
            $crate::core::binary::AttributeArray::I16($inner) => $body,
            $crate::core::binary::AttributeArray::U32($inner) => $body,
            $crate::core::binary::AttributeArray::I32($inner) => $body,
            $crate::core::binary::AttributeArray::U64($inner) => $body,
            $crate::core::binary::AttributeArray::I64($inner) => $body,
            $crate::core::binary::AttributeArray::F32($inner) => $body,
            $crate::core::binary::AttributeArray::F64($inner) => $body,
        }
    };
}

/// Like [`with_array!`], but wraps the resulting array back into the same variant.
macro_rules! map_array {
    ($array:expr, $inner:ident => $body:expr) => {
        match $array {
            $crate::core::binary::AttributeArray::U8($inner) => $crate::core::binary::AttributeArray::U8($body),
            $crate::core::binary::AttributeArray::I8($inner) => $crate::core::binary::AttributeArray::I8($body),
            $crate::core::binary::AttributeArray::U16($inner) => $crate::core::binary::AttributeArray::U16($body),
            $crate::core::binary::AttributeArray::I16($inner) => $crate::core::binary::AttributeArray::I16($body),
            $crate::core::binary::AttributeArray::U32($inner) => $crate::core::binary::AttributeArray::U32($body),
            $crate::core::binary::AttributeArray::I32($inner) => $crate::core::binary::AttributeArray::I32($body),
            $crate::core::binary::AttributeArray::U64($inner) => $crate::core::binary::AttributeArray::U64($body),
            $crate::core::binary::AttributeArray::I64($inner) => $crate::core::binary::AttributeArray::I64($body),
            $crate::core::binary::AttributeArray::F32($inner) => $crate::core::binary::AttributeArray::F32($body),
            $crate::core::binary::AttributeArray::F64($inner) => $crate::core::binary::AttributeArray::F64($body),
        }
    };
}

pub(crate) use map_array;
pub(crate) use with_array;

macro_rules! impl_from_array {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Array4<$ty>> for AttributeArray {
                fn from(array: Array4<$ty>) -> Self {
                    AttributeArray::$variant(array)
                }
            }
        )*
    };
}

impl_from_array!(u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32, i32 => I32, u64 => U64, i64 => I64, f32 => F32, f64 => F64);

impl AttributeArray {
    /// Element type of the underlying buffer.
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::U8(_) => ElementType::U8,
            Self::I8(_) => ElementType::I8,
            Self::U16(_) => ElementType::U16,
            Self::I16(_) => ElementType::I16,
            Self::U32(_) => ElementType::U32,
            Self::I32(_) => ElementType::I32,
            Self::U64(_) => ElementType::U64,
            Self::I64(_) => ElementType::I64,
            Self::F32(_) => ElementType::F32,
            Self::F64(_) => ElementType::F64,
        }
    }

    /// Full shape as (samples, height, width, channels).
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        with_array!(self, a => a.dim())
    }

    /// Per-sample shape.
    pub fn sample_shape(&self) -> SampleShape {
        let (_, height, width, channels) = self.dim();
        SampleShape::new(height, width, channels)
    }

    /// Number of samples (length of the leading axis).
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.dim().0
    }

    /// Length of the trailing channel axis.
    #[inline]
    pub fn channels(&self) -> usize {
        self.dim().3
    }

    /// Values of one frame slot of one sample, widened to `f64`, row-major.
    ///
    /// The channel axis is split into `slots` equal blocks and block `slot` is
    /// returned. Single-frame arrays use `slots == 1`. Returns `None` when the
    /// sample or slot does not exist or the channels do not split evenly.
    pub fn frame_values(&self, index: usize, slot: usize, slots: usize) -> Option<Vec<f64>> {
        with_array!(self, a => frame_values_of(a, index, slot, slots))
    }

    /// Row-major native-order bytes of the whole array.
    pub fn to_bytes(&self) -> Vec<u8> {
        with_array!(self, a => element_bytes(a))
    }

    /// Dump the array to `writer` as a flat headerless buffer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        with_array!(self, a => write_elements(a, writer))
    }
}

fn frame_values_of<T: Element>(
    array: &Array4<T>,
    index: usize,
    slot: usize,
    slots: usize,
) -> Option<Vec<f64>> {
    let (samples, _, _, channels) = array.dim();
    if index >= samples || slots == 0 || slot >= slots || channels % slots != 0 {
        return None;
    }

    let per_slot = channels / slots;
    let start = slot * per_slot;
    let sample = array.index_axis(Axis(0), index);
    let block = sample.slice(s![.., .., start..start + per_slot]);
    Some(block.iter().map(|&v| v.to_f64()).collect())
}

fn element_bytes<T: Element>(array: &Array4<T>) -> Vec<u8> {
    match array.as_slice() {
        Some(values) => bytemuck::cast_slice(values).to_vec(),
        None => array
            .iter()
            .flat_map(|v| bytemuck::bytes_of(v).to_vec())
            .collect(),
    }
}

fn write_elements<T: Element, W: Write>(array: &Array4<T>, writer: &mut W) -> io::Result<()> {
    match array.as_slice() {
        Some(values) => writer.write_all(bytemuck::cast_slice(values)),
        None => {
            for value in array.iter() {
                writer.write_all(bytemuck::bytes_of(value))?;
            }
            Ok(())
        }
    }
}

/// Decode a raw buffer into a (samples, height, width, channels) array.
///
/// The sample count is inferred from the buffer length. An empty buffer
/// decodes to zero samples.
///
/// # Errors
///
/// Returns a shape mismatch if the buffer is not a whole number of elements,
/// if the element count is not divisible by `height * width * channels`, or
/// if the sample shape has a zero dimension.
pub fn decode(bytes: &[u8], element_type: ElementType, shape: SampleShape) -> Result<AttributeArray> {
    let array = match element_type {
        ElementType::U8 => AttributeArray::U8(decode_as(bytes, shape)?),
        ElementType::I8 => AttributeArray::I8(decode_as(bytes, shape)?),
        ElementType::U16 => AttributeArray::U16(decode_as(bytes, shape)?),
        ElementType::I16 => AttributeArray::I16(decode_as(bytes, shape)?),
        ElementType::U32 => AttributeArray::U32(decode_as(bytes, shape)?),
        ElementType::I32 => AttributeArray::I32(decode_as(bytes, shape)?),
        ElementType::U64 => AttributeArray::U64(decode_as(bytes, shape)?),
        ElementType::I64 => AttributeArray::I64(decode_as(bytes, shape)?),
        ElementType::F32 => AttributeArray::F32(decode_as(bytes, shape)?),
        ElementType::F64 => AttributeArray::F64(decode_as(bytes, shape)?),
    };
    Ok(array)
}

fn decode_as<T: Element>(bytes: &[u8], shape: SampleShape) -> Result<Array4<T>> {
    let element_size = std::mem::size_of::<T>();
    if bytes.len() % element_size != 0 {
        return Err(DecodeError::PartialElement {
            len: bytes.len(),
            element_type: T::TYPE,
        });
    }

    let elements = bytes.len() / element_size;
    let per_sample = shape.elements();
    if per_sample == 0 || elements % per_sample != 0 {
        return Err(DecodeError::ShapeMismatch {
            elements,
            height: shape.height,
            width: shape.width,
            channels: shape.channels,
        });
    }

    // Copies into an aligned buffer; the source bytes carry no alignment guarantee
    let values: Vec<T> = bytemuck::pod_collect_to_vec(bytes);
    let samples = elements / per_sample;

    Ok(Array4::from_shape_vec(
        (samples, shape.height, shape.width, shape.channels),
        values,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn test_element_type_names() {
        assert_eq!("uint8".parse::<ElementType>().unwrap(), ElementType::U8);
        assert_eq!("<f4".parse::<ElementType>().unwrap(), ElementType::F32);
        assert_eq!("float".parse::<ElementType>().unwrap(), ElementType::F64);
        assert_eq!("|u1".parse::<ElementType>().unwrap(), ElementType::U8);
        assert_eq!("i8".parse::<ElementType>().unwrap(), ElementType::I64);
        assert!(">f4".parse::<ElementType>().is_err());
        assert!("complex64".parse::<ElementType>().is_err());
    }

    #[test]
    fn test_element_type_serde() {
        let parsed: ElementType = serde_json::from_str("\"int32\"").unwrap();
        assert_eq!(parsed, ElementType::I32);
        assert_eq!(serde_json::to_string(&ElementType::F64).unwrap(), "\"float64\"");
        assert!(serde_json::from_str::<ElementType>("\"bool\"").is_err());
    }

    #[test]
    fn test_decode_shape() {
        let bytes: Vec<u8> = (0..24).collect();
        let array = decode(&bytes, ElementType::U8, SampleShape::new(2, 3, 2)).unwrap();

        assert_eq!(array.dim(), (2, 2, 3, 2));
        assert_eq!(array.element_type(), ElementType::U8);
        match array {
            AttributeArray::U8(a) => {
                assert_eq!(a[[0, 0, 0, 0]], 0);
                assert_eq!(a[[0, 0, 0, 1]], 1);
                assert_eq!(a[[1, 1, 2, 1]], 23);
            }
            other => panic!("Expected U8 array, got {:?}", other.element_type()),
        }
    }

    #[test]
    fn test_decode_typed_values() {
        let values = [1.5f32, -2.0, 3.25, 0.0];
        let bytes = bytemuck::cast_slice::<f32, u8>(&values).to_vec();

        let array = decode(&bytes, ElementType::F32, SampleShape::new(1, 1, 2)).unwrap();

        assert_eq!(array.num_samples(), 2);
        assert_eq!(array.frame_values(1, 0, 1), Some(vec![3.25, 0.0]));
    }

    #[test]
    fn test_decode_unaligned_buffer() {
        let values = [7i64, 9, 11];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(bytemuck::cast_slice(&values));

        let array = decode(&bytes[1..], ElementType::I64, SampleShape::new(1, 1, 1)).unwrap();

        assert_eq!(array.frame_values(2, 0, 1), Some(vec![11.0]));
    }

    #[test]
    fn test_decode_partial_element() {
        let bytes = vec![0u8; 7];
        let result = decode(&bytes, ElementType::F32, SampleShape::new(1, 1, 1));

        assert!(matches!(result, Err(DecodeError::PartialElement { len: 7, .. })));
    }

    #[test]
    fn test_decode_indivisible_samples() {
        let bytes = vec![0u8; 10];
        let result = decode(&bytes, ElementType::U8, SampleShape::new(2, 2, 1));

        match result {
            Err(DecodeError::ShapeMismatch { elements, height, .. }) => {
                assert_eq!(elements, 10);
                assert_eq!(height, 2);
            }
            other => panic!("Expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_zero_dimension() {
        let result = decode(&[0u8; 4], ElementType::U8, SampleShape::new(0, 2, 1));
        assert!(matches!(result, Err(DecodeError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_decode_empty_buffer() {
        let array = decode(&[], ElementType::U16, SampleShape::new(4, 4, 1)).unwrap();
        assert_eq!(array.dim(), (0, 4, 4, 1));
    }

    #[test]
    fn test_bytes_round_trip() {
        let source = Array::from_shape_fn((3, 2, 2, 2), |(n, h, w, c)| {
            (n * 100 + h * 10 + w) as i32 - c as i32
        });
        let array = AttributeArray::from(source);

        let bytes = array.to_bytes();
        assert_eq!(bytes.len(), 3 * 2 * 2 * 2 * 4);

        let mut written = Vec::new();
        array.write_to(&mut written).unwrap();
        assert_eq!(written, bytes);

        let decoded = decode(&bytes, ElementType::I32, array.sample_shape()).unwrap();
        assert_eq!(decoded, array);
    }

    #[test]
    fn test_non_contiguous_bytes() {
        let source = Array::from_shape_fn((2, 1, 1, 2), |(n, _, _, c)| (n * 2 + c) as u8);
        let reversed = source.slice(s![..;-1, .., .., ..]).to_owned();
        let view_array = AttributeArray::from(reversed);

        assert_eq!(view_array.to_bytes(), vec![2, 3, 0, 1]);
    }

    #[test]
    fn test_frame_values_slots() {
        let source = Array::from_shape_fn((1, 1, 2, 4), |(_, _, w, c)| (w * 10 + c) as u16);
        let array = AttributeArray::from(source);

        assert_eq!(array.frame_values(0, 0, 2), Some(vec![0.0, 1.0, 10.0, 11.0]));
        assert_eq!(array.frame_values(0, 1, 2), Some(vec![2.0, 3.0, 12.0, 13.0]));
        assert_eq!(array.frame_values(0, 2, 2), None);
        assert_eq!(array.frame_values(1, 0, 2), None);
        assert_eq!(array.frame_values(0, 0, 3), None);
    }

    #[test]
    fn test_track_id_conversion() {
        assert_eq!(5u8.to_track_id(), Some(5));
        assert_eq!(u64::MAX.to_track_id(), Some(u64::MAX as TrackId));
        assert_eq!(7.0f32.to_track_id(), Some(7));
        assert_eq!(7.5f64.to_track_id(), None);
        assert_eq!(f64::NAN.to_track_id(), None);
    }
}
