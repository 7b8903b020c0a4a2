//! Sample encodings and the fixed-width cells the ring buffer stores.
//!
//! Every ring buffer slot is a 4-byte [`SampleCell`] holding one interleaved
//! sample. Narrower encodings occupy a prefix of the cell and the rest stays
//! zero, so an all-zero cell is silence in every encoding. Arithmetic never
//! happens on cells: samples are encoded from normalized `f32` on the way in
//! and decoded on the way out.

use std::fmt;
use std::str::FromStr;

use crate::format::convert::{
    f32_to_i16, f32_to_i32, f32_to_i8, i16_to_f32, i32_to_f32, i8_to_f32,
};
use crate::AudioError;

/// Width of every ring buffer cell in bytes.
pub const CELL_BYTES: usize = 4;

/// Linear PCM encodings a device stream can be opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleEncoding {
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 32-bit IEEE float.
    #[default]
    Float32,
}

impl SampleEncoding {
    /// Bytes one sample occupies on the hardware side.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 | Self::Float32 => 4,
        }
    }

    /// Ratio between the cell width and the sample width (4, 2 or 1).
    #[must_use]
    pub const fn length_factor(self) -> usize {
        CELL_BYTES / self.width()
    }

    /// Raw device bytes represented by `cells` ring buffer cells.
    #[must_use]
    pub const fn bytes_for_cells(self, cells: usize) -> usize {
        cells * CELL_BYTES / self.length_factor()
    }

    /// Encodes a normalized sample into a cell.
    #[inline]
    #[must_use]
    pub fn encode(self, sample: f32) -> SampleCell {
        match self {
            Self::Int8 => SampleCell::from_i8(f32_to_i8(sample)),
            Self::Int16 => SampleCell::from_i16(f32_to_i16(sample)),
            Self::Int32 => SampleCell::from_i32(f32_to_i32(sample)),
            Self::Float32 => SampleCell::from_f32(sample),
        }
    }

    /// Decodes a cell back to a normalized sample.
    #[inline]
    #[must_use]
    pub fn decode(self, cell: SampleCell) -> f32 {
        match self {
            Self::Int8 => i8_to_f32(cell.as_i8()),
            Self::Int16 => i16_to_f32(cell.as_i16()),
            Self::Int32 => i32_to_f32(cell.as_i32()),
            Self::Float32 => cell.as_f32(),
        }
    }

    /// Name as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int8 => "8",
            Self::Int16 => "16",
            Self::Int32 => "32",
            Self::Float32 => "f32",
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleEncoding {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "8" | "i8" | "s8" => Ok(Self::Int8),
            "16" | "i16" | "s16" => Ok(Self::Int16),
            "32" | "i32" | "s32" => Ok(Self::Int32),
            "f32" | "float" | "float32" => Ok(Self::Float32),
            other => Err(AudioError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// One 4-byte ring buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct SampleCell([u8; CELL_BYTES]);

impl SampleCell {
    /// The silent cell (all bytes zero).
    pub const SILENCE: Self = Self([0; CELL_BYTES]);

    /// Stores an 8-bit sample in the first byte.
    #[inline]
    #[must_use]
    pub const fn from_i8(v: i8) -> Self {
        let [b0] = v.to_ne_bytes();
        Self([b0, 0, 0, 0])
    }

    /// Stores a 16-bit sample in the first two bytes.
    #[inline]
    #[must_use]
    pub const fn from_i16(v: i16) -> Self {
        let [b0, b1] = v.to_ne_bytes();
        Self([b0, b1, 0, 0])
    }

    /// Stores a 32-bit integer sample.
    #[inline]
    #[must_use]
    pub const fn from_i32(v: i32) -> Self {
        Self(v.to_ne_bytes())
    }

    /// Stores a 32-bit float sample.
    #[inline]
    #[must_use]
    pub fn from_f32(v: f32) -> Self {
        Self(v.to_ne_bytes())
    }

    /// Reads the cell as an 8-bit sample.
    #[inline]
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        i8::from_ne_bytes([self.0[0]])
    }

    /// Reads the cell as a 16-bit sample.
    #[inline]
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        i16::from_ne_bytes([self.0[0], self.0[1]])
    }

    /// Reads the cell as a 32-bit integer sample.
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        i32::from_ne_bytes(self.0)
    }

    /// Reads the cell as a 32-bit float sample.
    #[inline]
    #[must_use]
    pub fn as_f32(self) -> f32 {
        f32::from_ne_bytes(self.0)
    }

    /// Returns `true` if every byte is zero.
    #[inline]
    #[must_use]
    pub fn is_silent(self) -> bool {
        self == Self::SILENCE
    }
}

/// A hardware sample type that maps one-to-one onto a cell.
///
/// Implemented for the native types of each [`SampleEncoding`] so the
/// callback can copy cells straight into the driver's typed buffer.
pub trait CellSample: Copy + Send + 'static {
    /// The encoding whose cells hold this type.
    const ENCODING: SampleEncoding;

    /// Reads the sample out of a cell.
    fn from_cell(cell: SampleCell) -> Self;

    /// Packs the sample into a cell.
    fn to_cell(self) -> SampleCell;
}

impl CellSample for i8 {
    const ENCODING: SampleEncoding = SampleEncoding::Int8;

    #[inline]
    fn from_cell(cell: SampleCell) -> Self {
        cell.as_i8()
    }

    #[inline]
    fn to_cell(self) -> SampleCell {
        SampleCell::from_i8(self)
    }
}

impl CellSample for i16 {
    const ENCODING: SampleEncoding = SampleEncoding::Int16;

    #[inline]
    fn from_cell(cell: SampleCell) -> Self {
        cell.as_i16()
    }

    #[inline]
    fn to_cell(self) -> SampleCell {
        SampleCell::from_i16(self)
    }
}

impl CellSample for i32 {
    const ENCODING: SampleEncoding = SampleEncoding::Int32;

    #[inline]
    fn from_cell(cell: SampleCell) -> Self {
        cell.as_i32()
    }

    #[inline]
    fn to_cell(self) -> SampleCell {
        SampleCell::from_i32(self)
    }
}

impl CellSample for f32 {
    const ENCODING: SampleEncoding = SampleEncoding::Float32;

    #[inline]
    fn from_cell(cell: SampleCell) -> Self {
        cell.as_f32()
    }

    #[inline]
    fn to_cell(self) -> SampleCell {
        SampleCell::from_f32(self)
    }
}
