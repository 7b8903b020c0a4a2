//! Audio format utilities.
//!
//! This module provides:
//! - Sample value conversion (f32 ↔ i8/i16/i32)
//! - Sample encodings and the fixed-width ring buffer cell
//! - The gain matrix used for channel routing

mod convert;
mod mix;
mod sample;

pub use convert::{
    amplitude_to_db, db_to_amplitude, f32_to_i16, f32_to_i32, f32_to_i8, i16_to_f32, i32_to_f32,
    i8_to_f32, int_to_f32, peak,
};
pub use mix::GainMatrix;
pub use sample::{CellSample, SampleCell, SampleEncoding, CELL_BYTES};
