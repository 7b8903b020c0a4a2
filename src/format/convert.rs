//! Sample value conversion between normalized `f32` and signed integers.

/// Converts an f32 sample to i8.
///
/// Uses × 127 for symmetric scaling; out-of-range input is clamped.
#[inline]
pub fn f32_to_i8(sample: f32) -> i8 {
    (sample * 127.0).clamp(-128.0, 127.0) as i8
}

/// Converts an i8 sample to f32 in the range [-1.0, 1.0).
#[inline]
pub fn i8_to_f32(sample: i8) -> f32 {
    f32::from(sample) / 128.0
}

/// Converts f32 samples to i16.
///
/// Input should be in the range [-1.0, 1.0].
/// Values outside this range are clamped.
///
/// Uses × 32767 (not 32768) for symmetric scaling. This means -1.0 maps
/// to -32767 rather than -32768, losing 1 LSB at the negative extreme.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Converts i16 samples to f32.
///
/// Output will be in the range [-1.0, 1.0].
#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / 32768.0
}

/// Converts an f32 sample to i32.
///
/// Computed in f64 so full-scale input does not round past `i32::MAX`.
#[inline]
pub fn f32_to_i32(sample: f32) -> i32 {
    (f64::from(sample) * 2_147_483_647.0).clamp(-2_147_483_648.0, 2_147_483_647.0) as i32
}

/// Converts an i32 sample to f32.
#[inline]
pub fn i32_to_f32(sample: i32) -> f32 {
    (f64::from(sample) / 2_147_483_648.0) as f32
}

/// Normalizes a signed integer sample of `bits` significant bits to f32.
///
/// This is the decoder-side conversion: a 24-bit sample is divided by 2^23,
/// an 8-bit one by 2^7.
#[inline]
pub fn int_to_f32(sample: i32, bits: u16) -> f32 {
    let scale = 2f64.powi(i32::from(bits.clamp(1, 32)) - 1);
    (f64::from(sample) / scale) as f32
}

/// Returns the absolute peak of a block of samples.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// Converts a linear amplitude to decibels full scale.
///
/// Silence maps to negative infinity.
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.log10()
}

/// Converts a gain in decibels to a linear factor.
///
/// Negative infinity maps to exactly 0.0.
pub fn db_to_amplitude(db: f32) -> f32 {
    if db == f32::NEG_INFINITY {
        0.0
    } else {
        10f32.powf(db / 20.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_to_i16_full_range() {
        assert_eq!(f32_to_i16(1.0), 32767);
        assert_eq!(f32_to_i16(-1.0), -32767);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[test]
    fn test_f32_to_i16_clamping() {
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(-2.0), -32768);
    }

    #[test]
    fn test_i16_to_f32_full_range() {
        let max = i16_to_f32(32767);
        assert!((max - 0.99997).abs() < 0.001);

        let min = i16_to_f32(-32768);
        assert!((min - (-1.0)).abs() < 0.001);

        assert_eq!(i16_to_f32(0), 0.0);
    }

    #[test]
    fn test_i8_conversion() {
        assert_eq!(f32_to_i8(1.0), 127);
        assert_eq!(f32_to_i8(-1.0), -127);
        assert_eq!(f32_to_i8(-3.0), -128);
        assert_eq!(i8_to_f32(-128), -1.0);
        assert_eq!(i8_to_f32(64), 0.5);
    }

    #[test]
    fn test_i32_conversion() {
        assert_eq!(f32_to_i32(1.0), i32::MAX);
        assert_eq!(f32_to_i32(-2.0), i32::MIN);
        assert_eq!(f32_to_i32(0.0), 0);
        assert_eq!(i32_to_f32(i32::MIN), -1.0);
        assert!((i32_to_f32(1 << 30) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_int_to_f32_bit_depths() {
        assert_eq!(int_to_f32(-128, 8), -1.0);
        assert_eq!(int_to_f32(16384, 16), 0.5);
        assert_eq!(int_to_f32(-(1 << 23), 24), -1.0);
        assert_eq!(int_to_f32(1 << 30, 32), 0.5);
    }

    #[test]
    fn test_peak() {
        assert_eq!(peak(&[0.1, -0.7, 0.5]), 0.7);
        assert_eq!(peak(&[]), 0.0);
    }

    #[test]
    fn test_db_round_trip() {
        assert_eq!(db_to_amplitude(0.0), 1.0);
        assert_eq!(db_to_amplitude(f32::NEG_INFINITY), 0.0);
        assert!((amplitude_to_db(0.5) + 6.0206).abs() < 0.001);
        assert_eq!(amplitude_to_db(0.0), f32::NEG_INFINITY);
    }
}
