//! Scalar quantization
//!
//! Values are normalized by the field maximum to an 8-bit image (`[0, 255]`,
//! rounded to nearest), then only the top `n` bits are kept. The result holds
//! level indices `0..=L` with `L = 2^n - 1`, which becomes the new color-mapping
//! range.

use crate::error::{VisError, VisResult};
use tracing::trace;

/// Largest supported bit depth
pub const MAX_BITS: u32 = 8;

/// Highest level index for a bit depth (`2^bits - 1`)
///
/// # Errors
///
/// Returns [`VisError::InvalidBitDepth`] unless `1 <= bits <= 8`
pub fn quantization_bound(bits: u32) -> VisResult<u32> {
    if !(1..=MAX_BITS).contains(&bits) {
        return Err(VisError::InvalidBitDepth(bits));
    }
    Ok((1 << bits) - 1)
}

/// Quantize `values` in place and return the level bound `L`
///
/// A field without a positive finite maximum (all zeros, all negative, empty)
/// becomes an all-zero image. Negative and non-finite samples map to level 0.
///
/// # Errors
///
/// Returns [`VisError::InvalidBitDepth`] unless `1 <= bits <= 8`
pub fn quantize(values: &mut [f32], bits: u32) -> VisResult<u32> {
    let bound = quantization_bound(bits)?;

    let max = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);

    if !(max.is_finite() && max > 0.0) {
        trace!("quantization input has no positive maximum, emitting zero image");
        values.fill(0.0);
        return Ok(bound);
    }

    let shift = MAX_BITS - bits;
    for v in values.iter_mut() {
        let pixel = if v.is_finite() {
            (v.clamp(0.0, max) / max * 255.0).round() as u32
        } else {
            0
        };
        *v = (pixel.min(255) >> shift) as f32;
    }

    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn distinct_levels(values: &[f32]) -> BTreeSet<u32> {
        values.iter().map(|&v| v as u32).collect()
    }

    #[test]
    fn test_bound_per_bit_depth() {
        assert_eq!(quantization_bound(1), Ok(1));
        assert_eq!(quantization_bound(4), Ok(15));
        assert_eq!(quantization_bound(8), Ok(255));
        assert_eq!(quantization_bound(0), Err(VisError::InvalidBitDepth(0)));
        assert_eq!(quantization_bound(9), Err(VisError::InvalidBitDepth(9)));
    }

    #[test]
    fn test_full_ramp_produces_every_level() {
        for bits in 1..=8 {
            let mut ramp: Vec<f32> = (0..=255).map(|v| v as f32 * 0.01).collect();
            let bound = quantize(&mut ramp, bits).unwrap();
            assert_eq!(bound, (1 << bits) - 1);

            let levels = distinct_levels(&ramp);
            assert_eq!(levels.len(), 1 << bits, "bits = {bits}");
            assert_eq!(levels.first(), Some(&0));
            assert_eq!(levels.last(), Some(&bound));
        }
    }

    #[test]
    fn test_eight_bits_is_plain_normalization() {
        let mut values = vec![0.0, 1.0, 2.0, 4.0];
        quantize(&mut values, 8).unwrap();
        // 1/4 * 255 = 63.75 -> 64, 2/4 * 255 = 127.5 -> 128
        assert_eq!(values, vec![0.0, 64.0, 128.0, 255.0]);
    }

    #[test]
    fn test_zero_field_maps_to_zero_image() {
        let mut values = vec![0.0; 9];
        assert_eq!(quantize(&mut values, 3), Ok(7));
        assert!(values.iter().all(|&v| v == 0.0));

        let mut negative = vec![-1.0, -2.0];
        quantize(&mut negative, 3).unwrap();
        assert_eq!(negative, vec![0.0, 0.0]);
    }

    #[test]
    fn test_non_finite_samples_never_propagate() {
        let mut values = vec![f32::NAN, 2.0, f32::INFINITY, -3.0];
        quantize(&mut values, 2).unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
        assert_eq!(values, vec![0.0, 3.0, 0.0, 0.0]);
    }
}
