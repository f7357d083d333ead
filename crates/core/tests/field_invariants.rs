//! Property-based invariants of the field operators.
//!
//! 1. Divergence of a constant vector field is exactly zero
//! 2. Shifting the input by whole cells shifts the divergence identically
//! 3. Transfer function inputs outside [0, 255] clamp to the end colors
//! 4. Opacity correction keeps its identities and stays in [0, 1]
//! 5. Gaussian blur leaves a uniform field unchanged
//! 6. Quantization never exceeds the level bound

use proptest::prelude::*;
use scivis_core::divergence::divergence;
use scivis_core::preprocess::{convolve_wrapped, quantize, GAUSSIAN_3X3};
use scivis_core::transfer::opacity_correction;
use scivis_core::{GridDims, TransferFunction};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Strategies ──────────────────────────────────────────────────────────────

fn field_strategy() -> impl Strategy<Value = (usize, Vec<f32>, Vec<f32>)> {
    (1usize..=12).prop_flat_map(|dim| {
        let n = dim * dim;
        (
            Just(dim),
            proptest::collection::vec(-10.0f32..10.0, n),
            proptest::collection::vec(-10.0f32..10.0, n),
        )
    })
}

fn shift(values: &[f32], dim: usize, dx: usize, dy: usize) -> Vec<f32> {
    let mut out = vec![0.0; values.len()];
    for y in 0..dim {
        for x in 0..dim {
            out[((y + dy) % dim) * dim + (x + dx) % dim] = values[y * dim + x];
        }
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn constant_field_has_zero_divergence(
        dim in 1usize..=16,
        vx in -100.0f32..100.0,
        vy in -100.0f32..100.0,
    ) {
        let dims = GridDims::new(dim).unwrap();
        let n = dims.cell_count();
        let div = divergence(dims, &vec![vx; n], &vec![vy; n], dims.cell_size());
        prop_assert!(div.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn divergence_commutes_with_translation(
        (dim, fx, fy) in field_strategy(),
        dx in 0usize..12,
        dy in 0usize..12,
    ) {
        let dims = GridDims::new(dim).unwrap();
        let cell = dims.cell_size();

        let shifted = divergence(dims, &shift(&fx, dim, dx, dy), &shift(&fy, dim, dx, dy), cell);
        let expected = shift(&divergence(dims, &fx, &fy, cell), dim, dx, dy);
        for (a, b) in shifted.iter().zip(&expected) {
            prop_assert!((a - b).abs() <= 1e-3 * b.abs().max(1.0), "{a} vs {b}");
        }
    }

    #[test]
    fn transfer_function_clamps_out_of_range(value in -1000.0f32..1000.0) {
        let tf = TransferFunction::default();
        let color = tf.evaluate(value);
        prop_assert_eq!(color, tf.evaluate(value.clamp(0.0, 255.0)));
        prop_assert!((0.0..=1.0).contains(&color.a));
    }

    #[test]
    fn opacity_correction_identities(alpha in 0.0f32..=1.0, ratio in 0.0f32..8.0) {
        prop_assert!((opacity_correction(alpha, 1.0) - alpha).abs() < 1e-6);
        prop_assert_eq!(opacity_correction(0.0, ratio), 0.0);
        let corrected = opacity_correction(alpha, ratio);
        prop_assert!((0.0..=1.0).contains(&corrected));
    }

    #[test]
    fn blur_preserves_uniform_fields(
        width in 1usize..10,
        height in 1usize..10,
        value in -50.0f32..50.0,
    ) {
        let out = convolve_wrapped(&vec![value; width * height], width, height, &GAUSSIAN_3X3);
        for v in out {
            prop_assert!((v - value).abs() <= 1e-4 * value.abs().max(1.0));
        }
    }

    #[test]
    fn quantized_levels_stay_within_bound(
        mut values in proptest::collection::vec(-5.0f32..50.0, 1..200),
        bits in 1u32..=8,
    ) {
        let bound = quantize(&mut values, bits).unwrap();
        prop_assert_eq!(bound, (1 << bits) - 1);
        for v in values {
            prop_assert!(v >= 0.0 && v <= bound as f32 && v.fract() == 0.0);
        }
    }
}

#[test]
fn quantization_with_n_bits_uses_every_level() {
    let ramp: Vec<f32> = (0..=255).map(|i| i as f32).collect();
    for bits in 1..=8 {
        let mut values = ramp.clone();
        let bound = quantize(&mut values, bits).unwrap();
        let mut levels: Vec<u32> = values.iter().map(|&v| v as u32).collect();
        levels.sort_unstable();
        levels.dedup();
        assert_eq!(levels.len(), 1 << bits, "bits = {bits}");
        assert_eq!(levels.last().copied(), Some(bound));
    }
}
