//! Transfer function and pre-integrated volume lookup tables
//!
//! The transfer function maps a byte-range scalar to a color and opacity:
//!
//! ```text
//! v     = clamp(value, 0, 255) / 255
//! alpha = base                                      if v < threshold
//!       = base + ramp · (v - threshold) / (1 - threshold)  otherwise
//! color = low → mid over [0, 0.5), mid → high over [0.5, 1]
//! ```
//!
//! With the defaults (threshold 0.2, base 0.5, ramp 0.5) opacity reaches 1 at 255.
//!
//! A pre-integration table stores, for every pair of entry and exit values, the
//! color accumulated by compositing `steps` evenly spaced samples front to back.
//! Each sample's opacity is corrected for the sub-step length `1 / steps`.

use crate::color::Rgba;
use crate::error::{VisError, VisResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest scalar value accepted by the transfer function
pub const MAX_VALUE: f32 = 255.0;

/// Piecewise-linear scalar → RGBA mapping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    /// Color at 0
    pub low: Rgba,
    /// Color at the midpoint
    pub mid: Rgba,
    /// Color at 255
    pub high: Rgba,
    /// Normalized value below which opacity stays at `base_alpha`
    pub opaque_threshold: f32,
    /// Opacity below the threshold
    pub base_alpha: f32,
    /// Opacity gained between the threshold and 255
    pub ramp_scale: f32,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self {
            low: Rgba::BLUE,
            mid: Rgba::GREEN,
            high: Rgba::RED,
            opaque_threshold: 0.2,
            base_alpha: 0.5,
            ramp_scale: 0.5,
        }
    }
}

impl TransferFunction {
    /// Check coefficient ranges
    ///
    /// # Errors
    ///
    /// Rejects thresholds outside `[0, 1)` and opacities that can leave `[0, 1]`
    pub fn validate(&self) -> VisResult<()> {
        if !(0.0..1.0).contains(&self.opaque_threshold) {
            return Err(VisError::invalid_parameter(
                "opaque_threshold",
                "must lie within [0, 1)",
            ));
        }
        let peak = self.base_alpha + self.ramp_scale;
        if !(0.0..=1.0).contains(&self.base_alpha)
            || !(0.0..=1.0).contains(&peak)
            || self.ramp_scale < 0.0
        {
            return Err(VisError::invalid_parameter(
                "transfer function opacity",
                "must stay within [0, 1]",
            ));
        }
        Ok(())
    }

    /// Color and opacity of a scalar in `[0, 255]`
    ///
    /// Values outside the range are clamped; NaN reads as 0.
    #[must_use]
    pub fn evaluate(&self, value: f32) -> Rgba {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, MAX_VALUE) };
        let v = value / MAX_VALUE;

        let alpha = if v < self.opaque_threshold {
            self.base_alpha
        } else {
            self.base_alpha
                + self.ramp_scale * (v - self.opaque_threshold) / (1.0 - self.opaque_threshold)
        };

        let color = if v < 0.5 {
            self.low.lerp(self.mid, 2.0 * v)
        } else {
            self.mid.lerp(self.high, 2.0 * (v - 0.5))
        };
        color.with_alpha(alpha)
    }
}

/// Opacity of a sample whose length is `sample_ratio` times the reference length
#[must_use]
pub fn opacity_correction(alpha: f32, sample_ratio: f32) -> f32 {
    1.0 - (1.0 - alpha).powf(sample_ratio)
}

/// `resolution × resolution` table of composited colors, row = entry value
#[derive(Debug, Clone, PartialEq)]
pub struct PreIntegrationTable {
    resolution: usize,
    steps: u32,
    transfer: TransferFunction,
    entries: Vec<Rgba>,
}

impl PreIntegrationTable {
    /// Composite every (entry, exit) pair
    ///
    /// Bin `i` stands for the value `i · 255 / (resolution - 1)`. Colors are
    /// premultiplied by opacity.
    ///
    /// # Errors
    ///
    /// Returns an error when `resolution < 2` or `steps == 0`
    pub fn build(transfer: &TransferFunction, resolution: usize, steps: u32) -> VisResult<Self> {
        if resolution < 2 {
            return Err(VisError::invalid_parameter(
                "pre-integration resolution",
                &format!("must be at least 2, got {resolution}"),
            ));
        }
        if steps == 0 {
            return Err(VisError::invalid_parameter(
                "pre-integration steps",
                "must be at least 1",
            ));
        }

        let bin = |i: usize| i as f32 * MAX_VALUE / (resolution - 1) as f32;
        let ratio = 1.0 / steps as f32;
        let mut entries = vec![Rgba::TRANSPARENT; resolution * resolution];

        entries
            .par_chunks_mut(resolution)
            .enumerate()
            .for_each(|(i, row)| {
                let entry = bin(i);
                for (j, texel) in row.iter_mut().enumerate() {
                    let exit = bin(j);
                    let mut acc = Rgba::TRANSPARENT;
                    for k in 0..steps {
                        let s = entry + (exit - entry) * (k as f32 + 0.5) * ratio;
                        let sample = transfer.evaluate(s);
                        let alpha = opacity_correction(sample.a, ratio);
                        let weight = (1.0 - acc.a) * alpha;
                        acc.r += weight * sample.r;
                        acc.g += weight * sample.g;
                        acc.b += weight * sample.b;
                        acc.a += weight;
                    }
                    *texel = acc;
                }
            });

        Ok(Self {
            resolution,
            steps,
            transfer: *transfer,
            entries,
        })
    }

    /// Bins per axis
    #[must_use]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Sub-steps composited per entry
    #[must_use]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Composited color for entry bin `i` and exit bin `j`
    ///
    /// # Panics
    ///
    /// Panics if either bin is out of range
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Rgba {
        assert!(
            i < self.resolution && j < self.resolution,
            "Coordinates out of bounds"
        );
        self.entries[i * self.resolution + j]
    }

    /// Row-major entries for texture upload
    #[must_use]
    pub fn entries(&self) -> &[Rgba] {
        &self.entries
    }

    fn matches(&self, transfer: &TransferFunction, resolution: usize, steps: u32) -> bool {
        self.resolution == resolution && self.steps == steps && self.transfer == *transfer
    }
}

/// Keeps the last table and rebuilds it only when its inputs change
#[derive(Debug, Default)]
pub struct PreIntegrationCache {
    table: Option<PreIntegrationTable>,
    rebuilds: u64,
}

impl PreIntegrationCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for the given inputs, rebuilding if any of them changed
    ///
    /// # Errors
    ///
    /// Propagates [`PreIntegrationTable::build`] errors; the previous table is kept
    pub fn get_or_build(
        &mut self,
        transfer: &TransferFunction,
        resolution: usize,
        steps: u32,
    ) -> VisResult<&PreIntegrationTable> {
        match self.table.take() {
            Some(table) if table.matches(transfer, resolution, steps) => {
                Ok(&*self.table.insert(table))
            }
            previous => {
                let table = match PreIntegrationTable::build(transfer, resolution, steps) {
                    Ok(table) => table,
                    Err(e) => {
                        self.table = previous;
                        return Err(e);
                    }
                };
                self.rebuilds += 1;
                debug!(resolution, steps, rebuilds = self.rebuilds, "rebuilt pre-integration table");
                Ok(&*self.table.insert(table))
            }
        }
    }

    /// Number of table builds so far
    #[must_use]
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Drop the cached table
    pub fn invalidate(&mut self) {
        self.table = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transfer_function_anchors() {
        let tf = TransferFunction::default();

        let low = tf.evaluate(0.0);
        assert_eq!(low, Rgba::new(0.0, 0.0, 1.0, 0.5));

        let high = tf.evaluate(255.0);
        assert_eq!(high, Rgba::new(1.0, 0.0, 0.0, 1.0));

        let mid = tf.evaluate(127.5);
        assert_eq!((mid.r, mid.g, mid.b), (0.0, 1.0, 0.0));
    }

    #[test]
    fn test_alpha_ramp_is_continuous_at_threshold() {
        let tf = TransferFunction::default();
        assert_relative_eq!(tf.evaluate(0.2 * 255.0).a, 0.5, epsilon = 1e-6);
        assert_relative_eq!(tf.evaluate(0.6 * 255.0).a, 0.75, epsilon = 1e-5);
        assert_eq!(tf.evaluate(0.1 * 255.0).a, 0.5);
    }

    #[test]
    fn test_inputs_are_clamped_not_wrapped() {
        let tf = TransferFunction::default();
        assert_eq!(tf.evaluate(-40.0), tf.evaluate(0.0));
        assert_eq!(tf.evaluate(300.0), tf.evaluate(255.0));
        assert_eq!(tf.evaluate(f32::NAN), tf.evaluate(0.0));
    }

    #[test]
    fn test_opacity_correction_identities() {
        assert_relative_eq!(opacity_correction(0.3, 1.0), 0.3, epsilon = 1e-6);
        assert_eq!(opacity_correction(0.0, 0.01), 0.0);
        assert_eq!(opacity_correction(1.0, 0.5), 1.0);
        // Two half-length samples composite to one full-length sample
        let half = opacity_correction(0.6, 0.5);
        assert_relative_eq!(1.0 - (1.0 - half) * (1.0 - half), 0.6, epsilon = 1e-6);
    }

    #[test]
    fn test_table_diagonal_is_premultiplied_transfer_function() {
        let tf = TransferFunction::default();
        let table = PreIntegrationTable::build(&tf, 16, 100).unwrap();
        for i in 0..16 {
            let value = i as f32 * 255.0 / 15.0;
            let expected = tf.evaluate(value).premultiplied();
            let actual = table.get(i, i);
            assert_relative_eq!(actual.r, expected.r, epsilon = 1e-4);
            assert_relative_eq!(actual.g, expected.g, epsilon = 1e-4);
            assert_relative_eq!(actual.b, expected.b, epsilon = 1e-4);
            assert_relative_eq!(actual.a, expected.a, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_table_orders_entry_before_exit() {
        let tf = TransferFunction::default();
        let table = PreIntegrationTable::build(&tf, 8, 100).unwrap();
        // Entering at red composites red in front of blue
        let red_first = table.get(7, 0);
        let blue_first = table.get(0, 7);
        assert!(red_first.r > blue_first.r);
        assert!(blue_first.b > red_first.b);
        assert_eq!(table.entries().len(), 64);
    }

    #[test]
    fn test_table_rejects_degenerate_sizes() {
        let tf = TransferFunction::default();
        assert!(PreIntegrationTable::build(&tf, 1, 100).is_err());
        assert!(PreIntegrationTable::build(&tf, 8, 0).is_err());
    }

    #[test]
    fn test_cache_rebuilds_only_on_key_change() {
        let mut cache = PreIntegrationCache::new();
        let tf = TransferFunction::default();

        cache.get_or_build(&tf, 8, 10).unwrap();
        cache.get_or_build(&tf, 8, 10).unwrap();
        assert_eq!(cache.rebuilds(), 1);

        cache.get_or_build(&tf, 8, 20).unwrap();
        assert_eq!(cache.rebuilds(), 2);

        cache.get_or_build(&tf, 12, 20).unwrap();
        assert_eq!(cache.rebuilds(), 3);

        let brighter = TransferFunction {
            base_alpha: 0.25,
            ..tf
        };
        let table = cache.get_or_build(&brighter, 12, 20).unwrap();
        assert_eq!(table.resolution(), 12);
        assert_eq!(cache.rebuilds(), 4);
    }

    #[test]
    fn test_cache_keeps_table_on_error() {
        let mut cache = PreIntegrationCache::new();
        let tf = TransferFunction::default();
        cache.get_or_build(&tf, 8, 10).unwrap();
        assert!(cache.get_or_build(&tf, 0, 10).is_err());
        cache.get_or_build(&tf, 8, 10).unwrap();
        assert_eq!(cache.rebuilds(), 1);
    }
}
