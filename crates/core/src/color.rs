//! Colors, color maps and scalar-to-color mapping
//!
//! [`Rgba`] is `#[repr(C)]` plain-old-data so color-map textures can be uploaded
//! with `bytemuck::cast_slice` without copying.

use crate::error::{VisError, VisResult};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Linear RGBA color with components in `[0, 1]`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct Rgba {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha (opacity)
    pub a: f32,
}

impl Rgba {
    /// Opaque blue
    pub const BLUE: Self = Self::opaque(0.0, 0.0, 1.0);
    /// Opaque green
    pub const GREEN: Self = Self::opaque(0.0, 1.0, 0.0);
    /// Opaque red
    pub const RED: Self = Self::opaque(1.0, 0.0, 0.0);
    /// Opaque black
    pub const BLACK: Self = Self::opaque(0.0, 0.0, 0.0);
    /// Opaque white
    pub const WHITE: Self = Self::opaque(1.0, 1.0, 1.0);
    /// Fully transparent black
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a color from all four components
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a fully opaque color
    #[must_use]
    pub const fn opaque(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Linear interpolation, `t = 0` giving `self` and `t = 1` giving `other`
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: f32, b: f32| a * (1.0 - t) + b * t;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    /// Same color with its channels multiplied by alpha
    #[must_use]
    pub fn premultiplied(self) -> Self {
        Self {
            r: self.r * self.a,
            g: self.g * self.a,
            b: self.b * self.a,
            a: self.a,
        }
    }

    /// Same color with a different alpha
    #[must_use]
    pub const fn with_alpha(self, a: f32) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }
}

/// Ordered color stops sampled with linear interpolation
///
/// Serialized as the bare stop list. Deserialization goes through
/// [`ColorMap::new`], so an empty list is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Rgba>", into = "Vec<Rgba>")]
pub struct ColorMap {
    stops: Vec<Rgba>,
}

impl TryFrom<Vec<Rgba>> for ColorMap {
    type Error = VisError;

    fn try_from(stops: Vec<Rgba>) -> VisResult<Self> {
        Self::new(stops)
    }
}

impl From<ColorMap> for Vec<Rgba> {
    fn from(map: ColorMap) -> Self {
        map.stops
    }
}

impl ColorMap {
    /// Create a color map from evenly spaced stops
    ///
    /// # Errors
    ///
    /// Returns an error when `stops` is empty
    pub fn new(stops: Vec<Rgba>) -> VisResult<Self> {
        if stops.is_empty() {
            return Err(VisError::invalid_parameter(
                "color map",
                "must contain at least one stop",
            ));
        }
        Ok(Self { stops })
    }

    /// Blue → green → red
    #[must_use]
    pub fn rainbow() -> Self {
        Self {
            stops: vec![Rgba::BLUE, Rgba::GREEN, Rgba::RED],
        }
    }

    /// Black → white
    #[must_use]
    pub fn grayscale() -> Self {
        Self {
            stops: vec![Rgba::BLACK, Rgba::WHITE],
        }
    }

    /// Black → red → yellow → white
    #[must_use]
    pub fn heat() -> Self {
        Self {
            stops: vec![
                Rgba::BLACK,
                Rgba::RED,
                Rgba::opaque(1.0, 1.0, 0.0),
                Rgba::WHITE,
            ],
        }
    }

    /// Color stops, first to last
    #[must_use]
    pub fn stops(&self) -> &[Rgba] {
        &self.stops
    }

    /// Color at normalized position `t`
    ///
    /// `t` is clamped to `[0, 1]`; NaN samples the first stop.
    #[must_use]
    pub fn sample(&self, t: f32) -> Rgba {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let last = self.stops.len() - 1;
        if last == 0 {
            return self.stops[0];
        }
        let pos = t * last as f32;
        let i = (pos.floor() as usize).min(last - 1);
        self.stops[i].lerp(self.stops[i + 1], pos - i as f32)
    }

    /// `texels` evenly spaced samples from the first to the last stop
    #[must_use]
    pub fn texture(&self, texels: usize) -> Vec<Rgba> {
        match texels {
            0 => Vec::new(),
            1 => vec![self.sample(0.0)],
            n => (0..n)
                .map(|k| self.sample(k as f32 / (n - 1) as f32))
                .collect(),
        }
    }
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::rainbow()
    }
}

/// Clamping range plus color map applied to scalar fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarMapping {
    /// Value mapped to the first color stop
    pub clamp_min: f32,
    /// Value mapped to the last color stop
    pub clamp_max: f32,
    /// Colors sampled over the range
    pub color_map: ColorMap,
}

impl Default for ScalarMapping {
    fn default() -> Self {
        Self {
            clamp_min: 0.0,
            clamp_max: 1.0,
            color_map: ColorMap::rainbow(),
        }
    }
}

impl ScalarMapping {
    /// Check that the range is finite and non-empty
    ///
    /// # Errors
    ///
    /// Returns an error unless `clamp_min < clamp_max`, both finite
    pub fn validate(&self) -> VisResult<()> {
        if !(self.clamp_min.is_finite() && self.clamp_max.is_finite())
            || self.clamp_min >= self.clamp_max
        {
            return Err(VisError::invalid_parameter(
                "scalar clamping range",
                &format!(
                    "must satisfy min < max, got [{}, {}]",
                    self.clamp_min, self.clamp_max
                ),
            ));
        }
        Ok(())
    }

    /// Replace the clamping range
    ///
    /// # Errors
    ///
    /// Rejects empty or non-finite ranges, leaving the old range in place
    pub fn set_range(&mut self, min: f32, max: f32) -> VisResult<()> {
        let candidate = Self {
            clamp_min: min,
            clamp_max: max,
            color_map: ColorMap::default(),
        };
        candidate.validate()?;
        self.clamp_min = min;
        self.clamp_max = max;
        Ok(())
    }

    /// Copy of this mapping spanning the quantized levels `[0, bound]`
    #[must_use]
    pub fn with_quantization_bound(&self, bound: u32) -> Self {
        Self {
            clamp_min: 0.0,
            clamp_max: bound.max(1) as f32,
            color_map: self.color_map.clone(),
        }
    }

    /// Position of `value` within the clamping range, in `[0, 1]`
    #[must_use]
    pub fn normalize(&self, value: f32) -> f32 {
        let t = (value - self.clamp_min) / (self.clamp_max - self.clamp_min);
        if t.is_nan() {
            0.0
        } else {
            t.clamp(0.0, 1.0)
        }
    }

    /// One color per value
    #[must_use]
    pub fn map(&self, values: &[f32]) -> Vec<Rgba> {
        values
            .iter()
            .map(|&v| self.color_map.sample(self.normalize(v)))
            .collect()
    }
}
