//! Line integral convolution geometry
//!
//! The LIC texture covers the viewport minus the one-cell border on each side.
//! The border never eats the whole viewport: at least one texel remains, which
//! matters for single-cell grids whose cell spans the full half-extent.
//! The integration step is `factor / texture_width` in texture coordinates, so a
//! factor of 1 advances one texel per step.

use crate::error::{VisError, VisResult};
use crate::grid::CellSize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Step factor applied after every resize
pub const DEFAULT_STEP_FACTOR: f32 = 0.5;

/// LIC texture size and integration step for one viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LicGeometry {
    /// Texture width in texels
    pub texture_width: u32,
    /// Texture height in texels
    pub texture_height: u32,
    /// Border width in pixels on each side
    pub border_x: u32,
    /// Border height in pixels on each side
    pub border_y: u32,
    /// Integration step in texture coordinates
    pub step_size: f32,
}

impl LicGeometry {
    /// Derive the texture size for a viewport and grid cell
    ///
    /// # Errors
    ///
    /// Returns an error for an empty viewport or a factor that is not finite
    /// and positive
    pub fn from_viewport(
        width: u32,
        height: u32,
        cell: CellSize,
        step_factor: f32,
    ) -> VisResult<Self> {
        // Cell extents are in NDC, where the viewport spans 2 units
        if width == 0 || height == 0 {
            return Err(VisError::invalid_parameter(
                "viewport",
                &format!("{width} x {height} leaves no room for the LIC texture"),
            ));
        }
        let border = |extent: u32, cell_extent: f32| {
            ((cell_extent * 0.5 * extent as f32).round() as u32).min((extent - 1) / 2)
        };
        let border_x = border(width, cell.width);
        let border_y = border(height, cell.height);
        let texture_width = width - 2 * border_x;
        let texture_height = height - 2 * border_y;

        let mut geometry = Self {
            texture_width,
            texture_height,
            border_x,
            border_y,
            step_size: 0.0,
        };
        geometry.set_step_factor(step_factor)?;
        debug!(
            texture_width,
            texture_height,
            step_size = geometry.step_size,
            "LIC geometry updated"
        );
        Ok(geometry)
    }

    /// Recompute the step size from a new factor
    ///
    /// # Errors
    ///
    /// Rejects factors that are not finite and positive
    pub fn set_step_factor(&mut self, step_factor: f32) -> VisResult<()> {
        if !(step_factor.is_finite() && step_factor > 0.0) {
            return Err(VisError::invalid_parameter(
                "LIC step factor",
                &format!("must be finite and positive, got {step_factor}"),
            ));
        }
        // Square textures are assumed, so only the width enters
        self.step_size = step_factor / self.texture_width as f32;
        Ok(())
    }

    /// Texels in the texture
    #[must_use]
    pub fn texel_count(&self) -> usize {
        self.texture_width as usize * self.texture_height as usize
    }
}

/// White noise texture, one byte per texel, reproducible for a given seed
#[must_use]
pub fn noise_texture(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..width as usize * height as usize)
        .map(|_| rng.random::<u8>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_texture_excludes_border() {
        // DIM = 4 gives cell 0.4, i.e. 20% of the half-width
        let cell = CellSize::new(0.4, 0.4).unwrap();
        let geometry = LicGeometry::from_viewport(500, 400, cell, DEFAULT_STEP_FACTOR).unwrap();
        assert_eq!(geometry.border_x, 100);
        assert_eq!(geometry.border_y, 80);
        assert_eq!(geometry.texture_width, 300);
        assert_eq!(geometry.texture_height, 240);
        assert_relative_eq!(geometry.step_size, 0.5 / 300.0);
    }

    #[test]
    fn test_step_factor_validation() {
        let cell = CellSize::new(0.1, 0.1).unwrap();
        let mut geometry = LicGeometry::from_viewport(200, 200, cell, 1.0).unwrap();
        assert!(geometry.set_step_factor(0.0).is_err());
        assert!(geometry.set_step_factor(f32::NAN).is_err());
        geometry.set_step_factor(2.0).unwrap();
        assert_relative_eq!(geometry.step_size, 2.0 / 180.0);
    }

    #[test]
    fn test_empty_viewport_rejected() {
        let cell = CellSize::new(0.4, 0.4).unwrap();
        assert!(LicGeometry::from_viewport(0, 4, cell, 0.5).is_err());
        assert!(LicGeometry::from_viewport(4, 0, cell, 0.5).is_err());
    }

    #[test]
    fn test_single_cell_border_leaves_texels() {
        // DIM = 1 gives cell 1.0, a border of the full half-extent
        let cell = CellSize::new(1.0, 1.0).unwrap();
        let geometry = LicGeometry::from_viewport(800, 800, cell, DEFAULT_STEP_FACTOR).unwrap();
        assert_eq!(geometry.border_x, 399);
        assert_eq!(geometry.texture_width, 2);
        assert_eq!(geometry.texture_height, 2);

        let odd = LicGeometry::from_viewport(5, 1, cell, DEFAULT_STEP_FACTOR).unwrap();
        assert_eq!((odd.texture_width, odd.texture_height), (1, 1));
        assert_eq!((odd.border_x, odd.border_y), (2, 0));
        assert!(odd.step_size.is_finite());
    }

    #[test]
    fn test_noise_is_seeded() {
        let a = noise_texture(16, 8, 7);
        let b = noise_texture(16, 8, 7);
        let c = noise_texture(16, 8, 8);
        assert_eq!(a.len(), 128);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
