//! Field data structures for scalar and vector samples
//!
//! Both containers store values as flat `Vec<f32>` in row-major order
//! (`y * width + x`). Scalar fields are ephemeral: one is produced per frame and
//! handed through the preprocessing stages.

/// Scalar field container
///
/// Usually `dim × dim`, but slicing produces `dim × window` images, so the
/// width and height are tracked separately.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    /// Field values in row-major order (y * width + x)
    pub data: Vec<f32>,
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
}

impl ScalarField {
    /// Create a new field with given dimensions, initialized to zero
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_value(width, height, 0.0)
    }

    /// Create a new field with given dimensions, initialized to a value
    ///
    /// # Arguments
    ///
    /// * `width` - Grid width in cells
    /// * `height` - Grid height in cells
    /// * `value` - Initial value for all cells
    #[must_use]
    pub fn with_value(width: usize, height: usize, value: f32) -> Self {
        Self {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Wrap existing samples
    ///
    /// # Panics
    ///
    /// Panics if `data` does not hold exactly `width * height` values
    #[must_use]
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "Field buffer length must equal width * height"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// Get reference to field data
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Get mutable reference to field data
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the field has no cells
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x]
    }

    /// Set value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x] = value;
    }

    /// Fill entire field with a value
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Smallest and largest finite value, `None` when no value is finite
    #[must_use]
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Vector field with a derived magnitude channel
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    /// X components in row-major order
    pub x: Vec<f32>,
    /// Y components in row-major order
    pub y: Vec<f32>,
    /// `hypot(x, y)` per cell
    pub magnitude: Vec<f32>,
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
}

impl VectorField {
    /// Build from component buffers, deriving the magnitude channel
    ///
    /// # Panics
    ///
    /// Panics if either buffer does not hold exactly `width * height` values
    #[must_use]
    pub fn from_components(width: usize, height: usize, x: Vec<f32>, y: Vec<f32>) -> Self {
        assert!(
            x.len() == width * height && y.len() == width * height,
            "Vector component buffers must equal width * height"
        );
        let magnitude = x.iter().zip(&y).map(|(vx, vy)| vx.hypot(*vy)).collect();
        Self {
            x,
            y,
            magnitude,
            width,
            height,
        }
    }

    /// Bilinear sample at fractional grid coordinates `(gx, gy)`
    ///
    /// Integer coordinates hit cell centers. The grid is toroidal, so
    /// coordinates past the last column blend with the first and negative
    /// ones wrap around.
    ///
    /// # Panics
    ///
    /// Panics if the field is empty
    #[must_use]
    pub fn sample(&self, gx: f32, gy: f32) -> (f32, f32) {
        assert!(
            self.width > 0 && self.height > 0,
            "Cannot sample an empty vector field"
        );
        let (x0, x1, tx) = wrap_axis(gx, self.width);
        let (y0, y1, ty) = wrap_axis(gy, self.height);

        let corners = [
            (y0 * self.width + x0, (1.0 - tx) * (1.0 - ty)),
            (y0 * self.width + x1, tx * (1.0 - ty)),
            (y1 * self.width + x0, (1.0 - tx) * ty),
            (y1 * self.width + x1, tx * ty),
        ];
        corners.iter().fold((0.0, 0.0), |(vx, vy), &(idx, weight)| {
            (vx + self.x[idx] * weight, vy + self.y[idx] * weight)
        })
    }
}

/// Wrapped lower and upper indices around `coord`, plus the upper weight
fn wrap_axis(coord: f32, len: usize) -> (usize, usize, f32) {
    let floor = coord.floor();
    let lower = (floor as i64).rem_euclid(len as i64) as usize;
    (lower, (lower + 1) % len, coord - floor)
}
