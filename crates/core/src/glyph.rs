//! Per-instance glyph transforms for instanced vector rendering
//!
//! Each glyph is a unit shape pointing along +x. Its model matrix is
//! `translation · rotation(z) · scale(s, s, 1)` where the rotation aligns +x with
//! the sampled vector and `s = magnifier · |v|`.

use crate::error::{VisError, VisResult};
use crate::fields::VectorField;
use crate::grid::CellSize;
use crate::render::Primitive;
use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// One glyph's model matrix, column-major, ready for upload
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlyphInstance {
    /// Four columns of four components
    pub model: [[f32; 4]; 4],
}

impl GlyphInstance {
    /// Compose translation, rotation about z and uniform xy scale
    #[must_use]
    pub fn new(x: f32, y: f32, angle: f32, scale: f32) -> Self {
        let model = Matrix4::new_translation(&Vector3::new(x, y, 0.0))
            * Rotation3::from_axis_angle(&Vector3::z_axis(), angle).to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&Vector3::new(scale, scale, 1.0));
        Self {
            model: model.into(),
        }
    }

    /// Translation component `(x, y)`
    #[must_use]
    pub fn translation(&self) -> (f32, f32) {
        (self.model[3][0], self.model[3][1])
    }

    /// Image of the glyph's +x axis `(x, y)`
    #[must_use]
    pub fn axis(&self) -> (f32, f32) {
        (self.model[0][0], self.model[0][1])
    }
}

/// Glyph geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GlyphShape {
    /// Single line segment from the origin to (1, 0)
    #[default]
    Hedgehog,
    /// Filled arrow drawn as a triangle strip
    Arrow,
}

const HEDGEHOG_VERTICES: [[f32; 2]; 2] = [[0.0, 0.0], [1.0, 0.0]];

const ARROW_VERTICES: [[f32; 2]; 7] = [
    [0.0, -0.05],
    [0.0, 0.05],
    [0.7, -0.05],
    [0.7, 0.05],
    [0.7, -0.2],
    [0.7, 0.2],
    [1.0, 0.0],
];

impl GlyphShape {
    /// Draw primitive for this shape
    #[must_use]
    pub const fn primitive(self) -> Primitive {
        match self {
            Self::Hedgehog => Primitive::Lines,
            Self::Arrow => Primitive::TriangleStrip,
        }
    }

    /// Unit-shape vertices in glyph space
    #[must_use]
    pub const fn vertices(self) -> &'static [[f32; 2]] {
        match self {
            Self::Hedgehog => &HEDGEHOG_VERTICES,
            Self::Arrow => &ARROW_VERTICES,
        }
    }

    /// Index buffer contents
    #[must_use]
    pub fn indices(self) -> Vec<u16> {
        (0..self.vertices().len() as u16).collect()
    }
}

/// Placement of a `count_x × count_y` glyph grid in normalized device coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphLayout {
    count_x: usize,
    count_y: usize,
    origin: (f32, f32),
    spacing: (f32, f32),
}

impl GlyphLayout {
    /// Evenly spaced glyph grid with its own cell size `2 / (count + 1)`
    ///
    /// Glyph `(col, row)` sits at `(col · g + g - 1, row · g + g - 1)`. With one
    /// glyph per simulation cell this coincides with the cell centers.
    ///
    /// # Errors
    ///
    /// Returns [`VisError::EmptyGlyphGrid`] when either count is zero
    pub fn uniform(count_x: usize, count_y: usize) -> VisResult<Self> {
        check_counts(count_x, count_y)?;
        let glyph_cell = |count: usize| 2.0 / (count as f32 + 1.0);
        let (gw, gh) = (glyph_cell(count_x), glyph_cell(count_y));
        Ok(Self {
            count_x,
            count_y,
            origin: (gw - 1.0, gh - 1.0),
            spacing: (gw, gh),
        })
    }

    /// Any glyph count spread over the bordered domain `[w - 1, 1 - w]`
    ///
    /// # Errors
    ///
    /// Returns [`VisError::EmptyGlyphGrid`] when either count is zero
    pub fn fitted(count_x: usize, count_y: usize, cell: CellSize) -> VisResult<Self> {
        check_counts(count_x, count_y)?;
        let spread = |count: usize, border: f32| {
            if count > 1 {
                (2.0 - 2.0 * border) / (count - 1) as f32
            } else {
                0.0
            }
        };
        Ok(Self {
            count_x,
            count_y,
            origin: (cell.width - 1.0, cell.height - 1.0),
            spacing: (spread(count_x, cell.width), spread(count_y, cell.height)),
        })
    }

    /// Glyph columns and rows
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        (self.count_x, self.count_y)
    }

    /// Number of instances
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.count_x * self.count_y
    }

    /// Center of glyph `(col, row)`
    #[must_use]
    pub fn position(&self, col: usize, row: usize) -> (f32, f32) {
        (
            self.origin.0 + col as f32 * self.spacing.0,
            self.origin.1 + row as f32 * self.spacing.1,
        )
    }

    /// Fractional simulation-grid coordinates under glyph `(col, row)`
    ///
    /// Inverse of the cell-center placement `x = (i + 1) · w - 1`.
    #[must_use]
    pub fn grid_point(&self, col: usize, row: usize, cell: CellSize) -> (f32, f32) {
        let (x, y) = self.position(col, row);
        ((x + 1.0 - cell.width) / cell.width, (y + 1.0 - cell.height) / cell.height)
    }

    /// Sample `field` under every glyph, row-major
    ///
    /// `cell` is the simulation cell size of `field`.
    #[must_use]
    pub fn sample_field(&self, field: &VectorField, cell: CellSize) -> VectorField {
        let mut xs = Vec::with_capacity(self.instance_count());
        let mut ys = Vec::with_capacity(self.instance_count());
        for row in 0..self.count_y {
            for col in 0..self.count_x {
                let (gx, gy) = self.grid_point(col, row, cell);
                let (vx, vy) = field.sample(gx, gy);
                xs.push(vx);
                ys.push(vy);
            }
        }
        VectorField::from_components(self.count_x, self.count_y, xs, ys)
    }
}

fn check_counts(count_x: usize, count_y: usize) -> VisResult<()> {
    if count_x == 0 || count_y == 0 {
        return Err(VisError::EmptyGlyphGrid { count_x, count_y });
    }
    Ok(())
}

/// Smallest and largest magnified magnitude of a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeRange {
    /// Smallest value
    pub min: f32,
    /// Largest value
    pub max: f32,
}

/// Transforms and magnified magnitudes for one frame, instance-ordered
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlyphBatch {
    /// One model matrix per glyph
    pub instances: Vec<GlyphInstance>,
    /// `magnifier · |v|` per glyph, uploaded alongside for coloring
    pub magnitudes: Vec<f32>,
}

impl GlyphBatch {
    /// Range of the magnified magnitudes, `None` for an empty batch
    #[must_use]
    pub fn magnitude_range(&self) -> Option<MagnitudeRange> {
        let mut values = self.magnitudes.iter().copied();
        let first = values.next()?;
        let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(MagnitudeRange { min, max })
    }
}

/// Build one transform per glyph from a field sampled on the glyph grid
///
/// # Panics
///
/// Panics if `field` is not `count_x × count_y`
#[must_use]
pub fn generate_glyph_transforms(
    layout: &GlyphLayout,
    field: &VectorField,
    magnifier: f32,
) -> GlyphBatch {
    let (count_x, count_y) = layout.counts();
    assert!(
        field.width == count_x && field.height == count_y,
        "Glyph field must match the glyph grid"
    );

    let mut batch = GlyphBatch {
        instances: Vec::with_capacity(layout.instance_count()),
        magnitudes: Vec::with_capacity(layout.instance_count()),
    };

    for row in 0..count_y {
        for col in 0..count_x {
            let idx = row * count_x + col;
            let (dx, dy) = (field.x[idx], field.y[idx]);
            let angle = if dx == 0.0 && dy == 0.0 {
                0.0
            } else {
                dy.atan2(dx)
            };
            let scale = magnifier * field.magnitude[idx];
            let (x, y) = layout.position(col, row);
            batch.instances.push(GlyphInstance::new(x, y, angle, scale));
            batch.magnitudes.push(scale);
        }
    }

    batch
}
