//! Toroidal grid addressing and the read-only grid sampler
//!
//! Cells are stored row-major (`idx = y * dim + x`). Neighbor queries wrap at the
//! grid boundaries, so the previous row of row 0 is row `dim - 1` and the previous
//! column of column 0 is column `dim - 1`.

use crate::divergence::{divergence, divergence_at};
use crate::error::{VisError, VisResult};
use crate::fields::{ScalarField, VectorField};
use crate::source::FluidSource;
use serde::{Deserialize, Serialize};

/// Smallest accepted grid dimension
pub const MIN_DIM: usize = 1;

/// Square grid dimensions (`dim × dim` cells)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    dim: usize,
}

impl GridDims {
    /// Validate and wrap a grid dimension
    ///
    /// # Errors
    ///
    /// Returns [`VisError::InvalidDimension`] when `dim` is below [`MIN_DIM`]
    pub fn new(dim: usize) -> VisResult<Self> {
        if dim < MIN_DIM {
            return Err(VisError::InvalidDimension {
                actual: dim,
                min: MIN_DIM,
            });
        }
        Ok(Self { dim })
    }

    /// Cells per row and per column
    #[must_use]
    pub const fn dim(self) -> usize {
        self.dim
    }

    /// Total number of cells (`dim * dim`)
    #[must_use]
    pub const fn cell_count(self) -> usize {
        self.dim * self.dim
    }

    /// Row-major index of cell `(x, y)`
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[must_use]
    pub fn index(self, x: usize, y: usize) -> usize {
        assert!(x < self.dim && y < self.dim, "Coordinates out of bounds");
        y * self.dim + x
    }

    /// Cell coordinates `(x, y)` of a row-major index
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not a cell of this grid
    #[must_use]
    pub fn coords(self, idx: usize) -> (usize, usize) {
        assert!(idx < self.cell_count(), "Cell index out of bounds");
        (idx % self.dim, idx / self.dim)
    }

    /// Index of the cell at `(x + dx, y + dy)` with wrap-around on both axes
    #[must_use]
    pub fn wrapped(self, x: usize, y: usize, dx: isize, dy: isize) -> usize {
        let dim = self.dim as isize;
        let wx = (x as isize + dx).rem_euclid(dim) as usize;
        let wy = (y as isize + dy).rem_euclid(dim) as usize;
        wy * self.dim + wx
    }

    /// Previous column (`x - 1`, wrapping to `dim - 1`)
    #[must_use]
    pub fn west(self, idx: usize) -> usize {
        let (x, y) = self.coords(idx);
        self.wrapped(x, y, -1, 0)
    }

    /// Next column (`x + 1`, wrapping to 0)
    #[must_use]
    pub fn east(self, idx: usize) -> usize {
        let (x, y) = self.coords(idx);
        self.wrapped(x, y, 1, 0)
    }

    /// Previous row (`y - 1`, wrapping to `dim - 1`)
    #[must_use]
    pub fn north(self, idx: usize) -> usize {
        let (x, y) = self.coords(idx);
        self.wrapped(x, y, 0, -1)
    }

    /// Next row (`y + 1`, wrapping to 0)
    #[must_use]
    pub fn south(self, idx: usize) -> usize {
        let (x, y) = self.coords(idx);
        self.wrapped(x, y, 0, 1)
    }

    /// Cell size that fits `dim` cells plus a one-cell border into the `[-1, 1]` domain
    #[must_use]
    pub fn cell_size(self) -> CellSize {
        let size = 2.0 / (self.dim + 1) as f32;
        CellSize {
            width: size,
            height: size,
        }
    }
}

/// Size of one grid cell in normalized device coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize {
    /// Horizontal extent
    pub width: f32,
    /// Vertical extent
    pub height: f32,
}

impl CellSize {
    /// Validate a cell size
    ///
    /// # Errors
    ///
    /// Returns [`VisError::InvalidCellSize`] unless both extents are finite and positive
    pub fn new(width: f32, height: f32) -> VisResult<Self> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) {
            return Err(VisError::InvalidCellSize { width, height });
        }
        Ok(Self { width, height })
    }
}

/// Scalar quantities that can be displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScalarKind {
    /// Fluid density
    #[default]
    Density,
    /// Velocity magnitude
    VelocityMagnitude,
    /// Force field magnitude
    ForceMagnitude,
    /// Divergence of the velocity field
    VelocityDivergence,
    /// Divergence of the force field
    ForceDivergence,
}

impl ScalarKind {
    /// Vector field whose divergence this quantity is, if any
    #[must_use]
    pub const fn divergence_of(self) -> Option<VectorKind> {
        match self {
            Self::VelocityDivergence => Some(VectorKind::Velocity),
            Self::ForceDivergence => Some(VectorKind::Force),
            Self::Density | Self::VelocityMagnitude | Self::ForceMagnitude => None,
        }
    }
}

/// Vector quantities that can be displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VectorKind {
    /// Fluid velocity
    #[default]
    Velocity,
    /// External force field
    Force,
}

/// Read-only view over the current simulation snapshot
///
/// Borrowing the source for the sampler's lifetime guarantees every query in a
/// frame reads the same snapshot.
pub struct GridSampler<'a> {
    source: &'a dyn FluidSource,
    dims: GridDims,
    cell: CellSize,
}

impl<'a> GridSampler<'a> {
    /// Wrap a simulation snapshot
    ///
    /// # Panics
    ///
    /// Panics if the source dimension or any of its buffers disagree with `dims`
    pub fn new(source: &'a dyn FluidSource, dims: GridDims, cell: CellSize) -> Self {
        assert_eq!(
            source.dim(),
            dims.dim(),
            "Simulation dimension does not match the visualization grid"
        );
        let n = dims.cell_count();
        assert!(
            source.density().len() == n
                && source.vx().len() == n
                && source.vy().len() == n
                && source.fx().len() == n
                && source.fy().len() == n,
            "Simulation buffers must hold exactly dim * dim cells"
        );
        Self { source, dims, cell }
    }

    /// Grid dimensions of the snapshot
    #[must_use]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Vector components `(x, y)` at a cell
    #[must_use]
    pub fn vector(&self, kind: VectorKind, idx: usize) -> (f32, f32) {
        let (xs, ys) = self.components(kind);
        (xs[idx], ys[idx])
    }

    /// Scalar value at a cell
    #[must_use]
    pub fn scalar(&self, kind: ScalarKind, idx: usize) -> f32 {
        match kind {
            ScalarKind::Density => self.source.density()[idx],
            ScalarKind::VelocityMagnitude => {
                let (x, y) = self.vector(VectorKind::Velocity, idx);
                x.hypot(y)
            }
            ScalarKind::ForceMagnitude => {
                let (x, y) = self.vector(VectorKind::Force, idx);
                x.hypot(y)
            }
            ScalarKind::VelocityDivergence | ScalarKind::ForceDivergence => {
                let (xs, ys) = self.components(kind.divergence_of().unwrap_or_default());
                divergence_at(self.dims, xs, ys, self.cell, idx)
            }
        }
    }

    /// Fresh scalar field for the whole grid
    #[must_use]
    pub fn scalar_field(&self, kind: ScalarKind) -> ScalarField {
        let dim = self.dims.dim();
        let data = match kind {
            ScalarKind::Density => self.source.density().to_vec(),
            ScalarKind::VelocityMagnitude => self.source.velocity_magnitude().into_owned(),
            ScalarKind::ForceMagnitude => self.source.force_magnitude().into_owned(),
            ScalarKind::VelocityDivergence | ScalarKind::ForceDivergence => {
                let (xs, ys) = self.components(kind.divergence_of().unwrap_or_default());
                divergence(self.dims, xs, ys, self.cell)
            }
        };
        ScalarField::from_vec(dim, dim, data)
    }

    /// Vector field for the whole grid
    #[must_use]
    pub fn vector_field(&self, kind: VectorKind) -> VectorField {
        let (xs, ys) = self.components(kind);
        let dim = self.dims.dim();
        VectorField::from_components(dim, dim, xs.to_vec(), ys.to_vec())
    }

    fn components(&self, kind: VectorKind) -> (&'a [f32], &'a [f32]) {
        match kind {
            VectorKind::Velocity => (self.source.vx(), self.source.vy()),
            VectorKind::Force => (self.source.fx(), self.source.fy()),
        }
    }
}
