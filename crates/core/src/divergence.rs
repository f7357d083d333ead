//! Backward-difference divergence on the toroidal grid
//!
//! ```text
//! div(F)[i] = (Fx[i] - Fx[west(i)]) / cell_width + (Fy[i] - Fy[north(i)]) / cell_height
//! ```
//!
//! `west` is the previous column and `north` the previous row, both wrapping at the
//! grid edges. Because every cell uses the same stencil, shifting the input by whole
//! rows or columns shifts the output identically.

use crate::grid::{CellSize, GridDims};

/// Divergence at a single cell
///
/// # Panics
///
/// Panics if `idx` is outside the grid or a component buffer has the wrong length
#[must_use]
pub fn divergence_at(dims: GridDims, fx: &[f32], fy: &[f32], cell: CellSize, idx: usize) -> f32 {
    assert_component_lengths(dims, fx, fy);
    let west = dims.west(idx);
    let north = dims.north(idx);
    (fx[idx] - fx[west]) / cell.width + (fy[idx] - fy[north]) / cell.height
}

/// Divergence for every cell, in the same order as the source field
///
/// # Panics
///
/// Panics if a component buffer does not hold exactly `dim * dim` values
#[must_use]
pub fn divergence(dims: GridDims, fx: &[f32], fy: &[f32], cell: CellSize) -> Vec<f32> {
    assert_component_lengths(dims, fx, fy);
    let dim = dims.dim();
    let mut out = Vec::with_capacity(dims.cell_count());
    for y in 0..dim {
        let prev_row = if y == 0 { dim - 1 } else { y - 1 };
        for x in 0..dim {
            let prev_col = if x == 0 { dim - 1 } else { x - 1 };
            let idx = y * dim + x;
            let ddx = (fx[idx] - fx[y * dim + prev_col]) / cell.width;
            let ddy = (fy[idx] - fy[prev_row * dim + x]) / cell.height;
            out.push(ddx + ddy);
        }
    }
    out
}

fn assert_component_lengths(dims: GridDims, fx: &[f32], fy: &[f32]) {
    assert!(
        fx.len() == dims.cell_count() && fy.len() == dims.cell_count(),
        "Vector components must hold exactly dim * dim cells"
    );
}
