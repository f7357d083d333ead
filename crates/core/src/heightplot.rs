//! Height-plot surface geometry
//!
//! The scalar field becomes a surface `z = scale · value` over the bordered grid.
//! Normals come from central differences with wrap-around neighbors.

use crate::fields::ScalarField;
use crate::grid::CellSize;
use nalgebra::Vector3;

/// Positions, normals and triangle indices of a height-plot surface
#[derive(Debug, Clone, PartialEq)]
pub struct HeightPlotMesh {
    /// One vertex per sample, row-major
    pub positions: Vec<Vector3<f32>>,
    /// Unit normal per vertex
    pub normals: Vec<Vector3<f32>>,
    /// Two triangles per quad
    pub indices: Vec<u32>,
}

impl HeightPlotMesh {
    /// Build the surface for `field`
    #[must_use]
    pub fn build(field: &ScalarField, cell: CellSize, height_scale: f32) -> Self {
        Self {
            positions: vertex_positions(field, cell, height_scale),
            normals: compute_normals(field, cell, height_scale),
            indices: grid_indices(field.width, field.height),
        }
    }
}

/// Surface vertex for every sample
#[must_use]
pub fn vertex_positions(field: &ScalarField, cell: CellSize, height_scale: f32) -> Vec<Vector3<f32>> {
    (0..field.height)
        .flat_map(|y| (0..field.width).map(move |x| (x, y)))
        .map(|(x, y)| {
            Vector3::new(
                x as f32 * cell.width + cell.width - 1.0,
                y as f32 * cell.height + cell.height - 1.0,
                height_scale * field.get(x, y),
            )
        })
        .collect()
}

/// Per-vertex unit normals
///
/// A flat field yields `+z` everywhere.
#[must_use]
pub fn compute_normals(field: &ScalarField, cell: CellSize, height_scale: f32) -> Vec<Vector3<f32>> {
    let (width, height) = (field.width, field.height);
    let mut normals = Vec::with_capacity(field.len());

    for y in 0..height {
        let up = (y + height - 1) % height;
        let down = (y + 1) % height;
        for x in 0..width {
            let left = (x + width - 1) % width;
            let right = (x + 1) % width;
            let dzdx = height_scale * (field.get(right, y) - field.get(left, y)) / (2.0 * cell.width);
            let dzdy = height_scale * (field.get(x, down) - field.get(x, up)) / (2.0 * cell.height);
            let n = Vector3::new(-dzdx, -dzdy, 1.0);
            normals.push(n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z));
        }
    }

    normals
}

/// Triangle list indices covering a `width × height` vertex grid
#[must_use]
pub fn grid_indices(width: usize, height: usize) -> Vec<u32> {
    if width < 2 || height < 2 {
        return Vec::new();
    }
    let mut indices = Vec::with_capacity((width - 1) * (height - 1) * 6);
    for y in 0..height - 1 {
        for x in 0..width - 1 {
            let tl = (y * width + x) as u32;
            let tr = tl + 1;
            let bl = tl + width as u32;
            let br = bl + 1;
            indices.extend_from_slice(&[tl, bl, tr, tr, bl, br]);
        }
    }
    indices
}
