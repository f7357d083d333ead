//! Marching squares isoline extraction
//!
//! Every quad of four neighboring samples is classified by which corners lie at or
//! above the iso value (16 cases). Crossing edges get a vertex placed by linear
//! interpolation, and each case emits zero, one or two line segments. Output is
//! a line list in normalized device coordinates, using the same bordered
//! placement as the scalar grid (`x · w + w - 1`).

use crate::color::Rgba;
use crate::error::{VisError, VisResult};
use crate::fields::ScalarField;
use crate::grid::CellSize;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Number and spacing of isolines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsolineConfig {
    /// Number of iso values
    pub count: usize,
    /// First iso value
    pub min: f32,
    /// Last iso value
    pub max: f32,
    /// Line color
    pub color: Rgba,
}

impl Default for IsolineConfig {
    fn default() -> Self {
        Self {
            count: 1,
            min: 0.5,
            max: 0.5,
            color: Rgba::WHITE,
        }
    }
}

impl IsolineConfig {
    /// Check the iso range
    ///
    /// # Errors
    ///
    /// Rejects non-finite bounds and `min > max`
    pub fn validate(&self) -> VisResult<()> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(VisError::invalid_parameter(
                "isoline range",
                &format!("must be finite with min <= max, got [{}, {}]", self.min, self.max),
            ));
        }
        Ok(())
    }

    /// Evenly spaced iso values from `min` to `max`
    #[must_use]
    pub fn iso_values(&self) -> Vec<f32> {
        match self.count {
            0 => Vec::new(),
            1 => vec![self.min],
            n => {
                let step = (self.max - self.min) / (n - 1) as f32;
                (0..n).map(|k| self.min + k as f32 * step).collect()
            }
        }
    }
}

/// Extracted contour segments
#[derive(Debug, Clone, PartialEq)]
pub struct Isolines {
    /// Segment endpoints, two per segment
    pub vertices: Vec<Vector2<f32>>,
    /// Index into `vertices` where each iso value's segments begin, plus a final end marker
    pub line_starts: Vec<usize>,
}

impl Isolines {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            line_starts: vec![0],
        }
    }

    /// Number of line segments
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.vertices.len() / 2
    }

    /// Number of iso values extracted
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.line_starts.len().saturating_sub(1)
    }

    /// Whether no segment was produced
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertices of level `level`
    #[must_use]
    pub fn level(&self, level: usize) -> &[Vector2<f32>] {
        &self.vertices[self.line_starts[level]..self.line_starts[level + 1]]
    }

    /// Vertices flattened for upload
    #[must_use]
    pub fn flat_vertices(&self) -> Vec<[f32; 2]> {
        self.vertices.iter().map(|v| [v.x, v.y]).collect()
    }
}

impl Default for Isolines {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// Segments per case; corner bits are tl = 1, tr = 2, br = 4, bl = 8
const fn case_segments(case: u8) -> &'static [(Edge, Edge)] {
    use Edge::{Bottom, Left, Right, Top};
    match case {
        1 | 14 => &[(Top, Left)],
        2 | 13 => &[(Right, Top)],
        3 | 12 => &[(Right, Left)],
        4 | 11 => &[(Bottom, Right)],
        5 => &[(Top, Left), (Bottom, Right)],
        6 | 9 => &[(Bottom, Top)],
        7 | 8 => &[(Left, Bottom)],
        10 => &[(Top, Right), (Left, Bottom)],
        _ => &[],
    }
}

/// Extract the contours of `field` at each of `values`
#[must_use]
pub fn extract_isolines(field: &ScalarField, values: &[f32], cell: CellSize) -> Isolines {
    let mut lines = Isolines::new();
    let (width, height) = (field.width, field.height);

    for &iso in values {
        if width >= 2 && height >= 2 && iso.is_finite() {
            for y in 0..height - 1 {
                for x in 0..width - 1 {
                    let tl = field.get(x, y);
                    let tr = field.get(x + 1, y);
                    let br = field.get(x + 1, y + 1);
                    let bl = field.get(x, y + 1);

                    let case = u8::from(tl >= iso)
                        | (u8::from(tr >= iso) << 1)
                        | (u8::from(br >= iso) << 2)
                        | (u8::from(bl >= iso) << 3);

                    for &(a, b) in case_segments(case) {
                        let corners = (tl, tr, br, bl);
                        lines.vertices.push(edge_point(a, x, y, corners, iso, cell));
                        lines.vertices.push(edge_point(b, x, y, corners, iso, cell));
                    }
                }
            }
        }
        lines.line_starts.push(lines.vertices.len());
    }

    lines
}

/// Interpolated crossing on one edge of quad `(x, y)`
fn edge_point(
    edge: Edge,
    x: usize,
    y: usize,
    (tl, tr, br, bl): (f32, f32, f32, f32),
    iso: f32,
    cell: CellSize,
) -> Vector2<f32> {
    let lerp = |a: f32, b: f32| {
        let t = (iso - a) / (b - a);
        if t.is_finite() {
            t.clamp(0.0, 1.0)
        } else {
            0.5
        }
    };
    let (gx, gy) = (x as f32, y as f32);
    let (fx, fy) = match edge {
        Edge::Top => (gx + lerp(tl, tr), gy),
        Edge::Right => (gx + 1.0, gy + lerp(tr, br)),
        Edge::Bottom => (gx + lerp(bl, br), gy + 1.0),
        Edge::Left => (gx, gy + lerp(tl, bl)),
    };
    Vector2::new(
        fx * cell.width + cell.width - 1.0,
        fy * cell.height + cell.height - 1.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_cell() -> CellSize {
        CellSize::new(1.0, 1.0).unwrap()
    }

    #[test]
    fn test_constant_field_has_no_isolines() {
        let field = ScalarField::with_value(6, 6, 0.5);
        let lines = extract_isolines(&field, &[0.25, 0.5, 0.75], unit_cell());
        assert!(lines.is_empty());
        assert_eq!(lines.level_count(), 3);
    }

    #[test]
    fn test_vertical_contour_is_interpolated() {
        // Values grow with x: the 0.25 contour crosses a quarter of the way along
        let field = ScalarField::from_vec(2, 2, vec![0.0, 1.0, 0.0, 1.0]);
        let lines = extract_isolines(&field, &[0.25], unit_cell());
        assert_eq!(lines.segment_count(), 1);
        // Unit cells shift the grid origin to (0, 0)
        for v in &lines.vertices {
            assert_relative_eq!(v.x, 0.25, epsilon = 1e-6);
        }
        let ys: Vec<f32> = lines.vertices.iter().map(|v| v.y).collect();
        assert!(ys.contains(&0.0) && ys.contains(&1.0));
    }

    #[test]
    fn test_saddle_emits_two_segments() {
        let field = ScalarField::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]);
        let lines = extract_isolines(&field, &[0.5], unit_cell());
        assert_eq!(lines.segment_count(), 2);
    }

    #[test]
    fn test_levels_are_separated() {
        let field = ScalarField::from_vec(3, 2, vec![0.0, 0.5, 1.0, 0.0, 0.5, 1.0]);
        let lines = extract_isolines(&field, &[0.25, 0.75, 2.0], unit_cell());
        assert_eq!(lines.level(0).len(), 2);
        assert_eq!(lines.level(1).len(), 2);
        assert!(lines.level(2).is_empty());
    }

    #[test]
    fn test_iso_values_are_evenly_spaced() {
        let config = IsolineConfig {
            count: 5,
            min: 0.0,
            max: 1.0,
            ..Default::default()
        };
        assert_eq!(config.iso_values(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(IsolineConfig::default().validate().is_ok());
        let inverted = IsolineConfig {
            min: 2.0,
            max: 1.0,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }
}
