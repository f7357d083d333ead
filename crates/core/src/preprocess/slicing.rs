//! Slicing through a rolling X × Y × T stack of frames
//!
//! The stack keeps the last `window` frames (oldest first). A slice holds one axis
//! fixed and returns a `dim × window` image whose rows run along time:
//!
//! - `X = k`: `out[t * dim + y] = frame[t][y * dim + k]`
//! - `Y = k`: `out[t * dim + x] = frame[t][k * dim + x]`
//! - `T = k`: `out = frame[k]` (for `window == dim` this is `dim × dim`)
//!
//! Frames not yet recorded read as zeros.

use crate::error::{VisError, VisResult};
use crate::fields::ScalarField;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis held constant by a slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SliceAxis {
    /// Fixed column
    X,
    /// Fixed row
    Y,
    /// Fixed frame in the time window
    #[default]
    T,
}

impl fmt::Display for SliceAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::X => "x",
            Self::Y => "y",
            Self::T => "t",
        };
        f.write_str(name)
    }
}

/// Ring buffer of the most recent `window` frames of a `dim × dim` field
#[derive(Debug, Clone)]
pub struct SliceStack {
    dim: usize,
    window: usize,
    frames: Vec<f32>,
    /// Slot written by the next push, which is also the oldest frame
    next: usize,
}

impl SliceStack {
    /// Allocate a zero-filled stack
    ///
    /// # Errors
    ///
    /// Returns an error when `dim` or `window` is zero
    pub fn new(dim: usize, window: usize) -> VisResult<Self> {
        if dim == 0 || window == 0 {
            return Err(VisError::invalid_parameter(
                "slicing window",
                &format!("must be non-empty, got {dim} x {window}"),
            ));
        }
        Ok(Self {
            dim,
            window,
            frames: vec![0.0; dim * dim * window],
            next: 0,
        })
    }

    /// Frame dimension
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of frames kept
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Extent of the given axis
    #[must_use]
    pub fn extent(&self, axis: SliceAxis) -> usize {
        match axis {
            SliceAxis::X | SliceAxis::Y => self.dim,
            SliceAxis::T => self.window,
        }
    }

    /// Record a frame, evicting the oldest
    ///
    /// # Panics
    ///
    /// Panics if `frame` does not hold exactly `dim * dim` values
    pub fn push(&mut self, frame: &[f32]) {
        let n = self.dim * self.dim;
        assert_eq!(frame.len(), n, "Slice frame must hold dim * dim values");
        let start = self.next * n;
        self.frames[start..start + n].copy_from_slice(frame);
        self.next = (self.next + 1) % self.window;
    }

    /// Frame `t` of the window, `0` being the oldest
    #[must_use]
    pub fn frame(&self, t: usize) -> &[f32] {
        let n = self.dim * self.dim;
        let slot = (self.next + t) % self.window;
        &self.frames[slot * n..(slot + 1) * n]
    }

    /// Extract the cross-section at `index` along `axis`
    ///
    /// # Errors
    ///
    /// Returns [`VisError::SliceOutOfRange`] when `index` is not below the axis extent
    pub fn extract(&self, axis: SliceAxis, index: usize) -> VisResult<ScalarField> {
        let extent = self.extent(axis);
        if index >= extent {
            return Err(VisError::SliceOutOfRange {
                axis,
                index,
                extent,
            });
        }

        let dim = self.dim;
        let data = match axis {
            SliceAxis::X => (0..self.window)
                .flat_map(|t| {
                    let frame = self.frame(t);
                    (0..dim).map(move |y| frame[y * dim + index])
                })
                .collect(),
            SliceAxis::Y => (0..self.window)
                .flat_map(|t| self.frame(t)[index * dim..(index + 1) * dim].iter().copied())
                .collect(),
            SliceAxis::T => {
                return Ok(ScalarField::from_vec(dim, dim, self.frame(index).to_vec()));
            }
        };
        Ok(ScalarField::from_vec(dim, self.window, data))
    }
}
