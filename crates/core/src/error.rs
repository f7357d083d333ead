//! Error types for the visualization pipeline
//!
//! Configuration-invariant violations are reported as [`VisError`] before any
//! buffer is sized. Buffer-shape mismatches are contract violations and panic
//! at the call site instead.

use crate::preprocess::SliceAxis;
use crate::render::Technique;
use thiserror::Error;

/// Errors raised by pipeline configuration and rendering collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisError {
    /// Grid dimension below the supported minimum
    #[error("Grid dimension must be at least {min}, got {actual}")]
    InvalidDimension {
        /// Requested dimension
        actual: usize,
        /// Smallest accepted dimension
        min: usize,
    },

    /// Cell width or height is zero, negative or not finite
    #[error("Cell size must be finite and positive, got {width} x {height}")]
    InvalidCellSize {
        /// Cell width in normalized device coordinates
        width: f32,
        /// Cell height in normalized device coordinates
        height: f32,
    },

    /// Glyph grid without any instance
    #[error("Glyph grid must contain at least one instance, got {count_x} x {count_y}")]
    EmptyGlyphGrid {
        /// Glyph columns
        count_x: usize,
        /// Glyph rows
        count_y: usize,
    },

    /// Quantization bit depth outside `1..=8`
    #[error("Quantization bit depth must be within 1..=8, got {0}")]
    InvalidBitDepth(u32),

    /// Slice index beyond the extent of the chosen axis
    #[error("Slice index {index} out of range for {axis} axis of extent {extent}")]
    SliceOutOfRange {
        /// Axis held fixed
        axis: SliceAxis,
        /// Requested index
        index: usize,
        /// Number of positions along the axis
        extent: usize,
    },

    /// Any other rejected parameter
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the violated constraint
        message: String,
    },

    /// The render backend could not carry out a command
    #[error("Render backend failure in {technique}: {message}")]
    Backend {
        /// Technique whose commands failed
        technique: Technique,
        /// Backend-provided detail
        message: String,
    },
}

impl VisError {
    /// Create an [`VisError::InvalidConfiguration`] from a parameter name and constraint
    pub fn invalid_parameter(param_name: &str, constraint: &str) -> Self {
        Self::InvalidConfiguration {
            message: format!("{param_name} {constraint}"),
        }
    }
}

/// Result alias used across the pipeline
pub type VisResult<T> = Result<T, VisError>;
