//! Scalar preprocessing pipeline
//!
//! Stages run in a fixed order, each independently enabled:
//!
//! 1. Quantization (reports the new level bound `L`)
//! 2. Gaussian blur
//! 3. Gradient extraction (the magnitude replaces the field)
//! 4. Slicing (replaces the field with a cross-section of the frame history)
//!
//! Every stage sees the output of the stages before it. With all stages disabled
//! the field passes through untouched.

pub mod kernel;
pub mod quantize;
pub mod slicing;

pub use kernel::{convolve_wrapped, sobel_gradient, Gradient, Kernel3, GAUSSIAN_3X3};
pub use quantize::{quantization_bound, quantize};
pub use slicing::{SliceAxis, SliceStack};

use crate::error::{VisError, VisResult};
use crate::fields::ScalarField;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Preprocessing toggles and parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Enable quantization
    pub quantize: bool,
    /// Bits retained by quantization (`1..=8`)
    pub quantization_bits: u32,
    /// Enable the 3×3 Gaussian blur
    pub blur: bool,
    /// Replace the field with its Sobel gradient magnitude
    pub gradient: bool,
    /// Replace the field with a slice through the frame history
    pub slicing: bool,
    /// Axis held fixed by the slice
    pub slice_axis: SliceAxis,
    /// Position along the fixed axis
    pub slice_index: usize,
    /// Frames kept for slicing, `None` meaning one per grid row
    pub slice_window: Option<usize>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            quantize: false,
            quantization_bits: 8,
            blur: false,
            gradient: false,
            slicing: false,
            slice_axis: SliceAxis::T,
            slice_index: 0,
            slice_window: None,
        }
    }
}

impl PreprocessConfig {
    /// Whether any stage is enabled
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.quantize || self.blur || self.gradient || self.slicing
    }

    /// Slicing window for a grid dimension
    #[must_use]
    pub fn window_for(&self, dim: usize) -> usize {
        self.slice_window.unwrap_or(dim)
    }

    /// Check parameters against a grid dimension
    ///
    /// # Errors
    ///
    /// Rejects bit depths outside `1..=8`, empty windows and slice indices beyond
    /// the axis extent
    pub fn validate(&self, dim: usize) -> VisResult<()> {
        quantization_bound(self.quantization_bits)?;
        let window = self.window_for(dim);
        if window == 0 {
            return Err(VisError::invalid_parameter(
                "slice_window",
                "must be at least 1",
            ));
        }
        let extent = match self.slice_axis {
            SliceAxis::X | SliceAxis::Y => dim,
            SliceAxis::T => window,
        };
        if self.slice_index >= extent {
            return Err(VisError::SliceOutOfRange {
                axis: self.slice_axis,
                index: self.slice_index,
                extent,
            });
        }
        Ok(())
    }
}

/// Result of one pass through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessOutput {
    /// Field handed to color mapping
    pub field: ScalarField,
    /// Level bound `L` when quantization ran
    pub quantization_bound: Option<u32>,
    /// Gradient direction per cell when gradient extraction ran
    pub gradient_direction: Option<Vec<f32>>,
}

/// Stateful pipeline runner
///
/// Owns the slicing history, so it must be rebuilt when the grid dimension
/// changes.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    config: PreprocessConfig,
    history: SliceStack,
}

impl Preprocessor {
    /// Create a pipeline for a `dim × dim` grid
    ///
    /// # Errors
    ///
    /// Returns the first violated parameter constraint
    pub fn new(config: PreprocessConfig, dim: usize) -> VisResult<Self> {
        config.validate(dim)?;
        let history = SliceStack::new(dim, config.window_for(dim))?;
        Ok(Self { config, history })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Replace the configuration, keeping history when the window is unchanged
    ///
    /// # Errors
    ///
    /// Returns the first violated parameter constraint; the old configuration stays
    pub fn set_config(&mut self, config: PreprocessConfig) -> VisResult<()> {
        let dim = self.history.dim();
        config.validate(dim)?;
        if config.window_for(dim) != self.history.window() {
            self.history = SliceStack::new(dim, config.window_for(dim))?;
        }
        self.config = config;
        Ok(())
    }

    /// Run the enabled stages over `field`
    ///
    /// # Errors
    ///
    /// Propagates stage parameter errors
    ///
    /// # Panics
    ///
    /// Panics if `field` is not `dim × dim` for the grid this pipeline was built for
    pub fn apply(&mut self, mut field: ScalarField) -> VisResult<PreprocessOutput> {
        let dim = self.history.dim();
        assert!(
            field.width == dim && field.height == dim,
            "Preprocessing input must be dim x dim"
        );

        let mut quantization_bound = None;
        let mut gradient_direction = None;

        if self.config.quantize {
            let bound = quantize(field.as_mut_slice(), self.config.quantization_bits)?;
            debug!(bits = self.config.quantization_bits, bound, "quantized scalar field");
            quantization_bound = Some(bound);
        }

        if self.config.blur {
            field.data = convolve_wrapped(&field.data, field.width, field.height, &GAUSSIAN_3X3);
        }

        if self.config.gradient {
            let gradient = sobel_gradient(&field.data, field.width, field.height);
            field.data = gradient.magnitude;
            gradient_direction = Some(gradient.direction);
        }

        // History records every frame so a freshly enabled slice has context
        self.history.push(field.as_slice());
        if self.config.slicing {
            field = self
                .history
                .extract(self.config.slice_axis, self.config.slice_index)?;
        }

        Ok(PreprocessOutput {
            field,
            quantization_bound,
            gradient_direction,
        })
    }
}
