//! Visualization configuration
//!
//! Every value type here derives `Serialize`/`Deserialize` so a front end can
//! persist or exchange settings. [`VisualizationConfig::validate`] runs before any
//! buffer is sized.

use crate::color::{ColorMap, ScalarMapping};
use crate::error::{VisError, VisResult};
use crate::glyph::GlyphShape;
use crate::grid::{GridDims, ScalarKind, VectorKind};
use crate::isolines::IsolineConfig;
use crate::lic::DEFAULT_STEP_FACTOR;
use crate::preprocess::PreprocessConfig;
use crate::render::VisualizationMode;
use crate::transfer::TransferFunction;
use crate::visualization::Viewport;
use serde::{Deserialize, Serialize};

/// Default grid dimension
pub const DEFAULT_DIM: usize = 50;

/// Glyph grid and appearance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlyphConfig {
    /// Glyph columns
    pub count_x: usize,
    /// Glyph rows
    pub count_y: usize,
    /// Factor applied to vector magnitudes before scaling glyphs
    pub magnifier: f32,
    /// Glyph geometry
    pub shape: GlyphShape,
    /// Spread the glyphs over the bordered domain instead of one per cell
    pub fit_to_domain: bool,
    /// Report the magnified magnitude range each frame
    pub report_range: bool,
}

impl Default for GlyphConfig {
    fn default() -> Self {
        Self {
            count_x: DEFAULT_DIM,
            count_y: DEFAULT_DIM,
            magnifier: 1.0,
            shape: GlyphShape::Hedgehog,
            fit_to_domain: false,
            report_range: true,
        }
    }
}

impl GlyphConfig {
    /// Check counts and magnifier
    ///
    /// # Errors
    ///
    /// Rejects empty glyph grids and non-finite or negative magnifiers
    pub fn validate(&self) -> VisResult<()> {
        if self.count_x == 0 || self.count_y == 0 {
            return Err(VisError::EmptyGlyphGrid {
                count_x: self.count_x,
                count_y: self.count_y,
            });
        }
        if !(self.magnifier.is_finite() && self.magnifier >= 0.0) {
            return Err(VisError::invalid_parameter(
                "magnifier",
                "must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

/// Height-plot surface settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightPlotConfig {
    /// Surface height per unit of scalar value
    pub height_scale: f32,
}

impl Default for HeightPlotConfig {
    fn default() -> Self {
        Self { height_scale: 0.5 }
    }
}

impl HeightPlotConfig {
    /// Check the height scale
    ///
    /// # Errors
    ///
    /// Rejects non-finite scales
    pub fn validate(&self) -> VisResult<()> {
        if !self.height_scale.is_finite() {
            return Err(VisError::invalid_parameter("height_scale", "must be finite"));
        }
        Ok(())
    }
}

/// LIC settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LicConfig {
    /// Integration step in texels
    pub step_factor: f32,
    /// Seed of the noise texture
    pub noise_seed: u64,
}

impl Default for LicConfig {
    fn default() -> Self {
        Self {
            step_factor: DEFAULT_STEP_FACTOR,
            noise_seed: 0x5C15,
        }
    }
}

impl LicConfig {
    /// Check the step factor
    ///
    /// # Errors
    ///
    /// Rejects factors that are not finite and positive
    pub fn validate(&self) -> VisResult<()> {
        if !(self.step_factor.is_finite() && self.step_factor > 0.0) {
            return Err(VisError::invalid_parameter(
                "LIC step factor",
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// Pre-integration table parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Bins per table axis
    pub table_resolution: usize,
    /// Sub-steps composited per table entry
    pub integration_steps: u32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            table_resolution: 256,
            integration_steps: 100,
        }
    }
}

impl VolumeConfig {
    /// Check table size
    ///
    /// # Errors
    ///
    /// Rejects resolutions below 2 and zero steps
    pub fn validate(&self) -> VisResult<()> {
        if self.table_resolution < 2 {
            return Err(VisError::invalid_parameter(
                "table_resolution",
                "must be at least 2",
            ));
        }
        if self.integration_steps == 0 {
            return Err(VisError::invalid_parameter(
                "integration_steps",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Frame cadence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Time between ticks
    pub tick_interval_ms: u64,
    /// Ticks run per poll when behind; the rest are dropped
    pub max_catch_up: u32,
    /// Render time above which a warning is logged
    pub frame_budget_ms: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 17,
            max_catch_up: 1,
            frame_budget_ms: 17.0,
        }
    }
}

impl ClockConfig {
    /// Check cadence parameters
    ///
    /// # Errors
    ///
    /// Rejects a zero interval, zero catch-up and non-positive budgets
    pub fn validate(&self) -> VisResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(VisError::invalid_parameter(
                "tick_interval_ms",
                "must be at least 1",
            ));
        }
        if self.max_catch_up == 0 {
            return Err(VisError::invalid_parameter("max_catch_up", "must be at least 1"));
        }
        if !(self.frame_budget_ms.is_finite() && self.frame_budget_ms > 0.0) {
            return Err(VisError::invalid_parameter(
                "frame_budget_ms",
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// Grid dimension
    pub dim: usize,
    /// Output surface size in pixels
    pub viewport: Viewport,
    /// Technique selection
    pub mode: VisualizationMode,
    /// Displayed scalar quantity
    pub scalar_kind: ScalarKind,
    /// Displayed vector quantity
    pub vector_kind: VectorKind,
    /// Scalar clamping range and colors
    pub scalar_mapping: ScalarMapping,
    /// Glyph colors by magnitude
    pub vector_color_map: ColorMap,
    /// Preprocessing stages
    pub preprocess: PreprocessConfig,
    /// Glyph grid
    pub glyph: GlyphConfig,
    /// Isolines
    pub isolines: IsolineConfig,
    /// Height plot
    pub height_plot: HeightPlotConfig,
    /// LIC
    pub lic: LicConfig,
    /// Transfer function for volume rendering
    pub transfer_function: TransferFunction,
    /// Pre-integration table
    pub volume: VolumeConfig,
    /// Frame cadence
    pub clock: ClockConfig,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            dim: DEFAULT_DIM,
            viewport: Viewport::default(),
            mode: VisualizationMode::default(),
            scalar_kind: ScalarKind::default(),
            vector_kind: VectorKind::default(),
            scalar_mapping: ScalarMapping::default(),
            vector_color_map: ColorMap::rainbow(),
            preprocess: PreprocessConfig::default(),
            glyph: GlyphConfig::default(),
            isolines: IsolineConfig::default(),
            height_plot: HeightPlotConfig::default(),
            lic: LicConfig::default(),
            transfer_function: TransferFunction::default(),
            volume: VolumeConfig::default(),
            clock: ClockConfig::default(),
        }
    }
}

impl VisualizationConfig {
    /// Default configuration for a `dim × dim` grid, one glyph per cell
    #[must_use]
    pub fn with_dim(dim: usize) -> Self {
        Self {
            dim,
            glyph: GlyphConfig {
                count_x: dim,
                count_y: dim,
                ..GlyphConfig::default()
            },
            ..Self::default()
        }
    }

    /// Check every section
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint
    pub fn validate(&self) -> VisResult<()> {
        GridDims::new(self.dim)?;
        self.viewport.validate()?;
        self.scalar_mapping.validate()?;
        self.preprocess.validate(self.dim)?;
        self.glyph.validate()?;
        self.isolines.validate()?;
        self.height_plot.validate()?;
        self.lic.validate()?;
        self.transfer_function.validate()?;
        self.volume.validate()?;
        self.clock.validate()
    }
}
