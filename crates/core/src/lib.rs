//! Field Visualization Core Library
//!
//! Turns the per-cell scalar and vector grids of a 2D fluid simulation into
//! renderable representations, and decides per frame which visualization
//! technique draws.
//!
//! ## Pipeline
//!
//! - Toroidal grid sampling and backward-difference divergence
//! - Ordered preprocessing: quantization, Gaussian blur, Sobel gradients, slicing
//! - Color mapping, transfer function and pre-integrated volume lookup tables
//! - Instanced glyph transforms, isolines, height-plot normals and LIC geometry
//! - A tagged visualization mode dispatcher and a fixed-cadence frame driver
//!
//! The fluid solver and the GPU are collaborators behind the [`FluidSource`]
//! and [`RenderBackend`] traits.

// Errors and configuration
pub mod config;
pub mod error;

// Grid data
pub mod divergence;
pub mod fields;
pub mod grid;
pub mod source;

// Pipeline stages
pub mod color;
pub mod glyph;
pub mod heightplot;
pub mod isolines;
pub mod lic;
pub mod preprocess;
pub mod transfer;

// Frame orchestration
pub mod clock;
pub mod profiler;
pub mod render;
pub mod visualization;

pub use clock::{Clock, FrameDriver, ManualClock, PollOutcome, RunState, SystemClock};
pub use color::{ColorMap, Rgba, ScalarMapping};
pub use config::{
    ClockConfig, GlyphConfig, HeightPlotConfig, LicConfig, VisualizationConfig, VolumeConfig,
};
pub use error::{VisError, VisResult};
pub use fields::{ScalarField, VectorField};
pub use glyph::{GlyphBatch, GlyphInstance, GlyphLayout, GlyphShape, MagnitudeRange};
pub use grid::{CellSize, GridDims, GridSampler, ScalarKind, VectorKind};
pub use heightplot::HeightPlotMesh;
pub use isolines::{IsolineConfig, Isolines};
pub use lic::LicGeometry;
pub use preprocess::{PreprocessConfig, PreprocessOutput, Preprocessor, SliceAxis};
pub use profiler::{FrameTimer, ProfilerScope};
pub use render::{
    BufferId, BufferUpload, ClearMask, DrawCall, FramePlan, ModeFlags, OverlaySet, Primitive,
    RecordedCommand, RecordingBackend, RenderBackend, Technique, VisualizationMode,
};
pub use source::{FluidSource, SyntheticFlow};
pub use transfer::{PreIntegrationCache, PreIntegrationTable, TransferFunction};
pub use visualization::{FrameOutcome, FrameReport, Viewport, Visualization};
