//! Per-frame visualization
//!
//! [`Visualization`] owns everything derived from the grid dimension and the
//! viewport (cell size, glyph layout, LIC geometry, slicing history, lookup table
//! cache) and turns one simulation snapshot into backend commands:
//!
//! 1. Sample and preprocess the scalar field, advancing the slicing history
//! 2. Clear the attachments named by the mode
//! 3. Draw each technique of the mode in order, first uploading its static
//!    buffers (color maps, glyph geometry, LIC noise) when they changed
//!
//! A backend failure skips the rest of the frame. Each technique's first failure
//! is logged at `warn`, repeats only at `trace`.

use crate::color::{ColorMap, ScalarMapping};
use crate::config::{GlyphConfig, VisualizationConfig, VolumeConfig};
use crate::error::{VisError, VisResult};
use crate::glyph::{generate_glyph_transforms, GlyphBatch, GlyphLayout, GlyphShape, MagnitudeRange};
use crate::grid::{CellSize, GridDims, GridSampler, ScalarKind, VectorKind};
use crate::heightplot::{grid_indices, vertex_positions, HeightPlotMesh};
use crate::isolines::{extract_isolines, IsolineConfig};
use crate::lic::{noise_texture, LicGeometry, DEFAULT_STEP_FACTOR};
use crate::preprocess::{PreprocessConfig, PreprocessOutput, Preprocessor};
use crate::render::{BufferId, DrawCall, Primitive, RenderBackend, Technique, VisualizationMode};
use crate::source::FluidSource;
use crate::transfer::{PreIntegrationCache, TransferFunction};
use nalgebra::Vector3;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// Texels in each uploaded color-map texture
const COLOR_MAP_TEXELS: usize = 256;

/// Techniques that own buffers uploaded only when their inputs change
const STATIC_TECHNIQUES: [Technique; 3] = [
    Technique::ScalarData,
    Technique::VectorGlyphs,
    Technique::Lic,
];

/// Output surface size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
        }
    }
}

impl Viewport {
    /// Validate a viewport size
    ///
    /// # Errors
    ///
    /// Rejects zero width or height
    pub fn new(width: u32, height: u32) -> VisResult<Self> {
        let viewport = Self { width, height };
        viewport.validate()?;
        Ok(viewport)
    }

    /// Check that both extents are non-zero
    ///
    /// # Errors
    ///
    /// Rejects zero width or height
    pub fn validate(&self) -> VisResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VisError::invalid_parameter(
                "viewport",
                &format!("must be non-empty, got {} x {}", self.width, self.height),
            ));
        }
        Ok(())
    }
}

/// How a frame ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Every technique drew
    Drawn,
    /// A technique failed and the rest of the frame was skipped
    Skipped {
        /// Technique whose commands failed
        technique: Technique,
    },
}

/// Values a front end displays after each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Mode the frame was drawn in
    pub mode: VisualizationMode,
    /// Whether the frame completed
    pub outcome: FrameOutcome,
    /// Magnified glyph magnitude range, when glyphs drew and reporting is on
    pub vector_range: Option<MagnitudeRange>,
    /// Quantization level bound, when quantization ran
    pub quantization_bound: Option<u32>,
}

/// Grid-derived state and per-frame drawing
#[derive(Debug)]
pub struct Visualization {
    config: VisualizationConfig,
    dims: GridDims,
    cell: CellSize,
    glyph_layout: GlyphLayout,
    lic: LicGeometry,
    preprocessor: Preprocessor,
    pre_integration: PreIntegrationCache,
    reported_failures: FxHashSet<Technique>,
    static_pending: FxHashSet<Technique>,
    quantization_bound: Option<u32>,
    vector_range: Option<MagnitudeRange>,
}

impl Visualization {
    /// Validate `config` and size every grid-derived structure
    ///
    /// # Errors
    ///
    /// Returns the first violated configuration constraint
    pub fn new(config: VisualizationConfig) -> VisResult<Self> {
        config.validate()?;
        let dims = GridDims::new(config.dim)?;
        let cell = dims.cell_size();
        let glyph_layout = layout_for(&config.glyph, cell)?;
        let lic = LicGeometry::from_viewport(
            config.viewport.width,
            config.viewport.height,
            cell,
            config.lic.step_factor,
        )?;
        let preprocessor = Preprocessor::new(config.preprocess, config.dim)?;

        info!(
            dim = config.dim,
            width = config.viewport.width,
            height = config.viewport.height,
            "Visualization initialized"
        );

        Ok(Self {
            config,
            dims,
            cell,
            glyph_layout,
            lic,
            preprocessor,
            pre_integration: PreIntegrationCache::new(),
            reported_failures: FxHashSet::default(),
            static_pending: STATIC_TECHNIQUES.into_iter().collect(),
            quantization_bound: None,
            vector_range: None,
        })
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &VisualizationConfig {
        &self.config
    }

    /// Grid dimensions
    #[must_use]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Cell size in normalized device coordinates
    #[must_use]
    pub fn cell_size(&self) -> CellSize {
        self.cell
    }

    /// Current glyph placement
    #[must_use]
    pub fn glyph_layout(&self) -> &GlyphLayout {
        &self.glyph_layout
    }

    /// Current LIC texture size and step
    #[must_use]
    pub fn lic_geometry(&self) -> &LicGeometry {
        &self.lic
    }

    /// Active mode
    #[must_use]
    pub fn mode(&self) -> VisualizationMode {
        self.config.mode
    }

    /// Level bound of the last quantized frame
    #[must_use]
    pub fn quantization_bound(&self) -> Option<u32> {
        self.quantization_bound
    }

    /// Glyph magnitude range of the last frame that drew glyphs
    #[must_use]
    pub fn vector_range(&self) -> Option<MagnitudeRange> {
        self.vector_range
    }

    /// Number of pre-integration table builds so far
    #[must_use]
    pub fn pre_integration_rebuilds(&self) -> u64 {
        self.pre_integration.rebuilds()
    }

    /// Change the grid dimension
    ///
    /// Resets the glyph grid to one glyph per cell, the LIC step factor to its
    /// default and the slicing history. The simulation source must be resized by
    /// the caller.
    ///
    /// # Errors
    ///
    /// Returns an error without changing anything when `dim` is invalid or the
    /// preprocessing settings do not fit the new grid
    pub fn set_dim(&mut self, dim: usize) -> VisResult<()> {
        let dims = GridDims::new(dim)?;
        let cell = dims.cell_size();
        let glyph = GlyphConfig {
            count_x: dim,
            count_y: dim,
            ..self.config.glyph
        };
        let glyph_layout = layout_for(&glyph, cell)?;
        let lic = LicGeometry::from_viewport(
            self.config.viewport.width,
            self.config.viewport.height,
            cell,
            DEFAULT_STEP_FACTOR,
        )?;
        let preprocessor = Preprocessor::new(self.config.preprocess, dim)?;

        self.dims = dims;
        self.cell = cell;
        self.glyph_layout = glyph_layout;
        self.lic = lic;
        self.preprocessor = preprocessor;
        self.config.dim = dim;
        self.config.glyph = glyph;
        self.config.lic.step_factor = DEFAULT_STEP_FACTOR;
        self.static_pending.extend(STATIC_TECHNIQUES);

        info!(dim, cell = cell.width, "Grid dimension changed");
        Ok(())
    }

    /// Change the viewport, regenerating LIC geometry with the default step factor
    ///
    /// # Errors
    ///
    /// Rejects empty viewports and viewports too small for the LIC texture
    pub fn resize_viewport(&mut self, width: u32, height: u32) -> VisResult<()> {
        let viewport = Viewport::new(width, height)?;
        let lic = LicGeometry::from_viewport(width, height, self.cell, DEFAULT_STEP_FACTOR)?;
        self.config.viewport = viewport;
        self.config.lic.step_factor = DEFAULT_STEP_FACTOR;
        self.lic = lic;
        self.static_pending.insert(Technique::Lic);
        info!(width, height, "Viewport resized");
        Ok(())
    }

    /// Change the glyph grid resolution
    ///
    /// # Errors
    ///
    /// Returns [`VisError::EmptyGlyphGrid`] when either count is zero
    pub fn set_glyph_counts(&mut self, count_x: usize, count_y: usize) -> VisResult<()> {
        let glyph = GlyphConfig {
            count_x,
            count_y,
            ..self.config.glyph
        };
        glyph.validate()?;
        self.glyph_layout = layout_for(&glyph, self.cell)?;
        self.config.glyph = glyph;
        Ok(())
    }

    /// Change the glyph geometry
    pub fn set_glyph_shape(&mut self, shape: GlyphShape) {
        if self.config.glyph.shape != shape {
            self.config.glyph.shape = shape;
            self.static_pending.insert(Technique::VectorGlyphs);
        }
    }

    /// Change the glyph magnitude magnifier
    ///
    /// # Errors
    ///
    /// Rejects non-finite or negative values
    pub fn set_magnifier(&mut self, magnifier: f32) -> VisResult<()> {
        let glyph = GlyphConfig {
            magnifier,
            ..self.config.glyph
        };
        glyph.validate()?;
        self.config.glyph = glyph;
        Ok(())
    }

    /// Change the LIC step factor
    ///
    /// # Errors
    ///
    /// Rejects factors that are not finite and positive
    pub fn set_lic_step_factor(&mut self, step_factor: f32) -> VisResult<()> {
        self.lic.set_step_factor(step_factor)?;
        self.config.lic.step_factor = step_factor;
        Ok(())
    }

    /// Change the mode, effective from the next frame
    pub fn set_mode(&mut self, mode: VisualizationMode) {
        if self.config.mode != mode {
            debug!(?mode, "Visualization mode changed");
        }
        self.config.mode = mode;
    }

    /// Change the preprocessing stages
    ///
    /// # Errors
    ///
    /// Returns the first violated parameter constraint
    pub fn set_preprocess(&mut self, preprocess: PreprocessConfig) -> VisResult<()> {
        self.preprocessor.set_config(preprocess)?;
        self.config.preprocess = preprocess;
        Ok(())
    }

    /// Change the displayed scalar quantity
    pub fn set_scalar_kind(&mut self, kind: ScalarKind) {
        self.config.scalar_kind = kind;
    }

    /// Change the displayed vector quantity
    pub fn set_vector_kind(&mut self, kind: VectorKind) {
        self.config.vector_kind = kind;
    }

    /// Change the scalar clamping range and colors
    ///
    /// # Errors
    ///
    /// Rejects empty or non-finite ranges
    pub fn set_scalar_mapping(&mut self, mapping: ScalarMapping) -> VisResult<()> {
        mapping.validate()?;
        self.config.scalar_mapping = mapping;
        self.static_pending.insert(Technique::ScalarData);
        Ok(())
    }

    /// Change the glyph color map
    pub fn set_vector_color_map(&mut self, color_map: ColorMap) {
        self.config.vector_color_map = color_map;
        self.static_pending.insert(Technique::VectorGlyphs);
    }

    /// Change the volume transfer function
    ///
    /// # Errors
    ///
    /// Rejects out-of-range coefficients
    pub fn set_transfer_function(&mut self, transfer: TransferFunction) -> VisResult<()> {
        transfer.validate()?;
        self.config.transfer_function = transfer;
        Ok(())
    }

    /// Change the pre-integration table parameters
    ///
    /// # Errors
    ///
    /// Rejects degenerate table sizes
    pub fn set_volume(&mut self, volume: VolumeConfig) -> VisResult<()> {
        volume.validate()?;
        self.config.volume = volume;
        Ok(())
    }

    /// Change the isoline values
    ///
    /// # Errors
    ///
    /// Rejects non-finite or inverted ranges
    pub fn set_isolines(&mut self, isolines: IsolineConfig) -> VisResult<()> {
        isolines.validate()?;
        self.config.isolines = isolines;
        Ok(())
    }

    /// Sample the configured scalar and run it through preprocessing
    ///
    /// Advances the slicing history, so call it once per frame. Frames call it
    /// whether or not a scalar technique is drawn.
    ///
    /// # Errors
    ///
    /// Propagates preprocessing errors
    pub fn prepare_scalar(&mut self, sampler: &GridSampler<'_>) -> VisResult<PreprocessOutput> {
        let field = sampler.scalar_field(self.config.scalar_kind);
        self.preprocessor.apply(field)
    }

    /// Glyph transforms for the configured vector quantity
    #[must_use]
    pub fn prepare_glyphs(&self, sampler: &GridSampler<'_>) -> GlyphBatch {
        let field = self
            .glyph_layout
            .sample_field(&sampler.vector_field(self.config.vector_kind), self.cell);
        generate_glyph_transforms(&self.glyph_layout, &field, self.config.glyph.magnifier)
    }

    /// Draw one frame of `source` through `backend`
    ///
    /// Backend failures do not surface as errors: the frame is reported as
    /// skipped instead.
    ///
    /// # Errors
    ///
    /// Returns non-backend errors, which indicate a configuration problem
    ///
    /// # Panics
    ///
    /// Panics if the source dimension differs from the visualization grid
    pub fn render_frame(
        &mut self,
        source: &dyn FluidSource,
        backend: &mut dyn RenderBackend,
    ) -> VisResult<FrameReport> {
        let mode = self.config.mode;
        let sampler = GridSampler::new(source, self.dims, self.cell);
        let mut report = FrameReport {
            mode,
            outcome: FrameOutcome::Drawn,
            vector_range: None,
            quantization_bound: None,
        };

        match self.draw_frame(mode, &sampler, backend, &mut report) {
            Ok(()) => {}
            Err(VisError::Backend { technique, message }) => {
                if self.reported_failures.insert(technique) {
                    warn!(%technique, %message, "Technique failed, skipping frame");
                } else {
                    trace!(%technique, "Technique still failing, skipping frame");
                }
                report.outcome = FrameOutcome::Skipped { technique };
            }
            Err(e) => return Err(e),
        }

        if report.quantization_bound.is_some() && report.quantization_bound != self.quantization_bound {
            debug!(bound = ?report.quantization_bound, "Quantization bound changed");
        }
        self.quantization_bound = report.quantization_bound;
        if report.vector_range.is_some() {
            self.vector_range = report.vector_range;
        }
        Ok(report)
    }

    fn draw_frame(
        &mut self,
        mode: VisualizationMode,
        sampler: &GridSampler<'_>,
        backend: &mut dyn RenderBackend,
        report: &mut FrameReport,
    ) -> VisResult<()> {
        let plan = mode.frame_plan();

        // Every frame feeds the slicing history, drawn or not
        let scalar = self.prepare_scalar(sampler)?;
        if plan.techniques.iter().any(|t| t.uses_scalar()) {
            report.quantization_bound = scalar.quantization_bound;
        }

        backend.clear(plan.clear)?;

        for technique in plan.techniques {
            if self.static_pending.contains(&technique) {
                self.upload_static(technique, backend)?;
                self.static_pending.remove(&technique);
            }
            match technique {
                Technique::HeightPlot => self.draw_height_plot(&scalar, backend)?,
                Technique::VolumeRendering => self.draw_volume(&scalar, backend)?,
                Technique::ScalarData => self.draw_scalar(&scalar, backend)?,
                Technique::Isolines => self.draw_isolines(&scalar, backend)?,
                Technique::Lic => self.draw_lic(sampler, backend)?,
                Technique::VectorGlyphs => {
                    let range = self.draw_glyphs(sampler, backend)?;
                    if self.config.glyph.report_range {
                        report.vector_range = range;
                    }
                }
            }
        }
        Ok(())
    }

    /// Upload the buffers of `technique` that only change with configuration
    fn upload_static(&self, technique: Technique, backend: &mut dyn RenderBackend) -> VisResult<()> {
        match technique {
            Technique::ScalarData => {
                let scalar_map = self.config.scalar_mapping.color_map.texture(COLOR_MAP_TEXELS);
                backend.upload(BufferId::ScalarColorMap, bytemuck::cast_slice(&scalar_map))?;
            }
            Technique::VectorGlyphs => {
                let vector_map = self.config.vector_color_map.texture(COLOR_MAP_TEXELS);
                backend.upload(BufferId::VectorColorMap, bytemuck::cast_slice(&vector_map))?;
                let shape = self.config.glyph.shape;
                backend.upload(BufferId::GlyphVertices, bytemuck::cast_slice(shape.vertices()))?;
                backend.upload(BufferId::GlyphIndices, bytemuck::cast_slice(&shape.indices()))?;
            }
            Technique::Lic => {
                let noise = noise_texture(
                    self.lic.texture_width,
                    self.lic.texture_height,
                    self.config.lic.noise_seed,
                );
                backend.upload(BufferId::LicNoise, &noise)?;
            }
            Technique::Isolines | Technique::HeightPlot | Technique::VolumeRendering => return Ok(()),
        }
        debug!(%technique, "Uploaded static buffers");
        Ok(())
    }

    fn scalar_mapping(&self, output: &PreprocessOutput) -> ScalarMapping {
        match output.quantization_bound {
            Some(bound) => self.config.scalar_mapping.with_quantization_bound(bound),
            None => self.config.scalar_mapping.clone(),
        }
    }

    fn draw_scalar(&self, output: &PreprocessOutput, backend: &mut dyn RenderBackend) -> VisResult<()> {
        let field = &output.field;
        let colors = self.scalar_mapping(output).map(field.as_slice());
        let positions = flatten(&vertex_positions(field, self.cell, 0.0));
        let indices = grid_indices(field.width, field.height);

        backend.upload(BufferId::ScalarPositions, bytemuck::cast_slice(&positions))?;
        backend.upload(BufferId::ScalarColors, bytemuck::cast_slice(&colors))?;
        backend.upload(BufferId::ScalarIndices, bytemuck::cast_slice(&indices))?;
        backend.draw(DrawCall {
            technique: Technique::ScalarData,
            primitive: Primitive::Triangles,
            index_count: count(indices.len()),
            instance_count: 1,
        })
    }

    fn draw_isolines(&self, output: &PreprocessOutput, backend: &mut dyn RenderBackend) -> VisResult<()> {
        let values = self.config.isolines.iso_values();
        let lines = extract_isolines(&output.field, &values, self.cell);
        let vertices = lines.flat_vertices();

        backend.upload(BufferId::IsolineVertices, bytemuck::cast_slice(&vertices))?;
        backend.draw(DrawCall {
            technique: Technique::Isolines,
            primitive: Primitive::Lines,
            index_count: count(vertices.len()),
            instance_count: 1,
        })
    }

    fn draw_height_plot(
        &self,
        output: &PreprocessOutput,
        backend: &mut dyn RenderBackend,
    ) -> VisResult<()> {
        let mesh = HeightPlotMesh::build(&output.field, self.cell, self.config.height_plot.height_scale);
        let colors = self.scalar_mapping(output).map(output.field.as_slice());

        backend.upload(BufferId::HeightPlotPositions, bytemuck::cast_slice(&flatten(&mesh.positions)))?;
        backend.upload(BufferId::HeightPlotNormals, bytemuck::cast_slice(&flatten(&mesh.normals)))?;
        backend.upload(BufferId::HeightPlotColors, bytemuck::cast_slice(&colors))?;
        backend.upload(BufferId::HeightPlotIndices, bytemuck::cast_slice(&mesh.indices))?;
        backend.draw(DrawCall {
            technique: Technique::HeightPlot,
            primitive: Primitive::Triangles,
            index_count: count(mesh.indices.len()),
            instance_count: 1,
        })
    }

    fn draw_volume(
        &mut self,
        output: &PreprocessOutput,
        backend: &mut dyn RenderBackend,
    ) -> VisResult<()> {
        let mapping = self.scalar_mapping(output);
        let values: Vec<f32> = output
            .field
            .as_slice()
            .iter()
            .map(|&v| mapping.normalize(v) * 255.0)
            .collect();

        let table = self.pre_integration.get_or_build(
            &self.config.transfer_function,
            self.config.volume.table_resolution,
            self.config.volume.integration_steps,
        )?;
        backend.upload(BufferId::PreIntegrationTable, bytemuck::cast_slice(table.entries()))?;
        backend.upload(BufferId::VolumeValues, bytemuck::cast_slice(&values))?;
        backend.draw(DrawCall {
            technique: Technique::VolumeRendering,
            primitive: Primitive::TriangleStrip,
            index_count: 4,
            instance_count: 1,
        })
    }

    fn draw_lic(&self, sampler: &GridSampler<'_>, backend: &mut dyn RenderBackend) -> VisResult<()> {
        let field = sampler.vector_field(self.config.vector_kind);
        let vectors: Vec<[f32; 2]> = field.x.iter().zip(&field.y).map(|(&x, &y)| [x, y]).collect();
        let parameters = [
            self.lic.step_size,
            self.lic.texture_width as f32,
            self.lic.texture_height as f32,
            0.0,
        ];

        backend.upload(BufferId::LicVectorField, bytemuck::cast_slice(&vectors))?;
        backend.upload(BufferId::LicParameters, bytemuck::cast_slice(&parameters))?;
        backend.draw(DrawCall {
            technique: Technique::Lic,
            primitive: Primitive::TriangleStrip,
            index_count: 4,
            instance_count: 1,
        })
    }

    fn draw_glyphs(
        &self,
        sampler: &GridSampler<'_>,
        backend: &mut dyn RenderBackend,
    ) -> VisResult<Option<MagnitudeRange>> {
        let batch = self.prepare_glyphs(sampler);
        let shape = self.config.glyph.shape;

        backend.upload(BufferId::GlyphInstances, bytemuck::cast_slice(&batch.instances))?;
        backend.upload(BufferId::GlyphMagnitudes, bytemuck::cast_slice(&batch.magnitudes))?;
        backend.draw(DrawCall {
            technique: Technique::VectorGlyphs,
            primitive: shape.primitive(),
            index_count: count(shape.vertices().len()),
            instance_count: count(self.glyph_layout.instance_count()),
        })?;
        Ok(batch.magnitude_range())
    }
}

fn layout_for(glyph: &GlyphConfig, cell: CellSize) -> VisResult<GlyphLayout> {
    if glyph.fit_to_domain {
        GlyphLayout::fitted(glyph.count_x, glyph.count_y, cell)
    } else {
        GlyphLayout::uniform(glyph.count_x, glyph.count_y)
    }
}

fn flatten(points: &[Vector3<f32>]) -> Vec<[f32; 3]> {
    points.iter().map(|p| [p.x, p.y, p.z]).collect()
}

/// Index or instance count for a draw call
///
/// # Panics
///
/// Panics if `n` does not fit in `u32`
fn count(n: usize) -> u32 {
    assert!(
        u32::try_from(n).is_ok(),
        "Draw count {n} exceeds the u32 range of the backend"
    );
    n as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{OverlaySet, RecordedCommand, RecordingBackend};
    use crate::source::SyntheticFlow;

    fn setup(dim: usize, mode: VisualizationMode) -> (Visualization, SyntheticFlow, RecordingBackend) {
        let config = VisualizationConfig {
            mode,
            ..VisualizationConfig::with_dim(dim)
        };
        (
            Visualization::new(config).unwrap(),
            SyntheticFlow::new(dim),
            RecordingBackend::new(),
        )
    }

    fn draws(backend: &RecordingBackend) -> Vec<Technique> {
        backend.draw_calls().map(|call| call.technique).collect()
    }

    fn uploads_of(backend: &RecordingBackend, id: BufferId) -> usize {
        backend
            .commands()
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Upload { buffer, .. } if *buffer == id))
            .count()
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(Visualization::new(VisualizationConfig::with_dim(0)).is_err());
    }

    #[test]
    fn test_combined_frame_draws_overlays_in_order() {
        let mode = VisualizationMode::Combined(OverlaySet {
            scalar: true,
            isolines: true,
            vectors: true,
        });
        let (mut vis, flow, mut backend) = setup(8, mode);
        let report = vis.render_frame(&flow, &mut backend).unwrap();

        assert_eq!(report.outcome, FrameOutcome::Drawn);
        assert_eq!(
            draws(&backend),
            vec![
                Technique::ScalarData,
                Technique::Isolines,
                Technique::VectorGlyphs
            ]
        );
        assert!(report.vector_range.is_some());
    }

    #[test]
    fn test_height_plot_clears_depth_first() {
        let (mut vis, flow, mut backend) = setup(6, VisualizationMode::HeightPlot);
        vis.render_frame(&flow, &mut backend).unwrap();
        assert_eq!(draws(&backend), vec![Technique::HeightPlot]);

        let first_clear = backend.commands().iter().find_map(|c| match c {
            RecordedCommand::Clear(mask) => Some(*mask),
            _ => None,
        });
        assert_eq!(first_clear, Some(crate::render::ClearMask::COLOR_DEPTH));
    }

    #[test]
    fn test_static_buffers_upload_once() {
        let mode = VisualizationMode::Combined(OverlaySet {
            scalar: true,
            isolines: false,
            vectors: true,
        });
        let (mut vis, flow, mut backend) = setup(6, mode);
        vis.render_frame(&flow, &mut backend).unwrap();
        vis.render_frame(&flow, &mut backend).unwrap();
        assert_eq!(uploads_of(&backend, BufferId::ScalarColorMap), 1);
        assert_eq!(uploads_of(&backend, BufferId::ScalarColors), 2);
        assert_eq!(uploads_of(&backend, BufferId::LicNoise), 0);

        vis.set_glyph_shape(GlyphShape::Arrow);
        vis.render_frame(&flow, &mut backend).unwrap();
        assert_eq!(uploads_of(&backend, BufferId::GlyphVertices), 2);
        assert_eq!(uploads_of(&backend, BufferId::ScalarColorMap), 1);
    }

    #[test]
    fn test_static_upload_failure_only_skips_its_technique() {
        let mode = VisualizationMode::Combined(OverlaySet {
            scalar: true,
            isolines: true,
            vectors: true,
        });
        let (mut vis, flow, mut backend) = setup(6, mode);
        backend.fail_upload(BufferId::LicNoise);

        for _ in 0..3 {
            let report = vis.render_frame(&flow, &mut backend).unwrap();
            assert_eq!(report.outcome, FrameOutcome::Drawn);
        }

        vis.set_mode(VisualizationMode::Lic);
        let report = vis.render_frame(&flow, &mut backend).unwrap();
        assert_eq!(
            report.outcome,
            FrameOutcome::Skipped {
                technique: Technique::Lic
            }
        );

        // Retried on the next LIC frame once the backend accepts it
        backend.clear_failures();
        let report = vis.render_frame(&flow, &mut backend).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Drawn);
        assert_eq!(uploads_of(&backend, BufferId::LicNoise), 1);
    }

    #[test]
    fn test_single_cell_grid_renders_every_mode() {
        let (mut vis, flow, mut backend) = setup(1, VisualizationMode::default());
        assert!(vis.lic_geometry().texture_width >= 1);
        assert!(vis.lic_geometry().texture_height >= 1);

        for mode in [
            VisualizationMode::Combined(OverlaySet {
                scalar: true,
                isolines: true,
                vectors: true,
            }),
            VisualizationMode::HeightPlot,
            VisualizationMode::Lic,
            VisualizationMode::VolumeRendering,
        ] {
            vis.set_mode(mode);
            let report = vis.render_frame(&flow, &mut backend).unwrap();
            assert_eq!(report.outcome, FrameOutcome::Drawn, "{mode:?}");
        }
    }

    #[test]
    fn test_glyph_grid_coarser_than_simulation() {
        let mode = VisualizationMode::Combined(OverlaySet {
            scalar: false,
            isolines: false,
            vectors: true,
        });
        let (mut vis, flow, mut backend) = setup(8, mode);
        vis.set_glyph_counts(4, 4).unwrap();
        let sampler = GridSampler::new(&flow, vis.dims(), vis.cell_size());
        let full = sampler.vector_field(vis.config().vector_kind);
        let batch = vis.prepare_glyphs(&sampler);

        let cell = vis.cell_size();
        for (idx, instance) in batch.instances.iter().enumerate() {
            let (x, y) = instance.translation();
            let (vx, vy) = full.sample((x + 1.0) / cell.width - 1.0, (y + 1.0) / cell.height - 1.0);
            assert!((batch.magnitudes[idx] - vx.hypot(vy)).abs() < 1e-4);
        }

        vis.render_frame(&flow, &mut backend).unwrap();
        assert_eq!(backend.draw_calls().map(|c| c.instance_count).collect::<Vec<_>>(), vec![16]);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "exceeds the u32 range")]
    fn test_oversized_draw_count_panics() {
        let _ = count(u32::MAX as usize + 1);
    }

    #[test]
    fn test_draw_count_in_range() {
        assert_eq!(count(0), 0);
        assert_eq!(count(u32::MAX as usize), u32::MAX);
    }

    #[test]
    fn test_backend_failure_skips_frame() {
        let mode = VisualizationMode::Combined(OverlaySet {
            scalar: true,
            isolines: true,
            vectors: true,
        });
        let (mut vis, flow, mut backend) = setup(6, mode);
        backend.fail_on(Technique::Isolines);

        for _ in 0..3 {
            let report = vis.render_frame(&flow, &mut backend).unwrap();
            assert_eq!(
                report.outcome,
                FrameOutcome::Skipped {
                    technique: Technique::Isolines
                }
            );
        }
        // Scalar drew each time, glyphs never did
        assert_eq!(draws(&backend), vec![Technique::ScalarData; 3]);

        backend.clear_failures();
        let report = vis.render_frame(&flow, &mut backend).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Drawn);
    }

    #[test]
    fn test_quantization_bound_is_reported() {
        let (mut vis, flow, mut backend) = setup(6, VisualizationMode::default());
        vis.set_preprocess(PreprocessConfig {
            quantize: true,
            quantization_bits: 4,
            ..Default::default()
        })
        .unwrap();
        let report = vis.render_frame(&flow, &mut backend).unwrap();
        assert_eq!(report.quantization_bound, Some(15));
        assert_eq!(vis.quantization_bound(), Some(15));
    }

    #[test]
    fn test_volume_table_is_cached_across_frames() {
        let (mut vis, flow, mut backend) = setup(4, VisualizationMode::VolumeRendering);
        vis.set_volume(VolumeConfig {
            table_resolution: 16,
            integration_steps: 10,
        })
        .unwrap();
        for _ in 0..3 {
            vis.render_frame(&flow, &mut backend).unwrap();
        }
        assert_eq!(vis.pre_integration_rebuilds(), 1);
        assert_eq!(draws(&backend), vec![Technique::VolumeRendering; 3]);
    }

    #[test]
    fn test_set_dim_resets_derived_state() {
        let (mut vis, _, _) = setup(8, VisualizationMode::default());
        vis.set_glyph_counts(3, 5).unwrap();
        vis.set_lic_step_factor(2.0).unwrap();

        vis.set_dim(4).unwrap();
        assert_eq!(vis.dims().dim(), 4);
        assert_eq!(vis.glyph_layout().counts(), (4, 4));
        assert_eq!(vis.config().lic.step_factor, DEFAULT_STEP_FACTOR);
        assert!((vis.cell_size().width - 0.4).abs() < 1e-6);

        assert!(vis.set_dim(0).is_err());
        assert_eq!(vis.dims().dim(), 4);
    }

    #[test]
    fn test_glyph_counts_validated() {
        let (mut vis, _, _) = setup(8, VisualizationMode::default());
        assert_eq!(
            vis.set_glyph_counts(0, 3),
            Err(VisError::EmptyGlyphGrid { count_x: 0, count_y: 3 })
        );
        assert_eq!(vis.glyph_layout().counts(), (8, 8));
    }

    #[test]
    fn test_lic_frame_uploads_vector_field() {
        let (mut vis, flow, mut backend) = setup(5, VisualizationMode::Lic);
        vis.render_frame(&flow, &mut backend).unwrap();
        assert_eq!(
            backend.buffer(BufferId::LicVectorField).map(<[u8]>::len),
            Some(25 * 8)
        );
        assert_eq!(draws(&backend), vec![Technique::Lic]);
    }
}
