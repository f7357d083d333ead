//! Visualization modes and the render backend seam
//!
//! A frame draws exactly one of the exclusive techniques (height plot, LIC,
//! volume rendering) or the combined overlays. [`VisualizationMode`] holds the
//! choice as a single tagged value; [`VisualizationMode::frame_plan`] turns it into
//! the clear mask and the ordered technique list for one frame.
//!
//! The GPU is reached only through [`RenderBackend`]. [`RecordingBackend`] keeps
//! every command in memory; with the `gpu` feature, [`gpu::GpuContext`] probes
//! a `wgpu` device and checks grid sizes against its buffer limits.

#[cfg(feature = "gpu")]
pub mod gpu;
pub mod recording;

pub use recording::{RecordedCommand, RecordingBackend};

use crate::error::VisResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Drawing technique, also the unit of failure reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technique {
    /// Shaded surface of the scalar field
    HeightPlot,
    /// Line integral convolution of the velocity field
    Lic,
    /// Pre-integrated volume rendering of the scalar history
    VolumeRendering,
    /// Color-mapped scalar field
    ScalarData,
    /// Contour lines of the scalar field
    Isolines,
    /// Instanced vector glyphs
    VectorGlyphs,
}

impl Technique {
    /// Whether the technique reads the preprocessed scalar field
    #[must_use]
    pub const fn uses_scalar(self) -> bool {
        matches!(
            self,
            Self::HeightPlot | Self::VolumeRendering | Self::ScalarData | Self::Isolines
        )
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HeightPlot => "height plot",
            Self::Lic => "LIC",
            Self::VolumeRendering => "volume rendering",
            Self::ScalarData => "scalar data",
            Self::Isolines => "isolines",
            Self::VectorGlyphs => "vector glyphs",
        };
        f.write_str(name)
    }
}

/// Overlays drawn together in combined mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlaySet {
    /// Color-mapped scalar field
    pub scalar: bool,
    /// Isolines
    pub isolines: bool,
    /// Vector glyphs
    pub vectors: bool,
}

impl Default for OverlaySet {
    fn default() -> Self {
        Self {
            scalar: true,
            isolines: false,
            vectors: false,
        }
    }
}

impl OverlaySet {
    /// Enabled overlays in draw order: scalar, isolines, vectors
    #[must_use]
    pub fn techniques(&self) -> Vec<Technique> {
        [
            (self.scalar, Technique::ScalarData),
            (self.isolines, Technique::Isolines),
            (self.vectors, Technique::VectorGlyphs),
        ]
        .into_iter()
        .filter_map(|(enabled, technique)| enabled.then_some(technique))
        .collect()
    }
}

/// Independent on/off switches as exposed by a parameter panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModeFlags {
    /// Height plot requested
    pub height_plot: bool,
    /// LIC requested
    pub lic: bool,
    /// Volume rendering requested
    pub volume_rendering: bool,
    /// Scalar overlay requested
    pub scalar: bool,
    /// Isoline overlay requested
    pub isolines: bool,
    /// Vector overlay requested
    pub vectors: bool,
}

/// What a frame draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualizationMode {
    /// Height plot alone
    HeightPlot,
    /// LIC alone
    Lic,
    /// Volume rendering alone
    VolumeRendering,
    /// Any combination of the overlays
    Combined(OverlaySet),
}

impl Default for VisualizationMode {
    fn default() -> Self {
        Self::Combined(OverlaySet::default())
    }
}

impl VisualizationMode {
    /// Resolve independent switches with the priority
    /// height plot > LIC > volume rendering > overlays
    #[must_use]
    pub fn from_flags(flags: ModeFlags) -> Self {
        if flags.height_plot {
            Self::HeightPlot
        } else if flags.lic {
            Self::Lic
        } else if flags.volume_rendering {
            Self::VolumeRendering
        } else {
            Self::Combined(OverlaySet {
                scalar: flags.scalar,
                isolines: flags.isolines,
                vectors: flags.vectors,
            })
        }
    }

    /// Buffers cleared at the start of the frame
    #[must_use]
    pub const fn clear_mask(self) -> ClearMask {
        match self {
            Self::HeightPlot => ClearMask::COLOR_DEPTH,
            Self::Lic | Self::VolumeRendering | Self::Combined(_) => ClearMask::COLOR,
        }
    }

    /// Techniques drawn, in order
    #[must_use]
    pub fn techniques(self) -> Vec<Technique> {
        match self {
            Self::HeightPlot => vec![Technique::HeightPlot],
            Self::Lic => vec![Technique::Lic],
            Self::VolumeRendering => vec![Technique::VolumeRendering],
            Self::Combined(overlays) => overlays.techniques(),
        }
    }

    /// Clear mask and ordered techniques for one frame
    #[must_use]
    pub fn frame_plan(self) -> FramePlan {
        FramePlan {
            clear: self.clear_mask(),
            techniques: self.techniques(),
        }
    }
}

/// Work for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    /// Buffers cleared first
    pub clear: ClearMask,
    /// Techniques drawn after clearing, in order
    pub techniques: Vec<Technique>,
}

/// Framebuffer attachments to clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClearMask {
    /// Clear the color attachment
    pub color: bool,
    /// Clear the depth attachment
    pub depth: bool,
}

impl ClearMask {
    /// Color only
    pub const COLOR: Self = Self {
        color: true,
        depth: false,
    };
    /// Color and depth
    pub const COLOR_DEPTH: Self = Self {
        color: true,
        depth: true,
    };
}

/// Named GPU buffers written by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    /// Grid vertex positions for the scalar overlay
    ScalarPositions,
    /// Per-vertex colors of the scalar overlay
    ScalarColors,
    /// Triangle indices of the scalar grid
    ScalarIndices,
    /// Color-map texture for scalar data
    ScalarColorMap,
    /// Color-map texture for glyph magnitudes
    VectorColorMap,
    /// Unit glyph vertices
    GlyphVertices,
    /// Unit glyph indices
    GlyphIndices,
    /// Per-instance model matrices
    GlyphInstances,
    /// Per-instance magnified magnitudes
    GlyphMagnitudes,
    /// Isoline segment endpoints
    IsolineVertices,
    /// Height-plot vertex positions
    HeightPlotPositions,
    /// Height-plot vertex normals
    HeightPlotNormals,
    /// Height-plot vertex colors
    HeightPlotColors,
    /// Height-plot triangle indices
    HeightPlotIndices,
    /// LIC white noise texture
    LicNoise,
    /// Vector field advected by LIC
    LicVectorField,
    /// LIC step size and texture extent
    LicParameters,
    /// Pre-integrated transfer function table
    PreIntegrationTable,
    /// Scalar samples in `[0, 255]` for volume rendering
    VolumeValues,
}

impl BufferId {
    /// Technique that reads this buffer
    #[must_use]
    pub const fn technique(self) -> Technique {
        match self {
            Self::ScalarPositions | Self::ScalarColors | Self::ScalarIndices | Self::ScalarColorMap => {
                Technique::ScalarData
            }
            Self::VectorColorMap
            | Self::GlyphVertices
            | Self::GlyphIndices
            | Self::GlyphInstances
            | Self::GlyphMagnitudes => Technique::VectorGlyphs,
            Self::IsolineVertices => Technique::Isolines,
            Self::HeightPlotPositions
            | Self::HeightPlotNormals
            | Self::HeightPlotColors
            | Self::HeightPlotIndices => Technique::HeightPlot,
            Self::LicNoise | Self::LicVectorField | Self::LicParameters => Technique::Lic,
            Self::PreIntegrationTable | Self::VolumeValues => Technique::VolumeRendering,
        }
    }
}

/// Draw primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Independent triangles
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Independent line segments
    Lines,
}

/// One indexed, instanced draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawCall {
    /// Technique this draw belongs to
    pub technique: Technique,
    /// Primitive topology
    pub primitive: Primitive,
    /// Indices per instance
    pub index_count: u32,
    /// Number of instances
    pub instance_count: u32,
}

/// Buffer upload half of the GPU collaborator
pub trait BufferUpload {
    /// Replace the contents of `buffer`
    ///
    /// # Errors
    ///
    /// Returns [`crate::VisError::Backend`] when the upload cannot be carried out
    fn upload(&mut self, buffer: BufferId, bytes: &[u8]) -> VisResult<()>;
}

/// GPU collaborator receiving every command of a frame
pub trait RenderBackend: BufferUpload {
    /// Clear framebuffer attachments
    ///
    /// # Errors
    ///
    /// Returns [`crate::VisError::Backend`] on failure
    fn clear(&mut self, mask: ClearMask) -> VisResult<()>;

    /// Issue a draw
    ///
    /// # Errors
    ///
    /// Returns [`crate::VisError::Backend`] naming the failed technique
    fn draw(&mut self, call: DrawCall) -> VisResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let all = ModeFlags {
            height_plot: true,
            lic: true,
            volume_rendering: true,
            scalar: true,
            isolines: true,
            vectors: true,
        };
        assert_eq!(VisualizationMode::from_flags(all), VisualizationMode::HeightPlot);

        let no_height = ModeFlags {
            height_plot: false,
            ..all
        };
        assert_eq!(VisualizationMode::from_flags(no_height), VisualizationMode::Lic);

        let volume = ModeFlags {
            lic: false,
            ..no_height
        };
        assert_eq!(
            VisualizationMode::from_flags(volume),
            VisualizationMode::VolumeRendering
        );

        let overlays = ModeFlags {
            volume_rendering: false,
            ..volume
        };
        assert_eq!(
            VisualizationMode::from_flags(overlays),
            VisualizationMode::Combined(OverlaySet {
                scalar: true,
                isolines: true,
                vectors: true,
            })
        );
    }

    #[test]
    fn test_only_height_plot_clears_depth() {
        assert_eq!(VisualizationMode::HeightPlot.clear_mask(), ClearMask::COLOR_DEPTH);
        assert_eq!(VisualizationMode::Lic.clear_mask(), ClearMask::COLOR);
        assert_eq!(VisualizationMode::VolumeRendering.clear_mask(), ClearMask::COLOR);
        assert_eq!(VisualizationMode::default().clear_mask(), ClearMask::COLOR);
    }

    #[test]
    fn test_combined_overlays_draw_in_fixed_order() {
        let mode = VisualizationMode::Combined(OverlaySet {
            scalar: true,
            isolines: true,
            vectors: true,
        });
        assert_eq!(
            mode.frame_plan().techniques,
            vec![
                Technique::ScalarData,
                Technique::Isolines,
                Technique::VectorGlyphs
            ]
        );

        let vectors_only = VisualizationMode::Combined(OverlaySet {
            scalar: false,
            isolines: false,
            vectors: true,
        });
        assert_eq!(vectors_only.techniques(), vec![Technique::VectorGlyphs]);
    }

    #[test]
    fn test_exclusive_modes_draw_one_technique() {
        assert_eq!(VisualizationMode::Lic.techniques(), vec![Technique::Lic]);
        assert_eq!(
            VisualizationMode::HeightPlot.frame_plan(),
            FramePlan {
                clear: ClearMask::COLOR_DEPTH,
                techniques: vec![Technique::HeightPlot],
            }
        );
    }
}
