use clap::{Parser, ValueEnum};
use scivis_core::{
    FrameDriver, FrameOutcome, FrameReport, GlyphShape, ManualClock, OverlaySet, PreprocessConfig,
    RecordedCommand, RecordingBackend, ScalarKind, SliceAxis, SyntheticFlow, VectorKind,
    Visualization, VisualizationConfig, VisualizationMode,
};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Technique selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Color-mapped scalar field
    Scalar,
    /// Scalar field with isolines
    Isolines,
    /// Scalar field, isolines and vector glyphs
    Combined,
    /// Vector glyphs only
    Vectors,
    /// Shaded height plot
    HeightPlot,
    /// Line integral convolution
    Lic,
    /// Pre-integrated volume rendering
    Volume,
}

impl Mode {
    fn to_visualization_mode(self) -> VisualizationMode {
        let overlays = |scalar, isolines, vectors| {
            VisualizationMode::Combined(OverlaySet {
                scalar,
                isolines,
                vectors,
            })
        };
        match self {
            Mode::Scalar => overlays(true, false, false),
            Mode::Isolines => overlays(true, true, false),
            Mode::Combined => overlays(true, true, true),
            Mode::Vectors => overlays(false, false, true),
            Mode::HeightPlot => VisualizationMode::HeightPlot,
            Mode::Lic => VisualizationMode::Lic,
            Mode::Volume => VisualizationMode::VolumeRendering,
        }
    }
}

/// Displayed scalar on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scalar {
    Density,
    Velocity,
    Force,
    VelocityDivergence,
    ForceDivergence,
}

impl From<Scalar> for ScalarKind {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Density => ScalarKind::Density,
            Scalar::Velocity => ScalarKind::VelocityMagnitude,
            Scalar::Force => ScalarKind::ForceMagnitude,
            Scalar::VelocityDivergence => ScalarKind::VelocityDivergence,
            Scalar::ForceDivergence => ScalarKind::ForceDivergence,
        }
    }
}

/// Slicing axis on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Axis {
    X,
    Y,
    T,
}

impl From<Axis> for SliceAxis {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::X => SliceAxis::X,
            Axis::Y => SliceAxis::Y,
            Axis::T => SliceAxis::T,
        }
    }
}

/// Headless field visualization run against a synthetic flow
#[derive(Parser, Debug)]
#[command(name = "scivis-headless")]
#[command(about = "Drive the visualization pipeline without a window", long_about = None)]
struct Args {
    /// Grid dimension (cells per side)
    #[arg(short, long, default_value_t = 50)]
    dim: usize,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 120)]
    frames: u64,

    /// Visualization technique
    #[arg(short, long, value_enum, default_value_t = Mode::Combined)]
    mode: Mode,

    /// Displayed scalar quantity
    #[arg(short, long, value_enum, default_value_t = Scalar::Density)]
    scalar: Scalar,

    /// Show force glyphs instead of velocity glyphs
    #[arg(long)]
    force_glyphs: bool,

    /// Glyphs per side (defaults to one per cell)
    #[arg(short, long)]
    glyphs: Option<usize>,

    /// Draw arrows instead of hedgehogs
    #[arg(long)]
    arrows: bool,

    /// Glyph magnitude magnifier
    #[arg(long, default_value_t = 1.0)]
    magnifier: f32,

    /// Quantize the scalar field to this many bits
    #[arg(short, long)]
    quantize: Option<u32>,

    /// Gaussian blur
    #[arg(long)]
    blur: bool,

    /// Replace the scalar by its Sobel gradient magnitude
    #[arg(long)]
    gradient: bool,

    /// Slice the frame history along an axis
    #[arg(long, value_enum)]
    slice: Option<Axis>,

    /// Slice index along the chosen axis
    #[arg(long, default_value_t = 0)]
    slice_index: usize,

    /// Number of isolines
    #[arg(long, default_value_t = 1)]
    isolines: usize,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Pause the simulation after this many ticks
    #[arg(long)]
    pause_after: Option<u64>,

    /// Print a row every N ticks
    #[arg(short, long, default_value_t = 10)]
    report_interval: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    println!("=== Field Visualization Demo ===\n");

    #[cfg(feature = "gpu")]
    probe_gpu(args.dim);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(message) => {
            error!("{message}");
            std::process::exit(2);
        }
    };

    let visualization = match Visualization::new(config) {
        Ok(visualization) => visualization,
        Err(e) => {
            error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    println!(
        "Grid {}x{} | cell {:.4} | viewport {}x{} | mode {:?}",
        args.dim,
        args.dim,
        visualization.cell_size().width,
        args.width,
        args.height,
        visualization.mode()
    );
    let lic = visualization.lic_geometry();
    println!(
        "LIC texture {}x{} (border {}x{}), step {:.5}\n",
        lic.texture_width, lic.texture_height, lic.border_x, lic.border_y, lic.step_size
    );

    let clock = ManualClock::new();
    let tick = Duration::from_millis(visualization.config().clock.tick_interval_ms);
    let mut driver = FrameDriver::new(
        clock,
        SyntheticFlow::new(args.dim),
        RecordingBackend::new(),
        visualization,
    );

    println!("Tick  | Steps | Outcome            | Draws | Uploaded(KiB) | |v| range         | Levels");
    println!("------|-------|--------------------|-------|---------------|-------------------|-------");

    let mut skipped = 0u64;
    for frame in 1..=args.frames {
        if args.pause_after == Some(frame - 1) {
            info!(frame, "Pausing simulation");
            driver.pause();
        }

        driver.clock().advance(tick);
        if let Err(e) = driver.poll() {
            error!("Frame {frame} failed: {e}");
            std::process::exit(1);
        }

        let commands = driver.backend_mut().take_commands();
        let Some(report) = driver.last_report().copied() else {
            continue;
        };
        if matches!(report.outcome, FrameOutcome::Skipped { .. }) {
            skipped += 1;
        }
        if frame % args.report_interval.max(1) == 0 || frame == args.frames {
            print_row(frame, driver.source().steps(), &report, &commands);
        }
    }

    let timer = driver.timer();
    println!("\n=== Run Complete ===");
    println!("Ticks: {}", args.frames);
    println!("Simulation steps: {}", driver.source().steps());
    println!("Skipped frames: {skipped}");
    println!("Dropped ticks: {}", driver.dropped_ticks());
    println!(
        "Render time: avg {:.3} ms, last {:.3} ms, {} over budget",
        timer.average_frame_time_ms(),
        timer.last_frame_time_ms(),
        timer.overruns()
    );
    println!(
        "Pre-integration table builds: {}",
        driver.visualization().pre_integration_rebuilds()
    );
}

fn build_config(args: &Args) -> Result<VisualizationConfig, String> {
    let mut config = VisualizationConfig::with_dim(args.dim);
    config.viewport.width = args.width;
    config.viewport.height = args.height;
    config.mode = args.mode.to_visualization_mode();
    config.scalar_kind = args.scalar.into();
    config.vector_kind = if args.force_glyphs {
        VectorKind::Force
    } else {
        VectorKind::Velocity
    };

    if let Some(glyphs) = args.glyphs {
        config.glyph.count_x = glyphs;
        config.glyph.count_y = glyphs;
        config.glyph.fit_to_domain = true;
    }
    config.glyph.magnifier = args.magnifier;
    if args.arrows {
        config.glyph.shape = GlyphShape::Arrow;
    }

    config.isolines.count = args.isolines;
    if args.isolines > 1 {
        config.isolines.min = 0.1;
        config.isolines.max = 0.9;
    }

    config.preprocess = PreprocessConfig {
        quantize: args.quantize.is_some(),
        quantization_bits: args.quantize.unwrap_or(8),
        blur: args.blur,
        gradient: args.gradient,
        slicing: args.slice.is_some(),
        slice_axis: args.slice.map_or(SliceAxis::T, SliceAxis::from),
        slice_index: args.slice_index,
        slice_window: None,
    };

    config.validate().map_err(|e| format!("Invalid configuration: {e}"))?;
    Ok(config)
}

fn print_row(frame: u64, steps: u64, report: &FrameReport, commands: &[RecordedCommand]) {
    let draws = commands
        .iter()
        .filter(|c| matches!(c, RecordedCommand::Draw(_)))
        .count();
    let uploaded: usize = commands
        .iter()
        .map(|c| match c {
            RecordedCommand::Upload { len, .. } => *len,
            RecordedCommand::Clear(_) | RecordedCommand::Draw(_) => 0,
        })
        .sum();
    let outcome = match report.outcome {
        FrameOutcome::Drawn => "drawn".to_string(),
        FrameOutcome::Skipped { technique } => format!("skipped ({technique})"),
    };
    let range = report
        .vector_range
        .map_or_else(|| "-".to_string(), |r| format!("{:.4} .. {:.4}", r.min, r.max));
    let levels = report
        .quantization_bound
        .map_or_else(|| "-".to_string(), |bound| bound.to_string());

    println!(
        "{:5} | {:5} | {:18} | {:5} | {:13.1} | {:17} | {}",
        frame,
        steps,
        outcome,
        draws,
        uploaded as f64 / 1024.0,
        range,
        levels
    );
}

#[cfg(feature = "gpu")]
fn probe_gpu(dim: usize) {
    use scivis_core::render::gpu::{GpuContext, GpuInitResult};

    match GpuContext::new() {
        GpuInitResult::Success(ctx) => {
            let fits = u32::try_from(dim).is_ok_and(|dim| ctx.can_allocate(dim));
            println!(
                "GPU: {} ({dim}x{dim} grid {} device buffer limits)\n",
                ctx.adapter_name(),
                if fits { "fits" } else { "exceeds" }
            );
        }
        GpuInitResult::NoGpuFound => println!("GPU: none found, recording only\n"),
        GpuInitResult::InitFailed {
            adapter_name,
            error,
        } => println!("GPU: {adapter_name} failed to initialize ({error})\n"),
    }
}
