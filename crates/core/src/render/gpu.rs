//! GPU device probing
//!
//! Device initialization distinguishes "no GPU found" (expected on headless
//! machines) from "GPU found but failed to initialize" (worth a warning). A
//! live context answers whether a grid's per-cell buffers fit the device.

use tracing::{debug, info};

/// Result of a GPU initialization attempt
#[derive(Debug)]
pub enum GpuInitResult {
    /// GPU initialized successfully
    Success(GpuContext),
    /// No GPU adapter found
    NoGpuFound,
    /// GPU found but initialization failed
    InitFailed {
        /// Name of the adapter that failed
        adapter_name: String,
        /// Error message
        error: String,
    },
}

/// Opened device and its adapter information
#[derive(Debug)]
pub struct GpuContext {
    device: wgpu::Device,
    adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Request a high-performance adapter and open a device on it
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> GpuInitResult {
        info!("Attempting to initialize GPU context");

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = if let Some(a) =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })) {
            debug!("Found GPU adapter: {}", a.get_info().name);
            a
        } else {
            debug!("No GPU adapter found");
            return GpuInitResult::NoGpuFound;
        };

        let adapter_info = adapter.get_info();
        let adapter_name = adapter_info.name.clone();

        match pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("SciVis GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )) {
            Ok((device, _queue)) => {
                info!("GPU context initialized successfully: {}", adapter_name);
                GpuInitResult::Success(Self {
                    device,
                    adapter_info,
                })
            }
            Err(e) => {
                debug!("Failed to create GPU device: {}", e);
                GpuInitResult::InitFailed {
                    adapter_name,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Adapter name for logging
    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Check whether a `dim × dim` grid's per-cell buffers fit the device limits
    ///
    /// Estimates the largest per-frame buffer: one RGBA color per cell.
    #[must_use]
    pub fn can_allocate(&self, dim: u32) -> bool {
        let cells = u64::from(dim).saturating_mul(u64::from(dim));
        let largest = cells.saturating_mul(16);
        largest <= self.device.limits().max_buffer_size
    }
}
