/// Frame timing helpers.
///
/// Provides an RAII scope for wall-clock measurement and a frame timer that
/// tracks render times against a budget.
use std::time::Instant;
use tracing::{trace, warn};

/// A profiling scope that measures elapsed wall-clock time using RAII.
///
/// Logs at `trace` when dropped, or at `warn` when a budget was set and exceeded.
pub struct ProfilerScope {
    start: Instant,
    name: &'static str,
    budget_ms: Option<f64>,
}

impl ProfilerScope {
    /// Creates a new profiling scope.
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
            budget_ms: None,
        }
    }

    /// Creates a scope that warns when it outlives `budget_ms`.
    pub fn with_budget(name: &'static str, budget_ms: f64) -> Self {
        Self {
            budget_ms: Some(budget_ms),
            ..Self::new(name)
        }
    }

    /// Gets elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for ProfilerScope {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        match self.budget_ms {
            Some(budget_ms) if elapsed_ms > budget_ms => {
                warn!(scope = self.name, elapsed_ms, budget_ms, "Scope over budget");
            }
            _ => trace!(scope = self.name, elapsed_ms, "Scope finished"),
        }
    }
}

/// Render-time statistics for the frame driver.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTimer {
    last_frame_time_ms: f64,
    average_frame_time_ms: f64,
    frames: u64,
    overruns: u64,
    budget_ms: f64,
}

impl FrameTimer {
    /// Creates a frame timer with a per-frame budget.
    pub fn new(budget_ms: f64) -> Self {
        Self {
            last_frame_time_ms: 0.0,
            average_frame_time_ms: 0.0,
            frames: 0,
            overruns: 0,
            budget_ms,
        }
    }

    /// Records a frame time in milliseconds, returning whether it overran the budget.
    pub fn record(&mut self, time_ms: f64) -> bool {
        self.frames += 1;
        self.last_frame_time_ms = time_ms;
        self.average_frame_time_ms += (time_ms - self.average_frame_time_ms) / self.frames as f64;

        let overran = time_ms > self.budget_ms;
        if overran {
            self.overruns += 1;
        }
        overran
    }

    /// Gets the last recorded frame time.
    pub fn last_frame_time_ms(&self) -> f64 {
        self.last_frame_time_ms
    }

    /// Running mean of all recorded frame times.
    pub fn average_frame_time_ms(&self) -> f64 {
        self.average_frame_time_ms
    }

    /// Frames recorded so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames that exceeded the budget.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Per-frame budget in milliseconds.
    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }
}
