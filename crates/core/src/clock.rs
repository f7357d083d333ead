//! Fixed-cadence frame driver
//!
//! Each tick advances the simulation one step (only while running) and then
//! redraws exactly once, so a paused simulation keeps presenting its last state.
//! [`FrameDriver::poll`] runs the ticks that came due since the last poll, up to
//! `max_catch_up`; older ones are dropped.

use crate::error::VisResult;
use crate::profiler::{FrameTimer, ProfilerScope};
use crate::render::RenderBackend;
use crate::source::FluidSource;
use crate::visualization::{FrameReport, Visualization};
use std::cell::Cell;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Monotonic time source
pub trait Clock {
    /// Time since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock advanced by hand, for tests and offline rendering
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// Clock starting at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Steps and redraws every tick
    Running,
    /// Redraws every tick without stepping
    Paused,
    /// Neither steps nor redraws; held while buffers are reallocated
    Halted,
}

/// Result of one [`FrameDriver::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollOutcome {
    /// Ticks executed
    pub ticks_run: u64,
    /// Due ticks skipped by the catch-up limit
    pub dropped: u64,
}

/// Owns the simulation, the backend and the visualization, and paces them
#[derive(Debug)]
pub struct FrameDriver<C, S, B> {
    clock: C,
    source: S,
    backend: B,
    visualization: Visualization,
    state: RunState,
    tick_interval: Duration,
    max_catch_up: u64,
    next_tick: Duration,
    timer: FrameTimer,
    last_report: Option<FrameReport>,
    dropped_ticks: u64,
}

impl<C: Clock, S: FluidSource, B: RenderBackend> FrameDriver<C, S, B> {
    /// Create a running driver, resizing `source` to the visualization grid if needed
    pub fn new(clock: C, mut source: S, backend: B, visualization: Visualization) -> Self {
        let dim = visualization.dims().dim();
        if source.dim() != dim {
            debug!(from = source.dim(), to = dim, "Resizing source to visualization grid");
            source.set_dim(dim);
        }

        let clock_config = visualization.config().clock;
        let tick_interval = Duration::from_millis(clock_config.tick_interval_ms);
        let next_tick = clock.now() + tick_interval;

        Self {
            clock,
            source,
            backend,
            visualization,
            state: RunState::Running,
            tick_interval,
            max_catch_up: u64::from(clock_config.max_catch_up),
            next_tick,
            timer: FrameTimer::new(clock_config.frame_budget_ms),
            last_report: None,
            dropped_ticks: 0,
        }
    }

    /// Step the simulation once if running
    ///
    /// Returns whether a step was taken.
    pub fn advance_simulation(&mut self) -> bool {
        if self.state != RunState::Running {
            return false;
        }
        let _scope = ProfilerScope::new("simulation_step");
        self.source.step();
        true
    }

    /// Redraw the current simulation state
    ///
    /// # Errors
    ///
    /// Propagates non-backend errors from [`Visualization::render_frame`]
    pub fn render_frame(&mut self) -> VisResult<FrameReport> {
        let _scope = ProfilerScope::with_budget("render_frame", self.timer.budget_ms());
        let start = self.clock.now();
        let report = self
            .visualization
            .render_frame(&self.source, &mut self.backend)?;
        let elapsed = self.clock.now().saturating_sub(start);
        self.timer.record(elapsed.as_secs_f64() * 1000.0);
        self.last_report = Some(report);
        Ok(report)
    }

    /// One step (when running) followed by one redraw
    ///
    /// Does nothing while halted.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::render_frame`]
    pub fn tick(&mut self) -> VisResult<Option<FrameReport>> {
        if self.state == RunState::Halted {
            return Ok(None);
        }
        self.advance_simulation();
        self.render_frame().map(Some)
    }

    /// Run the ticks that came due since the last poll
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::tick`]; the schedule is not advanced
    pub fn poll(&mut self) -> VisResult<PollOutcome> {
        let now = self.clock.now();
        if self.state == RunState::Halted || now < self.next_tick {
            return Ok(PollOutcome::default());
        }

        let behind = (now - self.next_tick).as_nanos() / self.tick_interval.as_nanos();
        let due = u64::try_from(behind).unwrap_or(u64::MAX).saturating_add(1);
        let ticks_run = due.min(self.max_catch_up);
        let dropped = due - ticks_run;

        for _ in 0..ticks_run {
            self.tick()?;
        }
        if dropped > 0 {
            self.dropped_ticks += dropped;
            debug!(dropped, total = self.dropped_ticks, "Dropped ticks while catching up");
        }
        self.next_tick += self
            .tick_interval
            .saturating_mul(u32::try_from(due).unwrap_or(u32::MAX));

        Ok(PollOutcome { ticks_run, dropped })
    }

    /// Stop stepping; frames still redraw
    pub fn pause(&mut self) {
        if self.state == RunState::Running {
            self.state = RunState::Paused;
        }
    }

    /// Resume stepping from paused or halted
    pub fn resume(&mut self) {
        if self.state != RunState::Running {
            self.state = RunState::Running;
            self.next_tick = self.clock.now() + self.tick_interval;
        }
    }

    /// Stop ticking altogether until [`Self::resume`]
    pub fn halt(&mut self) {
        self.state = RunState::Halted;
    }

    /// Change the grid dimension of both the visualization and the source
    ///
    /// The driver is halted for the reallocation and returns to its previous
    /// state afterwards, with the tick schedule restarted.
    ///
    /// # Errors
    ///
    /// Returns the validation error and leaves both sides unchanged
    pub fn set_dim(&mut self, dim: usize) -> VisResult<()> {
        let previous = self.state;
        self.state = RunState::Halted;
        info!(dim, "Halting frame driver to change grid dimension");

        let result = self.visualization.set_dim(dim);
        if result.is_ok() {
            self.source.set_dim(dim);
        }

        self.state = previous;
        self.next_tick = self.clock.now() + self.tick_interval;
        result
    }

    /// Change the viewport, halting around the reallocation like [`Self::set_dim`]
    ///
    /// # Errors
    ///
    /// Returns the validation error and leaves the viewport unchanged
    pub fn resize_viewport(&mut self, width: u32, height: u32) -> VisResult<()> {
        let previous = self.state;
        self.state = RunState::Halted;
        info!(width, height, "Halting frame driver to resize viewport");

        let result = self.visualization.resize_viewport(width, height);

        self.state = previous;
        self.next_tick = self.clock.now() + self.tick_interval;
        result
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// The time source
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The simulation
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The backend
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The visualization
    #[must_use]
    pub fn visualization(&self) -> &Visualization {
        &self.visualization
    }

    /// Mutable access to the visualization
    ///
    /// Change the grid dimension through [`Self::set_dim`] so the source follows.
    pub fn visualization_mut(&mut self) -> &mut Visualization {
        &mut self.visualization
    }

    /// Render-time statistics
    #[must_use]
    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    /// Report of the most recent frame
    #[must_use]
    pub fn last_report(&self) -> Option<&FrameReport> {
        self.last_report.as_ref()
    }

    /// Ticks dropped by the catch-up limit so far
    #[must_use]
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisualizationConfig;
    use crate::render::RecordingBackend;
    use crate::source::SyntheticFlow;

    type TestDriver = FrameDriver<ManualClock, SyntheticFlow, RecordingBackend>;

    fn driver(dim: usize) -> TestDriver {
        let visualization = Visualization::new(VisualizationConfig::with_dim(dim)).unwrap();
        FrameDriver::new(
            ManualClock::new(),
            SyntheticFlow::new(dim),
            RecordingBackend::new(),
            visualization,
        )
    }

    #[test]
    fn test_new_resizes_source() {
        let visualization = Visualization::new(VisualizationConfig::with_dim(6)).unwrap();
        let driver = FrameDriver::new(
            ManualClock::new(),
            SyntheticFlow::new(10),
            RecordingBackend::new(),
            visualization,
        );
        assert_eq!(driver.source().dim(), 6);
        assert_eq!(driver.state(), RunState::Running);
    }

    #[test]
    fn test_poll_waits_for_interval() {
        let mut driver = driver(6);
        driver.clock().advance(Duration::from_millis(10));
        assert_eq!(driver.poll().unwrap(), PollOutcome::default());

        driver.clock().advance(Duration::from_millis(7));
        assert_eq!(
            driver.poll().unwrap(),
            PollOutcome {
                ticks_run: 1,
                dropped: 0
            }
        );
        assert_eq!(driver.source().steps(), 1);
        assert_eq!(driver.backend().draw_calls().count(), 1);
    }

    #[test]
    fn test_late_ticks_are_dropped() {
        let mut driver = driver(6);
        driver.clock().advance(Duration::from_millis(100));
        let outcome = driver.poll().unwrap();
        assert_eq!(outcome.ticks_run, 1);
        assert_eq!(outcome.dropped, 4);
        assert_eq!(driver.dropped_ticks(), 4);
        assert_eq!(driver.source().steps(), 1);

        // Schedule moved past every due tick
        assert_eq!(driver.poll().unwrap(), PollOutcome::default());
    }

    #[test]
    fn test_paused_driver_still_redraws() {
        let mut driver = driver(6);
        driver.pause();
        let report = driver.tick().unwrap();
        assert!(report.is_some());
        assert_eq!(driver.source().steps(), 0);
        assert_eq!(driver.backend().draw_calls().count(), 1);
        assert!(driver.last_report().is_some());
        assert_eq!(driver.timer().frames(), 1);
    }

    #[test]
    fn test_halted_driver_does_nothing() {
        let mut driver = driver(6);
        driver.halt();
        driver.clock().advance(Duration::from_millis(50));
        assert_eq!(driver.tick().unwrap(), None);
        assert_eq!(driver.poll().unwrap(), PollOutcome::default());
        assert!(driver.backend().commands().is_empty());

        driver.resume();
        assert_eq!(driver.state(), RunState::Running);
    }

    #[test]
    fn test_set_dim_restores_state_and_schedule() {
        let mut driver = driver(8);
        driver.pause();
        driver.clock().advance(Duration::from_millis(40));

        driver.set_dim(4).unwrap();
        assert_eq!(driver.state(), RunState::Paused);
        assert_eq!(driver.source().dim(), 4);
        assert_eq!(driver.visualization().dims().dim(), 4);

        // Schedule restarted at resize time
        driver.clock().advance(Duration::from_millis(16));
        assert_eq!(driver.poll().unwrap().ticks_run, 0);
        driver.clock().advance(Duration::from_millis(1));
        assert_eq!(driver.poll().unwrap().ticks_run, 1);
    }

    #[test]
    fn test_invalid_resize_keeps_everything() {
        let mut driver = driver(8);
        assert!(driver.set_dim(0).is_err());
        assert_eq!(driver.state(), RunState::Running);
        assert_eq!(driver.source().dim(), 8);

        assert!(driver.resize_viewport(0, 600).is_err());
        assert_eq!(driver.visualization().config().viewport.width, 800);
        driver.resize_viewport(640, 480).unwrap();
        assert_eq!(driver.state(), RunState::Running);
    }
}
