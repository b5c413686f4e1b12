//! Frame loop for XR applications
//!
//! Drains host signals, polls the controller for session events and, while
//! a session runs, advances actions, rendering and tracking once per
//! iteration. With no running session the loop throttles instead of
//! touching frame timing.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use system::{AppState, EventSource, HostControl, HostEvent};
use xr::{EventFlags, Program, XrError};

use crate::error::{AppError, Result};
use crate::startup;

/// Sleep between iterations while no session is running
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(250);

/// Frame loop configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub throttle: Duration,
    /// Stop after this many iterations
    pub max_iterations: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            throttle: DEFAULT_THROTTLE,
            max_iterations: None,
        }
    }
}

impl LoopConfig {
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
}

/// Why the frame loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The session exited without restart; the host was finished
    Finished,
    /// The host asked for the process to go away
    DestroyRequested,
    /// The configured iteration bound was reached
    IterationLimit,
}

enum Step {
    Continue,
    Finished,
}

/// Drives a [`Program`] from host signals
pub struct FrameLoop<P, E, H>
where
    P: Program,
    E: EventSource,
    H: HostControl,
{
    program: P,
    events: E,
    host: H,
    state: AppState,
    config: LoopConfig,
    iterations: u64,
}

impl<P, E, H> FrameLoop<P, E, H>
where
    P: Program,
    E: EventSource,
    H: HostControl,
{
    pub fn new(program: P, events: E, host: H) -> Self {
        Self {
            program,
            events,
            host,
            state: AppState::new(),
            config: LoopConfig::default(),
            iterations: 0,
        }
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an app state wired to the platform's window slot
    pub fn with_app_state(mut self, state: AppState) -> Self {
        self.state = state;
        self
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut P {
        &mut self.program
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn app_state(&self) -> &AppState {
        &self.state
    }

    /// Iterations started so far
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn into_parts(self) -> (P, E, H) {
        (self.program, self.events, self.host)
    }

    /// How long to wait for the next host event
    ///
    /// With nothing to render and nothing to shut down there is no reason to
    /// wake up, so the wait is unbounded.
    pub fn event_timeout(&self) -> Option<Duration> {
        if !self.state.is_resumed()
            && !self.program.is_session_running()
            && !self.state.destroy_requested()
        {
            None
        } else {
            Some(Duration::ZERO)
        }
    }

    fn drain_host_events(&mut self) {
        loop {
            let timeout = self.event_timeout();
            match self.events.next_event(timeout) {
                Some(event) => self.state.apply(event),
                None => {
                    if timeout.is_none() {
                        tracing::warn!("Host event source closed");
                        self.state.apply(HostEvent::DestroyRequested);
                    }
                    break;
                }
            }
        }
    }

    /// Run until the host goes away or the session exits for good
    pub fn run(&mut self) -> Result<LoopExit> {
        loop {
            if let Some(max) = self.config.max_iterations {
                if self.iterations >= max {
                    tracing::info!("Stopping after {} iterations", self.iterations);
                    return Ok(LoopExit::IterationLimit);
                }
            }
            if let Some(exit) = self.iterate()? {
                return Ok(exit);
            }
        }
    }

    /// One loop iteration; returns why the loop should stop, if it should
    pub fn iterate(&mut self) -> Result<Option<LoopExit>> {
        self.drain_host_events();
        if self.state.destroy_requested() {
            tracing::info!("Destroy requested; leaving frame loop");
            return Ok(Some(LoopExit::DestroyRequested));
        }

        self.iterations += 1;
        match self.step()? {
            Step::Continue => Ok(None),
            Step::Finished => Ok(Some(LoopExit::Finished)),
        }
    }

    fn step(&mut self) -> Result<Step> {
        let flags = match self.program.poll_events() {
            Ok(flags) => flags,
            Err(e) => {
                log_frame_error("poll_events", &e);
                EventFlags::CONTINUE
            }
        };

        if flags.exit_render_loop {
            if !flags.request_restart {
                tracing::info!("Session exited; finishing host");
                self.host.finish();
                self.host.terminate();
                return Ok(Step::Finished);
            }
            tracing::info!("Session lost; restarting");
            startup::restart(&mut self.program).map_err(AppError::Restart)?;
            return Ok(Step::Continue);
        }

        if !self.program.is_session_running() {
            thread::sleep(self.config.throttle);
            return Ok(Step::Continue);
        }

        if let Err(e) = self.program.poll_actions() {
            log_frame_error("poll_actions", &e);
        }
        if let Err(e) = self.program.render_frame() {
            log_frame_error("render_frame", &e);
        }
        if let Err(e) = self.program.process_marker_data() {
            log_frame_error("process_marker_data", &e);
        }
        if let Err(e) = self.program.process_plane_tracking() {
            log_frame_error("process_plane_tracking", &e);
        }
        Ok(Step::Continue)
    }
}

fn log_frame_error(step: &str, error: &XrError) {
    if error.is_session_loss() {
        tracing::warn!("{}: {}", step, error);
    } else {
        tracing::error!("{} failed: {}", step, error);
    }
}

/// Run `f`, turning a panic into [`AppError::Panicked`]
pub fn run_guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("Frame loop panicked: {}", message);
            Err(AppError::Panicked(message))
        }
    }
}
