//! Frame loop driven by a scripted host against the simulated runtime

use std::collections::VecDeque;
use std::time::Duration;

use app::startup;
use app::{AppError, FrameLoop, LoopConfig, LoopExit};
use renderer::HeadlessGraphics;
use system::{AppState, EventSource, HostControl, HostEvent, HostPlatform};
use xr::platform::{NativeWindow, PlatformBackend};
use xr::sim::{SimConfig, SimRuntime};
use xr::{
    ApplicationInfo, MarkerImage, Options, Program, SessionState, XrError, XrProgram,
    MARKER_EXTENSION,
};

type SimProgram = XrProgram<SimRuntime, HeadlessGraphics, HostPlatform>;
type TestLoop = FrameLoop<SimProgram, ScriptedHost, RecordingHost>;

/// Host event source that replays a fixed list and records each wait
#[derive(Default)]
struct ScriptedHost {
    events: VecDeque<HostEvent>,
    waits: Vec<Option<Duration>>,
}

impl ScriptedHost {
    fn new(events: &[HostEvent]) -> Self {
        Self {
            events: events.iter().copied().collect(),
            waits: Vec::new(),
        }
    }
}

impl EventSource for ScriptedHost {
    fn next_event(&mut self, timeout: Option<Duration>) -> Option<HostEvent> {
        self.waits.push(timeout);
        self.events.pop_front()
    }
}

#[derive(Default)]
struct RecordingHost {
    calls: Vec<&'static str>,
}

impl HostControl for RecordingHost {
    fn finish(&mut self) {
        self.calls.push("finish");
    }

    fn terminate(&mut self) {
        self.calls.push("terminate");
    }
}

fn platform() -> HostPlatform {
    HostPlatform::new(ApplicationInfo {
        name: "frame-loop-tests".to_string(),
        version: 1,
        engine_name: "tests".to_string(),
    })
}

fn program(config: SimConfig) -> SimProgram {
    XrProgram::new(
        Options::default(),
        SimRuntime::new(config),
        HeadlessGraphics::new(),
        platform(),
    )
    .with_marker_images(vec![
        MarkerImage::checkerboard("alpha", 4, 0.2),
        MarkerImage::checkerboard("beta", 4, 0.3),
    ])
}

fn fast() -> LoopConfig {
    LoopConfig::default().with_throttle(Duration::ZERO)
}

fn started_loop(config: SimConfig, events: &[HostEvent]) -> TestLoop {
    let mut program = program(config);
    startup::initialize(&mut program).expect("startup");
    FrameLoop::new(program, ScriptedHost::new(events), RecordingHost::default()).with_config(fast())
}

fn resumed_and_focused() -> TestLoop {
    let mut frame_loop = started_loop(SimConfig::auto(), &[HostEvent::Resume]);
    assert_eq!(frame_loop.iterate().unwrap(), None);
    assert!(frame_loop.program().is_session_focused());
    frame_loop
}

#[test]
fn test_begin_once_and_focus_after_final_transition() {
    let mut frame_loop = started_loop(
        SimConfig::default(),
        &[HostEvent::WindowInit(NativeWindow(5)), HostEvent::Resume],
    );

    for (state, focused) in [
        (SessionState::Idle, false),
        (SessionState::Ready, false),
        (SessionState::Synchronized, false),
        (SessionState::Focused, true),
    ] {
        frame_loop.program_mut().runtime_mut().push_state(state);
        assert_eq!(frame_loop.iterate().unwrap(), None);
        assert_eq!(
            frame_loop.program().is_session_focused(),
            focused,
            "after {state:?}"
        );
    }

    let runtime = frame_loop.program().runtime();
    assert_eq!(runtime.stats().begin_session, 1);
    assert!(runtime.stats().end_frame >= 3);
    assert!(runtime.violations().is_empty(), "{:?}", runtime.violations());
    assert_eq!(frame_loop.app_state().window(), Some(NativeWindow(5)));
    assert!(frame_loop.host().calls.is_empty());
}

#[test]
fn test_idle_host_waits_without_bound() {
    let mut frame_loop = FrameLoop::new(
        program(SimConfig::default()),
        ScriptedHost::new(&[HostEvent::Resume, HostEvent::Pause]),
        RecordingHost::default(),
    )
    .with_config(fast());

    assert_eq!(frame_loop.event_timeout(), None);
    assert_eq!(
        frame_loop.iterate().unwrap(),
        Some(LoopExit::DestroyRequested)
    );
    assert_eq!(
        frame_loop.events().waits,
        vec![None, Some(Duration::ZERO), None]
    );
    assert_eq!(frame_loop.iterations(), 0);
}

#[test]
fn test_running_session_polls_without_waiting() {
    let mut frame_loop = resumed_and_focused();
    let waits_before = frame_loop.events().waits.len();
    assert_eq!(frame_loop.iterate().unwrap(), None);
    assert!(frame_loop.events().waits[waits_before..]
        .iter()
        .all(|w| *w == Some(Duration::ZERO)));
}

#[test]
fn test_no_frame_calls_while_not_running() {
    let mut frame_loop = started_loop(SimConfig::default(), &[HostEvent::Resume]);
    frame_loop
        .program_mut()
        .runtime_mut()
        .push_state(SessionState::Idle);
    for _ in 0..3 {
        assert_eq!(frame_loop.iterate().unwrap(), None);
    }

    let stats = frame_loop.program().runtime().stats();
    assert_eq!(stats.wait_frame, 0);
    assert_eq!(stats.sync_actions, 0);
    assert_eq!(stats.acquire_image, 0);
}

#[test]
fn test_loss_pending_recreates_session() {
    let mut frame_loop = resumed_and_focused();
    frame_loop
        .program_mut()
        .runtime_mut()
        .push_state(SessionState::LossPending);

    assert_eq!(frame_loop.iterate().unwrap(), None);
    {
        let stats = frame_loop.program().runtime().stats();
        assert_eq!(stats.sessions_destroyed, 1);
        assert_eq!(stats.swapchains_destroyed, 2);
        assert_eq!(stats.sessions_created, 2);
        assert_eq!(frame_loop.program().runtime().live_swapchains(), 2);
    }
    assert!(frame_loop.host().calls.is_empty());

    // The new session comes back up through Ready
    assert_eq!(frame_loop.iterate().unwrap(), None);
    assert!(frame_loop.program().is_session_focused());
    let runtime = frame_loop.program().runtime();
    assert_eq!(runtime.stats().begin_session, 2);
    assert_eq!(runtime.marker_labels().len(), 2);
    assert!(runtime.violations().is_empty(), "{:?}", runtime.violations());
}

#[test]
fn test_exit_finishes_then_terminates() {
    let mut frame_loop = resumed_and_focused();
    frame_loop
        .program_mut()
        .runtime_mut()
        .push_state(SessionState::Exiting);

    assert_eq!(frame_loop.iterate().unwrap(), Some(LoopExit::Finished));
    assert_eq!(frame_loop.host().calls, vec!["finish", "terminate"]);
    assert!(!frame_loop.program().has_session());
    assert_eq!(frame_loop.iterations(), 2);
}

#[test]
fn test_run_stops_after_exit() {
    let mut frame_loop = started_loop(
        SimConfig {
            exit_after_frames: Some(3),
            ..SimConfig::auto()
        },
        &[HostEvent::Resume],
    );

    assert_eq!(frame_loop.run().unwrap(), LoopExit::Finished);
    // Three rendered iterations, then the one that observed the exit
    assert_eq!(frame_loop.iterations(), 4);
    let runtime = frame_loop.program().runtime();
    assert_eq!(runtime.stats().end_frame, 3);
    assert_eq!(runtime.stats().end_session, 1);
    assert!(runtime.violations().is_empty(), "{:?}", runtime.violations());
    assert_eq!(frame_loop.host().calls, vec!["finish", "terminate"]);
}

#[test]
fn test_missing_marker_extension_reaches_steady_state() {
    let mut frame_loop = started_loop(
        SimConfig::auto().without_extension(MARKER_EXTENSION),
        &[HostEvent::Resume],
    );
    frame_loop = frame_loop.with_config(fast().with_max_iterations(5));

    assert_eq!(frame_loop.run().unwrap(), LoopExit::IterationLimit);
    assert!(frame_loop.program().is_session_focused());
    assert!(!frame_loop.program().marker_tracking().is_active());
    assert!(frame_loop.program().runtime().stats().end_frame >= 4);
}

#[test]
fn test_session_lost_mid_frame_restarts() {
    let mut frame_loop = resumed_and_focused();
    frame_loop
        .program_mut()
        .runtime_mut()
        .fail_next("wait_frame", XrError::SessionLost);

    // The failing frame is logged; the next poll reports the restart
    assert_eq!(frame_loop.iterate().unwrap(), None);
    assert!(!frame_loop.program().has_session());
    assert_eq!(frame_loop.iterate().unwrap(), None);
    assert!(frame_loop.program().has_session());
    assert_eq!(frame_loop.program().runtime().stats().sessions_created, 2);
}

#[test]
fn test_instance_loss_recreates_instance() {
    let mut frame_loop = resumed_and_focused();
    frame_loop.program_mut().runtime_mut().lose_instance();

    assert_eq!(frame_loop.iterate().unwrap(), None);
    assert!(frame_loop.program().has_instance());
    let stats = frame_loop.program().runtime().stats();
    assert_eq!(stats.instances_created, 2);
    assert_eq!(stats.instances_destroyed, 1);
}

#[test]
fn test_failed_restart_is_fatal() {
    let mut frame_loop = resumed_and_focused();
    let runtime = frame_loop.program_mut().runtime_mut();
    runtime.push_state(SessionState::LossPending);
    runtime.fail_next("create_session", XrError::runtime("xrCreateSession", "refused"));

    assert!(matches!(frame_loop.iterate(), Err(AppError::Restart(_))));
    assert!(frame_loop.host().calls.is_empty());
}

#[test]
fn test_window_reaches_platform_backend() {
    let program = program(SimConfig::default());
    let slot = program.platform().window_slot();
    let mut frame_loop = FrameLoop::new(
        program,
        ScriptedHost::new(&[HostEvent::WindowInit(NativeWindow(9)), HostEvent::Resume]),
        RecordingHost::default(),
    )
    .with_app_state(AppState::new().with_window_slot(slot))
    .with_config(fast());

    assert_eq!(frame_loop.iterate().unwrap(), None);
    assert_eq!(
        frame_loop.program().platform().native_window(),
        Some(NativeWindow(9))
    );
}

#[test]
fn test_destroy_request_ends_loop() {
    let mut frame_loop = started_loop(
        SimConfig::auto(),
        &[HostEvent::Resume, HostEvent::DestroyRequested],
    );
    assert_eq!(frame_loop.run().unwrap(), LoopExit::DestroyRequested);
    assert_eq!(frame_loop.iterations(), 0);
    assert!(frame_loop.host().calls.is_empty());
}

#[test]
fn test_begin_failure_recreates_session() {
    let mut frame_loop = started_loop(SimConfig::auto(), &[HostEvent::Resume]);
    frame_loop
        .program_mut()
        .runtime_mut()
        .fail_next("begin_session", XrError::runtime("xrBeginSession", "refused"));

    assert_eq!(frame_loop.iterate().unwrap(), None);
    assert_eq!(frame_loop.program().runtime().stats().sessions_created, 2);
    assert_eq!(frame_loop.iterate().unwrap(), None);
    assert!(frame_loop.program().is_session_focused());
    assert_eq!(frame_loop.program().runtime().stats().begin_session, 2);
    assert!(frame_loop.host().calls.is_empty());
}
