//! Simulated runtime
//!
//! [`SimRuntime`] implements [`XrRuntime`] without an XR service. Session
//! states come either from a script ([`SimRuntime::push_state`]) or, in
//! auto mode, from the calls the controller makes, the way a real runtime
//! reacts to begin/end/request-exit. Marker and plane detections are
//! replayed frame by frame from queued batches.
//!
//! Every call is counted in [`SimStats`], and calls a real runtime would
//! reject (rendering while not running, a second begin, ...) are recorded
//! as violations so tests can assert the controller never makes them.

use std::collections::{HashMap, VecDeque};

use glam::{Quat, Vec2, Vec3};

use crate::error::{Result, XrError};
use crate::graphics::{FORMAT_RGBA8, FORMAT_SRGB8_ALPHA8, HEADLESS_EXTENSION};
use crate::runtime::{
    FrameEndInfo, InstanceCreateInfo, ReferenceSpace, RuntimeEvent, SwapchainCreateInfo,
    XrRuntime, MARKER_EXTENSION, PLANE_EXTENSION,
};
use crate::types::{
    ActionSetHandle, ActionSnapshot, BlendMode, Extent2D, FormFactor, Fov, FrameState,
    InstanceHandle, MarkerDetection, MarkerImage, MarkerTrackerHandle, PlaneDetection,
    PlaneTrackerHandle, Pose, SessionHandle, SessionState, SpaceHandle, SwapchainHandle,
    SystemId, View, ViewConfigView, ViewConfiguration,
};

const EYE_SEPARATION: f32 = 0.064;
const EYE_HEIGHT: f32 = 1.6;

/// Static capabilities of the simulated device
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub extensions: Vec<String>,
    pub form_factors: Vec<FormFactor>,
    pub view_configurations: Vec<ViewConfiguration>,
    pub blend_modes: Vec<BlendMode>,
    pub swapchain_formats: Vec<i64>,
    pub view_extent: Extent2D,
    pub images_per_swapchain: u32,
    /// Derive session states from controller calls instead of a script
    pub auto_advance: bool,
    /// In auto mode, request exit after this many submitted frames
    pub exit_after_frames: Option<u64>,
    pub frame_period_ns: i64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            extensions: vec![
                HEADLESS_EXTENSION.to_string(),
                MARKER_EXTENSION.to_string(),
                PLANE_EXTENSION.to_string(),
            ],
            form_factors: vec![FormFactor::Hmd, FormFactor::Handheld],
            view_configurations: vec![ViewConfiguration::Stereo, ViewConfiguration::Mono],
            blend_modes: vec![BlendMode::Opaque, BlendMode::AlphaBlend],
            swapchain_formats: vec![FORMAT_SRGB8_ALPHA8, FORMAT_RGBA8],
            view_extent: Extent2D::new(320, 240),
            images_per_swapchain: 3,
            auto_advance: false,
            exit_after_frames: None,
            frame_period_ns: 11_111_111,
        }
    }
}

impl SimConfig {
    /// Auto-advancing device, as used by the demo binary
    pub fn auto() -> Self {
        Self {
            auto_advance: true,
            ..Self::default()
        }
    }

    pub fn without_extension(mut self, name: &str) -> Self {
        self.extensions.retain(|e| e != name);
        self
    }
}

/// Call counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimStats {
    pub instances_created: u32,
    pub instances_destroyed: u32,
    pub sessions_created: u32,
    pub sessions_destroyed: u32,
    pub begin_session: u32,
    pub end_session: u32,
    pub request_exit: u32,
    pub swapchains_created: u32,
    pub swapchains_destroyed: u32,
    pub sync_actions: u32,
    pub wait_frame: u32,
    pub begin_frame: u32,
    pub end_frame: u32,
    pub acquire_image: u32,
    pub locate_markers: u32,
    pub locate_planes: u32,
}

#[derive(Debug, Clone, Copy)]
enum Scripted {
    State(SessionState),
    Event(RuntimeEvent),
}

#[derive(Debug, Clone)]
struct SimSwapchain {
    info: SwapchainCreateInfo,
    next_image: u32,
    acquired: Option<u32>,
}

#[derive(Debug, Clone, Copy)]
struct SimSession {
    handle: SessionHandle,
    state: SessionState,
    begun: bool,
    ended: bool,
}

/// Deterministic stand-in for an XR runtime
#[derive(Debug, Default)]
pub struct SimRuntime {
    config: SimConfig,
    next_handle: u64,

    instance: Option<InstanceHandle>,
    instance_lost: bool,
    enabled_extensions: Vec<String>,
    system: Option<SystemId>,
    session: Option<SimSession>,
    swapchains: HashMap<SwapchainHandle, SimSwapchain>,

    script: VecDeque<Scripted>,
    failures: HashMap<&'static str, XrError>,
    quit_pending: bool,
    hands: [Option<Pose>; 2],
    views_valid: bool,
    display_time: i64,
    exit_requested: bool,

    marker_tracker: Option<MarkerTrackerHandle>,
    marker_labels: Vec<String>,
    marker_frames: VecDeque<Vec<MarkerDetection>>,
    current_markers: Vec<MarkerDetection>,

    plane_tracker: Option<PlaneTrackerHandle>,
    plane_frames: VecDeque<Vec<PlaneDetection>>,
    current_planes: Vec<PlaneDetection>,

    last_frame: Option<FrameEndInfo>,
    stats: SimStats,
    violations: Vec<String>,
}

impl SimRuntime {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            next_handle: 1,
            views_valid: true,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Calls a conforming runtime would have rejected
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    /// State the simulated session is in, if one exists
    pub fn session_state(&self) -> Option<SessionState> {
        self.session.map(|s| s.state)
    }

    pub fn live_swapchains(&self) -> usize {
        self.swapchains.len()
    }

    pub fn swapchain_info(&self, swapchain: SwapchainHandle) -> Option<SwapchainCreateInfo> {
        self.swapchains.get(&swapchain).map(|s| s.info)
    }

    /// Labels of the registered marker images, in database order
    pub fn marker_labels(&self) -> &[String] {
        &self.marker_labels
    }

    pub fn last_frame(&self) -> Option<&FrameEndInfo> {
        self.last_frame.as_ref()
    }

    /// Queue a session state change for the current session
    pub fn push_state(&mut self, state: SessionState) {
        self.script.push_back(Scripted::State(state));
    }

    pub fn push_states(&mut self, states: &[SessionState]) {
        for state in states {
            self.push_state(*state);
        }
    }

    pub fn push_event(&mut self, event: RuntimeEvent) {
        self.script.push_back(Scripted::Event(event));
    }

    /// Make the next call named `call` fail with `error`
    pub fn fail_next(&mut self, call: &'static str, error: XrError) {
        self.failures.insert(call, error);
    }

    /// Report the quit action on the next sync
    pub fn press_quit(&mut self) {
        self.quit_pending = true;
    }

    pub fn set_hand_pose(&mut self, hand: usize, pose: Option<Pose>) {
        if let Some(slot) = self.hands.get_mut(hand) {
            *slot = pose;
        }
    }

    /// Make view location report invalid tracking
    pub fn set_views_valid(&mut self, valid: bool) {
        self.views_valid = valid;
    }

    /// Detections reported from the next frame on, until the next batch
    pub fn queue_marker_frame(&mut self, detections: Vec<MarkerDetection>) {
        self.marker_frames.push_back(detections);
    }

    pub fn queue_plane_frame(&mut self, detections: Vec<PlaneDetection>) {
        self.plane_frames.push_back(detections);
    }

    /// Announce instance loss; every later call fails until a new instance
    pub fn lose_instance(&mut self) {
        self.instance_lost = true;
        self.push_event(RuntimeEvent::InstanceLossPending);
    }

    fn handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn check(&mut self, call: &'static str) -> Result<()> {
        if self.instance_lost {
            return Err(XrError::InstanceLost);
        }
        match self.failures.remove(call) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn violation(&mut self, message: String) {
        tracing::debug!("Simulated runtime violation: {}", message);
        self.violations.push(message);
    }

    fn running(&self) -> bool {
        self.session
            .map(|s| s.begun && !s.ended && s.state.is_active())
            .unwrap_or(false)
    }

    fn require_running(&mut self, call: &'static str) {
        if !self.running() {
            let state = self.session_state();
            self.violation(format!("{} while session not running ({:?})", call, state));
        }
    }

    fn require_session(&self, session: SessionHandle, call: &'static str) -> Result<()> {
        match self.session {
            Some(s) if s.handle == session => Ok(()),
            _ => Err(XrError::runtime(call, format!("unknown session {}", session))),
        }
    }

    fn auto_states(&mut self, states: &[SessionState]) {
        if self.config.auto_advance {
            self.push_states(states);
        }
    }

    fn request_exit(&mut self) {
        if !self.exit_requested {
            self.exit_requested = true;
            self.auto_states(&[SessionState::Stopping]);
        }
    }

    fn eye_pose(&self, eye: usize, count: usize) -> Pose {
        let offset = if count > 1 {
            (eye as f32 - 0.5) * EYE_SEPARATION
        } else {
            0.0
        };
        Pose::new(Quat::IDENTITY, Vec3::new(offset, EYE_HEIGHT, 0.0))
    }
}

impl XrRuntime for SimRuntime {
    fn enumerate_extensions(&self) -> Result<Vec<String>> {
        Ok(self.config.extensions.clone())
    }

    fn create_instance(&mut self, info: &InstanceCreateInfo) -> Result<InstanceHandle> {
        self.instance_lost = false;
        self.check("create_instance")?;
        if let Some(unknown) = info
            .extensions
            .iter()
            .find(|e| !self.config.extensions.contains(*e))
        {
            return Err(XrError::MissingExtension(unknown.clone()));
        }
        let instance = InstanceHandle(self.handle());
        self.instance = Some(instance);
        self.enabled_extensions = info.extensions.clone();
        self.stats.instances_created += 1;
        Ok(instance)
    }

    fn destroy_instance(&mut self, instance: InstanceHandle) {
        if self.instance == Some(instance) {
            self.instance = None;
            self.system = None;
            self.stats.instances_destroyed += 1;
        }
    }

    fn system(&mut self, instance: InstanceHandle, form_factor: FormFactor) -> Result<SystemId> {
        self.check("system")?;
        if self.instance != Some(instance) {
            return Err(XrError::NoInstance);
        }
        if !self.config.form_factors.contains(&form_factor) {
            return Err(XrError::FormFactorUnavailable(form_factor));
        }
        let system = SystemId(self.handle());
        self.system = Some(system);
        Ok(system)
    }

    fn enumerate_view_configurations(&self, _system: SystemId) -> Result<Vec<ViewConfiguration>> {
        Ok(self.config.view_configurations.clone())
    }

    fn enumerate_blend_modes(
        &self,
        _system: SystemId,
        _view_configuration: ViewConfiguration,
    ) -> Result<Vec<BlendMode>> {
        Ok(self.config.blend_modes.clone())
    }

    fn enumerate_view_configuration_views(
        &self,
        _system: SystemId,
        view_configuration: ViewConfiguration,
    ) -> Result<Vec<ViewConfigView>> {
        if !self.config.view_configurations.contains(&view_configuration) {
            return Err(XrError::ViewConfigurationUnsupported(view_configuration));
        }
        let extent = self.config.view_extent;
        let view = ViewConfigView {
            recommended_width: extent.width,
            recommended_height: extent.height,
            max_width: extent.width * 2,
            max_height: extent.height * 2,
            recommended_sample_count: 1,
            max_sample_count: 4,
        };
        Ok(vec![view; view_configuration.view_count()])
    }

    fn create_session(&mut self, system: SystemId) -> Result<SessionHandle> {
        self.check("create_session")?;
        if self.system != Some(system) {
            return Err(XrError::runtime("create_session", "unknown system"));
        }
        if self.session.is_some() {
            self.violation("create_session while a session exists".to_string());
        }
        let handle = SessionHandle(self.handle());
        self.session = Some(SimSession {
            handle,
            state: SessionState::Unknown,
            begun: false,
            ended: false,
        });
        self.exit_requested = false;
        self.stats.sessions_created += 1;
        self.auto_states(&[SessionState::Idle, SessionState::Ready]);
        Ok(handle)
    }

    fn destroy_session(&mut self, session: SessionHandle) {
        if self.session.map(|s| s.handle) == Some(session) {
            self.session = None;
            self.stats.sessions_destroyed += 1;
            // Pending states belonged to the destroyed session
            self.script.retain(|s| matches!(s, Scripted::Event(_)));
        }
    }

    fn create_reference_space(
        &mut self,
        session: SessionHandle,
        _space: ReferenceSpace,
    ) -> Result<SpaceHandle> {
        self.check("create_reference_space")?;
        self.require_session(session, "create_reference_space")?;
        Ok(SpaceHandle(self.handle()))
    }

    fn create_action_set(
        &mut self,
        session: SessionHandle,
        _name: &str,
    ) -> Result<ActionSetHandle> {
        self.check("create_action_set")?;
        self.require_session(session, "create_action_set")?;
        Ok(ActionSetHandle(self.handle()))
    }

    fn enumerate_swapchain_formats(&self, _session: SessionHandle) -> Result<Vec<i64>> {
        Ok(self.config.swapchain_formats.clone())
    }

    fn create_swapchain(
        &mut self,
        session: SessionHandle,
        info: &SwapchainCreateInfo,
    ) -> Result<SwapchainHandle> {
        self.check("create_swapchain")?;
        self.require_session(session, "create_swapchain")?;
        if !self.config.swapchain_formats.contains(&info.format) {
            return Err(XrError::runtime("create_swapchain", "unsupported format"));
        }
        let handle = SwapchainHandle(self.handle());
        self.swapchains.insert(
            handle,
            SimSwapchain {
                info: *info,
                next_image: 0,
                acquired: None,
            },
        );
        self.stats.swapchains_created += 1;
        Ok(handle)
    }

    fn enumerate_swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<u64>> {
        if !self.swapchains.contains_key(&swapchain) {
            return Err(XrError::runtime("enumerate_swapchain_images", "unknown swapchain"));
        }
        Ok((0..u64::from(self.config.images_per_swapchain))
            .map(|i| (swapchain.0 << 8) | i)
            .collect())
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) {
        if self.swapchains.remove(&swapchain).is_some() {
            self.stats.swapchains_destroyed += 1;
        }
    }

    fn poll_event(&mut self) -> Result<Option<RuntimeEvent>> {
        // Queued events still arrive after an instance loss
        if let Some(error) = self.failures.remove("poll_event") {
            return Err(error);
        }
        while let Some(scripted) = self.script.pop_front() {
            match scripted {
                Scripted::Event(event) => return Ok(Some(event)),
                Scripted::State(state) => {
                    let Some(session) = self.session.as_mut() else {
                        continue;
                    };
                    session.state = state;
                    return Ok(Some(RuntimeEvent::SessionStateChanged {
                        session: session.handle,
                        state,
                    }));
                }
            }
        }
        Ok(None)
    }

    fn begin_session(
        &mut self,
        session: SessionHandle,
        view_configuration: ViewConfiguration,
    ) -> Result<()> {
        self.stats.begin_session += 1;
        self.check("begin_session")?;
        self.require_session(session, "begin_session")?;
        let Some(current) = self.session else {
            return Err(XrError::runtime("begin_session", "no session"));
        };
        if current.begun {
            self.violation("begin_session called twice".to_string());
            return Err(XrError::runtime("begin_session", "session already running"));
        }
        if current.state != SessionState::Ready {
            self.violation(format!("begin_session in {:?}", current.state));
            return Err(XrError::runtime("begin_session", "session not ready"));
        }
        if !self.config.view_configurations.contains(&view_configuration) {
            return Err(XrError::ViewConfigurationUnsupported(view_configuration));
        }
        if let Some(s) = self.session.as_mut() {
            s.begun = true;
        }
        self.auto_states(&[
            SessionState::Synchronized,
            SessionState::Visible,
            SessionState::Focused,
        ]);
        Ok(())
    }

    fn end_session(&mut self, session: SessionHandle) -> Result<()> {
        self.stats.end_session += 1;
        self.check("end_session")?;
        self.require_session(session, "end_session")?;
        let Some(current) = self.session else {
            return Err(XrError::runtime("end_session", "no session"));
        };
        if current.state != SessionState::Stopping || !current.begun || current.ended {
            self.violation(format!("end_session in {:?}", current.state));
            return Err(XrError::runtime("end_session", "session not stopping"));
        }
        if let Some(s) = self.session.as_mut() {
            s.ended = true;
        }
        self.auto_states(&[SessionState::Idle, SessionState::Exiting]);
        Ok(())
    }

    fn request_exit_session(&mut self, session: SessionHandle) -> Result<()> {
        self.stats.request_exit += 1;
        self.check("request_exit_session")?;
        self.require_session(session, "request_exit_session")?;
        self.request_exit();
        Ok(())
    }

    fn sync_actions(
        &mut self,
        session: SessionHandle,
        _action_set: ActionSetHandle,
        _space: SpaceHandle,
    ) -> Result<ActionSnapshot> {
        self.stats.sync_actions += 1;
        self.require_running("sync_actions");
        self.check("sync_actions")?;
        self.require_session(session, "sync_actions")?;
        Ok(ActionSnapshot {
            quit: std::mem::take(&mut self.quit_pending),
            hands: self.hands,
        })
    }

    fn wait_frame(&mut self, session: SessionHandle) -> Result<FrameState> {
        self.stats.wait_frame += 1;
        self.require_running("wait_frame");
        self.check("wait_frame")?;
        self.require_session(session, "wait_frame")?;
        self.display_time += self.config.frame_period_ns;
        let should_render = matches!(
            self.session_state(),
            Some(SessionState::Visible | SessionState::Focused)
        );
        Ok(FrameState {
            predicted_display_time: self.display_time,
            predicted_display_period: self.config.frame_period_ns,
            should_render,
        })
    }

    fn begin_frame(&mut self, session: SessionHandle) -> Result<()> {
        self.stats.begin_frame += 1;
        self.require_running("begin_frame");
        self.check("begin_frame")?;
        self.require_session(session, "begin_frame")
    }

    fn locate_views(
        &mut self,
        session: SessionHandle,
        view_configuration: ViewConfiguration,
        _display_time: i64,
        _space: SpaceHandle,
    ) -> Result<Option<Vec<View>>> {
        self.check("locate_views")?;
        self.require_session(session, "locate_views")?;
        if !self.views_valid {
            return Ok(None);
        }
        let count = view_configuration.view_count();
        let fov = Fov::symmetric(90f32.to_radians(), 90f32.to_radians());
        Ok(Some(
            (0..count)
                .map(|eye| View {
                    pose: self.eye_pose(eye, count),
                    fov,
                })
                .collect(),
        ))
    }

    fn acquire_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<u32> {
        self.stats.acquire_image += 1;
        self.require_running("acquire_swapchain_image");
        self.check("acquire_swapchain_image")?;
        let images = self.config.images_per_swapchain.max(1);
        let Some(chain) = self.swapchains.get_mut(&swapchain) else {
            return Err(XrError::runtime("acquire_swapchain_image", "unknown swapchain"));
        };
        if chain.acquired.is_some() {
            return Err(XrError::runtime("acquire_swapchain_image", "image already acquired"));
        }
        let index = chain.next_image;
        chain.next_image = (index + 1) % images;
        chain.acquired = Some(index);
        Ok(index)
    }

    fn wait_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<()> {
        self.check("wait_swapchain_image")?;
        match self.swapchains.get(&swapchain) {
            Some(chain) if chain.acquired.is_some() => Ok(()),
            _ => Err(XrError::runtime("wait_swapchain_image", "no image acquired")),
        }
    }

    fn release_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<()> {
        self.check("release_swapchain_image")?;
        match self.swapchains.get_mut(&swapchain) {
            Some(chain) if chain.acquired.is_some() => {
                chain.acquired = None;
                Ok(())
            }
            _ => Err(XrError::runtime("release_swapchain_image", "no image acquired")),
        }
    }

    fn end_frame(&mut self, session: SessionHandle, info: &FrameEndInfo) -> Result<()> {
        self.stats.end_frame += 1;
        self.require_running("end_frame");
        self.check("end_frame")?;
        self.require_session(session, "end_frame")?;
        if !self.config.blend_modes.contains(&info.blend_mode) {
            return Err(XrError::runtime("end_frame", "unsupported blend mode"));
        }
        self.last_frame = Some(info.clone());

        if let Some(limit) = self.config.exit_after_frames {
            if self.config.auto_advance && u64::from(self.stats.end_frame) >= limit {
                self.request_exit();
            }
        }
        Ok(())
    }

    fn create_marker_tracker(&mut self, session: SessionHandle) -> Result<MarkerTrackerHandle> {
        if !self.enabled_extensions.iter().any(|e| e == MARKER_EXTENSION) {
            return Err(XrError::ExtensionUnsupported(MARKER_EXTENSION));
        }
        self.check("create_marker_tracker")?;
        self.require_session(session, "create_marker_tracker")?;
        let tracker = MarkerTrackerHandle(self.handle());
        self.marker_tracker = Some(tracker);
        self.marker_labels.clear();
        Ok(tracker)
    }

    fn add_marker_image(&mut self, tracker: MarkerTrackerHandle, image: &MarkerImage) -> Result<usize> {
        self.check("add_marker_image")?;
        if self.marker_tracker != Some(tracker) {
            return Err(XrError::runtime("add_marker_image", "unknown tracker"));
        }
        let expected = image.width as usize * image.height as usize;
        if expected == 0 || image.pixels.len() != expected {
            return Err(XrError::MarkerImageRejected {
                label: image.label.clone(),
                reason: format!("expected {} pixels, got {}", expected, image.pixels.len()),
            });
        }
        if image.physical_size.cmple(Vec2::ZERO).any() {
            return Err(XrError::MarkerImageRejected {
                label: image.label.clone(),
                reason: "physical size must be positive".to_string(),
            });
        }
        self.marker_labels.push(image.label.clone());
        Ok(self.marker_labels.len() - 1)
    }

    fn locate_markers(
        &mut self,
        tracker: MarkerTrackerHandle,
        _display_time: i64,
        _space: SpaceHandle,
    ) -> Result<Vec<MarkerDetection>> {
        self.stats.locate_markers += 1;
        self.require_running("locate_markers");
        self.check("locate_markers")?;
        if self.marker_tracker != Some(tracker) {
            return Err(XrError::runtime("locate_markers", "unknown tracker"));
        }
        if let Some(frame) = self.marker_frames.pop_front() {
            self.current_markers = frame;
        }
        Ok(self.current_markers.clone())
    }

    fn destroy_marker_tracker(&mut self, tracker: MarkerTrackerHandle) {
        if self.marker_tracker == Some(tracker) {
            self.marker_tracker = None;
            self.marker_labels.clear();
            self.current_markers.clear();
        }
    }

    fn create_plane_tracker(&mut self, session: SessionHandle) -> Result<PlaneTrackerHandle> {
        if !self.enabled_extensions.iter().any(|e| e == PLANE_EXTENSION) {
            return Err(XrError::ExtensionUnsupported(PLANE_EXTENSION));
        }
        self.check("create_plane_tracker")?;
        self.require_session(session, "create_plane_tracker")?;
        let tracker = PlaneTrackerHandle(self.handle());
        self.plane_tracker = Some(tracker);
        Ok(tracker)
    }

    fn locate_planes(
        &mut self,
        tracker: PlaneTrackerHandle,
        _display_time: i64,
        _space: SpaceHandle,
    ) -> Result<Vec<PlaneDetection>> {
        self.stats.locate_planes += 1;
        self.require_running("locate_planes");
        self.check("locate_planes")?;
        if self.plane_tracker != Some(tracker) {
            return Err(XrError::runtime("locate_planes", "unknown tracker"));
        }
        if let Some(frame) = self.plane_frames.pop_front() {
            self.current_planes = frame;
        }
        Ok(self.current_planes.clone())
    }

    fn destroy_plane_tracker(&mut self, tracker: PlaneTrackerHandle) {
        if self.plane_tracker == Some(tracker) {
            self.plane_tracker = None;
            self.current_planes.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApplicationInfo;

    fn instance_info(extensions: &[&str]) -> InstanceCreateInfo {
        InstanceCreateInfo {
            application: ApplicationInfo {
                name: "sim-test".to_string(),
                version: 1,
                engine_name: "none".to_string(),
            },
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_auto_mode_walks_to_focused() {
        let mut sim = SimRuntime::new(SimConfig::auto());
        let instance = sim.create_instance(&instance_info(&[])).unwrap();
        let system = sim.system(instance, FormFactor::Hmd).unwrap();
        let session = sim.create_session(system).unwrap();

        let mut states = Vec::new();
        while let Some(RuntimeEvent::SessionStateChanged { state, .. }) = sim.poll_event().unwrap() {
            states.push(state);
            if state == SessionState::Ready {
                sim.begin_session(session, ViewConfiguration::Stereo).unwrap();
            }
        }
        assert_eq!(
            states,
            vec![
                SessionState::Idle,
                SessionState::Ready,
                SessionState::Synchronized,
                SessionState::Visible,
                SessionState::Focused
            ]
        );
        assert!(sim.violations().is_empty());
    }

    #[test]
    fn test_frame_calls_outside_running_session_are_violations() {
        let mut sim = SimRuntime::new(SimConfig::default());
        let instance = sim.create_instance(&instance_info(&[])).unwrap();
        let system = sim.system(instance, FormFactor::Hmd).unwrap();
        let session = sim.create_session(system).unwrap();
        sim.wait_frame(session).unwrap();
        assert_eq!(sim.violations().len(), 1);
    }

    #[test]
    fn test_unknown_extension_is_refused() {
        let mut sim = SimRuntime::new(SimConfig::default().without_extension(MARKER_EXTENSION));
        assert_eq!(
            sim.create_instance(&instance_info(&[MARKER_EXTENSION])),
            Err(XrError::MissingExtension(MARKER_EXTENSION.to_string()))
        );
    }

    #[test]
    fn test_malformed_marker_image_rejected() {
        let mut sim = SimRuntime::new(SimConfig::default());
        let instance = sim.create_instance(&instance_info(&[MARKER_EXTENSION])).unwrap();
        let system = sim.system(instance, FormFactor::Hmd).unwrap();
        let session = sim.create_session(system).unwrap();
        let tracker = sim.create_marker_tracker(session).unwrap();

        let mut image = MarkerImage::checkerboard("bad", 2, 0.1);
        image.pixels.truncate(3);
        assert!(matches!(
            sim.add_marker_image(tracker, &image),
            Err(XrError::MarkerImageRejected { .. })
        ));
        let good = MarkerImage::checkerboard("good", 2, 0.1);
        assert_eq!(sim.add_marker_image(tracker, &good), Ok(0));
    }
}
