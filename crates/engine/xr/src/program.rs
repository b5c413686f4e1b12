//! Session controller
//!
//! [`Program`] is the contract the frame loop drives. Startup calls the
//! lifecycle phases once, in declaration order; afterwards the loop calls
//! [`Program::poll_events`] every iteration and the per-frame operations
//! while the session runs.
//!
//! [`XrProgram`] is the implementation over an [`XrRuntime`], a
//! [`GraphicsBackend`] and a [`PlatformBackend`]. It owns the whole object
//! graph: instance, system, session, swapchains, trackers and the anchored
//! scene. Nothing is shared with the backends beyond the duration of a call.

use crate::error::{Result, Severity, XrError};
use crate::graphics::{GraphicsBackend, ViewSubmission};
use crate::marker::{MarkerObservation, MarkerTracking};
use crate::options::Options;
use crate::plane::{PlaneObservation, PlaneTracking};
use crate::platform::PlatformBackend;
use crate::runtime::{
    FrameEndInfo, InstanceCreateInfo, ProjectionView, ReferenceSpace, RuntimeEvent, XrRuntime,
    MARKER_EXTENSION, PLANE_EXTENSION,
};
use crate::scene::AnchorScene;
use crate::session::{EventFlags, LifecycleAction, SessionLifecycle};
use crate::swapchain::SwapchainSet;
use crate::types::{
    ActionSetHandle, BlendMode, InstanceHandle, MarkerImage, SessionHandle, SessionState,
    SpaceHandle, SystemId,
};

const NEAR_PLANE: f32 = 0.05;
const FAR_PLANE: f32 = 100.0;
const ACTION_SET_NAME: &str = "gameplay";

/// Operations the frame loop drives
pub trait Program {
    /// Bind to the runtime and enable the required and optional extensions
    fn create_instance(&mut self) -> Result<()>;

    /// Select the system, validate the view configuration, resolve the blend
    /// mode and bring up the graphics device
    fn initialize_system(&mut self) -> Result<()>;

    /// Create the session, its reference space and its action set
    fn initialize_session(&mut self) -> Result<()>;

    /// One swapchain per view of the configured view configuration
    fn create_swapchains(&mut self) -> Result<()>;

    /// Allocate a render target per swapchain
    fn initialize_application(&mut self) -> Result<()>;

    /// Create the marker tracker; a no-op when the extension is missing
    fn initialize_marker(&mut self) -> Result<()>;

    /// Register reference images; returns how many were accepted
    fn add_marker_images(&mut self) -> Result<usize>;

    /// Create the plane tracker when enabled and supported
    fn initialize_plane_tracking(&mut self) -> Result<()>;

    /// Drain the runtime event queue and advance the session state machine
    fn poll_events(&mut self) -> Result<EventFlags>;

    fn is_session_running(&self) -> bool;

    fn is_session_focused(&self) -> bool;

    fn poll_actions(&mut self) -> Result<()>;

    fn render_frame(&mut self) -> Result<()>;

    fn process_marker_data(&mut self) -> Result<()>;

    fn process_plane_tracking(&mut self) -> Result<()>;

    /// Whether the instance survived; false after an instance loss
    fn has_instance(&self) -> bool;
}

/// Per-session runtime objects
#[derive(Debug, Clone, Copy)]
struct SessionResources {
    handle: SessionHandle,
    space: SpaceHandle,
    action_set: ActionSetHandle,
}

/// Session controller over concrete backends
pub struct XrProgram<R, G, P>
where
    R: XrRuntime,
    G: GraphicsBackend,
    P: PlatformBackend,
{
    runtime: R,
    graphics: G,
    platform: P,
    options: Options,
    marker_images: Vec<MarkerImage>,

    instance: Option<InstanceHandle>,
    enabled_extensions: Vec<String>,
    system: Option<SystemId>,
    blend_mode: BlendMode,

    session: Option<SessionResources>,
    lifecycle: SessionLifecycle,
    swapchains: Option<SwapchainSet>,
    markers: MarkerTracking,
    planes: PlaneTracking,
    scene: AnchorScene,

    /// Flags raised outside `poll_events`, reported by its next call
    pending: EventFlags,
    display_time: i64,
    frame_count: u64,
}

impl<R, G, P> XrProgram<R, G, P>
where
    R: XrRuntime,
    G: GraphicsBackend,
    P: PlatformBackend,
{
    pub fn new(options: Options, runtime: R, graphics: G, platform: P) -> Self {
        Self {
            runtime,
            graphics,
            platform,
            blend_mode: options.blend_mode,
            options,
            marker_images: Vec::new(),
            instance: None,
            enabled_extensions: Vec::new(),
            system: None,
            session: None,
            lifecycle: SessionLifecycle::new(),
            swapchains: None,
            markers: MarkerTracking::new(),
            planes: PlaneTracking::new(),
            scene: AnchorScene::new(),
            pending: EventFlags::CONTINUE,
            display_time: 0,
            frame_count: 0,
        }
    }

    /// Reference images registered by `add_marker_images`
    pub fn with_marker_images(mut self, images: Vec<MarkerImage>) -> Self {
        self.marker_images = images;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn graphics(&self) -> &G {
        &self.graphics
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn session_state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn swapchains(&self) -> Option<&SwapchainSet> {
        self.swapchains.as_ref()
    }

    /// Blend mode submitted with every frame
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn extension_enabled(&self, name: &str) -> bool {
        self.enabled_extensions.iter().any(|e| e == name)
    }

    pub fn scene(&self) -> &AnchorScene {
        &self.scene
    }

    pub fn marker_tracking(&self) -> &MarkerTracking {
        &self.markers
    }

    /// Marker observations of the last processed frame
    pub fn marker_observations(&self) -> &[MarkerObservation] {
        self.markers.latest()
    }

    /// Plane observations of the last processed frame
    pub fn plane_observations(&self) -> &[PlaneObservation] {
        self.planes.latest()
    }

    /// Frames submitted since creation
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Release everything, session first
    pub fn shutdown(&mut self) {
        self.teardown_instance();
    }

    fn require_instance(&self) -> Result<InstanceHandle> {
        self.instance.ok_or(XrError::NoInstance)
    }

    fn require_session(&self, operation: &'static str) -> Result<SessionResources> {
        self.session.ok_or(XrError::PhaseOrder {
            operation,
            requirement: "a session",
        })
    }

    fn teardown_session(&mut self) {
        self.markers.shutdown(&mut self.runtime);
        self.planes.shutdown(&mut self.runtime);
        self.scene.clear();

        if let Some(swapchains) = self.swapchains.take() {
            tracing::info!("Destroying {} swapchains", swapchains.len());
            swapchains.destroy(&mut self.runtime, &mut self.graphics);
        }
        if let Some(session) = self.session.take() {
            tracing::info!("Destroying session {}", session.handle);
            self.runtime.destroy_session(session.handle);
        }
    }

    fn teardown_instance(&mut self) {
        self.teardown_session();
        self.system = None;
        self.enabled_extensions.clear();
        if let Some(instance) = self.instance.take() {
            tracing::info!("Destroying instance {}", instance);
            self.runtime.destroy_instance(instance);
        }
    }

    /// Turn loss errors into teardown plus a restart request
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            match e {
                XrError::SessionLost => {
                    tracing::warn!("Session lost during a frame call; scheduling restart");
                    self.lifecycle.mark_lost();
                    self.teardown_session();
                    self.pending = self.pending.merge(EventFlags::RESTART);
                }
                XrError::InstanceLost => {
                    tracing::warn!("Instance lost during a frame call; scheduling restart");
                    self.lifecycle.mark_lost();
                    self.teardown_instance();
                    self.pending = self.pending.merge(EventFlags::RESTART);
                }
                _ => {}
            }
        }
        result
    }

    fn resolve_blend_mode(&self, supported: &[BlendMode]) -> Result<BlendMode> {
        let preferred = self.options.blend_mode;
        if supported.contains(&preferred) {
            return Ok(preferred);
        }
        let fallback = supported.first().copied().ok_or(XrError::NoBlendMode)?;
        tracing::warn!(
            "Blend mode {} not supported (runtime offers {:?}); using {}",
            preferred,
            supported,
            fallback
        );
        Ok(fallback)
    }

    fn apply_lifecycle_action(
        &mut self,
        session: SessionResources,
        action: LifecycleAction,
    ) -> Result<EventFlags> {
        match action {
            LifecycleAction::None => Ok(EventFlags::CONTINUE),
            LifecycleAction::Begin => {
                let begun = self
                    .runtime
                    .begin_session(session.handle, self.options.view_configuration);
                if let Err(e) = begun {
                    if e.is_session_loss() {
                        return self.guard(Err(e));
                    }
                    // The runtime reports Ready only once per session
                    tracing::error!("Session {} failed to begin: {}", session.handle, e);
                    self.lifecycle.mark_lost();
                    self.teardown_session();
                    return Ok(EventFlags::RESTART);
                }
                self.lifecycle.mark_begun();
                tracing::info!("Session {} began", session.handle);
                Ok(EventFlags::CONTINUE)
            }
            LifecycleAction::End => {
                // Mark first so a failing end is never retried
                self.lifecycle.mark_ended();
                let ended = self.runtime.end_session(session.handle);
                self.guard(ended)?;
                tracing::info!("Session {} ended", session.handle);
                Ok(EventFlags::CONTINUE)
            }
            LifecycleAction::TearDown { restart } => {
                self.teardown_session();
                if restart {
                    tracing::warn!("Session lost; restart requested");
                    Ok(EventFlags::RESTART)
                } else {
                    tracing::info!("Session exiting");
                    Ok(EventFlags::EXIT)
                }
            }
        }
    }

    /// Drain the runtime queue, accumulating loop flags into `flags`
    fn drain_runtime_events(&mut self, flags: &mut EventFlags) -> Result<()> {
        if self.instance.is_none() {
            return Ok(());
        }

        loop {
            let polled = self.runtime.poll_event();
            let Some(event) = self.guard(polled)? else {
                break;
            };

            match event {
                RuntimeEvent::SessionStateChanged { session, state } => {
                    let Some(current) = self.session.filter(|s| s.handle == session) else {
                        tracing::debug!("Ignoring state {:?} for stale session {}", state, session);
                        continue;
                    };
                    tracing::info!(
                        "Session state changed: {:?} -> {:?}",
                        self.lifecycle.state(),
                        state
                    );
                    let action = self.lifecycle.on_state_changed(state);
                    *flags = flags.merge(self.apply_lifecycle_action(current, action)?);
                }
                RuntimeEvent::InstanceLossPending => {
                    tracing::warn!("Instance loss pending; tearing down");
                    self.lifecycle.mark_lost();
                    self.teardown_instance();
                    *flags = flags.merge(EventFlags::RESTART);
                    return Ok(());
                }
                RuntimeEvent::EventsLost { count } => {
                    tracing::warn!("{} runtime events lost", count);
                }
                RuntimeEvent::InteractionProfileChanged => {
                    tracing::info!("Interaction profile changed");
                }
                RuntimeEvent::ReferenceSpaceChangePending => {
                    tracing::debug!("Reference space change pending");
                }
            }

            if self.instance.is_none() {
                break;
            }
        }
        Ok(())
    }

    fn render_layer(
        &mut self,
        session: SessionResources,
        display_time: i64,
    ) -> Result<Vec<ProjectionView>> {
        let Some(views) = self.runtime.locate_views(
            session.handle,
            self.options.view_configuration,
            display_time,
            session.space,
        )?
        else {
            tracing::debug!("View poses invalid; submitting no layers");
            return Ok(Vec::new());
        };

        let Some(swapchains) = &self.swapchains else {
            return Err(XrError::PhaseOrder {
                operation: "render_frame",
                requirement: "created swapchains",
            });
        };
        if views.len() != swapchains.len() {
            tracing::warn!(
                "Located {} views for {} swapchains",
                views.len(),
                swapchains.len()
            );
        }

        let cubes = self.scene.cubes();
        let mut layer = Vec::with_capacity(views.len());
        for (view, swapchain) in views.iter().zip(swapchains.swapchains()) {
            let target = swapchain.render_target.ok_or(XrError::PhaseOrder {
                operation: "render_frame",
                requirement: "initialized render targets",
            })?;

            let image_index = self.runtime.acquire_swapchain_image(swapchain.handle)?;

            // An acquired image is always released, whatever happens in between
            let rendered = match self.runtime.wait_swapchain_image(swapchain.handle) {
                Ok(()) => {
                    let submission = ViewSubmission {
                        projection: view.fov.projection(NEAR_PLANE, FAR_PLANE),
                        view: view.pose.to_mat4().inverse(),
                        cubes: &cubes,
                    };
                    self.graphics.render_view(target, image_index, &submission)
                }
                Err(e) => Err(e),
            };
            let released = self.runtime.release_swapchain_image(swapchain.handle);
            rendered?;
            released?;

            layer.push(ProjectionView {
                view: *view,
                swapchain: swapchain.handle,
                extent: swapchain.extent(),
            });
        }
        Ok(layer)
    }
}

impl<R, G, P> Program for XrProgram<R, G, P>
where
    R: XrRuntime,
    G: GraphicsBackend,
    P: PlatformBackend,
{
    fn create_instance(&mut self) -> Result<()> {
        if self.instance.is_some() {
            tracing::debug!("Instance already exists");
            return Ok(());
        }

        let available = self.runtime.enumerate_extensions()?;
        tracing::debug!("Runtime extensions: {:?}", available);

        let mut extensions = self.graphics.instance_extensions();
        extensions.extend(self.platform.instance_extensions());
        if let Some(missing) = extensions.iter().find(|e| !available.contains(*e)) {
            return Err(XrError::MissingExtension(missing.clone()));
        }
        for optional in [MARKER_EXTENSION, PLANE_EXTENSION] {
            if available.iter().any(|e| e == optional) {
                extensions.push(optional.to_string());
            } else {
                tracing::info!("Optional extension {} not offered by the runtime", optional);
            }
        }

        let application = self.platform.application_info();
        match self.platform.native_window() {
            Some(window) => tracing::debug!("Creating instance with native window {:?}", window),
            None => tracing::debug!("Creating instance without a native window"),
        }

        let instance = self.runtime.create_instance(&InstanceCreateInfo {
            application: application.clone(),
            extensions: extensions.clone(),
        })?;
        tracing::info!(
            "Created instance {} for '{}' v{} with extensions {:?}",
            instance,
            application.name,
            application.version,
            extensions
        );

        self.instance = Some(instance);
        self.enabled_extensions = extensions;
        Ok(())
    }

    fn initialize_system(&mut self) -> Result<()> {
        let instance = self.require_instance()?;
        if self.system.is_some() {
            return Ok(());
        }

        let system = self.runtime.system(instance, self.options.form_factor)?;

        let view_configurations = self.runtime.enumerate_view_configurations(system)?;
        if !view_configurations.contains(&self.options.view_configuration) {
            return Err(XrError::ViewConfigurationUnsupported(
                self.options.view_configuration,
            ));
        }

        let blend_modes = self
            .runtime
            .enumerate_blend_modes(system, self.options.view_configuration)?;
        self.blend_mode = self.resolve_blend_mode(&blend_modes)?;

        self.graphics.initialize_device(instance, system)?;

        tracing::info!(
            "Using system {} ({}, {}, blend mode {}, graphics {})",
            system,
            self.options.form_factor,
            self.options.view_configuration,
            self.blend_mode,
            self.graphics.name()
        );
        self.system = Some(system);
        Ok(())
    }

    fn initialize_session(&mut self) -> Result<()> {
        let system = self.system.ok_or(XrError::PhaseOrder {
            operation: "initialize_session",
            requirement: "an initialized system",
        })?;
        if self.session.is_some() {
            return Ok(());
        }

        let handle = self.runtime.create_session(system)?;
        let resources = self
            .runtime
            .create_reference_space(handle, ReferenceSpace::default())
            .and_then(|space| {
                self.runtime
                    .create_action_set(handle, ACTION_SET_NAME)
                    .map(|action_set| SessionResources {
                        handle,
                        space,
                        action_set,
                    })
            });
        let resources = match resources {
            Ok(resources) => resources,
            Err(e) => {
                self.runtime.destroy_session(handle);
                return Err(e);
            }
        };

        tracing::info!("Created session {}", handle);
        self.session = Some(resources);
        self.lifecycle = SessionLifecycle::new();
        self.scene.clear();
        Ok(())
    }

    fn create_swapchains(&mut self) -> Result<()> {
        let session = self.require_session("create_swapchains")?;
        let system = self.system.ok_or(XrError::PhaseOrder {
            operation: "create_swapchains",
            requirement: "an initialized system",
        })?;
        if self.swapchains.is_some() {
            return Ok(());
        }

        let swapchains = SwapchainSet::create(
            &mut self.runtime,
            &self.graphics,
            system,
            session.handle,
            self.options.view_configuration,
        )?;
        self.swapchains = Some(swapchains);
        Ok(())
    }

    fn initialize_application(&mut self) -> Result<()> {
        let swapchains = self.swapchains.as_mut().ok_or(XrError::PhaseOrder {
            operation: "initialize_application",
            requirement: "created swapchains",
        })?;
        swapchains.allocate_render_targets(&mut self.graphics)?;
        tracing::info!(
            "Allocated render targets for {} views",
            swapchains.len()
        );
        Ok(())
    }

    fn initialize_marker(&mut self) -> Result<()> {
        let session = self.require_session("initialize_marker")?;
        if !self.extension_enabled(MARKER_EXTENSION) {
            tracing::warn!("{} unavailable; marker tracking disabled", MARKER_EXTENSION);
            return Ok(());
        }

        match self.markers.initialize(&mut self.runtime, session.handle) {
            Err(e) if e.severity() == Severity::Degraded => {
                tracing::warn!("Marker tracking disabled: {}", e);
                Ok(())
            }
            other => other,
        }
    }

    fn add_marker_images(&mut self) -> Result<usize> {
        if !self.markers.is_active() {
            tracing::debug!("Marker tracking inactive; not registering images");
            return Ok(0);
        }
        let registered = self
            .markers
            .add_images(&mut self.runtime, &self.marker_images)?;
        tracing::info!(
            "Marker database sealed with {} of {} images",
            registered,
            self.marker_images.len()
        );
        Ok(registered)
    }

    fn initialize_plane_tracking(&mut self) -> Result<()> {
        let session = self.require_session("initialize_plane_tracking")?;
        if !self.options.plane_tracking {
            tracing::debug!("Plane tracking not enabled");
            return Ok(());
        }
        if !self.extension_enabled(PLANE_EXTENSION) {
            tracing::warn!("{} unavailable; plane tracking disabled", PLANE_EXTENSION);
            return Ok(());
        }

        match self.planes.initialize(&mut self.runtime, session.handle) {
            Err(e) if e.severity() == Severity::Degraded => {
                tracing::warn!("Plane tracking disabled: {}", e);
                Ok(())
            }
            other => other,
        }
    }

    fn poll_events(&mut self) -> Result<EventFlags> {
        let mut flags = std::mem::take(&mut self.pending);
        match self.drain_runtime_events(&mut flags) {
            Ok(()) => Ok(flags),
            Err(e) => {
                let flags = flags.merge(std::mem::take(&mut self.pending));
                if flags.exit_render_loop {
                    tracing::warn!("Event polling failed after the session was torn down: {}", e);
                    Ok(flags)
                } else {
                    Err(e)
                }
            }
        }
    }

    fn is_session_running(&self) -> bool {
        self.session.is_some() && self.lifecycle.is_running()
    }

    fn is_session_focused(&self) -> bool {
        self.session.is_some() && self.lifecycle.is_focused()
    }

    fn poll_actions(&mut self) -> Result<()> {
        let Some(session) = self.session else {
            return Ok(());
        };
        if !self.lifecycle.is_focused() {
            self.scene.apply_hands(&Default::default());
            return Ok(());
        }

        let synced = self
            .runtime
            .sync_actions(session.handle, session.action_set, session.space);
        let actions = self.guard(synced)?;
        self.scene.apply_hands(&actions);

        if actions.quit {
            tracing::info!("Quit action; requesting session exit");
            let requested = self.runtime.request_exit_session(session.handle);
            self.guard(requested)?;
        }
        Ok(())
    }

    fn render_frame(&mut self) -> Result<()> {
        let Some(session) = self.session else {
            return Ok(());
        };
        if !self.lifecycle.is_running() {
            return Ok(());
        }

        let waited = self.runtime.wait_frame(session.handle);
        let frame = self.guard(waited)?;
        let begun = self.runtime.begin_frame(session.handle);
        self.guard(begun)?;
        self.display_time = frame.predicted_display_time;

        let rendered = if frame.should_render {
            self.render_layer(session, frame.predicted_display_time)
        } else {
            Ok(Vec::new())
        };
        let (projection_views, render_error) = match rendered {
            Ok(layer) => (layer, None),
            Err(e) => (Vec::new(), Some(e)),
        };

        let ended = self.runtime.end_frame(
            session.handle,
            &FrameEndInfo {
                display_time: frame.predicted_display_time,
                blend_mode: self.blend_mode,
                projection_views,
            },
        );
        self.frame_count += 1;

        if let Some(e) = render_error {
            return self.guard(Err(e));
        }
        self.guard(ended)
    }

    fn process_marker_data(&mut self) -> Result<()> {
        let Some(session) = self.session else {
            return Ok(());
        };
        if !self.lifecycle.is_running() || !self.markers.is_active() {
            return Ok(());
        }

        let processed = self
            .markers
            .process(&mut self.runtime, self.display_time, session.space)
            .map(|observations| observations.len());
        let count = self.guard(processed)?;
        if count > 0 {
            tracing::debug!("{} marker observations", count);
        }
        self.scene
            .apply_markers(self.markers.latest(), self.markers.database());
        Ok(())
    }

    fn process_plane_tracking(&mut self) -> Result<()> {
        let Some(session) = self.session else {
            return Ok(());
        };
        if !self.lifecycle.is_running() || !self.planes.is_active() {
            return Ok(());
        }

        let processed = self
            .planes
            .process(&mut self.runtime, self.display_time, session.space)
            .map(|observations| observations.len());
        let count = self.guard(processed)?;
        if count > 0 {
            tracing::debug!("{} plane observations", count);
        }
        self.scene.apply_planes(self.planes.latest());
        Ok(())
    }

    fn has_instance(&self) -> bool {
        self.instance.is_some()
    }
}

impl<R, G, P> Drop for XrProgram<R, G, P>
where
    R: XrRuntime,
    G: GraphicsBackend,
    P: PlatformBackend,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
