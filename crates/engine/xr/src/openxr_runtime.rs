//! OpenXR runtime binding
//!
//! [`OpenXrRuntime`] implements [`XrRuntime`] on top of the system OpenXR
//! loader through the `openxr` crate. Sessions are created headless
//! (`XR_MND_headless`), so the runtime paces frames and reports poses while
//! the renderer draws into its own offscreen images. Swapchains are
//! therefore kept on this side of the seam: they hand out image indices in
//! acquire/wait/release order and nothing is submitted as a projection layer.
//!
//! Marker and plane tracking keep the trait's unsupported defaults.

use std::collections::HashMap;

use glam::{Quat, Vec3};
use openxr as oxr;

use crate::error::{Result, XrError};
use crate::graphics::{FORMAT_RGBA8, FORMAT_SRGB8_ALPHA8, HEADLESS_EXTENSION};
use crate::runtime::{
    FrameEndInfo, InstanceCreateInfo, ReferenceSpace, RuntimeEvent, SwapchainCreateInfo,
    XrRuntime,
};
use crate::types::{
    ActionSetHandle, ActionSnapshot, BlendMode, FormFactor, Fov, FrameState, InstanceHandle,
    Pose, SessionHandle, SessionState, SpaceHandle, SwapchainHandle, SystemId, View,
    ViewConfigView, ViewConfiguration,
};

const ENGINE_VERSION: u32 = 1;
const SIMPLE_CONTROLLER: &str = "/interaction_profiles/khr/simple_controller";
const HAND_PATHS: [&str; 2] = ["/user/hand/left", "/user/hand/right"];

/// Map a failed OpenXR call to a controller error
fn call_error(call: &'static str, result: oxr::sys::Result) -> XrError {
    match result {
        oxr::sys::Result::ERROR_SESSION_LOST => XrError::SessionLost,
        oxr::sys::Result::ERROR_INSTANCE_LOST => XrError::InstanceLost,
        other => XrError::runtime(call, other.to_string()),
    }
}

fn form_factor(form_factor: FormFactor) -> oxr::FormFactor {
    match form_factor {
        FormFactor::Hmd => oxr::FormFactor::HEAD_MOUNTED_DISPLAY,
        FormFactor::Handheld => oxr::FormFactor::HANDHELD_DISPLAY,
    }
}

fn view_configuration_type(view_configuration: ViewConfiguration) -> oxr::ViewConfigurationType {
    match view_configuration {
        ViewConfiguration::Mono => oxr::ViewConfigurationType::PRIMARY_MONO,
        ViewConfiguration::Stereo => oxr::ViewConfigurationType::PRIMARY_STEREO,
    }
}

fn view_configuration(ty: oxr::ViewConfigurationType) -> Option<ViewConfiguration> {
    match ty {
        oxr::ViewConfigurationType::PRIMARY_MONO => Some(ViewConfiguration::Mono),
        oxr::ViewConfigurationType::PRIMARY_STEREO => Some(ViewConfiguration::Stereo),
        _ => None,
    }
}

fn environment_blend_mode(blend_mode: BlendMode) -> oxr::EnvironmentBlendMode {
    match blend_mode {
        BlendMode::Opaque => oxr::EnvironmentBlendMode::OPAQUE,
        BlendMode::Additive => oxr::EnvironmentBlendMode::ADDITIVE,
        BlendMode::AlphaBlend => oxr::EnvironmentBlendMode::ALPHA_BLEND,
    }
}

fn blend_mode(mode: oxr::EnvironmentBlendMode) -> Option<BlendMode> {
    match mode {
        oxr::EnvironmentBlendMode::OPAQUE => Some(BlendMode::Opaque),
        oxr::EnvironmentBlendMode::ADDITIVE => Some(BlendMode::Additive),
        oxr::EnvironmentBlendMode::ALPHA_BLEND => Some(BlendMode::AlphaBlend),
        _ => None,
    }
}

fn session_state(state: oxr::SessionState) -> SessionState {
    match state {
        oxr::SessionState::IDLE => SessionState::Idle,
        oxr::SessionState::READY => SessionState::Ready,
        oxr::SessionState::SYNCHRONIZED => SessionState::Synchronized,
        oxr::SessionState::VISIBLE => SessionState::Visible,
        oxr::SessionState::FOCUSED => SessionState::Focused,
        oxr::SessionState::STOPPING => SessionState::Stopping,
        oxr::SessionState::LOSS_PENDING => SessionState::LossPending,
        oxr::SessionState::EXITING => SessionState::Exiting,
        _ => SessionState::Unknown,
    }
}

fn pose(pose: oxr::Posef) -> Pose {
    let o = pose.orientation;
    let p = pose.position;
    Pose::new(Quat::from_xyzw(o.x, o.y, o.z, o.w), Vec3::new(p.x, p.y, p.z))
}

fn fov(fov: oxr::Fovf) -> Fov {
    Fov {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

fn reference_space_type(space: ReferenceSpace) -> oxr::ReferenceSpaceType {
    match space {
        ReferenceSpace::View => oxr::ReferenceSpaceType::VIEW,
        ReferenceSpace::Local => oxr::ReferenceSpaceType::LOCAL,
        ReferenceSpace::Stage => oxr::ReferenceSpaceType::STAGE,
    }
}

/// Image rotation of one offscreen swapchain
#[derive(Debug, Clone)]
struct OffscreenSwapchain {
    info: SwapchainCreateInfo,
    image_count: u32,
    next_image: u32,
    acquired: Option<u32>,
}

impl OffscreenSwapchain {
    fn new(info: SwapchainCreateInfo, image_count: u32) -> Self {
        Self {
            info,
            image_count: image_count.max(1),
            next_image: 0,
            acquired: None,
        }
    }

    fn acquire(&mut self) -> Result<u32> {
        if self.acquired.is_some() {
            return Err(XrError::runtime("xrAcquireSwapchainImage", "image already acquired"));
        }
        let index = self.next_image;
        self.next_image = (index + 1) % self.image_count;
        self.acquired = Some(index);
        Ok(index)
    }

    fn wait(&mut self) -> Result<()> {
        if self.acquired.is_none() {
            return Err(XrError::runtime("xrWaitSwapchainImage", "no image acquired"));
        }
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.acquired.take().is_none() {
            return Err(XrError::runtime("xrReleaseSwapchainImage", "no image acquired"));
        }
        Ok(())
    }
}

/// Actions bound for the session: a quit button and both grip poses
struct SessionActions {
    handle: ActionSetHandle,
    set: oxr::ActionSet,
    quit: oxr::Action<bool>,
    hand_spaces: Vec<oxr::Space>,
}

struct LiveSession {
    handle: SessionHandle,
    session: oxr::Session<oxr::Headless>,
    frame_waiter: oxr::FrameWaiter,
    frame_stream: oxr::FrameStream<oxr::Headless>,
    spaces: HashMap<SpaceHandle, oxr::Space>,
    actions: Option<SessionActions>,
}

impl LiveSession {
    fn space(&self, space: SpaceHandle, call: &'static str) -> Result<&oxr::Space> {
        self.spaces
            .get(&space)
            .ok_or_else(|| XrError::runtime(call, format!("unknown space {}", space)))
    }
}

struct LiveInstance {
    handle: InstanceHandle,
    instance: oxr::Instance,
    system: Option<(SystemId, oxr::SystemId)>,
}

/// [`XrRuntime`] backed by the system OpenXR loader
pub struct OpenXrRuntime {
    entry: oxr::Entry,
    next_handle: u64,
    images_per_swapchain: u32,
    instance: Option<LiveInstance>,
    session: Option<LiveSession>,
    swapchains: HashMap<SwapchainHandle, OffscreenSwapchain>,
    event_buffer: oxr::EventDataBuffer,
    display_time: oxr::Time,
}

impl OpenXrRuntime {
    /// Load the OpenXR loader installed on the system
    pub fn load() -> Result<Self> {
        #[allow(unused_unsafe)]
        let entry = unsafe { oxr::Entry::load() }
            .map_err(|e| XrError::RuntimeUnavailable(format!("OpenXR loader: {e:?}")))?;
        Ok(Self::with_entry(entry))
    }

    pub fn with_entry(entry: oxr::Entry) -> Self {
        Self {
            entry,
            next_handle: 1,
            images_per_swapchain: 3,
            instance: None,
            session: None,
            swapchains: HashMap::new(),
            event_buffer: oxr::EventDataBuffer::new(),
            display_time: oxr::Time::from_nanos(0),
        }
    }

    fn handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn live_instance(&self, instance: InstanceHandle) -> Result<&LiveInstance> {
        match &self.instance {
            Some(live) if live.handle == instance => Ok(live),
            _ => Err(XrError::NoInstance),
        }
    }

    fn system_instance(&self, system: SystemId) -> Result<(&oxr::Instance, oxr::SystemId)> {
        match &self.instance {
            Some(LiveInstance {
                instance,
                system: Some((id, raw)),
                ..
            }) if *id == system => Ok((instance, *raw)),
            _ => Err(XrError::runtime("xrGetSystem", format!("unknown system {}", system))),
        }
    }

    fn live_session(&mut self, session: SessionHandle, call: &'static str) -> Result<&mut LiveSession> {
        match self.session.as_mut() {
            Some(live) if live.handle == session => Ok(live),
            _ => Err(XrError::runtime(call, format!("unknown session {}", session))),
        }
    }

    fn swapchain(&mut self, swapchain: SwapchainHandle, call: &'static str) -> Result<&mut OffscreenSwapchain> {
        self.swapchains
            .get_mut(&swapchain)
            .ok_or_else(|| XrError::runtime(call, format!("unknown swapchain {}", swapchain)))
    }

    fn bind_actions(
        instance: &oxr::Instance,
        session: &oxr::Session<oxr::Headless>,
        handle: ActionSetHandle,
        name: &str,
    ) -> Result<SessionActions> {
        let set = instance
            .create_action_set(name, name, 0)
            .map_err(|e| call_error("xrCreateActionSet", e))?;

        let hands = HAND_PATHS
            .iter()
            .map(|path| {
                instance
                    .string_to_path(path)
                    .map_err(|e| call_error("xrStringToPath", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let quit = set
            .create_action::<bool>("quit", "Quit", &[])
            .map_err(|e| call_error("xrCreateAction", e))?;
        let grip = set
            .create_action::<oxr::Posef>("hand_pose", "Hand pose", &hands)
            .map_err(|e| call_error("xrCreateAction", e))?;

        let menu_paths = HAND_PATHS
            .iter()
            .map(|hand| instance.string_to_path(&format!("{hand}/input/menu/click")))
            .collect::<oxr::Result<Vec<_>>>()
            .map_err(|e| call_error("xrStringToPath", e))?;
        let grip_paths = HAND_PATHS
            .iter()
            .map(|hand| instance.string_to_path(&format!("{hand}/input/grip/pose")))
            .collect::<oxr::Result<Vec<_>>>()
            .map_err(|e| call_error("xrStringToPath", e))?;

        let mut bindings = Vec::new();
        for path in &menu_paths {
            bindings.push(oxr::Binding::new(&quit, *path));
        }
        for path in &grip_paths {
            bindings.push(oxr::Binding::new(&grip, *path));
        }
        let profile = instance
            .string_to_path(SIMPLE_CONTROLLER)
            .map_err(|e| call_error("xrStringToPath", e))?;
        if let Err(e) = instance.suggest_interaction_profile_bindings(profile, &bindings) {
            tracing::warn!("Bindings for {} rejected: {}", SIMPLE_CONTROLLER, e);
        }

        session
            .attach_action_sets(&[&set])
            .map_err(|e| call_error("xrAttachSessionActionSets", e))?;

        let hand_spaces = hands
            .iter()
            .map(|hand| {
                grip.create_space(session.clone(), *hand, oxr::Posef::IDENTITY)
                    .map_err(|e| call_error("xrCreateActionSpace", e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SessionActions {
            handle,
            set,
            quit,
            hand_spaces,
        })
    }
}

impl XrRuntime for OpenXrRuntime {
    /// Only the extensions this binding can drive are reported
    fn enumerate_extensions(&self) -> Result<Vec<String>> {
        let available = self
            .entry
            .enumerate_extensions()
            .map_err(|e| call_error("xrEnumerateInstanceExtensionProperties", e))?;
        let mut extensions = Vec::new();
        if available.mnd_headless {
            extensions.push(HEADLESS_EXTENSION.to_string());
        }
        Ok(extensions)
    }

    fn create_instance(&mut self, info: &InstanceCreateInfo) -> Result<InstanceHandle> {
        let mut extensions = oxr::ExtensionSet::default();
        for name in &info.extensions {
            if name == HEADLESS_EXTENSION {
                extensions.mnd_headless = true;
            } else {
                extensions.other.push(name.clone());
            }
        }

        let application = oxr::ApplicationInfo {
            application_name: &info.application.name,
            application_version: info.application.version,
            engine_name: &info.application.engine_name,
            engine_version: ENGINE_VERSION,
        };
        let instance = self
            .entry
            .create_instance(&application, &extensions, &[])
            .map_err(|e| XrError::RuntimeUnavailable(format!("xrCreateInstance: {e}")))?;

        if let Ok(properties) = instance.properties() {
            let version = properties.runtime_version;
            tracing::info!(
                "OpenXR runtime {} {}.{}.{}",
                properties.runtime_name,
                version.major(),
                version.minor(),
                version.patch()
            );
        }

        let handle = InstanceHandle(self.handle());
        self.instance = Some(LiveInstance {
            handle,
            instance,
            system: None,
        });
        Ok(handle)
    }

    fn destroy_instance(&mut self, instance: InstanceHandle) {
        if self.instance.as_ref().map(|live| live.handle) == Some(instance) {
            self.swapchains.clear();
            self.session = None;
            self.instance = None;
        }
    }

    fn system(&mut self, instance: InstanceHandle, requested: FormFactor) -> Result<SystemId> {
        let raw = self
            .live_instance(instance)?
            .instance
            .system(form_factor(requested))
            .map_err(|e| match e {
                oxr::sys::Result::ERROR_FORM_FACTOR_UNAVAILABLE => {
                    XrError::FormFactorUnavailable(requested)
                }
                other => call_error("xrGetSystem", other),
            })?;

        let system = SystemId(self.handle());
        if let Some(live) = self.instance.as_mut() {
            live.system = Some((system, raw));
        }
        Ok(system)
    }

    fn enumerate_view_configurations(&self, system: SystemId) -> Result<Vec<ViewConfiguration>> {
        let (instance, raw) = self.system_instance(system)?;
        let types = instance
            .enumerate_view_configurations(raw)
            .map_err(|e| call_error("xrEnumerateViewConfigurations", e))?;
        Ok(types.into_iter().filter_map(view_configuration).collect())
    }

    fn enumerate_blend_modes(
        &self,
        system: SystemId,
        view_configuration: ViewConfiguration,
    ) -> Result<Vec<BlendMode>> {
        let (instance, raw) = self.system_instance(system)?;
        let modes = instance
            .enumerate_environment_blend_modes(raw, view_configuration_type(view_configuration))
            .map_err(|e| call_error("xrEnumerateEnvironmentBlendModes", e))?;
        Ok(modes.into_iter().filter_map(blend_mode).collect())
    }

    fn enumerate_view_configuration_views(
        &self,
        system: SystemId,
        view_configuration: ViewConfiguration,
    ) -> Result<Vec<ViewConfigView>> {
        let (instance, raw) = self.system_instance(system)?;
        let views = instance
            .enumerate_view_configuration_views(raw, view_configuration_type(view_configuration))
            .map_err(|e| call_error("xrEnumerateViewConfigurationViews", e))?;
        Ok(views
            .into_iter()
            .map(|v| ViewConfigView {
                recommended_width: v.recommended_image_rect_width,
                recommended_height: v.recommended_image_rect_height,
                max_width: v.max_image_rect_width,
                max_height: v.max_image_rect_height,
                recommended_sample_count: v.recommended_swapchain_sample_count,
                max_sample_count: v.max_swapchain_sample_count,
            })
            .collect())
    }

    fn create_session(&mut self, system: SystemId) -> Result<SessionHandle> {
        let (instance, raw) = self.system_instance(system)?;
        // SAFETY: a headless session carries no graphics binding to keep alive
        let (session, frame_waiter, frame_stream) = unsafe {
            instance.create_session::<oxr::Headless>(raw, &oxr::headless::SessionCreateInfo {})
        }
        .map_err(|e| call_error("xrCreateSession", e))?;

        let handle = SessionHandle(self.handle());
        self.session = Some(LiveSession {
            handle,
            session,
            frame_waiter,
            frame_stream,
            spaces: HashMap::new(),
            actions: None,
        });
        Ok(handle)
    }

    fn destroy_session(&mut self, session: SessionHandle) {
        if self.session.as_ref().map(|live| live.handle) == Some(session) {
            self.session = None;
        }
    }

    fn create_reference_space(
        &mut self,
        session: SessionHandle,
        space: ReferenceSpace,
    ) -> Result<SpaceHandle> {
        let handle = SpaceHandle(self.handle());
        let live = self.live_session(session, "xrCreateReferenceSpace")?;
        let created = live
            .session
            .create_reference_space(reference_space_type(space), oxr::Posef::IDENTITY)
            .map_err(|e| call_error("xrCreateReferenceSpace", e))?;
        live.spaces.insert(handle, created);
        Ok(handle)
    }

    fn create_action_set(&mut self, session: SessionHandle, name: &str) -> Result<ActionSetHandle> {
        let handle = ActionSetHandle(self.handle());
        let Some(instance) = self.instance.as_ref().map(|live| live.instance.clone()) else {
            return Err(XrError::NoInstance);
        };
        let live = self.live_session(session, "xrCreateActionSet")?;
        let actions = Self::bind_actions(&instance, &live.session, handle, name)?;
        live.actions = Some(actions);
        Ok(handle)
    }

    fn enumerate_swapchain_formats(&self, _session: SessionHandle) -> Result<Vec<i64>> {
        Ok(vec![FORMAT_SRGB8_ALPHA8, FORMAT_RGBA8])
    }

    fn create_swapchain(
        &mut self,
        session: SessionHandle,
        info: &SwapchainCreateInfo,
    ) -> Result<SwapchainHandle> {
        self.live_session(session, "xrCreateSwapchain")?;
        let handle = SwapchainHandle(self.handle());
        let swapchain = OffscreenSwapchain::new(*info, self.images_per_swapchain);
        self.swapchains.insert(handle, swapchain);
        Ok(handle)
    }

    fn enumerate_swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<u64>> {
        let chain = self.swapchains.get(&swapchain).ok_or_else(|| {
            XrError::runtime("xrEnumerateSwapchainImages", format!("unknown swapchain {}", swapchain))
        })?;
        Ok((0..u64::from(chain.image_count))
            .map(|i| (swapchain.0 << 8) | i)
            .collect())
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) {
        if let Some(chain) = self.swapchains.remove(&swapchain) {
            tracing::debug!(
                "Destroyed offscreen swapchain {} ({}x{})",
                swapchain,
                chain.info.extent.width,
                chain.info.extent.height
            );
        }
    }

    fn poll_event(&mut self) -> Result<Option<RuntimeEvent>> {
        let Some(live) = self.instance.as_ref() else {
            return Ok(None);
        };
        let session = self.session.as_ref();

        loop {
            let polled = live
                .instance
                .poll_event(&mut self.event_buffer)
                .map_err(|e| call_error("xrPollEvent", e))?;
            let Some(event) = polled else {
                return Ok(None);
            };

            let converted = match event {
                oxr::Event::SessionStateChanged(changed) => {
                    let Some(current) =
                        session.filter(|s| s.session.as_raw() == changed.session())
                    else {
                        tracing::debug!("Dropping state change for a destroyed session");
                        continue;
                    };
                    RuntimeEvent::SessionStateChanged {
                        session: current.handle,
                        state: session_state(changed.state()),
                    }
                }
                oxr::Event::InstanceLossPending(_) => RuntimeEvent::InstanceLossPending,
                oxr::Event::EventsLost(lost) => RuntimeEvent::EventsLost {
                    count: lost.lost_event_count(),
                },
                oxr::Event::InteractionProfileChanged(_) => RuntimeEvent::InteractionProfileChanged,
                oxr::Event::ReferenceSpaceChangePending(_) => {
                    RuntimeEvent::ReferenceSpaceChangePending
                }
                _ => continue,
            };
            return Ok(Some(converted));
        }
    }

    fn begin_session(
        &mut self,
        session: SessionHandle,
        view_configuration: ViewConfiguration,
    ) -> Result<()> {
        let live = self.live_session(session, "xrBeginSession")?;
        live.session
            .begin(view_configuration_type(view_configuration))
            .map_err(|e| call_error("xrBeginSession", e))?;
        Ok(())
    }

    fn end_session(&mut self, session: SessionHandle) -> Result<()> {
        let live = self.live_session(session, "xrEndSession")?;
        live.session.end().map_err(|e| call_error("xrEndSession", e))?;
        Ok(())
    }

    fn request_exit_session(&mut self, session: SessionHandle) -> Result<()> {
        let live = self.live_session(session, "xrRequestExitSession")?;
        live.session
            .request_exit()
            .map_err(|e| call_error("xrRequestExitSession", e))
    }

    fn sync_actions(
        &mut self,
        session: SessionHandle,
        action_set: ActionSetHandle,
        space: SpaceHandle,
    ) -> Result<ActionSnapshot> {
        let time = self.display_time;
        let live = self.live_session(session, "xrSyncActions")?;
        let base = live.space(space, "xrSyncActions")?;
        let Some(actions) = live.actions.as_ref().filter(|a| a.handle == action_set) else {
            return Err(XrError::runtime("xrSyncActions", format!("unknown action set {}", action_set)));
        };

        live.session
            .sync_actions(&[oxr::ActiveActionSet::new(&actions.set)])
            .map_err(|e| call_error("xrSyncActions", e))?;

        let quit = actions
            .quit
            .state(&live.session, oxr::Path::NULL)
            .map_err(|e| call_error("xrGetActionStateBoolean", e))?;

        let mut snapshot = ActionSnapshot {
            quit: quit.is_active && quit.changed_since_last_sync && quit.current_state,
            hands: [None, None],
        };
        for (slot, hand) in snapshot.hands.iter_mut().zip(&actions.hand_spaces) {
            let location = hand
                .locate(base, time)
                .map_err(|e| call_error("xrLocateSpace", e))?;
            if location
                .location_flags
                .contains(oxr::SpaceLocationFlags::POSITION_VALID)
            {
                *slot = Some(pose(location.pose));
            }
        }
        Ok(snapshot)
    }

    fn wait_frame(&mut self, session: SessionHandle) -> Result<FrameState> {
        let live = self.live_session(session, "xrWaitFrame")?;
        let state = live
            .frame_waiter
            .wait()
            .map_err(|e| call_error("xrWaitFrame", e))?;
        self.display_time = state.predicted_display_time;
        Ok(FrameState {
            predicted_display_time: state.predicted_display_time.as_nanos(),
            predicted_display_period: state.predicted_display_period.as_nanos(),
            should_render: state.should_render,
        })
    }

    fn begin_frame(&mut self, session: SessionHandle) -> Result<()> {
        let live = self.live_session(session, "xrBeginFrame")?;
        live.frame_stream
            .begin()
            .map_err(|e| call_error("xrBeginFrame", e))?;
        Ok(())
    }

    fn locate_views(
        &mut self,
        session: SessionHandle,
        view_configuration: ViewConfiguration,
        display_time: i64,
        space: SpaceHandle,
    ) -> Result<Option<Vec<View>>> {
        let live = self.live_session(session, "xrLocateViews")?;
        let base = live.space(space, "xrLocateViews")?;
        let (flags, views) = live
            .session
            .locate_views(
                view_configuration_type(view_configuration),
                oxr::Time::from_nanos(display_time),
                base,
            )
            .map_err(|e| call_error("xrLocateViews", e))?;

        let valid = oxr::ViewStateFlags::ORIENTATION_VALID | oxr::ViewStateFlags::POSITION_VALID;
        if !flags.contains(valid) {
            return Ok(None);
        }
        Ok(Some(
            views
                .into_iter()
                .map(|view| View {
                    pose: pose(view.pose),
                    fov: fov(view.fov),
                })
                .collect(),
        ))
    }

    fn acquire_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<u32> {
        self.swapchain(swapchain, "xrAcquireSwapchainImage")?.acquire()
    }

    fn wait_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<()> {
        self.swapchain(swapchain, "xrWaitSwapchainImage")?.wait()
    }

    fn release_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<()> {
        self.swapchain(swapchain, "xrReleaseSwapchainImage")?.release()
    }

    fn end_frame(&mut self, session: SessionHandle, info: &FrameEndInfo) -> Result<()> {
        let live = self.live_session(session, "xrEndFrame")?;
        // Offscreen views stay with the renderer; the compositor gets no layers
        live.frame_stream
            .end(
                oxr::Time::from_nanos(info.display_time),
                environment_blend_mode(info.blend_mode),
                &[],
            )
            .map_err(|e| call_error("xrEndFrame", e))
    }
}
