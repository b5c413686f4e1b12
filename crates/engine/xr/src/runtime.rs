//! The seam between the session controller and an XR runtime
//!
//! [`XrRuntime`] mirrors the handful of runtime entry points the controller
//! needs. A loader-backed implementation talks to a real service; the
//! simulated runtime in [`crate::sim`] replays scripted events for tests.
//!
//! Marker and plane tracking live behind optional extensions. Their methods
//! have default bodies that report [`XrError::ExtensionUnsupported`], so a
//! runtime without them only has to implement the core surface.

use crate::error::{Result, XrError};
use crate::types::{
    ActionSetHandle, ActionSnapshot, ApplicationInfo, BlendMode, Extent2D, FormFactor,
    FrameState, InstanceHandle, MarkerDetection, MarkerImage, MarkerTrackerHandle,
    PlaneDetection, PlaneTrackerHandle, SessionHandle, SessionState, SpaceHandle,
    SwapchainHandle, SystemId, View, ViewConfigView, ViewConfiguration,
};

/// Extension name advertised by runtimes that can recognise image markers
pub const MARKER_EXTENSION: &str = "XR_EXT_image_marker_tracking";
/// Extension name advertised by runtimes that can detect planes
pub const PLANE_EXTENSION: &str = "XR_EXT_plane_detection";

/// Everything the runtime needs to create an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCreateInfo {
    pub application: ApplicationInfo,
    /// Extensions to enable, required and optional alike
    pub extensions: Vec<String>,
}

/// Parameters for one swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainCreateInfo {
    pub format: i64,
    pub extent: Extent2D,
    pub sample_count: u32,
    pub array_size: u32,
    pub mip_count: u32,
}

/// One view of the projection layer submitted at end-frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionView {
    pub view: View,
    pub swapchain: SwapchainHandle,
    pub extent: Extent2D,
}

/// Arguments of end-frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEndInfo {
    pub display_time: i64,
    pub blend_mode: BlendMode,
    /// Empty when nothing was rendered this frame
    pub projection_views: Vec<ProjectionView>,
}

/// Reference space the application renders in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceSpace {
    View,
    #[default]
    Local,
    Stage,
}

/// Events delivered by the runtime's event queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuntimeEvent {
    /// The session moved to a new state
    SessionStateChanged {
        session: SessionHandle,
        state: SessionState,
    },
    /// The whole instance is about to be lost
    InstanceLossPending,
    /// Events were dropped because the queue overflowed
    EventsLost { count: u32 },
    /// The active interaction profile changed
    InteractionProfileChanged,
    /// A reference space is about to change
    ReferenceSpaceChangePending,
}

/// The subset of an XR runtime the session controller drives
pub trait XrRuntime {
    /// Extensions the runtime offers
    fn enumerate_extensions(&self) -> Result<Vec<String>>;

    fn create_instance(&mut self, info: &InstanceCreateInfo) -> Result<InstanceHandle>;

    fn destroy_instance(&mut self, instance: InstanceHandle);

    /// Select the system for a form factor
    fn system(&mut self, instance: InstanceHandle, form_factor: FormFactor) -> Result<SystemId>;

    fn enumerate_view_configurations(&self, system: SystemId) -> Result<Vec<ViewConfiguration>>;

    fn enumerate_blend_modes(
        &self,
        system: SystemId,
        view_configuration: ViewConfiguration,
    ) -> Result<Vec<BlendMode>>;

    fn enumerate_view_configuration_views(
        &self,
        system: SystemId,
        view_configuration: ViewConfiguration,
    ) -> Result<Vec<ViewConfigView>>;

    fn create_session(&mut self, system: SystemId) -> Result<SessionHandle>;

    fn destroy_session(&mut self, session: SessionHandle);

    fn create_reference_space(
        &mut self,
        session: SessionHandle,
        space: ReferenceSpace,
    ) -> Result<SpaceHandle>;

    fn create_action_set(&mut self, session: SessionHandle, name: &str)
        -> Result<ActionSetHandle>;

    /// Formats in the runtime's order of preference
    fn enumerate_swapchain_formats(&self, session: SessionHandle) -> Result<Vec<i64>>;

    fn create_swapchain(
        &mut self,
        session: SessionHandle,
        info: &SwapchainCreateInfo,
    ) -> Result<SwapchainHandle>;

    /// Native image handles backing the swapchain
    fn enumerate_swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<u64>>;

    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle);

    /// Next queued event, if any; never blocks
    fn poll_event(&mut self) -> Result<Option<RuntimeEvent>>;

    fn begin_session(
        &mut self,
        session: SessionHandle,
        view_configuration: ViewConfiguration,
    ) -> Result<()>;

    fn end_session(&mut self, session: SessionHandle) -> Result<()>;

    fn request_exit_session(&mut self, session: SessionHandle) -> Result<()>;

    fn sync_actions(
        &mut self,
        session: SessionHandle,
        action_set: ActionSetHandle,
        space: SpaceHandle,
    ) -> Result<ActionSnapshot>;

    fn wait_frame(&mut self, session: SessionHandle) -> Result<FrameState>;

    fn begin_frame(&mut self, session: SessionHandle) -> Result<()>;

    /// Views at the given display time; `None` when tracking is invalid
    fn locate_views(
        &mut self,
        session: SessionHandle,
        view_configuration: ViewConfiguration,
        display_time: i64,
        space: SpaceHandle,
    ) -> Result<Option<Vec<View>>>;

    /// Index of the acquired image
    fn acquire_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<u32>;

    fn wait_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<()>;

    fn release_swapchain_image(&mut self, swapchain: SwapchainHandle) -> Result<()>;

    fn end_frame(&mut self, session: SessionHandle, info: &FrameEndInfo) -> Result<()>;

    fn create_marker_tracker(&mut self, _session: SessionHandle) -> Result<MarkerTrackerHandle> {
        Err(XrError::ExtensionUnsupported(MARKER_EXTENSION))
    }

    /// Register a reference image; returns its database index
    fn add_marker_image(
        &mut self,
        _tracker: MarkerTrackerHandle,
        _image: &MarkerImage,
    ) -> Result<usize> {
        Err(XrError::ExtensionUnsupported(MARKER_EXTENSION))
    }

    /// Markers currently recognised
    fn locate_markers(
        &mut self,
        _tracker: MarkerTrackerHandle,
        _display_time: i64,
        _space: SpaceHandle,
    ) -> Result<Vec<MarkerDetection>> {
        Err(XrError::ExtensionUnsupported(MARKER_EXTENSION))
    }

    fn destroy_marker_tracker(&mut self, _tracker: MarkerTrackerHandle) {}

    fn create_plane_tracker(&mut self, _session: SessionHandle) -> Result<PlaneTrackerHandle> {
        Err(XrError::ExtensionUnsupported(PLANE_EXTENSION))
    }

    /// Planes currently detected
    fn locate_planes(
        &mut self,
        _tracker: PlaneTrackerHandle,
        _display_time: i64,
        _space: SpaceHandle,
    ) -> Result<Vec<PlaneDetection>> {
        Err(XrError::ExtensionUnsupported(PLANE_EXTENSION))
    }

    fn destroy_plane_tracker(&mut self, _tracker: PlaneTrackerHandle) {}
}
