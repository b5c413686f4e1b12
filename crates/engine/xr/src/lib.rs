//! Immersive session controller
//!
//! This crate holds everything between the frame loop and an XR runtime:
//!
//! - [`XrRuntime`]: the seam to the runtime service
//! - [`GraphicsBackend`] / [`PlatformBackend`]: the external collaborators
//! - [`Program`] / [`XrProgram`]: the session controller the loop drives
//! - [`SessionLifecycle`]: the session-state machine
//! - [`SwapchainSet`]: per-view swapchains
//! - [`MarkerTracking`] / [`PlaneTracking`]: optional AR tracking
//!
//! # Features
//!
//! - `sim` (default): the simulated runtime in [`sim`]
//! - `openxr`: `openxr_runtime::OpenXrRuntime`, bound to the system loader

pub mod error;
pub mod graphics;
pub mod marker;
pub mod options;
pub mod plane;
pub mod platform;
pub mod program;
pub mod runtime;
pub mod scene;
pub mod session;
pub mod swapchain;
pub mod tracking;
pub mod types;

#[cfg(feature = "openxr")]
pub mod openxr_runtime;
#[cfg(feature = "sim")]
pub mod sim;

pub use error::{Result, Severity, XrError};
pub use graphics::{
    CubeInstance, GraphicsBackend, RenderTargetDesc, ViewSubmission, FORMAT_RGBA8,
    FORMAT_SRGB8_ALPHA8, HEADLESS_EXTENSION,
};
pub use marker::{MarkerDatabase, MarkerObservation, MarkerTracking};
pub use options::Options;
pub use plane::{PlaneObservation, PlaneTracking};
pub use platform::{NativeWindow, PlatformBackend};
pub use program::{Program, XrProgram};
pub use runtime::{RuntimeEvent, XrRuntime, MARKER_EXTENSION, PLANE_EXTENSION};
pub use scene::AnchorScene;
pub use session::{EventFlags, LifecycleAction, SessionLifecycle};
pub use swapchain::{Swapchain, SwapchainSet};
pub use tracking::{Lifecycle, Observation, ObservationTracker};
pub use types::{
    ApplicationInfo, BlendMode, Extent2D, FormFactor, MarkerId, MarkerImage, PlaneId, Pose,
    SessionState, ViewConfiguration,
};
