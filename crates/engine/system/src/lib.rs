//! System crate - host integration for the XR session client
//!
//! # Modules
//!
//! - [`platform`]: Platform detection and the [`xr::PlatformBackend`] used at instance creation
//! - [`events`]: Host lifecycle signals and the queue the frame loop drains
//! - [`host`]: Application state mirrored from host signals and process control
//! - [`properties`]: Option loading from `debug.xr.*` properties

pub mod events;
pub mod host;
pub mod platform;
pub mod properties;

// Re-export commonly used types at crate root
pub use events::{EventSource, HostEvent, HostEventQueue, HostEventSender, KeyAction};
pub use host::{AppState, HostControl, ProcessHost};
pub use platform::{HostPlatform, Platform, WindowSlot, ANDROID_CREATE_INSTANCE_EXTENSION};
pub use properties::{
    load_options, show_help, EnvProperties, MapProperties, OptionsError, PropertySource,
    TomlProperties,
};
