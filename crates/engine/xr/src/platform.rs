//! Platform backend contract
//!
//! Supplies what the runtime needs to know about the host before an instance
//! can exist: who the application is, which platform extensions to enable,
//! and whether a native window is currently available.

use crate::types::ApplicationInfo;

/// Opaque native window token (an `ANativeWindow*` or a window id on desktop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeWindow(pub u64);

/// OS integration the controller needs to create an instance
pub trait PlatformBackend {
    fn application_info(&self) -> ApplicationInfo;

    /// Platform-specific instance extensions
    fn instance_extensions(&self) -> Vec<String>;

    /// The native window, while the host has one
    fn native_window(&self) -> Option<NativeWindow>;
}
