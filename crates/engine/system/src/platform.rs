//! Platform detection and the host side of instance creation

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use xr::platform::{NativeWindow, PlatformBackend};
use xr::types::ApplicationInfo;

/// Instance extension Android runtimes need to reach the activity
pub const ANDROID_CREATE_INSTANCE_EXTENSION: &str = "XR_KHR_android_create_instance";

/// Target platform for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Desktop runtime (Windows, macOS, Linux)
    Desktop,
    /// Standalone headset or phone running Android
    Android,
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl Platform {
    /// Detect the current platform at compile time
    #[inline]
    pub const fn current() -> Self {
        #[cfg(target_os = "android")]
        {
            Self::Android
        }
        #[cfg(not(target_os = "android"))]
        {
            Self::Desktop
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Desktop => "Desktop",
            Self::Android => "Android",
        }
    }

    /// Extensions the runtime needs to bind to this platform
    pub fn instance_extensions(&self) -> Vec<String> {
        match self {
            Self::Desktop => Vec::new(),
            Self::Android => vec![ANDROID_CREATE_INSTANCE_EXTENSION.to_string()],
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Native window shared between the host thread and the controller
///
/// The host stores the window on window-init and clears it on
/// window-term; the platform backend reads it at instance creation.
#[derive(Debug, Clone, Default)]
pub struct WindowSlot(Arc<Mutex<Option<NativeWindow>>>);

impl WindowSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, window: Option<NativeWindow>) {
        match self.0.lock() {
            Ok(mut slot) => *slot = window,
            Err(poisoned) => *poisoned.into_inner() = window,
        }
    }

    pub fn get(&self) -> Option<NativeWindow> {
        match self.0.lock() {
            Ok(slot) => *slot,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Platform backend for the process the controller runs in
#[derive(Debug, Clone)]
pub struct HostPlatform {
    platform: Platform,
    application: ApplicationInfo,
    window: WindowSlot,
}

impl HostPlatform {
    pub fn new(application: ApplicationInfo) -> Self {
        Self {
            platform: Platform::current(),
            application,
            window: WindowSlot::new(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Handle the host writes window changes into
    pub fn window_slot(&self) -> WindowSlot {
        self.window.clone()
    }
}

impl PlatformBackend for HostPlatform {
    fn application_info(&self) -> ApplicationInfo {
        self.application.clone()
    }

    fn instance_extensions(&self) -> Vec<String> {
        self.platform.instance_extensions()
    }

    fn native_window(&self) -> Option<NativeWindow> {
        self.window.get()
    }
}
