//! Host-side application state and process control

use xr::platform::NativeWindow;

use crate::events::HostEvent;
use crate::platform::WindowSlot;

/// What the host has told the application so far
#[derive(Debug, Clone, Default)]
pub struct AppState {
    resumed: bool,
    window: Option<NativeWindow>,
    destroy_requested: bool,
    window_slot: Option<WindowSlot>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror window changes into the platform backend's slot
    pub fn with_window_slot(mut self, slot: WindowSlot) -> Self {
        self.window_slot = Some(slot);
        self
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn window(&self) -> Option<NativeWindow> {
        self.window
    }

    pub fn destroy_requested(&self) -> bool {
        self.destroy_requested
    }

    /// Apply one host event
    pub fn apply(&mut self, event: HostEvent) {
        match event {
            HostEvent::Start => tracing::info!("Host: start"),
            HostEvent::Resume => {
                tracing::info!("Host: resume");
                self.resumed = true;
            }
            HostEvent::Pause => {
                tracing::info!("Host: pause");
                self.resumed = false;
            }
            HostEvent::Stop => tracing::info!("Host: stop"),
            HostEvent::DestroyRequested => {
                tracing::info!("Host: destroy requested");
                self.destroy_requested = true;
            }
            HostEvent::WindowInit(window) => {
                tracing::info!("Host: window {:?} available", window);
                self.set_window(Some(window));
            }
            HostEvent::WindowTerm => {
                tracing::info!("Host: window terminated");
                self.set_window(None);
            }
            HostEvent::Key { code, action } => {
                tracing::debug!("Host: key {} {:?}", code, action);
            }
        }
    }

    fn set_window(&mut self, window: Option<NativeWindow>) {
        self.window = window;
        if let Some(slot) = &self.window_slot {
            slot.set(window);
        }
    }
}

/// Process-level actions the frame loop takes when it leaves for good
pub trait HostControl {
    /// Ask the host to finish the activity
    fn finish(&mut self);

    /// End the process
    fn terminate(&mut self);
}

/// Host control for a plain desktop process
///
/// Finishing has nothing to close. Terminating is recorded here and carried
/// out by the binary with `std::process::exit` once its outputs are written.
#[derive(Debug, Default)]
pub struct ProcessHost {
    finished: bool,
    terminated: bool,
}

impl ProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl HostControl for ProcessHost {
    fn finish(&mut self) {
        tracing::info!("Finishing host activity");
        self.finished = true;
    }

    fn terminate(&mut self) {
        tracing::info!("Terminating process");
        self.terminated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeyAction;

    #[test]
    fn test_resume_and_pause_toggle() {
        let mut state = AppState::new();
        assert!(!state.is_resumed());
        state.apply(HostEvent::Resume);
        assert!(state.is_resumed());
        state.apply(HostEvent::Pause);
        assert!(!state.is_resumed());
    }

    #[test]
    fn test_window_changes_reach_slot() {
        let slot = WindowSlot::new();
        let mut state = AppState::new().with_window_slot(slot.clone());
        state.apply(HostEvent::WindowInit(NativeWindow(3)));
        assert_eq!(state.window(), Some(NativeWindow(3)));
        assert_eq!(slot.get(), Some(NativeWindow(3)));
        state.apply(HostEvent::WindowTerm);
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn test_other_signals_only_log() {
        let mut state = AppState::new();
        state.apply(HostEvent::Start);
        state.apply(HostEvent::Key {
            code: 4,
            action: KeyAction::Down,
        });
        state.apply(HostEvent::Stop);
        assert!(!state.is_resumed());
        assert!(!state.destroy_requested());
        state.apply(HostEvent::DestroyRequested);
        assert!(state.destroy_requested());
    }

    #[test]
    fn test_process_host_records_requests() {
        let mut host = ProcessHost::new();
        assert!(!host.is_finished());
        assert!(!host.is_terminated());
        host.finish();
        assert!(host.is_finished());
        assert!(!host.is_terminated());
        host.terminate();
        assert!(host.is_terminated());
    }
}
