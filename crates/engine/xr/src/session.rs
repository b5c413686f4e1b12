//! Session-state machine
//!
//! [`SessionLifecycle`] mirrors the state the runtime reports and decides
//! which call the controller owes the runtime in response. It holds no
//! runtime handles, so it can be driven directly in tests.
//!
//! One lifecycle value covers one session instance. Recreating the session
//! means starting over with [`SessionLifecycle::new`].

use crate::types::SessionState;

/// Call the controller must make after a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Nothing to do
    None,
    /// Issue begin-session
    Begin,
    /// Issue end-session
    End,
    /// Tear down session and swapchains; restart if requested
    TearDown { restart: bool },
}

/// Loop control flags reported by `poll_events`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventFlags {
    pub exit_render_loop: bool,
    pub request_restart: bool,
}

impl EventFlags {
    pub const CONTINUE: Self = Self {
        exit_render_loop: false,
        request_restart: false,
    };

    pub const EXIT: Self = Self {
        exit_render_loop: true,
        request_restart: false,
    };

    pub const RESTART: Self = Self {
        exit_render_loop: true,
        request_restart: true,
    };

    /// Combine flags from several events; an exit without restart wins
    pub fn merge(self, other: Self) -> Self {
        let exit_render_loop = self.exit_render_loop || other.exit_render_loop;
        let request_restart = exit_render_loop
            && !((self.exit_render_loop && !self.request_restart)
                || (other.exit_render_loop && !other.request_restart));
        Self {
            exit_render_loop,
            request_restart,
        }
    }
}

/// Mirror of one session's state plus the begin/end bookkeeping
#[derive(Debug, Clone, Default)]
pub struct SessionLifecycle {
    state: SessionState,
    began: bool,
    ended: bool,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// A begin was issued and no end has followed yet
    pub fn is_running(&self) -> bool {
        self.began && !self.ended && self.state.is_active()
    }

    pub fn is_focused(&self) -> bool {
        self.is_running() && self.state == SessionState::Focused
    }

    pub fn has_begun(&self) -> bool {
        self.began
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Record a state reported by the runtime and return the owed call
    pub fn on_state_changed(&mut self, state: SessionState) -> LifecycleAction {
        let previous = self.state;
        self.state = state;

        match state {
            SessionState::Ready if !self.began => LifecycleAction::Begin,
            SessionState::Ready => {
                tracing::warn!(
                    "Ignoring repeated Ready (previous {:?}); session already begun",
                    previous
                );
                LifecycleAction::None
            }
            SessionState::Stopping if self.began && !self.ended => LifecycleAction::End,
            SessionState::Stopping => LifecycleAction::None,
            SessionState::Exiting => LifecycleAction::TearDown { restart: false },
            SessionState::LossPending => LifecycleAction::TearDown { restart: true },
            _ => LifecycleAction::None,
        }
    }

    /// Record that begin-session succeeded
    pub fn mark_begun(&mut self) {
        self.began = true;
    }

    /// Record that end-session was issued
    pub fn mark_ended(&mut self) {
        self.ended = true;
    }

    /// Force the mirror into loss after a call reported the session gone
    pub fn mark_lost(&mut self) -> LifecycleAction {
        self.state = SessionState::LossPending;
        LifecycleAction::TearDown { restart: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(lifecycle: &mut SessionLifecycle, state: SessionState) -> LifecycleAction {
        let action = lifecycle.on_state_changed(state);
        match action {
            LifecycleAction::Begin => lifecycle.mark_begun(),
            LifecycleAction::End => lifecycle.mark_ended(),
            _ => {}
        }
        action
    }

    #[test]
    fn test_ready_begins_exactly_once() {
        let mut lifecycle = SessionLifecycle::new();
        assert_eq!(drive(&mut lifecycle, SessionState::Idle), LifecycleAction::None);
        assert!(!lifecycle.is_running());
        assert_eq!(drive(&mut lifecycle, SessionState::Ready), LifecycleAction::Begin);
        assert!(lifecycle.is_running());
        assert_eq!(drive(&mut lifecycle, SessionState::Ready), LifecycleAction::None);
    }

    #[test]
    fn test_focus_only_in_focused() {
        let mut lifecycle = SessionLifecycle::new();
        for state in [
            SessionState::Idle,
            SessionState::Ready,
            SessionState::Synchronized,
            SessionState::Visible,
        ] {
            drive(&mut lifecycle, state);
            assert!(!lifecycle.is_focused(), "focused in {state:?}");
        }
        drive(&mut lifecycle, SessionState::Focused);
        assert!(lifecycle.is_focused());
        drive(&mut lifecycle, SessionState::Visible);
        assert!(!lifecycle.is_focused());
        assert!(lifecycle.is_running());
    }

    #[test]
    fn test_stopping_ends_once_and_only_after_begin() {
        let mut lifecycle = SessionLifecycle::new();
        assert_eq!(
            drive(&mut lifecycle, SessionState::Stopping),
            LifecycleAction::None,
            "end must not be issued for a session that never began"
        );

        let mut lifecycle = SessionLifecycle::new();
        drive(&mut lifecycle, SessionState::Ready);
        drive(&mut lifecycle, SessionState::Focused);
        assert_eq!(drive(&mut lifecycle, SessionState::Stopping), LifecycleAction::End);
        assert!(!lifecycle.is_running());
        assert_eq!(drive(&mut lifecycle, SessionState::Stopping), LifecycleAction::None);
        assert_eq!(drive(&mut lifecycle, SessionState::Idle), LifecycleAction::None);
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_exit_and_loss_tear_down() {
        let mut lifecycle = SessionLifecycle::new();
        assert_eq!(
            drive(&mut lifecycle, SessionState::Exiting),
            LifecycleAction::TearDown { restart: false }
        );
        let mut lifecycle = SessionLifecycle::new();
        drive(&mut lifecycle, SessionState::Ready);
        assert_eq!(
            drive(&mut lifecycle, SessionState::LossPending),
            LifecycleAction::TearDown { restart: true }
        );
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_mark_lost_stops_running() {
        let mut lifecycle = SessionLifecycle::new();
        drive(&mut lifecycle, SessionState::Ready);
        drive(&mut lifecycle, SessionState::Focused);
        assert_eq!(lifecycle.mark_lost(), LifecycleAction::TearDown { restart: true });
        assert_eq!(lifecycle.state(), SessionState::LossPending);
        assert!(!lifecycle.is_running());
    }

    #[test]
    fn test_flag_merge_prefers_plain_exit() {
        assert_eq!(
            EventFlags::CONTINUE.merge(EventFlags::RESTART),
            EventFlags::RESTART
        );
        assert_eq!(EventFlags::RESTART.merge(EventFlags::EXIT), EventFlags::EXIT);
        assert_eq!(EventFlags::EXIT.merge(EventFlags::CONTINUE), EventFlags::EXIT);
        assert_eq!(
            EventFlags::CONTINUE.merge(EventFlags::CONTINUE),
            EventFlags::CONTINUE
        );
    }
}
