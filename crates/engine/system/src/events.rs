//! Host lifecycle signals
//!
//! Host callbacks may arrive on any thread. They are posted through a
//! [`HostEventSender`] and drained by the frame loop at the top of each
//! iteration, so the loop sees them in order and on its own thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use xr::platform::NativeWindow;

/// Key state carried by [`HostEvent::Key`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Down,
    Up,
}

/// A signal from the host process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Start,
    Resume,
    Pause,
    Stop,
    /// The host wants the process gone
    DestroyRequested,
    /// A native window became available
    WindowInit(NativeWindow),
    /// The native window is going away
    WindowTerm,
    Key { code: u32, action: KeyAction },
}

/// Anything the frame loop can pull host events from
pub trait EventSource {
    /// Next event, waiting up to `timeout`; `None` waits until one arrives
    ///
    /// Returns `None` when the timeout elapses or no sender remains.
    fn next_event(&mut self, timeout: Option<Duration>) -> Option<HostEvent>;
}

/// Cloneable handle for posting host events
#[derive(Debug, Clone)]
pub struct HostEventSender(Sender<HostEvent>);

impl HostEventSender {
    /// Post an event; returns false once the queue is gone
    pub fn send(&self, event: HostEvent) -> bool {
        self.0.send(event).is_ok()
    }
}

/// Receiving end drained by the frame loop
#[derive(Debug)]
pub struct HostEventQueue {
    receiver: Receiver<HostEvent>,
    disconnected: bool,
}

impl HostEventQueue {
    pub fn new() -> (HostEventSender, Self) {
        let (sender, receiver) = mpsc::channel();
        (
            HostEventSender(sender),
            Self {
                receiver,
                disconnected: false,
            },
        )
    }

    /// Every sender has been dropped
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl EventSource for HostEventQueue {
    fn next_event(&mut self, timeout: Option<Duration>) -> Option<HostEvent> {
        if self.disconnected {
            return None;
        }
        let received = match timeout {
            None => self.receiver.recv().ok(),
            Some(timeout) if timeout.is_zero() => match self.receiver.try_recv() {
                Ok(event) => Some(event),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => None,
            },
            Some(timeout) => match self.receiver.recv_timeout(timeout) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => None,
            },
        };
        if received.is_none() {
            tracing::debug!("Host event queue disconnected");
            self.disconnected = true;
        }
        received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_events_arrive_in_order() {
        let (sender, mut queue) = HostEventQueue::new();
        sender.send(HostEvent::Start);
        sender.send(HostEvent::Resume);
        assert_eq!(queue.next_event(Some(Duration::ZERO)), Some(HostEvent::Start));
        assert_eq!(queue.next_event(Some(Duration::ZERO)), Some(HostEvent::Resume));
        assert_eq!(queue.next_event(Some(Duration::ZERO)), None);
        assert!(!queue.is_disconnected());
    }

    #[test]
    fn test_unbounded_wait_receives_from_other_thread() {
        let (sender, mut queue) = HostEventQueue::new();
        let host = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender.send(HostEvent::WindowInit(NativeWindow(7)));
        });
        assert_eq!(
            queue.next_event(None),
            Some(HostEvent::WindowInit(NativeWindow(7)))
        );
        host.join().unwrap();
    }

    #[test]
    fn test_dropped_sender_disconnects() {
        let (sender, mut queue) = HostEventQueue::new();
        drop(sender);
        assert_eq!(queue.next_event(None), None);
        assert!(queue.is_disconnected());
    }
}
