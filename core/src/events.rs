//! Broadcast notifications for UI collaborators (spinners, toast banners).
//!
//! # Design
//! Notifications are fire-and-forget: emitting with no subscribers is not an
//! error, and a subscriber that falls behind loses the oldest events rather
//! than stalling requests.

use tokio::sync::broadcast;

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// A lifecycle or failure notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// The in-flight counter went from 0 to 1.
    ActivityStarted,
    /// The in-flight counter went from 1 to 0.
    ActivityEnded,
    /// A request failed; carries the user-facing message.
    FetchError(String),
    /// A failed request reached the top-level `ErrorBoundary` unhandled.
    Unhandled(String),
}

/// Cloneable handle to a broadcast channel of `FetchEvent`s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<FetchEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FetchEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: FetchEvent) {
        tracing::trace!(?event, "emit");
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
