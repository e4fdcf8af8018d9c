//! Shared counter of in-flight requests.
//!
//! # Design
//! `ActivityTracker` is constructed explicitly and cloned into every place
//! that issues requests; all clones share one counter. Boundary notifications
//! are emitted only on the 0→1 and 1→0 transitions, so overlapping requests
//! produce a single started/ended pair.
//!
//! The counter update and the notification are done under the same lock.
//! That keeps "started" ahead of "ended" for a cycle even when requests run
//! on different worker threads.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ActivityError;
use crate::events::{EventBus, FetchEvent};

/// Counter of requests in flight, shared by every clone.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    counter: Mutex<usize>,
    events: EventBus,
}

impl ActivityTracker {
    /// Tracker starting at zero that announces its edges on `events`.
    pub fn new(events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                counter: Mutex::new(0),
                events,
            }),
        }
    }

    /// Bus the started/ended notifications are emitted on.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        *self.lock()
    }

    /// Register one more request. Emits `ActivityStarted` on the 0→1 edge.
    pub fn start(&self) {
        let mut counter = self.lock();
        if *counter == 0 {
            tracing::debug!("activity started");
            self.inner.events.emit(FetchEvent::ActivityStarted);
        }
        *counter += 1;
    }

    /// Deregister a request. Emits `ActivityEnded` on the 1→0 edge.
    ///
    /// Fails with `CounterMismatch`, leaving the counter at zero, when there
    /// is nothing to end.
    pub fn end(&self) -> Result<(), ActivityError> {
        let mut counter = self.lock();
        if *counter == 0 {
            return Err(ActivityError::CounterMismatch);
        }
        *counter -= 1;
        if *counter == 0 {
            tracing::debug!("activity ended");
            self.inner.events.emit(FetchEvent::ActivityEnded);
        }
        Ok(())
    }

    /// Start an activity that ends when the returned guard is dropped.
    pub fn track(&self) -> ActivityGuard {
        self.start();
        ActivityGuard {
            tracker: self.clone(),
        }
    }

    // The counter is a plain integer, so a poisoned lock still holds a
    // consistent value.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.inner
            .counter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new(EventBus::new())
    }
}

/// Ends its activity exactly once, on drop.
#[must_use = "the activity ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ActivityGuard {
    tracker: ActivityTracker,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracker.end() {
            tracing::error!(%err, "activity guard released without a matching start");
        }
    }
}
