//! Top-level handler for request failures nobody else dealt with.
//!
//! # Design
//! The hosting application decides where its outermost boundary is and wraps
//! that future with `ErrorBoundary::run`. Failures that reach it are
//! announced as `FetchEvent::Unhandled` and passed to the application's alert
//! hook, so an uncaught failure is loud by default without any global hook.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::FetchError;
use crate::events::{EventBus, FetchEvent};

type AlertFn = dyn Fn(&str) + Send + Sync;

#[derive(Clone)]
pub struct ErrorBoundary {
    events: EventBus,
    alert: Arc<AlertFn>,
}

impl ErrorBoundary {
    pub fn new(events: EventBus, alert: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            events,
            alert: Arc::new(alert),
        }
    }

    /// Boundary whose alert is an `error!` log line.
    pub fn logging(events: EventBus) -> Self {
        Self::new(events, |message| tracing::error!(%message, "unhandled request failure"))
    }

    /// Await `fut`; on failure report it and return `None`.
    pub async fn run<T, F>(&self, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, FetchError>>,
    {
        match fut.await {
            Ok(value) => Some(value),
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    pub fn report(&self, err: &FetchError) {
        let message = err.message();
        self.events.emit(FetchEvent::Unhandled(message.to_string()));
        (self.alert)(message);
    }
}

impl fmt::Debug for ErrorBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorBoundary")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}
