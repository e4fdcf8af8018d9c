//! JSON request wrapper with uniform errors and in-flight activity tracking.
//!
//! # Overview
//! `RequestExecutor::execute` performs one request through a `Transport`,
//! returns the decoded JSON body, and folds every failure (transport error,
//! status >= 400, undecodable body) into a single `FetchError`. A shared
//! `ActivityTracker` counts requests in flight and announces the idle/busy
//! edges on an `EventBus`, which UI collaborators such as spinners and toast
//! banners subscribe to.
//!
//! # Design
//! - No hidden globals: the tracker, event bus and `ErrorBoundary` are built
//!   by the host and passed to whoever needs them.
//! - The network primitive sits behind `Transport`; `ReqwestTransport` is
//!   the default and tests substitute scripted transports.
//! - No retries, caching, deduplication or cancellation. Timeouts are a
//!   transport option.

pub mod activity;
pub mod boundary;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod http;
pub mod transport;

pub use activity::{ActivityGuard, ActivityTracker};
pub use boundary::ErrorBoundary;
pub use config::FetchConfig;
pub use error::{ActivityError, ConfigError, FetchError, FetchErrorKind, TransportError};
pub use events::{EventBus, FetchEvent};
pub use executor::RequestExecutor;
pub use http::{Credentials, HttpMethod, HttpRequest, HttpResponse, RequestOptions};
pub use transport::{ReqwestTransport, Transport};
