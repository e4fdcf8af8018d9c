//! Single request/response cycle with uniform error classification.
//!
//! # Design
//! `execute` wraps one round-trip in an `ActivityGuard`, so the in-flight
//! counter is released exactly once on every exit path: transport failure,
//! HTTP error, undecodable body, success, or the future being dropped midway.
//! The guard is released before the failure is broadcast, so a
//! `FetchError` notification always follows the matching `ActivityEnded`.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::activity::ActivityTracker;
use crate::config::FetchConfig;
use crate::error::{ConfigError, FetchError};
use crate::events::{EventBus, FetchEvent};
use crate::http::{HttpRequest, HttpResponse, RequestOptions};
use crate::transport::{ReqwestTransport, Transport};

/// Runs requests through a `Transport` and reports their activity on a
/// shared `ActivityTracker`.
///
/// Cloning an executor shares the tracker; executors built separately share
/// it only when given clones of the same tracker.
#[derive(Debug, Clone)]
pub struct RequestExecutor<T> {
    transport: T,
    tracker: ActivityTracker,
}

impl RequestExecutor<ReqwestTransport> {
    /// Executor over `reqwest` with a fresh tracker and event bus.
    pub fn from_config(config: &FetchConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::from_config(config)?;
        let tracker = ActivityTracker::new(EventBus::with_capacity(config.event_capacity));
        Ok(Self::new(transport, tracker))
    }
}

impl<T: Transport> RequestExecutor<T> {
    /// Executor over `transport` that reports to `tracker` and to the
    /// tracker's event bus.
    pub fn new(transport: T, tracker: ActivityTracker) -> Self {
        Self { transport, tracker }
    }

    /// The in-flight counter this executor registers with.
    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    /// Bus carrying activity edges and `FetchEvent::FetchError` for every
    /// failed request.
    pub fn events(&self) -> &EventBus {
        self.tracker.events()
    }

    /// Perform the request and return the JSON body.
    ///
    /// `target` is rendered with `Display` before dispatch, so `&str`,
    /// `String` and `reqwest::Url` all work.
    pub async fn execute(
        &self,
        target: impl fmt::Display,
        options: RequestOptions,
    ) -> Result<Value, FetchError> {
        self.execute_as(target, options).await
    }

    /// Like `execute`, but decodes the body into `R`. A body that does not
    /// match `R` is reported as a body parse error.
    pub async fn execute_as<R: DeserializeOwned>(
        &self,
        target: impl fmt::Display,
        options: RequestOptions,
    ) -> Result<R, FetchError> {
        let request = options.into_request(target.to_string());
        tracing::debug!(method = %request.method, url = %redacted(&request.url), "dispatching request");

        let outcome = {
            let _activity = self.tracker.track();
            self.round_trip(request).await
        };
        outcome.map_err(|err| self.fail(err))
    }

    async fn round_trip<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R, FetchError> {
        let response = self.fetch(request).await?;
        match serde_json::from_str(&response.body) {
            Ok(value) => Ok(value),
            Err(err) => Err(FetchError::body_parse(response, err.to_string())),
        }
    }

    /// Send the request and turn transport failures and error statuses into
    /// `FetchError`. Returns successful responses with the body still raw.
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(%err, "transport failed");
                return Err(FetchError::network());
            }
        };

        if response.is_success() {
            return Ok(response);
        }

        // A body that fails to parse must not hide the status error.
        let body = serde_json::from_str::<Value>(&response.body).ok();
        let message = format!(
            "Error {}: {}",
            response.status,
            error_text(&response, body.as_ref())
        );
        Err(FetchError::http(response, body, message))
    }

    /// Log and broadcast a failure, then hand it back for propagation.
    fn fail(&self, err: FetchError) -> FetchError {
        tracing::warn!(kind = ?err.kind(), message = %err.message(), "request failed");
        self.events().emit(FetchEvent::FetchError(err.message().to_string()));
        err
    }
}

/// Pick the most specific error description available: `error.message`,
/// then `data.error.message`, then the reason phrase, then a generic line.
fn error_text(response: &HttpResponse, body: Option<&Value>) -> String {
    let from_body = body.and_then(|body| {
        message_at(body.pointer("/error/message"))
            .or_else(|| message_at(body.pointer("/data/error/message")))
    });
    from_body
        .or_else(|| (!response.status_text.is_empty()).then(|| response.status_text.clone()))
        .unwrap_or_else(|| format!("HTTP status {}", response.status))
}

/// Render a message field. Empty strings, null, false and zero count as
/// absent. Any other value is rendered the way a string template would:
/// objects become `[object Object]`, arrays join their elements with commas.
fn message_at(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Null | Value::Bool(false) => None,
        other => Some(template_text(other)),
    }
}

fn template_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(_) => "[object Object]".to_string(),
        Value::Array(items) => items
            .iter()
            .map(template_text)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// The target with userinfo, query and fragment removed, for logging.
fn redacted(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut url) => {
            // Only fails for URLs that cannot carry userinfo at all.
            let _ = url.set_username("");
            let _ = url.set_password(None);
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}
