//! Error types for the request wrapper.
//!
//! # Design
//! Every way a request can fail surfaces as a single `FetchError`. The
//! `kind` tells callers which branch failed; the message is always the
//! human-readable text shown to users. A network failure happens before any
//! response exists, so it carries neither a response nor a body.

use serde_json::Value;
use thiserror::Error;

use crate::http::HttpResponse;

/// Which stage of the request/response cycle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The transport failed before a response was received.
    Network,

    /// The server answered with status >= 400.
    Http { status: u16 },

    /// The server answered successfully but the body is not valid JSON
    /// (or does not match the requested type).
    BodyParse,
}

/// Uniform error returned by `RequestExecutor`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct FetchError {
    kind: FetchErrorKind,
    response: Option<HttpResponse>,
    body: Option<Value>,
    message: String,
}

pub(crate) const NETWORK_ERROR_MESSAGE: &str = "Network error has occurred.";

impl FetchError {
    /// Transport failure: fixed message, no response, no body.
    pub fn network() -> Self {
        Self {
            kind: FetchErrorKind::Network,
            response: None,
            body: None,
            message: NETWORK_ERROR_MESSAGE.to_string(),
        }
    }

    /// Status >= 400. `body` is the error body if it parsed as JSON.
    pub fn http(response: HttpResponse, body: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Http {
                status: response.status,
            },
            response: Some(response),
            body,
            message: message.into(),
        }
    }

    /// Successful status whose body could not be decoded; `message` is the
    /// decoder's error text.
    pub fn body_parse(response: HttpResponse, message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::BodyParse,
            response: Some(response),
            body: None,
            message: message.into(),
        }
    }

    /// Which stage of the cycle failed.
    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    /// Status code of the failed response, if one was received.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// The response, unless the failure happened before one arrived.
    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    /// Parsed error body. Only set for HTTP errors whose body was valid JSON.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Human-readable text, also used as the `Display` output.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Misuse of `ActivityTracker`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    #[error("activity counter mismatch: end called without matching start")]
    CounterMismatch,
}

/// Failure inside a `Transport` before a complete response was obtained.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request could not be built: {0}")]
    InvalidRequest(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("response body could not be read: {0}")]
    Body(String),

    #[error(transparent)]
    Other(#[from] reqwest::Error),
}

/// Invalid `FetchConfig` input.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            status_text: "Not Found".to_string(),
            headers: Vec::new(),
            body: r#"{"error":{"message":"gone"}}"#.to_string(),
        }
    }

    #[test]
    fn network_error_has_no_response_or_body() {
        let err = FetchError::network();
        assert_eq!(err.kind(), FetchErrorKind::Network);
        assert_eq!(err.to_string(), "Network error has occurred.");
        assert!(err.response().is_none());
        assert!(err.body().is_none());
        assert!(err.status().is_none());
    }

    #[test]
    fn http_error_keeps_response_and_body() {
        let body = serde_json::json!({"error": {"message": "gone"}});
        let err = FetchError::http(response(404), Some(body.clone()), "Error 404: gone");
        assert_eq!(err.kind(), FetchErrorKind::Http { status: 404 });
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.body(), Some(&body));
        assert_eq!(err.message(), "Error 404: gone");
    }

    #[test]
    fn body_parse_error_drops_body() {
        let err = FetchError::body_parse(response(200), "expected value at line 1 column 1");
        assert_eq!(err.kind(), FetchErrorKind::BodyParse);
        assert!(err.body().is_none());
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn activity_error_message() {
        assert_eq!(
            ActivityError::CounterMismatch.to_string(),
            "activity counter mismatch: end called without matching start"
        );
    }
}
