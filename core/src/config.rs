//! Runtime configuration for the default transport and event bus.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::events::DEFAULT_EVENT_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Connect timeout in milliseconds. `None` leaves it to the client.
    #[serde(rename = "connect_timeout_ms")]
    pub connect_timeout: Option<u64>,
    pub event_capacity: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("fetch-core/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `FETCH_USER_AGENT`, `FETCH_CONNECT_TIMEOUT_MS`
    /// and `FETCH_EVENT_CAPACITY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(agent) = lookup("FETCH_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(raw) = lookup("FETCH_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = Some(parse_number("FETCH_CONNECT_TIMEOUT_MS", raw)?);
        }
        if let Some(raw) = lookup("FETCH_EVENT_CAPACITY") {
            config.event_capacity = parse_number("FETCH_EVENT_CAPACITY", raw)?;
        }
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout.map(Duration::from_millis)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
