//! HTTP API and event stream endpoints (`[api]` and `[events]` sections)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default base URL of the planning API
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// Default websocket URL of the coordination event stream
pub const DEFAULT_EVENTS_URL: &str = "ws://localhost:8080/ws/coordination";

/// Raw `[api]` configuration
///
/// ```toml
/// [api]
/// base_url = "https://planner.internal"
/// timeout_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileApiConfig {
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FileApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl FileApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Raw `[events]` configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEventsConfig {
    /// Websocket URL (`ws://` or `wss://`)
    pub url: String,
    /// Limit on one websocket handshake, in seconds
    pub connect_timeout_secs: u64,
}

impl Default for FileEventsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_EVENTS_URL.to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl FileEventsConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
