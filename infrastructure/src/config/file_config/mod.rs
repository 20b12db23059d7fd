//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application types
//! ([`EngineConfig`], [`RetryPolicy`](conclave_application::RetryPolicy)) at
//! the wiring boundary.

mod api;
mod consensus;
mod retry;
mod workflow;

pub use api::{DEFAULT_API_BASE_URL, DEFAULT_EVENTS_URL, FileApiConfig, FileEventsConfig};
pub use consensus::FileConsensusConfig;
pub use retry::FileRetryConfig;
pub use workflow::FileWorkflowConfig;

use conclave_application::EngineConfig;
use conclave_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Planning API endpoint
    pub api: FileApiConfig,
    /// Coordination event stream endpoint
    pub events: FileEventsConfig,
    pub retry: FileRetryConfig,
    /// Consensus round tunables
    pub consensus: FileConsensusConfig,
    pub workflow: FileWorkflowConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        for (field, value) in [
            ("api.base_url", &self.api.base_url),
            ("events.url", &self.events.url),
        ] {
            if value.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyValue {
                        field: field.to_string(),
                    },
                    format!("{field} must not be empty"),
                ));
            }
        }

        let events_url = self.events.url.trim();
        if !events_url.is_empty()
            && !(events_url.starts_with("ws://") || events_url.starts_with("wss://"))
        {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidEnumValue {
                    field: "events.url".to_string(),
                    value: self.events.url.clone(),
                    valid_values: vec!["ws://...".to_string(), "wss://...".to_string()],
                },
                format!("events.url: '{}' is not a websocket URL", self.events.url),
            ));
        }

        if self.api.timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "api.timeout_secs".to_string(),
                    value: "0".to_string(),
                    range: "> 0".to_string(),
                },
                "api.timeout_secs: 0 makes every request time out immediately",
            ));
        }

        if self.events.connect_timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "events.connect_timeout_secs".to_string(),
                    value: "0".to_string(),
                    range: "> 0".to_string(),
                },
                "events.connect_timeout_secs: 0 makes every connect attempt time out",
            ));
        }

        issues.extend(self.consensus.to_round_settings().1);

        if self.workflow.max_events == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "workflow.max_events".to_string(),
                    value: "0".to_string(),
                    range: ">= 1".to_string(),
                },
                "workflow.max_events: 0 is raised to 1",
            ));
        }

        issues
    }

    /// Map onto the engine's parameters.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_retry(self.retry.to_policy())
            .with_round_settings(self.consensus.to_round_settings().0)
            .with_max_events(self.workflow.max_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[api]
base_url = "http://planner:9000"
timeout_secs = 10

[events]
url = "ws://planner:9000/ws"

[retry]
max_retries = 5
base_delay_ms = 250

[consensus]
timeout_ms = 60000

[workflow]
max_events = 50
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_empty());

        let engine = config.to_engine_config();
        assert_eq!(engine.retry.max_retries, 5);
        assert_eq!(engine.retry.base_delay, Duration::from_millis(250));
        assert_eq!(engine.round_timeout(), Duration::from_secs(60));
        assert_eq!(engine.max_events, 50);
    }

    #[test]
    fn test_default_config() {
        let config = FileConfig::default();
        assert_eq!(config.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.events.url, DEFAULT_EVENTS_URL);
        assert!(config.workflow.journal.is_none());
        assert_eq!(config.to_engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(FileConfig::default().validate().is_empty());
    }

    #[test]
    fn test_validate_reports_every_issue() {
        let toml_str = r#"
[api]
base_url = ""

[events]
url = "http://planner/ws"

[consensus]
convergence_step = 0.0

[workflow]
max_events = 0
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();

        assert_eq!(issues.len(), 4);
        assert_eq!(issues.iter().filter(|i| i.is_error()).count(), 2);
        assert!(matches!(
            &issues[0].code,
            ConfigIssueCode::EmptyValue { field } if field == "api.base_url"
        ));
        assert_eq!(config.to_engine_config().max_events, 1);
    }
}
