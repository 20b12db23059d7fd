//! Workflow configuration from TOML (`[workflow]` section)

use conclave_domain::workflow::DEFAULT_MAX_EVENTS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw workflow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWorkflowConfig {
    /// Coordination events kept in memory
    pub max_events: usize,
    /// JSONL journal of workflow transitions, disabled when unset
    pub journal: Option<PathBuf>,
}

impl Default for FileWorkflowConfig {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            journal: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_path() {
        let toml_str = r#"
[workflow]
journal = "/var/log/conclave/workflow.jsonl"
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.workflow.max_events, 100);
        assert_eq!(
            config.workflow.journal,
            Some(PathBuf::from("/var/log/conclave/workflow.jsonl"))
        );
    }
}
