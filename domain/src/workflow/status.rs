//! Workflow lifecycle status.

use serde::{Deserialize, Serialize};

/// Lifecycle of one workflow instance.
///
/// ```text
/// idle → planning → consensus → executing → completed
///           │           │           │
///           └───────────┴───────────┴────→ failed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Idle,
    Planning,
    Consensus,
    Executing,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Idle => "idle",
            WorkflowStatus::Planning => "planning",
            WorkflowStatus::Consensus => "consensus",
            WorkflowStatus::Executing => "executing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
        }
    }

    /// Whether a planning request may be submitted from this status.
    pub fn accepts_submission(&self) -> bool {
        matches!(self, WorkflowStatus::Idle | WorkflowStatus::Failed)
    }

    /// Whether the workflow has reached an end state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
