//! Inbound events merged into workflow state.

use crate::coordination::{Agent, CoordinationEvent, OrchestrationSession};
use crate::core::ids::CoordinationId;
use serde::{Deserialize, Serialize};

/// One decoded update from the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum WorkflowEvent {
    #[serde(rename = "coordination_event")]
    CoordinationEventReceived(CoordinationEvent),
    SessionUpdated(OrchestrationSession),
    AgentUpdated(Agent),
}

impl WorkflowEvent {
    /// Coordination id the payload belongs to.
    pub fn coordination_id(&self) -> &CoordinationId {
        match self {
            WorkflowEvent::CoordinationEventReceived(e) => &e.coordination_id,
            WorkflowEvent::SessionUpdated(s) => &s.coordination_id,
            WorkflowEvent::AgentUpdated(a) => &a.coordination_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::CoordinationEventReceived(_) => "coordination_event",
            WorkflowEvent::SessionUpdated(_) => "session_updated",
            WorkflowEvent::AgentUpdated(_) => "agent_updated",
        }
    }
}
