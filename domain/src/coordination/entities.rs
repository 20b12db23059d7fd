//! Coordination entities observed over the event stream.
//!
//! These payloads arrive as snapshots (sessions, agents) or immutable facts
//! (coordination events). All of them carry a coordination id so the
//! workflow can drop updates that belong to a replaced execution.

use super::keyed::Keyed;
use crate::core::ids::CoordinationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a [`CoordinationEvent`].
///
/// Unknown wire values are preserved in [`CoordinationEventType::Other`]
/// so they still round-trip to observers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CoordinationEventType {
    AgentSpawned,
    AgentStatusChanged,
    TaskAssigned,
    TaskCompleted,
    ConsensusVote,
    ConsensusReached,
    MessageSent,
    Error,
    Other(String),
}

impl CoordinationEventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AgentSpawned => "agent_spawned",
            Self::AgentStatusChanged => "agent_status_changed",
            Self::TaskAssigned => "task_assigned",
            Self::TaskCompleted => "task_completed",
            Self::ConsensusVote => "consensus_vote",
            Self::ConsensusReached => "consensus_reached",
            Self::MessageSent => "message_sent",
            Self::Error => "error",
            Self::Other(s) => s,
        }
    }

    /// Whether this event moves a consensus round's convergence.
    pub fn is_consensus_relevant(&self) -> bool {
        matches!(
            self,
            Self::ConsensusVote | Self::ConsensusReached | Self::AgentStatusChanged
        )
    }
}

impl From<String> for CoordinationEventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "agent_spawned" => Self::AgentSpawned,
            "agent_status_changed" => Self::AgentStatusChanged,
            "task_assigned" => Self::TaskAssigned,
            "task_completed" => Self::TaskCompleted,
            "consensus_vote" => Self::ConsensusVote,
            "consensus_reached" => Self::ConsensusReached,
            "message_sent" => Self::MessageSent,
            "error" => Self::Error,
            _ => Self::Other(s),
        }
    }
}

impl From<CoordinationEventType> for String {
    fn from(t: CoordinationEventType) -> Self {
        match t {
            CoordinationEventType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for CoordinationEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable fact about coordination activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationEvent {
    pub id: String,
    pub coordination_id: CoordinationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: CoordinationEventType,
    /// Wire timestamp; not used for ordering (receipt order wins)
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CoordinationEvent {
    pub fn new(
        id: impl Into<String>,
        coordination_id: impl Into<CoordinationId>,
        event_type: CoordinationEventType,
    ) -> Self {
        Self {
            id: id.into(),
            coordination_id: coordination_id.into(),
            agent_id: None,
            event_type,
            timestamp: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }
}

impl Keyed for CoordinationEvent {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Cost and token usage reported for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionMetrics {
    pub cost: f64,
    pub tokens_used: u64,
}

/// A running or finished unit of work tied to a coordination id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationSession {
    pub session_id: String,
    pub coordination_id: CoordinationId,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub metrics: SessionMetrics,
    pub start_time: DateTime<Utc>,
}

impl OrchestrationSession {
    pub fn new(
        session_id: impl Into<String>,
        coordination_id: impl Into<CoordinationId>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            coordination_id: coordination_id.into(),
            status: "running".to_string(),
            metrics: SessionMetrics::default(),
            start_time,
        }
    }

    pub fn with_metrics(mut self, cost: f64, tokens_used: u64) -> Self {
        self.metrics = SessionMetrics { cost, tokens_used };
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

impl Keyed for OrchestrationSession {
    fn key(&self) -> &str {
        &self.session_id
    }
}

/// Externally observed status of a spawned agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Thinking,
    Working,
    Active,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Thinking => "thinking",
            AgentStatus::Working => "working",
            AgentStatus::Active => "active",
            AgentStatus::Completed => "completed",
            AgentStatus::Error => "error",
            AgentStatus::Unknown => "unknown",
        }
    }

    /// Whether the agent is still doing work (not yet a settled vote).
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            AgentStatus::Thinking | AgentStatus::Working | AgentStatus::Active
        )
    }

    /// Whether the agent counts toward utilization.
    pub fn is_utilized(&self) -> bool {
        matches!(self, AgentStatus::Working | AgentStatus::Active)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spawned worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub coordination_id: CoordinationId,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub status: AgentStatus,
    /// Progress reported by the agent, 0–100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        coordination_id: impl Into<CoordinationId>,
        role: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            coordination_id: coordination_id.into(),
            role: role.into(),
            domain: domain.into(),
            status: AgentStatus::Idle,
            progress: None,
        }
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl Keyed for Agent {
    fn key(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trips_unknown_values() {
        let event: CoordinationEvent = serde_json::from_str(
            r#"{"id":"e1","coordination_id":"c1","type":"heartbeat"}"#,
        )
        .unwrap();
        assert_eq!(
            event.event_type,
            CoordinationEventType::Other("heartbeat".to_string())
        );
        assert!(!event.event_type.is_consensus_relevant());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "heartbeat");
    }

    #[test]
    fn test_consensus_relevant_types() {
        let vote: CoordinationEventType = "consensus_vote".to_string().into();
        assert_eq!(vote, CoordinationEventType::ConsensusVote);
        assert!(vote.is_consensus_relevant());
        assert!(CoordinationEventType::AgentStatusChanged.is_consensus_relevant());
        assert!(!CoordinationEventType::TaskAssigned.is_consensus_relevant());
    }

    #[test]
    fn test_session_uses_camel_case_wire_format() {
        let json = r#"{
            "sessionId": "s1",
            "coordinationId": "c1",
            "status": "running",
            "metrics": {"cost": 0.25, "tokensUsed": 1200},
            "startTime": "2026-01-01T00:00:00Z"
        }"#;
        let session: OrchestrationSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.session_id, "s1");
        assert_eq!(session.metrics.tokens_used, 1200);
        assert_eq!(session.metrics.cost, 0.25);
    }

    #[test]
    fn test_session_metrics_default_when_missing() {
        let json = r#"{"sessionId":"s1","coordinationId":"c1","startTime":"2026-01-01T00:00:00Z"}"#;
        let session: OrchestrationSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.metrics, SessionMetrics::default());
    }

    #[test]
    fn test_agent_status_unknown_values() {
        let agent: Agent = serde_json::from_str(
            r#"{"id":"a1","coordination_id":"c1","status":"paused","progress":40}"#,
        )
        .unwrap();
        assert_eq!(agent.status, AgentStatus::Unknown);
        assert_eq!(agent.progress, Some(40.0));
    }

    #[test]
    fn test_agent_status_classification() {
        assert!(AgentStatus::Thinking.is_busy());
        assert!(AgentStatus::Active.is_busy());
        assert!(!AgentStatus::Completed.is_busy());
        assert!(AgentStatus::Working.is_utilized());
        assert!(!AgentStatus::Thinking.is_utilized());
    }
}
