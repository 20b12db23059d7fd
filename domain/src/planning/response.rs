//! Planning response types returned by the planning server.

use crate::core::ids::CoordinationId;
use serde::{Deserialize, Serialize};

/// An agent proposed for a plan phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseAgent {
    pub id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl PhaseAgent {
    pub fn new(id: impl Into<String>, role: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            domain: domain.into(),
            priority: None,
        }
    }
}

/// One ordered phase of a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningPhase {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub agents: Vec<PhaseAgent>,
}

impl PlanningPhase {
    pub fn new(name: impl Into<String>, agents: Vec<PhaseAgent>) -> Self {
        Self {
            name: name.into(),
            description: None,
            agents,
        }
    }
}

/// Server-produced plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningResponse {
    pub coordination_id: CoordinationId,
    #[serde(default)]
    pub phases: Vec<PlanningPhase>,
    /// Directives of the form `"spawn <role> <domain>"`
    #[serde(default)]
    pub spawn_commands: Vec<String>,
}

impl PlanningResponse {
    pub fn new(coordination_id: impl Into<CoordinationId>, phases: Vec<PlanningPhase>) -> Self {
        Self {
            coordination_id: coordination_id.into(),
            phases,
            spawn_commands: Vec::new(),
        }
    }

    pub fn with_spawn_commands(mut self, commands: Vec<String>) -> Self {
        self.spawn_commands = commands;
        self
    }

    pub fn total_phases(&self) -> usize {
        self.phases.len()
    }

    /// Agents of the first phase, bounded by `max_agents`.
    ///
    /// A plan with no phases (or an empty first phase) yields an empty
    /// roster.
    pub fn initial_roster(&self, max_agents: u32) -> &[PhaseAgent] {
        let agents = self
            .phases
            .first()
            .map(|p| p.agents.as_slice())
            .unwrap_or_default();
        let limit = (max_agents.max(1) as usize).min(agents.len());
        &agents[..limit]
    }
}

/// Body of `POST /api/agents/spawn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub role: String,
    pub domain: String,
    pub coordination_id: CoordinationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Response of `POST /api/agents/spawn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnResponse {
    pub agent_id: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_agents(n: usize) -> PlanningResponse {
        let agents = (1..=n)
            .map(|i| PhaseAgent::new(format!("a{i}"), "researcher", "auth"))
            .collect();
        PlanningResponse::new(
            "c1",
            vec![
                PlanningPhase::new("analysis", agents),
                PlanningPhase::new("build", vec![]),
            ],
        )
    }

    #[test]
    fn test_deserialize_minimal_response() {
        let json = r#"{
            "coordination_id": "c1",
            "phases": [{"agents": [{"id": "a1"}, {"id": "a2", "role": "coder", "domain": "api"}]}],
            "spawn_commands": ["spawn researcher auth"]
        }"#;
        let response: PlanningResponse = serde_json::from_str(json).unwrap();

        assert_eq!(response.coordination_id.as_str(), "c1");
        assert_eq!(response.total_phases(), 1);
        assert_eq!(response.phases[0].agents[1].role, "coder");
        assert_eq!(response.spawn_commands, vec!["spawn researcher auth"]);
    }

    #[test]
    fn test_initial_roster_bounded_by_max_agents() {
        let response = response_with_agents(4);
        assert_eq!(response.initial_roster(2).len(), 2);
        assert_eq!(response.initial_roster(10).len(), 4);
        assert_eq!(response.initial_roster(0).len(), 1);
    }

    #[test]
    fn test_initial_roster_empty_plan() {
        let response = PlanningResponse::new("c1", vec![]);
        assert!(response.initial_roster(5).is_empty());
        assert_eq!(response.total_phases(), 0);
    }

    #[test]
    fn test_spawn_request_omits_missing_context() {
        let request = SpawnRequest {
            role: "researcher".to_string(),
            domain: "auth".to_string(),
            coordination_id: CoordinationId::new("c1"),
            context: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["coordination_id"], "c1");
        assert!(json.get("context").is_none());
    }
}
