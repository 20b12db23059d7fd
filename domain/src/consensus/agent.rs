//! Per-agent voting state within a consensus round.

use crate::coordination::{Agent, AgentStatus};
use crate::planning::PhaseAgent;
use crate::util::progress_to_ratio;
use serde::{Deserialize, Serialize};

/// Reputation assigned to every agent when a round opens.
pub const DEFAULT_REPUTATION: f64 = 0.8;

/// Voting status of one agent.
///
/// Transitions are one-way: `Thinking → Voted` or `Thinking → Timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    Thinking,
    Voted,
    Timeout,
}

impl VoteStatus {
    /// Whether the agent has finished participating in the round.
    pub fn is_settled(&self) -> bool {
        !matches!(self, VoteStatus::Thinking)
    }
}

impl std::fmt::Display for VoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteStatus::Thinking => write!(f, "thinking"),
            VoteStatus::Voted => write!(f, "voted"),
            VoteStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// Outcome of feeding an [`Agent`] snapshot into an [`AgentConsensus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentTransition {
    /// Nothing observable changed
    Unchanged,
    /// Confidence or reasoning refreshed without a status change
    Refreshed,
    /// The agent cast its vote
    Voted(String),
}

/// One agent's voting state within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConsensus {
    pub agent_id: String,
    pub role: String,
    pub domain: String,
    pub vote: Option<String>,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub reasoning: String,
    pub status: VoteStatus,
    pub priority: u32,
    /// 0.0 to 1.0
    pub reputation: f64,
}

impl AgentConsensus {
    /// Seed an agent for a fresh round.
    ///
    /// Priority falls back to the agent's 1-based position in the roster.
    pub fn from_phase_agent(agent: &PhaseAgent, position: usize, reputation: f64) -> Self {
        Self {
            agent_id: agent.id.clone(),
            role: agent.role.clone(),
            domain: agent.domain.clone(),
            vote: None,
            confidence: 0.0,
            reasoning: String::new(),
            status: VoteStatus::Thinking,
            priority: agent.priority.unwrap_or(position as u32 + 1),
            reputation: reputation.clamp(0.0, 1.0),
        }
    }

    /// Derive a vote-state transition from an observed agent snapshot.
    ///
    /// Busy statuses keep the agent thinking; anything else counts as a
    /// vote. A settled agent never returns to thinking, but a later snapshot
    /// may still refresh its confidence.
    pub fn observe(&mut self, agent: &Agent) -> AgentTransition {
        let confidence = agent.progress.map(progress_to_ratio);
        let mut refreshed = false;
        if let Some(c) = confidence
            && c != self.confidence
        {
            self.confidence = c;
            refreshed = true;
        }

        if agent.status.is_busy() || self.status.is_settled() {
            return if refreshed {
                AgentTransition::Refreshed
            } else {
                AgentTransition::Unchanged
            };
        }

        let vote = agent.status.as_str().to_string();
        self.status = VoteStatus::Voted;
        self.vote = Some(vote.clone());
        self.reasoning = reasoning_for(agent.status);
        AgentTransition::Voted(vote)
    }

    /// Mark a still-thinking agent as timed out. Returns whether it changed.
    pub fn time_out(&mut self) -> bool {
        if self.status.is_settled() {
            return false;
        }
        self.status = VoteStatus::Timeout;
        self.reasoning = "no vote before round deadline".to_string();
        true
    }
}

fn reasoning_for(status: AgentStatus) -> String {
    match status {
        AgentStatus::Completed => "agent completed its work".to_string(),
        AgentStatus::Error => "agent reported an error".to_string(),
        other => format!("agent reported status {other}"),
    }
}
