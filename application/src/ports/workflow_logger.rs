//! Port for structured workflow logging.
//!
//! Defines the [`WorkflowLogger`] trait for recording workflow transitions
//! (submission, round outcomes, spawn results, resets) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures a
//! machine-readable journal of the workflow.

use conclave_domain::{Complexity, CoordinationId, WorkflowStatus};
use serde::Serialize;
use std::collections::BTreeMap;

/// A workflow transition worth journaling.
///
/// Serializes internally tagged, e.g.
/// `{"type":"round_timeout","round":1,"settled":2,"agents":3}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowLogEvent {
    PlanSubmitted {
        objective: String,
        complexity: Complexity,
        pattern: String,
        max_agents: u32,
    },
    PlanAccepted {
        total_phases: usize,
        roster: usize,
    },
    PlanFailed {
        error: String,
        retry_count: u32,
    },
    RoundCompleted {
        round: u32,
        convergence: f64,
        votes: BTreeMap<String, u32>,
    },
    RoundTimeout {
        round: u32,
        settled: usize,
        agents: usize,
    },
    AgentSpawned {
        agent_id: String,
        role: String,
        domain: String,
    },
    SpawnFailed {
        command: String,
        error: String,
    },
    ExecutionCompleted {
        agents: usize,
    },
    ExecutionFailed {
        error: String,
        agents: usize,
    },
    WorkflowReset,
}

impl WorkflowLogEvent {
    /// The `type` tag this event is journaled under.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowLogEvent::PlanSubmitted { .. } => "plan_submitted",
            WorkflowLogEvent::PlanAccepted { .. } => "plan_accepted",
            WorkflowLogEvent::PlanFailed { .. } => "plan_failed",
            WorkflowLogEvent::RoundCompleted { .. } => "round_completed",
            WorkflowLogEvent::RoundTimeout { .. } => "round_timeout",
            WorkflowLogEvent::AgentSpawned { .. } => "agent_spawned",
            WorkflowLogEvent::SpawnFailed { .. } => "spawn_failed",
            WorkflowLogEvent::ExecutionCompleted { .. } => "execution_completed",
            WorkflowLogEvent::ExecutionFailed { .. } => "execution_failed",
            WorkflowLogEvent::WorkflowReset => "workflow_reset",
        }
    }
}

/// One journal entry: the event plus the workflow it happened to.
///
/// `status` and `coordination_id` are read after the transition was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowLogEntry {
    pub coordination_id: Option<CoordinationId>,
    pub status: WorkflowStatus,
    pub event: WorkflowLogEvent,
}

/// Port for logging workflow events to a structured journal.
///
/// `log` is synchronous and non-fallible; journal failures must never
/// disturb the workflow.
pub trait WorkflowLogger: Send + Sync {
    fn log(&self, entry: WorkflowLogEntry);
}

/// No-op implementation for tests and when the journal is disabled.
pub struct NoWorkflowLogger;

impl WorkflowLogger for NoWorkflowLogger {
    fn log(&self, _entry: WorkflowLogEntry) {}
}
