//! Domain layer for conclave
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns, and no
//! async runtime: every state transition is a plain method that takes the
//! current time as an argument.
//!
//! # Core Concepts
//!
//! ## Planning
//!
//! A [`PlanningRequest`] is submitted to the planning server, which answers
//! with a [`PlanningResponse`]: a coordination id, ordered phases, and spawn
//! commands.
//!
//! ## Consensus
//!
//! The first phase's agents deliberate in a [`ConsensusRound`]. Votes are
//! advisory signals toward convergence; a round completes when convergence
//! saturates or every agent has settled, and times out otherwise.
//!
//! ## Workflow
//!
//! [`WorkflowState`] is the canonical state of one workflow instance:
//!
//! ```text
//! idle → planning → consensus → executing → {completed, failed}
//! ```

pub mod consensus;
pub mod coordination;
pub mod core;
pub mod metrics;
pub mod planning;
pub mod util;
pub mod workflow;

// Re-export commonly used types
pub use consensus::{
    AgentConsensus, ConsensusRound, RoundSettings, RoundStatus, RoundTransition, VoteStatus,
};
pub use coordination::{
    Agent, AgentStatus, CoordinationEvent, CoordinationEventType, Keyed, KeyedCollection,
    OrchestrationSession, SessionMetrics,
};
pub use core::{
    error::DomainError,
    ids::CoordinationId,
    validation::{ConfigIssue, ConfigIssueCode, Severity},
};
pub use metrics::{TokenTotals, WorkflowMetrics};
pub use planning::{
    Complexity, PhaseAgent, PlanningPhase, PlanningRequest, PlanningRequestPatch,
    PlanningResponse, SpawnCommand, SpawnRequest, SpawnResponse,
};
pub use workflow::{ApplyOutcome, WorkflowEvent, WorkflowState, WorkflowStatus};
