//! Coordination domain
//!
//! Entities produced by the running system (sessions, agents, events) and
//! the keyed collection used to merge them idempotently.

pub mod entities;
pub mod keyed;

pub use entities::{
    Agent, AgentStatus, CoordinationEvent, CoordinationEventType, OrchestrationSession,
    SessionMetrics,
};
pub use keyed::{Keyed, KeyedCollection, Upsert};
