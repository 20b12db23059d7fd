//! Consensus domain
//!
//! Votes here are advisory signals toward convergence, not a safety-critical
//! agreement protocol. A round ends when convergence saturates, when every
//! agent has settled, or when its deadline passes.

pub mod agent;
pub mod round;

pub use agent::{AgentConsensus, AgentTransition, DEFAULT_REPUTATION, VoteStatus};
pub use round::{
    ConsensusRound, DEFAULT_CONVERGENCE_STEP, DEFAULT_ROUND_TIMEOUT_MS, RoundSettings,
    RoundStatus, RoundTransition,
};
