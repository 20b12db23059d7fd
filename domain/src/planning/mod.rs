//! Planning domain
//!
//! Request/response types for the planning surface and the spawn directives
//! a plan carries.

pub mod request;
pub mod response;
pub mod spawn;

pub use request::{Complexity, DEFAULT_MAX_AGENTS, DEFAULT_PATTERN, PlanningRequest, PlanningRequestPatch};
pub use response::{PhaseAgent, PlanningPhase, PlanningResponse, SpawnRequest, SpawnResponse};
pub use spawn::SpawnCommand;
