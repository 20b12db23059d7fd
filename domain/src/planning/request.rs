//! Planning request types
//!
//! A [`PlanningRequest`] is the user's orchestration intent. The workflow
//! keeps a draft copy that can be edited at any time with a
//! [`PlanningRequestPatch`].

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default strategy tag: parallel execution.
pub const DEFAULT_PATTERN: &str = "P∥";

/// Default upper bound on the agent roster.
pub const DEFAULT_MAX_AGENTS: u32 = 5;

/// Requested planning depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Complexity::Low),
            "medium" | "med" => Ok(Complexity::Medium),
            "high" => Ok(Complexity::High),
            other => Err(DomainError::InvalidComplexity(other.to_string())),
        }
    }
}

/// The user's orchestration intent, sent to `POST /api/planning/submit`.
///
/// # Example
///
/// ```
/// use conclave_domain::planning::{Complexity, PlanningRequest};
///
/// let request = PlanningRequest::new("Implement auth")
///     .with_complexity(Complexity::High)
///     .with_max_agents(0);
///
/// // max_agents is never allowed below 1
/// assert_eq!(request.max_agents, 1);
/// assert_eq!(request.pattern, "P∥");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningRequest {
    pub objective: String,
    pub complexity: Complexity,
    /// Strategy tag (e.g. "P∥" for parallel, "S→" for sequential)
    pub pattern: String,
    /// Upper bound on the roster used to seed consensus round 1
    pub max_agents: u32,
    /// Optional free-text context forwarded to the planner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Default for PlanningRequest {
    fn default() -> Self {
        Self {
            objective: String::new(),
            complexity: Complexity::default(),
            pattern: DEFAULT_PATTERN.to_string(),
            max_agents: DEFAULT_MAX_AGENTS,
            context: None,
        }
    }
}

impl PlanningRequest {
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            ..Default::default()
        }
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_max_agents(mut self, max_agents: u32) -> Self {
        self.max_agents = max_agents.max(1);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Merge a partial update into this request.
    pub fn apply(&mut self, patch: PlanningRequestPatch) {
        if let Some(objective) = patch.objective {
            self.objective = objective;
        }
        if let Some(complexity) = patch.complexity {
            self.complexity = complexity;
        }
        if let Some(pattern) = patch.pattern {
            self.pattern = pattern;
        }
        if let Some(max_agents) = patch.max_agents {
            self.max_agents = max_agents.max(1);
        }
        if let Some(context) = patch.context {
            self.context = context;
        }
    }
}

/// Partial update for the draft [`PlanningRequest`].
///
/// Unset fields leave the draft untouched. `context` is doubly optional so
/// a patch can clear it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanningRequestPatch {
    pub objective: Option<String>,
    pub complexity: Option<Complexity>,
    pub pattern: Option<String>,
    pub max_agents: Option<u32>,
    pub context: Option<Option<String>>,
}

impl PlanningRequestPatch {
    pub fn objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    pub fn complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn max_agents(mut self, max_agents: u32) -> Self {
        self.max_agents = Some(max_agents);
        self
    }

    pub fn context(mut self, context: Option<String>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
