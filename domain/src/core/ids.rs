//! Identifier value objects.

use serde::{Deserialize, Serialize};

/// Opaque key grouping all sessions, agents, and events belonging to one
/// planning execution.
///
/// Assigned by the planning server in the
/// [`PlanningResponse`](crate::planning::PlanningResponse); the engine never
/// interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoordinationId(String);

impl CoordinationId {
    /// Creates a CoordinationId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CoordinationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CoordinationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for CoordinationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_string() {
        let id = CoordinationId::new("c1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c1\"");

        let parsed: CoordinationId = serde_json::from_str("\"coord-42\"").unwrap();
        assert_eq!(parsed.as_str(), "coord-42");
    }

    #[test]
    fn test_display() {
        assert_eq!(CoordinationId::from("abc").to_string(), "abc");
    }
}
