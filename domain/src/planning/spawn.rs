//! Spawn command parsing
//!
//! The planner emits spawn directives as plain strings of the form
//! `"spawn <role> <domain>"`.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A parsed `spawn <role> <domain>` directive.
///
/// # Example
///
/// ```
/// use conclave_domain::planning::SpawnCommand;
///
/// let cmd: SpawnCommand = "spawn researcher auth".parse().unwrap();
/// assert_eq!(cmd.role, "researcher");
/// assert_eq!(cmd.domain, "auth");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnCommand {
    pub role: String,
    pub domain: String,
}

impl SpawnCommand {
    pub fn new(role: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            domain: domain.into(),
        }
    }

    /// Parse every command, failing on the first malformed one.
    pub fn parse_all<S: AsRef<str>>(commands: &[S]) -> Result<Vec<Self>, DomainError> {
        commands.iter().map(|c| c.as_ref().parse()).collect()
    }
}

impl FromStr for SpawnCommand {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
            (Some(keyword), Some(role), Some(domain), None)
                if keyword.eq_ignore_ascii_case("spawn") =>
            {
                Ok(Self::new(role, domain))
            }
            _ => Err(DomainError::InvalidSpawnCommand(s.to_string())),
        }
    }
}

impl std::fmt::Display for SpawnCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "spawn {} {}", self.role, self.domain)
    }
}
