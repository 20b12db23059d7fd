//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid spawn command: {0:?} (expected \"spawn <role> <domain>\")")]
    InvalidSpawnCommand(String),

    #[error("Invalid complexity: {0} (expected low, medium or high)")]
    InvalidComplexity(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl DomainError {
    /// Check if this error is a contract violation by the caller
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, DomainError::InvalidOperation(_))
    }
}
