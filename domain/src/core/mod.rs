//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`ids::CoordinationId`]: opaque key grouping one planning execution
//! - [`validation::ConfigIssue`]: structured configuration problems

pub mod error;
pub mod ids;
pub mod validation;
