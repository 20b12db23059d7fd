//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod event_subscriber;
pub mod planning_api;
pub mod workflow_logger;
