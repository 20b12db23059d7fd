//! Infrastructure layer for conclave
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the HTTP planning client, the shared
//! websocket event hub, the JSONL workflow journal, and configuration
//! file loading.

pub mod api;
pub mod config;
pub mod events;
pub mod logging;

// Re-export commonly used types
pub use api::HttpPlanningClient;
pub use config::{ConfigLoader, FileConfig};
pub use events::{Connector, EventHub, TungsteniteConnector};
pub use logging::JsonlWorkflowLogger;
