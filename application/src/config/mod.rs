//! Application-level configuration.
//!
//! - [`EngineConfig`]: workflow engine control (retry policy, round
//!   tunables, event retention)

pub mod engine_config;

pub use engine_config::EngineConfig;
