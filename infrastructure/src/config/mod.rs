//! Configuration file loading for conclave
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./conclave.toml` or `./.conclave.toml`
//! 3. Global: `$XDG_CONFIG_HOME/conclave/config.toml`
//! 4. Environment: `CONCLAVE_<SECTION>__<KEY>`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    DEFAULT_API_BASE_URL, DEFAULT_EVENTS_URL, FileApiConfig, FileConfig, FileConsensusConfig,
    FileEventsConfig, FileRetryConfig, FileWorkflowConfig,
};
pub use loader::ConfigLoader;
