//! Planning API adapter.

pub mod http_client;

pub use http_client::{DEFAULT_TIMEOUT, HttpPlanningClient};
