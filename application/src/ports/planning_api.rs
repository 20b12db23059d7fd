//! Planning API port
//!
//! Typed request/response surface of the planning, session and agent HTTP
//! API. Adapters live in the infrastructure layer.

use crate::retry::{RetryError, Retryable};
use async_trait::async_trait;
use conclave_domain::{
    Agent, CoordinationEvent, CoordinationId, OrchestrationSession, PlanningRequest,
    PlanningResponse, SpawnRequest, SpawnResponse,
};
use thiserror::Error;

/// Errors returned by the planning API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server answered with a non-success status
    #[error("API error {status} ({code}): {details}")]
    Api {
        status: u16,
        code: String,
        details: String,
    },

    /// No response was received
    #[error("Connection error: {message}")]
    Connection { message: String, retryable: bool },

    /// A retried read kept failing transiently
    #[error("{last} (gave up after {attempts} attempts)")]
    RetriesExhausted { attempts: u32, last: Box<ApiError> },
}

impl ApiError {
    pub fn api(status: u16, code: impl Into<String>, details: impl Into<String>) -> Self {
        ApiError::Api {
            status,
            code: code.into(),
            details: details.into(),
        }
    }

    /// A transport failure; always retryable.
    pub fn connection(message: impl Into<String>) -> Self {
        ApiError::Connection {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Connection { .. } => None,
            ApiError::RetriesExhausted { last, .. } => last.status(),
        }
    }

    /// Number of attempts made before giving up, when more than one.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ApiError::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Whether an idempotent read may be retried after this error.
    ///
    /// Covers connection failures plus server errors, request timeouts and
    /// rate limiting.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Connection { retryable, .. } => *retryable,
            ApiError::Api { status, .. } => {
                (500..600).contains(status) || *status == 408 || *status == 429
            }
            ApiError::RetriesExhausted { .. } => false,
        }
    }
}

impl From<RetryError<ApiError>> for ApiError {
    /// A single failed attempt surfaces as-is; repeated failures keep their
    /// attempt count.
    fn from(err: RetryError<ApiError>) -> Self {
        match err {
            RetryError::RetriesExhausted { attempts, last } if attempts > 1 => {
                ApiError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                }
            }
            other => other.into_inner(),
        }
    }
}

impl Retryable for ApiError {
    /// Server rejections are final for submit and spawn; only a missing
    /// response is worth another attempt.
    fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Connection { retryable: true, .. })
    }
}

/// Client for the planning/session/agent API.
#[async_trait]
pub trait PlanningApi: Send + Sync {
    /// `POST /api/planning/submit`
    async fn submit_plan(&self, request: &PlanningRequest) -> Result<PlanningResponse, ApiError>;

    /// `GET /api/planning/result/{coordination_id}`
    async fn get_plan_result(
        &self,
        coordination_id: &CoordinationId,
    ) -> Result<PlanningResponse, ApiError>;

    /// `POST /api/agents/spawn`
    async fn spawn_agent(&self, request: &SpawnRequest) -> Result<SpawnResponse, ApiError>;

    /// `GET /api/sessions`
    async fn list_sessions(&self) -> Result<Vec<OrchestrationSession>, ApiError>;

    /// `GET /api/sessions/{id}`
    async fn get_session(&self, session_id: &str) -> Result<OrchestrationSession, ApiError>;

    /// `GET /api/agents`
    async fn list_agents(&self) -> Result<Vec<Agent>, ApiError>;

    /// `GET /api/coordination/events?coordination_id=&limit=`
    async fn list_events(
        &self,
        coordination_id: &CoordinationId,
        limit: Option<usize>,
    ) -> Result<Vec<CoordinationEvent>, ApiError>;
}
