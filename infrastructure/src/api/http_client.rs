//! reqwest adapter for the planning/session/agent HTTP API.
//!
//! Submit and spawn are sent once; the engine decides whether a connection
//! failure deserves another attempt. Reads are idempotent and are retried
//! here for connection failures and transient statuses (5xx, 408, 429).

use async_trait::async_trait;
use conclave_application::{ApiError, PlanningApi, RetryPolicy};
use conclave_domain::util::truncate_str;
use conclave_domain::{
    Agent, CoordinationEvent, CoordinationId, OrchestrationSession, PlanningRequest,
    PlanningResponse, SpawnRequest, SpawnResponse,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw error bodies are cut to this many bytes before they land in
/// `ApiError::details`.
const MAX_ERROR_BODY: usize = 500;

fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// [`PlanningApi`] over HTTP.
pub struct HttpPlanningClient {
    client: Client,
    base_url: String,
    read_retry: RetryPolicy,
}

impl HttpPlanningClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            read_retry: RetryPolicy::default(),
        }
    }

    /// Policy used for idempotent reads.
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::connection(e.to_string()))?;
        trace!("HTTP {} body: {}", status, truncate_str(&body, 1000));

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ApiError::api(
                status.as_u16(),
                "invalid_response",
                format!("{}: {}", e, truncate_str(&body, MAX_ERROR_BODY)),
            )
        })
    }

    /// GET with the read retry policy.
    async fn read<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("GET {}", url);
        self.read_retry
            .execute_if(
                || self.send(self.client.get(&url).query(query)),
                ApiError::is_transient,
            )
            .await
            .map_err(ApiError::from)
    }
}

/// Build an [`ApiError`] from a non-success response.
///
/// Understands `{code, details}` and `{error, message}` bodies; anything
/// else falls back to the reason phrase and the raw body.
fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = |names: &[&str]| -> Option<String> {
        let object = parsed.as_ref()?.as_object()?;
        names.iter().find_map(|name| match object.get(*name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        })
    };

    let code = field(&["code", "error"])
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
    let details =
        field(&["details", "message"]).unwrap_or_else(|| truncate_str(body, MAX_ERROR_BODY).to_string());

    ApiError::api(status.as_u16(), code, details)
}

#[async_trait]
impl PlanningApi for HttpPlanningClient {
    async fn submit_plan(&self, request: &PlanningRequest) -> Result<PlanningResponse, ApiError> {
        let url = self.url("/api/planning/submit");
        debug!("POST {}", url);
        self.send(self.client.post(&url).json(request)).await
    }

    async fn get_plan_result(
        &self,
        coordination_id: &CoordinationId,
    ) -> Result<PlanningResponse, ApiError> {
        self.read(&format!("/api/planning/result/{}", coordination_id), &[])
            .await
    }

    async fn spawn_agent(&self, request: &SpawnRequest) -> Result<SpawnResponse, ApiError> {
        let url = self.url("/api/agents/spawn");
        debug!("POST {} role={} domain={}", url, request.role, request.domain);
        let response: SpawnResponse = self.send(self.client.post(&url).json(request)).await?;
        if !response.success {
            return Err(ApiError::api(
                200,
                "spawn_rejected",
                format!(
                    "server rejected spawn of {} {} (agent {})",
                    request.role, request.domain, response.agent_id
                ),
            ));
        }
        Ok(response)
    }

    async fn list_sessions(&self) -> Result<Vec<OrchestrationSession>, ApiError> {
        self.read("/api/sessions", &[]).await
    }

    async fn get_session(&self, session_id: &str) -> Result<OrchestrationSession, ApiError> {
        self.read(&format!("/api/sessions/{}", session_id), &[]).await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, ApiError> {
        self.read("/api/agents", &[]).await
    }

    async fn list_events(
        &self,
        coordination_id: &CoordinationId,
        limit: Option<usize>,
    ) -> Result<Vec<CoordinationEvent>, ApiError> {
        let mut query = vec![("coordination_id", coordination_id.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        self.read("/api/coordination/events", &query).await
    }
}
