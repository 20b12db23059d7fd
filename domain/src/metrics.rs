//! Workflow metrics aggregation
//!
//! Metrics are a pure function of the current session/agent snapshot sets.
//! They are recomputed on every call and never cached.

use crate::coordination::{Agent, AgentStatus, OrchestrationSession};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token usage totals.
///
/// Sessions report a single `tokensUsed` counter, so `input` and `output`
/// currently carry the same value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
}

/// Derived metrics for one workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetrics {
    pub total_cost: f64,
    pub total_tokens: TokenTotals,
    /// Milliseconds since the first session started
    pub execution_time_ms: u64,
    /// Completed agents / all agents, 0.0 to 1.0
    pub success_rate: f64,
    /// Working or active agents / all agents, 0.0 to 1.0
    pub agent_utilization: f64,
}

impl WorkflowMetrics {
    /// Aggregate metrics from snapshot sets.
    ///
    /// `has_response` gates the execution timer: before a plan exists the
    /// workflow has not started executing anything.
    pub fn aggregate(
        sessions: &[OrchestrationSession],
        agents: &[Agent],
        has_response: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let total_cost: f64 = sessions.iter().map(|s| s.metrics.cost).sum();
        let tokens = sessions
            .iter()
            .map(|s| s.metrics.tokens_used)
            .fold(0, u64::saturating_add);

        let execution_time_ms: u64 = match sessions.first() {
            Some(first) if has_response => (now - first.start_time)
                .num_milliseconds()
                .max(0)
                .try_into()
                .unwrap_or(0),
            _ => 0,
        };

        Self {
            total_cost,
            total_tokens: TokenTotals {
                input: tokens,
                output: tokens,
            },
            execution_time_ms,
            success_rate: ratio(agents, |s| s == AgentStatus::Completed),
            agent_utilization: ratio(agents, |s| s.is_utilized()),
        }
    }
}

fn ratio(agents: &[Agent], predicate: impl Fn(AgentStatus) -> bool) -> f64 {
    if agents.is_empty() {
        return 0.0;
    }
    let matching = agents.iter().filter(|a| predicate(a.status)).count();
    matching as f64 / agents.len() as f64
}
