//! Console output for workflow state and API listings

use colored::Colorize;
use conclave_domain::{
    Agent, AgentStatus, ConfigIssue, CoordinationEvent, OrchestrationSession, PlanningResponse,
    RoundStatus, WorkflowMetrics, WorkflowState, WorkflowStatus,
};
use serde::Serialize;

/// Formats workflow results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Pretty JSON for any serializable result
    pub fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    /// One line announcing a status transition
    pub fn status_line(from: WorkflowStatus, to: WorkflowStatus) -> String {
        format!(
            "{} {} -> {}",
            "status".dimmed(),
            from.as_str(),
            Self::status(to)
        )
    }

    fn status(status: WorkflowStatus) -> String {
        match status {
            WorkflowStatus::Completed => status.as_str().green().bold().to_string(),
            WorkflowStatus::Failed => status.as_str().red().bold().to_string(),
            WorkflowStatus::Idle => status.as_str().dimmed().to_string(),
            _ => status.as_str().cyan().bold().to_string(),
        }
    }

    /// Final summary of a `plan` run
    pub fn format_summary(state: &WorkflowState, metrics: &WorkflowMetrics) -> String {
        let mut output = String::new();

        output.push_str(&format!("\n{}\n", "=== Workflow Summary ===".cyan().bold()));
        output.push_str(&format!(
            "{} {}\n",
            "Objective:".bold(),
            state.request.objective
        ));
        if let Some(id) = &state.coordination_id {
            output.push_str(&format!("{} {}\n", "Coordination:".bold(), id));
        }
        output.push_str(&format!(
            "{} {}\n",
            "Status:".bold(),
            Self::status(state.status)
        ));
        if let Some(error) = &state.error {
            output.push_str(&format!("{} {}\n", "Error:".red().bold(), error));
        }
        if state.retry_count > 0 {
            output.push_str(&format!("{} {}\n", "Retries:".bold(), state.retry_count));
        }

        if let Some(round) = state.current_round() {
            let status = match round.status {
                RoundStatus::Completed => round.status.to_string().green(),
                RoundStatus::Timeout => round.status.to_string().red(),
                RoundStatus::Active => round.status.to_string().yellow(),
            };
            output.push_str(&format!(
                "{} #{} {} (convergence {:.0}%)\n",
                "Round:".bold(),
                round.round,
                status,
                round.convergence * 100.0
            ));
        }

        if !state.agents.is_empty() {
            output.push_str(&format!("\n{}\n", "Agents:".cyan().bold()));
            output.push_str(&Self::format_agents(state.agents.as_slice()));
        }

        output.push_str(&format!("\n{}\n", "Metrics:".cyan().bold()));
        output.push_str(&Self::format_metrics(metrics));
        output
    }

    pub fn format_metrics(metrics: &WorkflowMetrics) -> String {
        format!(
            "  cost ${:.4}  tokens {} in / {} out  time {:.1}s\n  success {:.0}%  utilization {:.0}%\n",
            metrics.total_cost,
            metrics.total_tokens.input,
            metrics.total_tokens.output,
            metrics.execution_time_ms as f64 / 1000.0,
            metrics.success_rate * 100.0,
            metrics.agent_utilization * 100.0
        )
    }

    /// A stored plan
    pub fn format_plan(plan: &PlanningResponse) -> String {
        let mut output = format!("{} {}\n", "Coordination:".bold(), plan.coordination_id);

        for (index, phase) in plan.phases.iter().enumerate() {
            output.push_str(&format!(
                "\n{}\n",
                format!("── Phase {}: {} ──", index + 1, phase.name)
                    .yellow()
                    .bold()
            ));
            if let Some(description) = &phase.description {
                output.push_str(&format!("  {}\n", description));
            }
            for agent in &phase.agents {
                output.push_str(&format!(
                    "  * {} ({} / {})\n",
                    agent.id, agent.role, agent.domain
                ));
            }
        }

        if !plan.spawn_commands.is_empty() {
            output.push_str(&format!("\n{}\n", "Spawn commands:".cyan().bold()));
            for command in &plan.spawn_commands {
                output.push_str(&format!("  $ {}\n", command));
            }
        }
        output
    }

    pub fn format_sessions(sessions: &[OrchestrationSession]) -> String {
        if sessions.is_empty() {
            return format!("{}\n", "No sessions".dimmed());
        }
        sessions
            .iter()
            .map(|s| {
                format!(
                    "  {}  {}  {}  ${:.4}  {} tokens  started {}\n",
                    s.session_id.bold(),
                    s.coordination_id,
                    s.status,
                    s.metrics.cost,
                    s.metrics.tokens_used,
                    s.start_time.format("%Y-%m-%d %H:%M:%S")
                )
            })
            .collect()
    }

    pub fn format_agents(agents: &[Agent]) -> String {
        if agents.is_empty() {
            return format!("{}\n", "No agents".dimmed());
        }
        agents
            .iter()
            .map(|a| {
                let status = match a.status {
                    AgentStatus::Completed => a.status.as_str().green(),
                    AgentStatus::Error => a.status.as_str().red(),
                    AgentStatus::Idle => a.status.as_str().dimmed(),
                    _ => a.status.as_str().yellow(),
                };
                let progress = a
                    .progress
                    .map(|p| format!(" {:.0}%", p))
                    .unwrap_or_default();
                format!(
                    "  {}  {} / {}  {}{}\n",
                    a.id.bold(),
                    a.role,
                    a.domain,
                    status,
                    progress
                )
            })
            .collect()
    }

    pub fn format_events(events: &[CoordinationEvent]) -> String {
        if events.is_empty() {
            return format!("{}\n", "No events".dimmed());
        }
        events
            .iter()
            .map(|e| {
                let timestamp = e
                    .timestamp
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "--:--:--".to_string());
                let agent = e.agent_id.as_deref().unwrap_or("-");
                format!(
                    "  {}  {:<22} {}  {}\n",
                    timestamp.dimmed(),
                    e.event_type.as_str(),
                    agent,
                    e.id.dimmed()
                )
            })
            .collect()
    }

    pub fn format_issues(issues: &[ConfigIssue]) -> String {
        issues
            .iter()
            .map(|issue| {
                let label = if issue.is_error() {
                    "error".red().bold()
                } else {
                    "warning".yellow().bold()
                };
                format!("{}: {}\n", label, issue.message)
            })
            .collect()
    }
}
