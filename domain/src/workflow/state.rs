//! Canonical workflow state and its reducers.
//!
//! [`WorkflowState`] is a plain serializable struct. Every mutation goes
//! through one of the reducer methods below, each of which takes the
//! current time explicitly, so the whole state machine can be exercised
//! without a runtime.

use super::event::WorkflowEvent;
use super::status::WorkflowStatus;
use crate::consensus::{ConsensusRound, RoundSettings, RoundTransition};
use crate::coordination::{Agent, CoordinationEvent, KeyedCollection, OrchestrationSession, Upsert};
use crate::core::error::DomainError;
use crate::core::ids::CoordinationId;
use crate::metrics::WorkflowMetrics;
use crate::planning::{PlanningRequest, PlanningRequestPatch, PlanningResponse, SpawnCommand, SpawnResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default cap on the retained coordination events.
pub const DEFAULT_MAX_EVENTS: usize = 100;

/// Result of merging one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event belongs to an inactive coordination id and was dropped
    Ignored,
    /// The event was merged; `round` reports what it did to the current round
    Applied { round: RoundTransition },
}

/// Canonical state of one workflow instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub status: WorkflowStatus,
    /// Draft request, also the last submitted one
    pub request: PlanningRequest,
    pub response: Option<PlanningResponse>,
    pub coordination_id: Option<CoordinationId>,
    pub current_phase: usize,
    pub total_phases: usize,
    pub rounds: Vec<ConsensusRound>,
    pub consensus_complete: bool,
    pub sessions: KeyedCollection<OrchestrationSession>,
    pub agents: KeyedCollection<Agent>,
    /// Most recent coordination events in receipt order
    pub events: KeyedCollection<CoordinationEvent>,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_round(&self) -> Option<&ConsensusRound> {
        self.rounds.last()
    }

    /// Deadline of the current round while consensus is still open.
    pub fn round_deadline(&self) -> Option<DateTime<Utc>> {
        if self.status != WorkflowStatus::Consensus {
            return None;
        }
        self.current_round()
            .filter(|r| r.is_active())
            .map(ConsensusRound::deadline)
    }

    pub fn can_execute(&self) -> bool {
        self.status == WorkflowStatus::Consensus && self.consensus_complete
    }

    pub fn ensure_can_execute(&self) -> Result<(), DomainError> {
        if self.can_execute() {
            return Ok(());
        }
        Err(DomainError::InvalidOperation(format!(
            "cannot execute plan: status is {} and consensus is {}",
            self.status,
            if self.consensus_complete {
                "complete"
            } else {
                "incomplete"
            }
        )))
    }

    pub fn metrics(&self, now: DateTime<Utc>) -> WorkflowMetrics {
        WorkflowMetrics::aggregate(
            self.sessions.as_slice(),
            self.agents.as_slice(),
            self.response.is_some(),
            now,
        )
    }

    /// `idle|failed → planning`.
    ///
    /// Leftovers of a failed attempt are cleared. Returns the coordination
    /// id that was active before, so the caller can drop its membership.
    pub fn begin_planning(
        &mut self,
        request: PlanningRequest,
    ) -> Result<Option<CoordinationId>, DomainError> {
        if !self.status.accepts_submission() {
            return Err(DomainError::InvalidOperation(format!(
                "cannot submit a planning request while {}",
                self.status
            )));
        }

        let previous = self.coordination_id.take();
        self.response = None;
        self.current_phase = 0;
        self.total_phases = 0;
        self.rounds.clear();
        self.consensus_complete = false;
        self.sessions.clear();
        self.agents.clear();
        self.events.clear();
        self.error = None;
        self.request = request;
        self.status = WorkflowStatus::Planning;
        Ok(previous)
    }

    /// `planning → consensus`: store the plan and open round 1.
    ///
    /// The round is evaluated right away, so an empty roster completes it
    /// immediately.
    pub fn plan_accepted(
        &mut self,
        response: PlanningResponse,
        settings: RoundSettings,
        now: DateTime<Utc>,
    ) -> RoundTransition {
        let roster = response.initial_roster(self.request.max_agents);
        let round = ConsensusRound::open(1, roster, settings, now);

        self.coordination_id = Some(response.coordination_id.clone());
        self.total_phases = response.total_phases();
        self.current_phase = 0;
        self.response = Some(response);
        self.rounds = vec![round];
        self.consensus_complete = false;
        self.status = WorkflowStatus::Consensus;

        let transition = match self.rounds.last_mut() {
            Some(round) => round.evaluate(now),
            None => RoundTransition::Unchanged,
        };
        self.on_round_transition(transition);
        transition
    }

    /// `planning → failed`.
    pub fn plan_failed(&mut self, message: impl Into<String>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.fail(message);
    }

    /// `consensus → executing`, yielding the parsed spawn commands.
    ///
    /// `InvalidOperation` leaves the state untouched. A malformed spawn
    /// command fails the workflow and is returned as well.
    pub fn begin_execution(&mut self) -> Result<Vec<SpawnCommand>, DomainError> {
        self.ensure_can_execute()?;
        let commands = self
            .response
            .as_ref()
            .map(|r| SpawnCommand::parse_all(&r.spawn_commands))
            .unwrap_or_else(|| Ok(Vec::new()));

        match commands {
            Ok(commands) => {
                self.status = WorkflowStatus::Executing;
                Ok(commands)
            }
            Err(e) => {
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Record a successful spawn.
    ///
    /// The agent is only inserted when no snapshot for it has arrived yet,
    /// so a live status from the event stream is never overwritten.
    pub fn agent_spawned(&mut self, command: &SpawnCommand, response: &SpawnResponse) {
        if self.agents.contains(&response.agent_id) {
            return;
        }
        let Some(coordination_id) = self.coordination_id.clone() else {
            return;
        };
        self.agents.upsert(Agent::new(
            response.agent_id.clone(),
            coordination_id,
            command.role.clone(),
            command.domain.clone(),
        ));
    }

    /// `executing → completed|failed`.
    pub fn execution_finished(&mut self, result: Result<(), String>) {
        if self.status != WorkflowStatus::Executing {
            return;
        }
        match result {
            Ok(()) => {
                self.status = WorkflowStatus::Completed;
                self.consensus_complete = true;
                self.current_phase = self.total_phases.saturating_sub(1);
            }
            Err(message) => self.fail(message),
        }
    }

    /// Restore the default shape. Returns the coordination id that was
    /// active, if any.
    pub fn reset(&mut self) -> Option<CoordinationId> {
        let previous = self.coordination_id.take();
        *self = Self::default();
        previous
    }

    /// Merge a partial update into the draft request.
    pub fn update_request(&mut self, patch: PlanningRequestPatch) {
        self.request.apply(patch);
    }

    /// Whether `id` is the coordination id currently owned by this state.
    pub fn is_active_coordination(&self, id: &CoordinationId) -> bool {
        self.coordination_id.as_ref() == Some(id)
    }

    /// Merge one inbound event by identity.
    ///
    /// Events for any coordination id other than the active one are
    /// dropped. Consensus-relevant input is forwarded to the current round
    /// while the workflow is in `consensus`; the round itself ignores
    /// coordination event ids it has already counted.
    pub fn apply(
        &mut self,
        event: WorkflowEvent,
        max_events: usize,
        now: DateTime<Utc>,
    ) -> ApplyOutcome {
        if !self.is_active_coordination(event.coordination_id()) {
            return ApplyOutcome::Ignored;
        }

        let transition = match event {
            WorkflowEvent::SessionUpdated(session) => {
                self.sessions.upsert(session);
                RoundTransition::Unchanged
            }
            WorkflowEvent::AgentUpdated(agent) => {
                let transition = match self.open_round_mut() {
                    Some(round) => round.apply_agent_update(&agent, now),
                    None => RoundTransition::Unchanged,
                };
                self.agents.upsert(agent);
                transition
            }
            WorkflowEvent::CoordinationEventReceived(event) => {
                let transition = match self.open_round_mut() {
                    Some(round) => round.apply_coordination_event(&event, now),
                    None => RoundTransition::Unchanged,
                };
                if self.events.upsert(event) == Upsert::Inserted {
                    self.events.retain_last(max_events);
                }
                transition
            }
        };

        self.on_round_transition(transition);
        ApplyOutcome::Applied { round: transition }
    }

    /// Time out the current round if its deadline has passed.
    pub fn check_round_timeout(&mut self, now: DateTime<Utc>) -> RoundTransition {
        let transition = match self.open_round_mut() {
            Some(round) => round.check_timeout(now),
            None => RoundTransition::Unchanged,
        };
        self.on_round_transition(transition);
        transition
    }

    /// Time out the current round because its deadline timer fired.
    pub fn expire_round(&mut self, now: DateTime<Utc>) -> RoundTransition {
        let transition = match self.open_round_mut() {
            Some(round) => round.expire(now),
            None => RoundTransition::Unchanged,
        };
        self.on_round_transition(transition);
        transition
    }

    fn open_round_mut(&mut self) -> Option<&mut ConsensusRound> {
        if self.status != WorkflowStatus::Consensus {
            return None;
        }
        self.rounds.last_mut().filter(|r| r.is_active())
    }

    fn on_round_transition(&mut self, transition: RoundTransition) {
        match transition {
            RoundTransition::Completed => self.consensus_complete = true,
            RoundTransition::TimedOut => {
                let round = self.current_round().map(|r| r.round).unwrap_or(1);
                self.fail(format!("consensus round {round} timed out"));
            }
            RoundTransition::Unchanged | RoundTransition::Updated => {}
        }
    }

    /// Move to `failed` with `message` as the stored error.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = WorkflowStatus::Failed;
        self.error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{RoundStatus, VoteStatus};
    use crate::coordination::{AgentStatus, CoordinationEventType};
    use crate::planning::{PhaseAgent, PlanningPhase};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
    }

    fn plan(agent_ids: &[&str]) -> PlanningResponse {
        let agents = agent_ids
            .iter()
            .map(|id| PhaseAgent::new(*id, "researcher", "auth"))
            .collect();
        PlanningResponse::new(
            "c1",
            vec![
                PlanningPhase::new("analysis", agents),
                PlanningPhase::new("build", vec![]),
            ],
        )
        .with_spawn_commands(vec!["spawn researcher auth".to_string()])
    }

    fn in_consensus(agent_ids: &[&str]) -> WorkflowState {
        let mut state = WorkflowState::new();
        state
            .begin_planning(PlanningRequest::new("Implement auth"))
            .unwrap();
        state.plan_accepted(plan(agent_ids), RoundSettings::default(), t0());
        state
    }

    fn agent_update(id: &str, status: AgentStatus) -> WorkflowEvent {
        WorkflowEvent::AgentUpdated(Agent::new(id, "c1", "researcher", "auth").with_status(status))
    }

    fn vote(id: &str) -> WorkflowEvent {
        WorkflowEvent::CoordinationEventReceived(CoordinationEvent::new(
            id,
            "c1",
            CoordinationEventType::ConsensusVote,
        ))
    }

    #[test]
    fn test_submit_moves_to_consensus() {
        let mut state = WorkflowState::new();
        assert_eq!(state.begin_planning(PlanningRequest::new("x")).unwrap(), None);
        assert_eq!(state.status, WorkflowStatus::Planning);

        state.plan_accepted(plan(&["a1", "a2"]), RoundSettings::default(), t0());
        assert_eq!(state.status, WorkflowStatus::Consensus);
        assert_eq!(state.total_phases, 2);
        assert_eq!(state.coordination_id.as_ref().map(|c| c.as_str()), Some("c1"));

        let round = state.current_round().unwrap();
        assert_eq!(round.round, 1);
        assert_eq!(round.agents.len(), 2);
        assert!(round.agents.iter().all(|a| a.status == VoteStatus::Thinking));
        assert!(!state.can_execute());
    }

    #[test]
    fn test_submit_rejected_while_busy() {
        let mut state = in_consensus(&["a1"]);
        let err = state.begin_planning(PlanningRequest::new("again")).unwrap_err();
        assert!(err.is_invalid_operation());
        assert_eq!(state.status, WorkflowStatus::Consensus);
    }

    #[test]
    fn test_roster_truncated_to_max_agents() {
        let mut state = WorkflowState::new();
        state
            .begin_planning(PlanningRequest::new("x").with_max_agents(2))
            .unwrap();
        state.plan_accepted(plan(&["a1", "a2", "a3"]), RoundSettings::default(), t0());
        assert_eq!(state.current_round().unwrap().agents.len(), 2);
    }

    #[test]
    fn test_empty_roster_allows_execution_immediately() {
        let state = in_consensus(&[]);
        assert!(state.consensus_complete);
        assert!(state.can_execute());
    }

    #[test]
    fn test_plan_failure_counts_retry() {
        let mut state = WorkflowState::new();
        state.begin_planning(PlanningRequest::new("x")).unwrap();
        state.plan_failed("connection refused");
        assert_eq!(state.status, WorkflowStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("connection refused"));
        assert_eq!(state.retry_count, 1);

        // failed accepts a new submission and clears the error
        state.begin_planning(PlanningRequest::new("x")).unwrap();
        assert!(state.error.is_none());
        assert_eq!(state.retry_count, 1);
    }

    #[test]
    fn test_votes_complete_round_and_enable_execute() {
        let mut state = in_consensus(&["a1", "a2"]);
        let now = t0() + Duration::seconds(1);

        state.apply(agent_update("a1", AgentStatus::Completed), DEFAULT_MAX_EVENTS, now);
        assert!(!state.can_execute());
        let outcome = state.apply(agent_update("a2", AgentStatus::Completed), DEFAULT_MAX_EVENTS, now);
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                round: RoundTransition::Completed
            }
        );
        assert!(state.can_execute());
        assert_eq!(state.agents.len(), 2);
    }

    #[test]
    fn test_duplicate_agent_update_is_idempotent() {
        let mut state = in_consensus(&["a1", "a2"]);
        for _ in 0..2 {
            state.apply(agent_update("a1", AgentStatus::Working), DEFAULT_MAX_EVENTS, t0());
        }
        assert_eq!(state.agents.len(), 1);
    }

    #[test]
    fn test_foreign_coordination_id_ignored() {
        let mut state = in_consensus(&["a1"]);
        let foreign = WorkflowEvent::AgentUpdated(Agent::new("a9", "other", "r", "d"));
        assert_eq!(state.apply(foreign, DEFAULT_MAX_EVENTS, t0()), ApplyOutcome::Ignored);
        assert!(state.agents.is_empty());
    }

    #[test]
    fn test_events_before_plan_are_ignored() {
        let mut state = WorkflowState::new();
        state.begin_planning(PlanningRequest::new("x")).unwrap();
        assert_eq!(state.apply(vote("e1"), DEFAULT_MAX_EVENTS, t0()), ApplyOutcome::Ignored);
    }

    #[test]
    fn test_duplicate_event_does_not_raise_convergence_twice() {
        let mut state = in_consensus(&["a1"]);
        state.apply(vote("e1"), DEFAULT_MAX_EVENTS, t0());
        state.apply(vote("e1"), DEFAULT_MAX_EVENTS, t0());
        assert_eq!(state.events.len(), 1);
        assert!((state.current_round().unwrap().convergence - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_redelivery_after_log_eviction_not_counted_again() {
        let mut state = in_consensus(&["a1"]);
        state.apply(vote("e1"), 2, t0());
        for i in 0..3 {
            let event = CoordinationEvent::new(format!("t{i}"), "c1", CoordinationEventType::TaskAssigned);
            state.apply(WorkflowEvent::CoordinationEventReceived(event), 2, t0());
        }
        assert!(!state.events.contains("e1"));

        state.apply(vote("e1"), 2, t0());
        assert!((state.current_round().unwrap().convergence - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_event_log_capped() {
        let mut state = in_consensus(&["a1"]);
        for i in 0..5 {
            let event = CoordinationEvent::new(format!("e{i}"), "c1", CoordinationEventType::TaskAssigned);
            state.apply(WorkflowEvent::CoordinationEventReceived(event), 3, t0());
        }
        let ids: Vec<_> = state.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn test_round_timeout_fails_workflow() {
        let mut state = in_consensus(&["a1"]);
        assert_eq!(state.round_deadline(), Some(t0() + Duration::milliseconds(30_000)));
        assert_eq!(
            state.check_round_timeout(t0() + Duration::seconds(31)),
            RoundTransition::TimedOut
        );
        assert_eq!(state.status, WorkflowStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("consensus round 1 timed out"));
        assert_eq!(state.current_round().unwrap().status, RoundStatus::Timeout);
        assert_eq!(state.round_deadline(), None);
    }

    #[test]
    fn test_expire_round_only_during_consensus() {
        let mut state = in_consensus(&["a1"]);
        assert_eq!(state.expire_round(t0()), RoundTransition::TimedOut);
        assert_eq!(state.status, WorkflowStatus::Failed);
        // already failed, nothing left to expire
        assert_eq!(state.expire_round(t0()), RoundTransition::Unchanged);
    }

    #[test]
    fn test_execute_requires_consensus() {
        let mut idle = WorkflowState::new();
        assert!(idle.begin_execution().unwrap_err().is_invalid_operation());

        let mut pending = in_consensus(&["a1"]);
        assert!(pending.begin_execution().unwrap_err().is_invalid_operation());
        assert_eq!(pending.status, WorkflowStatus::Consensus);
    }

    #[test]
    fn test_execution_lifecycle() {
        let mut state = in_consensus(&[]);
        let commands = state.begin_execution().unwrap();
        assert_eq!(commands, vec![SpawnCommand::new("researcher", "auth")]);
        assert_eq!(state.status, WorkflowStatus::Executing);

        let response = SpawnResponse {
            agent_id: "agent-7".to_string(),
            success: true,
        };
        state.agent_spawned(&commands[0], &response);
        assert_eq!(state.agents.get("agent-7").unwrap().status, AgentStatus::Idle);

        state.execution_finished(Ok(()));
        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(state.current_phase, 1);
    }

    #[test]
    fn test_spawned_agent_does_not_clobber_live_snapshot() {
        let mut state = in_consensus(&[]);
        let commands = state.begin_execution().unwrap();
        state.apply(agent_update("agent-7", AgentStatus::Working), DEFAULT_MAX_EVENTS, t0());
        state.agent_spawned(
            &commands[0],
            &SpawnResponse {
                agent_id: "agent-7".to_string(),
                success: true,
            },
        );
        assert_eq!(state.agents.get("agent-7").unwrap().status, AgentStatus::Working);
    }

    #[test]
    fn test_malformed_spawn_command_fails_workflow() {
        let mut state = WorkflowState::new();
        state.begin_planning(PlanningRequest::new("x")).unwrap();
        let response = PlanningResponse::new("c1", vec![])
            .with_spawn_commands(vec!["launch researcher".to_string()]);
        state.plan_accepted(response, RoundSettings::default(), t0());

        let err = state.begin_execution().unwrap_err();
        assert!(!err.is_invalid_operation());
        assert_eq!(state.status, WorkflowStatus::Failed);
    }

    #[test]
    fn test_execution_failure_keeps_spawned_agents() {
        let mut state = in_consensus(&[]);
        let commands = state.begin_execution().unwrap();
        state.agent_spawned(
            &commands[0],
            &SpawnResponse {
                agent_id: "agent-1".to_string(),
                success: true,
            },
        );
        state.execution_finished(Err("spawn failed".to_string()));
        assert_eq!(state.status, WorkflowStatus::Failed);
        assert_eq!(state.agents.len(), 1);
    }

    #[test]
    fn test_reset_restores_default_shape() {
        let mut state = in_consensus(&["a1"]);
        state.apply(vote("e1"), DEFAULT_MAX_EVENTS, t0());
        state.retry_count = 4;
        state.update_request(PlanningRequestPatch::default().objective("changed"));

        let previous = state.reset();
        assert_eq!(previous.as_ref().map(|c| c.as_str()), Some("c1"));
        assert_eq!(state, WorkflowState::default());
        assert_eq!(state.reset(), None);
    }

    #[test]
    fn test_update_request_keeps_status() {
        let mut state = in_consensus(&["a1"]);
        state.update_request(PlanningRequestPatch::default().max_agents(0));
        assert_eq!(state.request.max_agents, 1);
        assert_eq!(state.status, WorkflowStatus::Consensus);
    }

    #[test]
    fn test_events_after_completion_still_merge() {
        let mut state = in_consensus(&[]);
        state.begin_execution().unwrap();
        state.execution_finished(Ok(()));
        let outcome = state.apply(agent_update("a1", AgentStatus::Active), DEFAULT_MAX_EVENTS, t0());
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                round: RoundTransition::Unchanged
            }
        );
        assert_eq!(state.agents.len(), 1);
    }

    #[test]
    fn test_metrics_from_state() {
        let mut state = in_consensus(&[]);
        let session = OrchestrationSession::new("s1", "c1", t0()).with_metrics(1.5, 300);
        state.apply(WorkflowEvent::SessionUpdated(session), DEFAULT_MAX_EVENTS, t0());
        let metrics = state.metrics(t0() + Duration::seconds(2));
        assert_eq!(metrics.total_cost, 1.5);
        assert_eq!(metrics.execution_time_ms, 2_000);
    }
}
