//! Consensus round tracking
//!
//! A [`ConsensusRound`] is one bounded-time cycle in which a fixed agent
//! roster moves from `thinking` to `voted`/`timeout`. Convergence rises as
//! consensus-relevant coordination events arrive.
//!
//! ```text
//!                 convergence ≥ 1.0
//!              or every agent settled
//!   ┌────────┐ ─────────────────────▶ ┌───────────┐
//!   │ Active │                        │ Completed │
//!   └────────┘ ─────────────────────▶ ┌───────────┐
//!               now - start > timeout │  Timeout  │
//!                                     └───────────┘
//! ```
//!
//! All mutators take the current time explicitly so the tracker stays pure.

use super::agent::{AgentConsensus, AgentTransition, DEFAULT_REPUTATION};
use crate::coordination::{Agent, CoordinationEvent, CoordinationEventType};
use crate::planning::PhaseAgent;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Convergence added per consensus-relevant event.
pub const DEFAULT_CONVERGENCE_STEP: f64 = 0.1;

/// Default round deadline in milliseconds.
pub const DEFAULT_ROUND_TIMEOUT_MS: u64 = 30_000;

// Absorbs float drift from repeated 0.1 steps
const CONVERGENCE_EPSILON: f64 = 1e-9;

/// Status of a consensus round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Active,
    Completed,
    Timeout,
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundStatus::Active => write!(f, "active"),
            RoundStatus::Completed => write!(f, "completed"),
            RoundStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// Tunables applied when a round opens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundSettings {
    pub timeout_ms: u64,
    pub convergence_step: f64,
    pub default_reputation: f64,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_ROUND_TIMEOUT_MS,
            convergence_step: DEFAULT_CONVERGENCE_STEP,
            default_reputation: DEFAULT_REPUTATION,
        }
    }
}

/// What a mutation did to the round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundTransition {
    /// The input did not touch this round
    Unchanged,
    /// State changed, round still active
    Updated,
    /// The round just reached `completed`
    Completed,
    /// The round just reached `timeout`
    TimedOut,
}

impl RoundTransition {
    /// Whether the round left `active` with this transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundTransition::Completed | RoundTransition::TimedOut)
    }
}

/// One round of agent deliberation.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use conclave_domain::consensus::{ConsensusRound, RoundSettings, RoundStatus};
///
/// // An empty roster is vacuously complete
/// let mut round = ConsensusRound::open(1, &[], RoundSettings::default(), Utc::now());
/// assert!(round.is_eligible_for_completion());
/// round.evaluate(Utc::now());
/// assert_eq!(round.status, RoundStatus::Completed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRound {
    /// Round number (1-based)
    pub round: u32,
    pub agents: Vec<AgentConsensus>,
    /// 0.0 to 1.0, non-decreasing within the round
    pub convergence: f64,
    pub convergence_step: f64,
    pub timeout_ms: u64,
    pub status: RoundStatus,
    /// Vote value → number of agents that cast it
    pub votes: BTreeMap<String, u32>,
    pub start_time: DateTime<Utc>,
    /// Set only once the round leaves `active`
    pub end_time: Option<DateTime<Utc>>,
    /// Ids of coordination events already counted towards convergence
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub seen_events: BTreeSet<String>,
}

impl ConsensusRound {
    /// Open a round with every roster agent thinking.
    pub fn open(
        round: u32,
        roster: &[PhaseAgent],
        settings: RoundSettings,
        now: DateTime<Utc>,
    ) -> Self {
        let agents = roster
            .iter()
            .enumerate()
            .map(|(i, a)| AgentConsensus::from_phase_agent(a, i, settings.default_reputation))
            .collect();

        Self {
            round,
            agents,
            convergence: 0.0,
            convergence_step: settings.convergence_step,
            timeout_ms: settings.timeout_ms,
            status: RoundStatus::Active,
            votes: BTreeMap::new(),
            start_time: now,
            end_time: None,
            seen_events: BTreeSet::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RoundStatus::Active
    }

    pub fn is_complete(&self) -> bool {
        self.status == RoundStatus::Completed
    }

    /// Point in time after which an active round times out.
    pub fn deadline(&self) -> DateTime<Utc> {
        let timeout = i64::try_from(self.timeout_ms).unwrap_or(i64::MAX);
        self.start_time
            .checked_add_signed(Duration::milliseconds(timeout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn tracks(&self, agent_id: &str) -> bool {
        self.agents.iter().any(|a| a.agent_id == agent_id)
    }

    pub fn settled_count(&self) -> usize {
        self.agents.iter().filter(|a| a.status.is_settled()).count()
    }

    /// Whether the completion criteria hold right now.
    ///
    /// An empty roster satisfies "every agent settled" vacuously.
    pub fn is_eligible_for_completion(&self) -> bool {
        self.convergence >= 1.0 || self.agents.iter().all(|a| a.status.is_settled())
    }

    /// Feed an agent snapshot. Untracked agents are ignored.
    pub fn apply_agent_update(&mut self, agent: &Agent, now: DateTime<Utc>) -> RoundTransition {
        if !self.is_active() {
            return RoundTransition::Unchanged;
        }
        if let Some(t) = self.expire_if_due(now) {
            return t;
        }
        let Some(member) = self.agents.iter_mut().find(|a| a.agent_id == agent.id) else {
            return RoundTransition::Unchanged;
        };

        match member.observe(agent) {
            AgentTransition::Unchanged => RoundTransition::Unchanged,
            AgentTransition::Refreshed => RoundTransition::Updated,
            AgentTransition::Voted(vote) => {
                *self.votes.entry(vote).or_insert(0) += 1;
                self.evaluate(now)
            }
        }
    }

    /// Feed a coordination event. Only consensus-relevant types move
    /// convergence; `consensus_reached` saturates it. Each event id counts
    /// once per round, however often it is redelivered.
    pub fn apply_coordination_event(
        &mut self,
        event: &CoordinationEvent,
        now: DateTime<Utc>,
    ) -> RoundTransition {
        if !self.is_active() || !event.event_type.is_consensus_relevant() {
            return RoundTransition::Unchanged;
        }
        if let Some(t) = self.expire_if_due(now) {
            return t;
        }
        if !self.seen_events.insert(event.id.clone()) {
            return RoundTransition::Unchanged;
        }

        if event.event_type == CoordinationEventType::ConsensusReached {
            self.convergence = 1.0;
        } else {
            self.raise_convergence(self.convergence_step);
        }
        self.evaluate(now)
    }

    /// Time out the round if its deadline has passed.
    pub fn check_timeout(&mut self, now: DateTime<Utc>) -> RoundTransition {
        if !self.is_active() {
            return RoundTransition::Unchanged;
        }
        self.expire_if_due(now).unwrap_or(RoundTransition::Unchanged)
    }

    /// Time out the round unconditionally, for callers that own the deadline
    /// timer themselves.
    pub fn expire(&mut self, now: DateTime<Utc>) -> RoundTransition {
        if !self.is_active() {
            return RoundTransition::Unchanged;
        }
        for agent in &mut self.agents {
            agent.time_out();
        }
        self.status = RoundStatus::Timeout;
        self.end_time = Some(now);
        RoundTransition::TimedOut
    }

    /// Complete the round if its completion criteria hold.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> RoundTransition {
        if !self.is_active() {
            return RoundTransition::Unchanged;
        }
        if self.is_eligible_for_completion() {
            self.status = RoundStatus::Completed;
            self.end_time = Some(now);
            return RoundTransition::Completed;
        }
        RoundTransition::Updated
    }

    fn expire_if_due(&mut self, now: DateTime<Utc>) -> Option<RoundTransition> {
        if now <= self.deadline() {
            return None;
        }
        Some(self.expire(now))
    }

    fn raise_convergence(&mut self, step: f64) {
        let next = self.convergence + step.max(0.0);
        self.convergence = if next >= 1.0 - CONVERGENCE_EPSILON {
            1.0
        } else {
            next
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::VoteStatus;
    use crate::coordination::AgentStatus;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn ms(n: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(n)
    }

    fn roster(ids: &[&str]) -> Vec<PhaseAgent> {
        ids.iter()
            .map(|id| PhaseAgent::new(*id, "researcher", "auth"))
            .collect()
    }

    fn vote_event(id: &str) -> CoordinationEvent {
        CoordinationEvent::new(id, "c1", CoordinationEventType::ConsensusVote)
    }

    fn agent(id: &str, status: AgentStatus) -> Agent {
        Agent::new(id, "c1", "researcher", "auth").with_status(status)
    }

    #[test]
    fn test_open_round_seeds_thinking_agents() {
        let round = ConsensusRound::open(1, &roster(&["a1", "a2"]), RoundSettings::default(), t0());
        assert_eq!(round.round, 1);
        assert_eq!(round.status, RoundStatus::Active);
        assert_eq!(round.agents.len(), 2);
        assert!(round.agents.iter().all(|a| a.status == VoteStatus::Thinking));
        assert_eq!(round.convergence, 0.0);
        assert!(round.end_time.is_none());
        assert_eq!(round.deadline(), ms(30_000));
    }

    #[test]
    fn test_convergence_reaches_exactly_one_after_ten_steps() {
        let mut round = ConsensusRound::open(1, &roster(&["a1"]), RoundSettings::default(), t0());
        let mut last = 0.0;
        for i in 0..9 {
            let t = round.apply_coordination_event(&vote_event(&format!("e{i}")), ms(i));
            assert_eq!(t, RoundTransition::Updated);
            assert!(round.convergence >= last && round.convergence < 1.0);
            last = round.convergence;
        }
        let t = round.apply_coordination_event(&vote_event("e9"), ms(10));
        assert_eq!(t, RoundTransition::Completed);
        assert_eq!(round.convergence, 1.0);
        assert_eq!(round.status, RoundStatus::Completed);
        assert_eq!(round.end_time, Some(ms(10)));
    }

    #[test]
    fn test_convergence_capped_and_frozen_after_completion() {
        let settings = RoundSettings {
            convergence_step: 0.6,
            ..Default::default()
        };
        let mut round = ConsensusRound::open(1, &roster(&["a1"]), settings, t0());
        round.apply_coordination_event(&vote_event("e1"), ms(1));
        round.apply_coordination_event(&vote_event("e2"), ms(2));
        assert_eq!(round.convergence, 1.0);
        assert_eq!(
            round.apply_coordination_event(&vote_event("e3"), ms(3)),
            RoundTransition::Unchanged
        );
        assert_eq!(round.convergence, 1.0);
    }

    #[test]
    fn test_redelivered_event_counted_once() {
        let mut round = ConsensusRound::open(1, &roster(&["a1"]), RoundSettings::default(), t0());
        round.apply_coordination_event(&vote_event("e1"), ms(1));
        assert_eq!(
            round.apply_coordination_event(&vote_event("e1"), ms(2)),
            RoundTransition::Unchanged
        );
        assert!((round.convergence - 0.1).abs() < 1e-12);
        assert!(round.seen_events.contains("e1"));
    }

    #[test]
    fn test_irrelevant_events_ignored() {
        let mut round = ConsensusRound::open(1, &roster(&["a1"]), RoundSettings::default(), t0());
        let event = CoordinationEvent::new("e1", "c1", CoordinationEventType::TaskAssigned);
        assert_eq!(round.apply_coordination_event(&event, ms(1)), RoundTransition::Unchanged);
        assert_eq!(round.convergence, 0.0);
    }

    #[test]
    fn test_consensus_reached_completes_immediately() {
        let mut round = ConsensusRound::open(1, &roster(&["a1"]), RoundSettings::default(), t0());
        let event = CoordinationEvent::new("e1", "c1", CoordinationEventType::ConsensusReached);
        assert_eq!(round.apply_coordination_event(&event, ms(1)), RoundTransition::Completed);
    }

    #[test]
    fn test_all_agents_voted_completes_round() {
        let mut round =
            ConsensusRound::open(1, &roster(&["a1", "a2"]), RoundSettings::default(), t0());

        assert_eq!(
            round.apply_agent_update(&agent("a1", AgentStatus::Completed), ms(5)),
            RoundTransition::Updated
        );
        assert_eq!(
            round.apply_agent_update(&agent("a2", AgentStatus::Completed), ms(6)),
            RoundTransition::Completed
        );
        assert_eq!(round.votes.get("completed"), Some(&2));
        assert_eq!(round.settled_count(), 2);
    }

    #[test]
    fn test_untracked_agent_ignored() {
        let mut round = ConsensusRound::open(1, &roster(&["a1"]), RoundSettings::default(), t0());
        assert_eq!(
            round.apply_agent_update(&agent("zz", AgentStatus::Completed), ms(1)),
            RoundTransition::Unchanged
        );
        assert!(round.votes.is_empty());
    }

    #[test]
    fn test_duplicate_vote_counted_once() {
        let mut round =
            ConsensusRound::open(1, &roster(&["a1", "a2"]), RoundSettings::default(), t0());
        round.apply_agent_update(&agent("a1", AgentStatus::Completed), ms(1));
        round.apply_agent_update(&agent("a1", AgentStatus::Completed), ms(2));
        assert_eq!(round.votes.get("completed"), Some(&1));
        assert!(round.is_active());
    }

    #[test]
    fn test_timeout_marks_thinking_agents() {
        let mut round =
            ConsensusRound::open(1, &roster(&["a1", "a2"]), RoundSettings::default(), t0());
        round.apply_agent_update(&agent("a1", AgentStatus::Completed), ms(10));

        assert_eq!(round.check_timeout(ms(30_000)), RoundTransition::Unchanged);
        assert_eq!(round.check_timeout(ms(30_001)), RoundTransition::TimedOut);
        assert_eq!(round.status, RoundStatus::Timeout);
        assert_eq!(round.end_time, Some(ms(30_001)));
        assert_eq!(round.agents[0].status, VoteStatus::Voted);
        assert_eq!(round.agents[1].status, VoteStatus::Timeout);
    }

    #[test]
    fn test_late_update_after_deadline_times_out_instead() {
        let mut round = ConsensusRound::open(1, &roster(&["a1"]), RoundSettings::default(), t0());
        let t = round.apply_agent_update(&agent("a1", AgentStatus::Completed), ms(40_000));
        assert_eq!(t, RoundTransition::TimedOut);
        assert!(round.votes.is_empty());
    }

    #[test]
    fn test_expire_ignores_deadline_but_not_status() {
        let mut round = ConsensusRound::open(1, &roster(&["a1"]), RoundSettings::default(), t0());
        assert_eq!(round.expire(ms(5)), RoundTransition::TimedOut);
        assert_eq!(round.agents[0].status, VoteStatus::Timeout);
        assert_eq!(round.expire(ms(6)), RoundTransition::Unchanged);
        assert_eq!(round.end_time, Some(ms(5)));
    }

    #[test]
    fn test_empty_roster_is_vacuously_complete() {
        let mut round = ConsensusRound::open(1, &[], RoundSettings::default(), t0());
        assert!(round.is_eligible_for_completion());
        assert_eq!(round.evaluate(t0()), RoundTransition::Completed);
        assert!(round.is_complete());
    }
}
