//! Workflow engine use case
//!
//! Drives one workflow instance through
//! `idle → planning → consensus → executing → {completed, failed}`.
//!
//! # Concurrency
//!
//! A single actor task owns the [`WorkflowState`]. Every mutation source is
//! serialized through its `select!` loop:
//!
//! - commands from [`WorkflowHandle`] (submit, execute, reset, update),
//! - completions posted by spawned network tasks,
//! - decoded events from the active [`EventStream`],
//! - the deadline timer of the open consensus round.
//!
//! Network work never runs on the actor itself, so inbound events keep
//! flowing while a submission or execution is pending. Completions carry the
//! epoch they were started in; reset and resubmission bump the epoch, which
//! turns late completions into no-ops.
//!
//! Joins and leaves go through a separate membership worker that applies
//! them in request order. A reset only queues its leave, so it returns at
//! once even while the subscriber is reconnecting.

use crate::config::EngineConfig;
use crate::ports::event_subscriber::{EventError, EventStream, EventSubscriber};
use crate::ports::planning_api::PlanningApi;
use crate::ports::workflow_logger::{
    NoWorkflowLogger, WorkflowLogEntry, WorkflowLogEvent, WorkflowLogger,
};
use chrono::Utc;
use conclave_domain::{
    ApplyOutcome, CoordinationId, DomainError, PlanningRequest, PlanningRequestPatch,
    PlanningResponse, RoundTransition, SpawnCommand, SpawnRequest, SpawnResponse, WorkflowEvent,
    WorkflowMetrics, WorkflowState, WorkflowStatus,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the command channel between handles and the actor.
const COMMAND_BUFFER: usize = 32;

/// Errors returned to callers of [`WorkflowHandle`].
///
/// Network and consensus failures never appear here: they move the workflow
/// to `failed` and are stored in [`WorkflowState::error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Workflow engine is not running")]
    EngineStopped,
}

impl WorkflowError {
    /// Check if this error is a contract violation by the caller
    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, WorkflowError::Domain(e) if e.is_invalid_operation())
    }
}

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Submit {
        request: PlanningRequest,
        reply: Reply<Result<WorkflowStatus, WorkflowError>>,
    },
    Execute {
        reply: Reply<Result<WorkflowStatus, WorkflowError>>,
    },
    Reset {
        reply: Reply<()>,
    },
    UpdateRequest {
        patch: PlanningRequestPatch,
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Subscription changes, applied in request order by the membership worker.
enum Membership {
    Join {
        epoch: u64,
        coordination_id: CoordinationId,
    },
    Leave(CoordinationId),
}

enum Completion {
    Planned {
        epoch: u64,
        result: Result<PlanningResponse, String>,
    },
    Subscribed {
        epoch: u64,
        coordination_id: CoordinationId,
        result: Result<EventStream, EventError>,
    },
    Spawned {
        epoch: u64,
        command: SpawnCommand,
        result: Result<SpawnResponse, String>,
    },
    ExecutionSettled {
        epoch: u64,
        result: Result<(), String>,
    },
}

/// Builder for a workflow actor.
pub struct WorkflowEngine {
    api: Arc<dyn PlanningApi>,
    subscriber: Arc<dyn EventSubscriber>,
    logger: Arc<dyn WorkflowLogger>,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(api: Arc<dyn PlanningApi>, subscriber: Arc<dyn EventSubscriber>) -> Self {
        Self {
            api,
            subscriber,
            logger: Arc::new(NoWorkflowLogger),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn WorkflowLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Start the actor task and return a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> WorkflowHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (membership_tx, membership_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(WorkflowState::default());

        let membership_cancel = CancellationToken::new();
        let membership_worker = tokio::spawn(run_membership(
            self.subscriber,
            membership_rx,
            completion_tx.clone(),
            membership_cancel.clone(),
        ));

        let actor = WorkflowActor {
            api: self.api,
            logger: self.logger,
            config: self.config,
            state: WorkflowState::default(),
            state_tx,
            completion_tx,
            membership: membership_tx,
            membership_cancel,
            epoch: 0,
            stream: None,
            round_timer: None,
            pending_submit: None,
            pending_execute: None,
        };
        let task = tokio::spawn(actor.run(command_rx, completion_rx, membership_worker));

        WorkflowHandle {
            commands: command_tx,
            state: state_rx,
            task: Arc::new(std::sync::Mutex::new(Some(task))),
        }
    }
}

/// Cloneable handle to a running workflow actor.
#[derive(Clone)]
pub struct WorkflowHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<WorkflowState>,
    task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl WorkflowHandle {
    /// Submit a planning request (`idle|failed → planning`).
    ///
    /// Resolves once the submission has settled: with `consensus` after the
    /// plan is stored and its event subscription is live, or with `failed`.
    pub async fn submit_planning_request(
        &self,
        request: PlanningRequest,
    ) -> Result<WorkflowStatus, WorkflowError> {
        self.call(|reply| Command::Submit { request, reply }).await?
    }

    /// Spawn every agent of the plan (`consensus → executing`).
    ///
    /// Fails with `InvalidOperation` unless [`Self::can_execute`] holds.
    /// Resolves with `completed` or `failed` once every spawn has settled.
    pub async fn execute_plan(&self) -> Result<WorkflowStatus, WorkflowError> {
        self.call(|reply| Command::Execute { reply }).await?
    }

    /// Restore the default state and queue a leave for the active
    /// coordination. Does not wait for the leave to reach the subscriber.
    pub async fn reset_workflow(&self) -> Result<(), WorkflowError> {
        self.call(|reply| Command::Reset { reply }).await
    }

    /// Merge `patch` into the draft request without touching the status.
    pub async fn update_request(&self, patch: PlanningRequestPatch) -> Result<(), WorkflowError> {
        self.call(|reply| Command::UpdateRequest { patch, reply }).await
    }

    /// Copy of the latest published state.
    pub fn snapshot(&self) -> WorkflowState {
        self.state.borrow().clone()
    }

    /// Metrics over the latest published state.
    pub fn metrics(&self) -> WorkflowMetrics {
        self.state.borrow().metrics(Utc::now())
    }

    pub fn can_execute(&self) -> bool {
        self.state.borrow().can_execute()
    }

    /// Receiver notified after every state mutation.
    pub fn watch(&self) -> watch::Receiver<WorkflowState> {
        self.state.clone()
    }

    /// Stop the actor. Resolves after its pending leaves were applied.
    pub async fn shutdown(&self) -> Result<(), WorkflowError> {
        let result = self.call(|reply| Command::Shutdown { reply }).await;
        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            let _ = task.await;
        }
        result
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, WorkflowError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| WorkflowError::EngineStopped)?;
        response.await.map_err(|_| WorkflowError::EngineStopped)
    }
}

struct WorkflowActor {
    api: Arc<dyn PlanningApi>,
    logger: Arc<dyn WorkflowLogger>,
    config: EngineConfig,
    state: WorkflowState,
    state_tx: watch::Sender<WorkflowState>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    membership: mpsc::UnboundedSender<Membership>,
    membership_cancel: CancellationToken,
    epoch: u64,
    stream: Option<EventStream>,
    round_timer: Option<Instant>,
    pending_submit: Option<Reply<Result<WorkflowStatus, WorkflowError>>>,
    pending_execute: Option<Reply<Result<WorkflowStatus, WorkflowError>>>,
}

impl WorkflowActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        membership_worker: JoinHandle<()>,
    ) {
        info!("Workflow engine started");
        loop {
            let timer = self.round_timer;
            tokio::select! {
                biased;

                Some(completion) = completions.recv() => self.on_completion(completion),

                command = commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.leave_active();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.on_command(command),
                    None => {
                        self.leave_active();
                        break;
                    }
                },

                event = next_event(&mut self.stream) => match event {
                    Some(event) => self.on_event(event),
                    None => {
                        warn!("Event stream ended");
                        self.stream = None;
                    }
                },

                _ = wait_until(timer) => self.on_round_timer(),
            }
        }

        // Joins still queued are abandoned; leaves are drained
        self.membership_cancel.cancel();
        drop(self);
        if let Err(e) = membership_worker.await {
            warn!(error = %e, "Membership worker failed");
        }
        info!("Workflow engine stopped");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Submit { request, reply } => self.submit(request, reply),
            Command::Execute { reply } => self.execute(reply),
            Command::Reset { reply } => {
                self.reset();
                let _ = reply.send(());
            }
            Command::UpdateRequest { patch, reply } => {
                self.state.update_request(patch);
                self.publish();
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn submit(&mut self, request: PlanningRequest, reply: Reply<Result<WorkflowStatus, WorkflowError>>) {
        let previous = match self.state.begin_planning(request.clone()) {
            Ok(previous) => previous,
            Err(e) => {
                let _ = reply.send(Err(e.into()));
                return;
            }
        };

        self.epoch += 1;
        self.stream = None;
        self.round_timer = None;
        if let Some(previous) = previous {
            self.leave(previous);
        }

        info!(
            objective = %request.objective,
            complexity = %request.complexity,
            max_agents = request.max_agents,
            "Submitting planning request"
        );
        self.journal(WorkflowLogEvent::PlanSubmitted {
            objective: request.objective.clone(),
            complexity: request.complexity,
            pattern: request.pattern.clone(),
            max_agents: request.max_agents,
        });
        self.pending_submit = Some(reply);
        self.publish();

        let api = Arc::clone(&self.api);
        let policy = self.config.retry;
        let tx = self.completion_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = policy
                .execute(|| api.submit_plan(&request))
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(Completion::Planned { epoch, result });
        });
    }

    fn execute(&mut self, reply: Reply<Result<WorkflowStatus, WorkflowError>>) {
        let commands = match self.state.begin_execution() {
            Ok(commands) => commands,
            Err(e) if e.is_invalid_operation() => {
                let _ = reply.send(Err(e.into()));
                return;
            }
            Err(e) => {
                warn!(error = %e, "Execution aborted");
                self.journal(WorkflowLogEvent::ExecutionFailed {
                    error: e.to_string(),
                    agents: self.state.agents.len(),
                });
                self.publish();
                let _ = reply.send(Ok(self.state.status));
                return;
            }
        };

        let Some(coordination_id) = self.state.coordination_id.clone() else {
            self.state.execution_finished(Err("no active coordination id".to_string()));
            self.publish();
            let _ = reply.send(Ok(self.state.status));
            return;
        };

        info!(
            coordination_id = %coordination_id,
            spawns = commands.len(),
            "Executing plan"
        );
        self.round_timer = None;
        self.pending_execute = Some(reply);
        self.publish();

        tokio::spawn(fan_out_spawns(
            Arc::clone(&self.api),
            self.config,
            coordination_id,
            self.state.request.context.clone(),
            commands,
            self.epoch,
            self.completion_tx.clone(),
        ));
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.stream = None;
        self.round_timer = None;
        if let Some(previous) = self.state.reset() {
            self.leave(previous);
        }

        for pending in [self.pending_submit.take(), self.pending_execute.take()]
            .into_iter()
            .flatten()
        {
            let _ = pending.send(Ok(WorkflowStatus::Idle));
        }

        info!("Workflow reset");
        self.journal(WorkflowLogEvent::WorkflowReset);
        self.publish();
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Planned { epoch, result } if epoch == self.epoch => {
                self.on_planned(result)
            }
            Completion::Subscribed {
                epoch,
                coordination_id,
                result,
            } => self.on_subscribed(epoch, coordination_id, result),
            Completion::Spawned {
                epoch,
                command,
                result,
            } if epoch == self.epoch => self.on_spawned(command, result),
            Completion::ExecutionSettled { epoch, result } if epoch == self.epoch => {
                self.on_execution_settled(result)
            }
            _ => debug!("Discarded completion from a previous epoch"),
        }
    }

    fn on_planned(&mut self, result: Result<PlanningResponse, String>) {
        let response = match result {
            Ok(response) => response,
            Err(message) => {
                warn!(error = %message, "Planning request failed");
                self.state.plan_failed(message.clone());
                self.journal(WorkflowLogEvent::PlanFailed {
                    error: message,
                    retry_count: self.state.retry_count,
                });
                self.publish();
                self.reply_submit();
                return;
            }
        };

        let coordination_id = response.coordination_id.clone();
        let transition = self
            .state
            .plan_accepted(response, self.config.round, Utc::now());
        let roster = self.state.current_round().map_or(0, |r| r.agents.len());

        info!(
            coordination_id = %coordination_id,
            phases = self.state.total_phases,
            roster,
            "Plan accepted, consensus round 1 opened"
        );
        self.journal(WorkflowLogEvent::PlanAccepted {
            total_phases: self.state.total_phases,
            roster,
        });
        self.on_round_transition(transition);
        if self.state.round_deadline().is_some() {
            self.round_timer = Some(Instant::now() + self.config.round_timeout());
        }
        self.publish();

        self.request_membership(Membership::Join {
            epoch: self.epoch,
            coordination_id,
        });
    }

    fn on_subscribed(
        &mut self,
        epoch: u64,
        coordination_id: CoordinationId,
        result: Result<EventStream, EventError>,
    ) {
        let current = epoch == self.epoch && self.state.is_active_coordination(&coordination_id);
        if !current {
            // membership joined after the workflow moved on
            if result.is_ok() {
                self.leave(coordination_id);
            }
            return;
        }

        match result {
            Ok(stream) => {
                debug!(coordination_id = %coordination_id, "Event subscription active");
                self.stream = Some(stream);
            }
            Err(e) => {
                warn!(coordination_id = %coordination_id, error = %e, "Event subscription failed");
                self.round_timer = None;
                self.state.fail(format!("event subscription failed: {e}"));
                self.publish();
            }
        }
        self.reply_submit();
    }

    fn on_spawned(&mut self, command: SpawnCommand, result: Result<SpawnResponse, String>) {
        match result {
            Ok(response) => {
                info!(agent_id = %response.agent_id, command = %command, "Agent spawned");
                self.state.agent_spawned(&command, &response);
                self.journal(WorkflowLogEvent::AgentSpawned {
                    agent_id: response.agent_id,
                    role: command.role,
                    domain: command.domain,
                });
                self.publish();
            }
            Err(message) => {
                warn!(command = %command, error = %message, "Spawn failed");
                self.journal(WorkflowLogEvent::SpawnFailed {
                    command: command.to_string(),
                    error: message,
                });
            }
        }
    }

    fn on_execution_settled(&mut self, result: Result<(), String>) {
        let error = result.as_ref().err().cloned();
        self.state.execution_finished(result);

        info!(status = %self.state.status, "Execution settled");
        let agents = self.state.agents.len();
        self.journal(match error {
            None => WorkflowLogEvent::ExecutionCompleted { agents },
            Some(error) => WorkflowLogEvent::ExecutionFailed { error, agents },
        });
        self.publish();
        if let Some(reply) = self.pending_execute.take() {
            let _ = reply.send(Ok(self.state.status));
        }
    }

    fn on_event(&mut self, event: WorkflowEvent) {
        let kind = event.kind();
        match self
            .state
            .apply(event, self.config.max_events, Utc::now())
        {
            ApplyOutcome::Ignored => {
                debug!(kind, "Dropped event for inactive coordination id");
            }
            ApplyOutcome::Applied { round } => {
                debug!(kind, "Applied event");
                self.on_round_transition(round);
                self.publish();
            }
        }
    }

    fn on_round_timer(&mut self) {
        self.round_timer = None;
        let transition = self.state.expire_round(Utc::now());
        if transition != RoundTransition::Unchanged {
            self.on_round_transition(transition);
            self.publish();
        }
    }

    fn on_round_transition(&mut self, transition: RoundTransition) {
        let Some(round) = self.state.current_round() else {
            return;
        };
        let event = match transition {
            RoundTransition::Completed => {
                info!(
                    round = round.round,
                    convergence = round.convergence,
                    "Consensus round completed"
                );
                WorkflowLogEvent::RoundCompleted {
                    round: round.round,
                    convergence: round.convergence,
                    votes: round.votes.clone(),
                }
            }
            RoundTransition::TimedOut => {
                warn!(round = round.round, "Consensus round timed out");
                WorkflowLogEvent::RoundTimeout {
                    round: round.round,
                    settled: round.settled_count(),
                    agents: round.agents.len(),
                }
            }
            RoundTransition::Unchanged | RoundTransition::Updated => return,
        };
        self.journal(event);
        self.round_timer = None;
    }

    fn reply_submit(&mut self) {
        if let Some(reply) = self.pending_submit.take() {
            let _ = reply.send(Ok(self.state.status));
        }
    }

    fn leave_active(&mut self) {
        self.stream = None;
        if let Some(id) = self.state.coordination_id.clone() {
            self.leave(id);
        }
    }

    fn leave(&self, coordination_id: CoordinationId) {
        self.request_membership(Membership::Leave(coordination_id));
    }

    fn request_membership(&self, request: Membership) {
        if self.membership.send(request).is_err() {
            warn!("Membership worker stopped, request dropped");
        }
    }

    fn journal(&self, event: WorkflowLogEvent) {
        self.logger.log(WorkflowLogEntry {
            coordination_id: self.state.coordination_id.clone(),
            status: self.state.status,
            event,
        });
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

/// Apply joins and leaves one at a time, in the order the actor requested
/// them. Runs beside the actor so a slow subscriber never stalls commands
/// or inbound events.
async fn run_membership(
    subscriber: Arc<dyn EventSubscriber>,
    mut requests: mpsc::UnboundedReceiver<Membership>,
    completions: mpsc::UnboundedSender<Completion>,
    cancel: CancellationToken,
) {
    while let Some(request) = requests.recv().await {
        match request {
            Membership::Join {
                epoch,
                coordination_id,
            } => {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => continue,
                    result = subscriber.subscribe(&coordination_id) => result,
                };
                let _ = completions.send(Completion::Subscribed {
                    epoch,
                    coordination_id,
                    result,
                });
            }
            Membership::Leave(coordination_id) => {
                if let Err(e) = subscriber.unsubscribe(&coordination_id).await {
                    warn!(coordination_id = %coordination_id, error = %e, "Failed to leave coordination");
                }
            }
        }
    }
}

/// Issue every spawn concurrently and report each result, then the overall
/// outcome. The first failure in completion order fails the execution;
/// spawns that already succeeded are kept.
async fn fan_out_spawns(
    api: Arc<dyn PlanningApi>,
    config: EngineConfig,
    coordination_id: CoordinationId,
    context: Option<String>,
    commands: Vec<SpawnCommand>,
    epoch: u64,
    tx: mpsc::UnboundedSender<Completion>,
) {
    let mut join_set = JoinSet::new();
    for command in commands {
        let api = Arc::clone(&api);
        let request = SpawnRequest {
            role: command.role.clone(),
            domain: command.domain.clone(),
            coordination_id: coordination_id.clone(),
            context: context.clone(),
        };
        join_set.spawn(async move {
            let result = config
                .retry
                .execute(|| api.spawn_agent(&request))
                .await
                .map_err(|e| format!("{command} failed: {e}"));
            (command, result)
        });
    }

    let mut first_failure: Option<String> = None;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((command, result)) => {
                if let Err(message) = &result {
                    first_failure.get_or_insert_with(|| message.clone());
                }
                let _ = tx.send(Completion::Spawned {
                    epoch,
                    command,
                    result,
                });
            }
            Err(e) => {
                first_failure.get_or_insert_with(|| format!("spawn task failed: {e}"));
            }
        }
    }

    let result = match first_failure {
        Some(message) => Err(message),
        None => Ok(()),
    };
    let _ = tx.send(Completion::ExecutionSettled { epoch, result });
}

async fn next_event(stream: &mut Option<EventStream>) -> Option<WorkflowEvent> {
    match stream {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
