//! 编排器
//! Orchestrator engine
//!
//! 负责工作流的校验、调度、快速失败、取消、超时和生命周期事件。
//! Validates a workflow, schedules its tasks level by level (sequentially or
//! with bounded parallelism), applies fail-fast, cancellation and timeout
//! rules, and publishes lifecycle events.
//!
//! Misuse (duplicate run, unknown capability) is returned as an error. Task
//! failures never are: they end up in [`WorkflowResult::errors`].

use super::config::{CyclePolicy, OrchestratorConfig};
use super::registry::AgentRegistry;
use super::result::{
    ActiveWorkflowEntry, DEPENDENCY_ERROR_KEY, OrchestratorMetrics, OrchestratorMetricsSnapshot,
    WorkflowResult, WorkflowStatusReport,
};
use crate::circuit_breaker::{CircuitBreakerMetricsSnapshot, CircuitBreakerRegistry};
use crate::workflow::{Task, TaskExecutor, TaskOutcome, Workflow, WorkflowGraph};
use chrono::Utc;
use conductor_kernel::agent::Agent;
use conductor_kernel::bus::{EventBus, WorkflowEvent};
use conductor_kernel::{OrchestratorError, OrchestratorResult, RunMetrics, RunStatus};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

type AgentMap = HashMap<String, Arc<dyn Agent>>;

struct ActiveRun {
    entry: ActiveWorkflowEntry,
    generation: u64,
    cancel: CancellationToken,
}

/// 运行结束时移除活动记录
/// Removes the active entry when the run ends, however it ends
struct ActiveRunGuard<'a> {
    runs: &'a Mutex<HashMap<String, ActiveRun>>,
    workflow_id: String,
    generation: u64,
}

impl Drop for ActiveRunGuard<'_> {
    fn drop(&mut self) {
        let mut runs = self.runs.lock();
        // a shutdown may already have dropped it, and a new run may reuse the id
        if runs
            .get(&self.workflow_id)
            .is_some_and(|run| run.generation == self.generation)
        {
            runs.remove(&self.workflow_id);
        }
    }
}

/// 单次运行的累积状态
#[derive(Default)]
struct RunState {
    results: HashMap<String, Value>,
    errors: HashMap<String, String>,
    agents_used: BTreeSet<String>,
    failed: bool,
}

impl RunState {
    /// Returns whether the task succeeded
    fn record(&mut self, outcome: TaskOutcome) -> bool {
        if outcome.invoked {
            self.agents_used.insert(outcome.capability.clone());
        }
        let message = outcome.error_message();
        match outcome.result {
            Ok(output) => {
                self.results.insert(outcome.task_id, output);
                true
            }
            Err(_) => {
                self.errors
                    .insert(outcome.task_id, message.unwrap_or_default());
                self.failed = true;
                false
            }
        }
    }

    fn record_joined(&mut self, joined: Result<TaskOutcome, JoinError>) {
        match joined {
            Ok(outcome) => {
                self.record(outcome);
            }
            Err(e) => {
                error!(error = %e, "Task join failed");
                self.failed = true;
            }
        }
    }
}

/// 编排器
pub struct Orchestrator {
    config: OrchestratorConfig,
    agents: AgentRegistry,
    executor: Arc<TaskExecutor>,
    owns_breakers: bool,
    event_bus: Option<Arc<dyn EventBus>>,
    active: Mutex<HashMap<String, ActiveRun>>,
    generation: AtomicU64,
    semaphore: Arc<Semaphore>,
    metrics: OrchestratorMetrics,
}

impl Orchestrator {
    /// 创建编排器（使用私有熔断器注册表）
    /// Create an orchestrator with its own breaker registry
    pub fn new(config: OrchestratorConfig) -> Self {
        let breakers = Arc::new(CircuitBreakerRegistry::with_default_config(
            config.default_breaker.clone(),
        ));
        Self {
            executor: Arc::new(build_executor(&config, breakers)),
            owns_breakers: true,
            agents: AgentRegistry::new(),
            event_bus: None,
            active: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            semaphore: Arc::new(Semaphore::new(config.concurrency())),
            metrics: OrchestratorMetrics::new(),
            config,
        }
    }

    /// 设置事件总线
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// 使用外部熔断器注册表
    /// Share breakers with other orchestrators through `registry`
    ///
    /// `shutdown` then only stops the monitors of this orchestrator's
    /// capabilities instead of destroying the registry.
    pub fn with_breaker_registry(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.executor = Arc::new(build_executor(&self.config, registry));
        self.owns_breakers = false;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        self.executor.breakers()
    }

    /// 注册 Agent
    pub fn register_agent(&self, agent: Arc<dyn Agent>) {
        self.agents.register(agent);
    }

    /// 注销 Agent
    pub fn unregister_agent(&self, capability: &str) -> bool {
        self.agents.unregister(capability).is_some()
    }

    /// 可用能力列表
    pub fn available_agents(&self) -> Vec<String> {
        self.agents.capabilities()
    }

    /// 执行工作流
    /// Execute `workflow` to a terminal state
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::DuplicateRun`] if a run with the same id is active,
    /// [`OrchestratorError::UnknownCapability`] if a task's capability has no
    /// agent, and [`OrchestratorError::Dependency`] for an unsatisfiable graph
    /// under [`CyclePolicy::Reject`]. Everything else is reported through the
    /// returned [`WorkflowResult`].
    pub async fn execute_workflow(&self, workflow: &Workflow) -> OrchestratorResult<WorkflowResult> {
        let span = info_span!("workflow", workflow_id = %workflow.id());
        self.execute_inner(workflow).instrument(span).await
    }

    async fn execute_inner(&self, workflow: &Workflow) -> OrchestratorResult<WorkflowResult> {
        let started = Instant::now();
        let (guard, cancel) = self.begin(workflow.id())?;
        let agents = self.resolve_agents(workflow)?;

        let levels: Vec<Vec<Task>> = match WorkflowGraph::new(workflow.tasks()).levels() {
            Ok(levels) => levels
                .into_iter()
                .map(|level| level.into_iter().cloned().collect())
                .collect(),
            Err(err) => return self.unsatisfiable(workflow, err, started),
        };

        info!(
            name = %workflow.name(),
            tasks = workflow.tasks().len(),
            levels = levels.len(),
            parallel = workflow.is_parallel(),
            "Workflow started"
        );
        self.publish(WorkflowEvent::started(
            workflow.id(),
            workflow.name(),
            workflow.tasks().len(),
        ))
        .await;

        let state = Mutex::new(RunState::default());
        let run = self.run_levels(levels, &agents, &state, &cancel, workflow.is_parallel());
        let status = match workflow.timeout().or_else(|| self.config.default_timeout()) {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "Workflow timed out");
                    RunStatus::Timeout
                }
            },
            None => run.await,
        };

        let state = state.into_inner();
        let metrics = RunMetrics {
            tasks_completed: state.results.len(),
            tasks_total: workflow.tasks().len(),
            total_time_ms: started.elapsed().as_millis() as u64,
            agents_used: state.agents_used.into_iter().collect(),
        };
        let result = WorkflowResult {
            status,
            results: state.results,
            errors: state.errors,
            metrics,
        };
        self.metrics.record_run(&result);

        info!(
            status = %status,
            completed = result.metrics.tasks_completed,
            total = result.metrics.tasks_total,
            elapsed_ms = result.metrics.total_time_ms,
            "Workflow finished"
        );

        let event = if status == RunStatus::Cancelled {
            WorkflowEvent::cancelled(workflow.id())
        } else {
            WorkflowEvent::completed(workflow.id(), status, result.metrics.clone())
        };
        self.publish(event).await;

        drop(guard);
        Ok(result)
    }

    /// 原子地检查并登记活动工作流
    fn begin(&self, workflow_id: &str) -> OrchestratorResult<(ActiveRunGuard<'_>, CancellationToken)> {
        let mut runs = self.active.lock();
        if runs.contains_key(workflow_id) {
            warn!("Rejected duplicate run");
            return Err(OrchestratorError::DuplicateRun(workflow_id.to_string()));
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        runs.insert(
            workflow_id.to_string(),
            ActiveRun {
                entry: ActiveWorkflowEntry {
                    workflow_id: workflow_id.to_string(),
                    started_at: Utc::now(),
                    cancelled: false,
                },
                generation,
                cancel: cancel.clone(),
            },
        );

        let guard = ActiveRunGuard {
            runs: &self.active,
            workflow_id: workflow_id.to_string(),
            generation,
        };
        Ok((guard, cancel))
    }

    fn resolve_agents(&self, workflow: &Workflow) -> OrchestratorResult<AgentMap> {
        let mut agents = AgentMap::new();
        for task in workflow.tasks() {
            if agents.contains_key(&task.agent_type) {
                continue;
            }
            let agent = self.agents.get(&task.agent_type).ok_or_else(|| {
                OrchestratorError::unknown_capability(&task.agent_type, &task.id)
            })?;
            agents.insert(task.agent_type.clone(), agent);
        }
        Ok(agents)
    }

    fn unsatisfiable(
        &self,
        workflow: &Workflow,
        err: OrchestratorError,
        started: Instant,
    ) -> OrchestratorResult<WorkflowResult> {
        warn!(error = %err, "Workflow dependency graph is unsatisfiable");
        if self.config.cycle_policy == CyclePolicy::Reject {
            return Err(err);
        }

        let message = match err {
            OrchestratorError::Dependency(message) => message,
            other => other.to_string(),
        };
        let result = WorkflowResult {
            status: RunStatus::Failed,
            results: HashMap::new(),
            errors: HashMap::from([(DEPENDENCY_ERROR_KEY.to_string(), message)]),
            metrics: RunMetrics {
                tasks_completed: 0,
                tasks_total: workflow.tasks().len(),
                total_time_ms: started.elapsed().as_millis() as u64,
                agents_used: Vec::new(),
            },
        };
        self.metrics.record_run(&result);
        Ok(result)
    }

    async fn run_levels(
        &self,
        levels: Vec<Vec<Task>>,
        agents: &AgentMap,
        state: &Mutex<RunState>,
        cancel: &CancellationToken,
        parallel: bool,
    ) -> RunStatus {
        for (depth, level) in levels.into_iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            debug!(level = depth, tasks = level.len(), "Scheduling level");

            if parallel {
                self.run_parallel(level, agents, state, cancel).await;
            } else {
                self.run_sequential(level, agents, state, cancel).await;
            }

            if state.lock().failed {
                return RunStatus::Failed;
            }
        }

        if cancel.is_cancelled() {
            info!("Workflow cancelled");
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        }
    }

    async fn run_sequential(
        &self,
        level: Vec<Task>,
        agents: &AgentMap,
        state: &Mutex<RunState>,
        cancel: &CancellationToken,
    ) {
        for task in level {
            if cancel.is_cancelled() {
                return;
            }
            let Some(agent) = agents.get(&task.agent_type).cloned() else {
                state
                    .lock()
                    .record(TaskOutcome::not_dispatched(&task, "no agent for capability"));
                return;
            };
            let Ok(_permit) = self.semaphore.acquire().await else {
                state
                    .lock()
                    .record(TaskOutcome::not_dispatched(&task, "task scheduler closed"));
                return;
            };

            let outcome = guarded(&self.executor, &task, agent).await;
            if !state.lock().record(outcome) {
                return;
            }
        }
    }

    /// 并行执行一个层级
    /// Run one level with bounded concurrency
    ///
    /// Dispatch stops at the first recorded failure or on cancellation;
    /// tasks already started are awaited and recorded.
    async fn run_parallel(
        &self,
        level: Vec<Task>,
        agents: &AgentMap,
        state: &Mutex<RunState>,
        cancel: &CancellationToken,
    ) {
        let mut join_set: JoinSet<TaskOutcome> = JoinSet::new();
        let mut pending = level.into_iter();
        let mut next = pending.next();

        while let Some(task) = next.take() {
            if state.lock().failed || cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                biased;
                Some(joined) = join_set.join_next(), if !join_set.is_empty() => {
                    state.lock().record_joined(joined);
                    next = Some(task);
                }
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&self.semaphore).acquire_owned() => {
                    let Ok(permit) = permit else {
                        state.lock().record(TaskOutcome::not_dispatched(&task, "task scheduler closed"));
                        break;
                    };
                    let Some(agent) = agents.get(&task.agent_type).cloned() else {
                        state.lock().record(TaskOutcome::not_dispatched(&task, "no agent for capability"));
                        break;
                    };
                    let executor = Arc::clone(&self.executor);
                    join_set.spawn(
                        async move {
                            let _permit = permit;
                            guarded(&executor, &task, agent).await
                        }
                        .in_current_span(),
                    );
                    next = pending.next();
                }
            }
        }

        while let Some(joined) = join_set.join_next().await {
            state.lock().record_joined(joined);
        }
    }

    async fn publish(&self, event: WorkflowEvent) {
        let Some(bus) = &self.event_bus else {
            return;
        };
        let event_type = event.event_type();
        if let Err(e) = bus.publish(event).await {
            warn!(event_type, error = %e, "Failed to publish workflow event");
        }
    }

    /// 取消工作流（协作式）
    /// Request cooperative cancellation; false if the id is not running
    pub fn cancel_workflow(&self, workflow_id: &str) -> bool {
        let mut runs = self.active.lock();
        match runs.get_mut(workflow_id) {
            Some(run) => {
                run.entry.cancelled = true;
                run.cancel.cancel();
                info!(workflow_id, "Workflow cancellation requested");
                true
            }
            None => {
                debug!(workflow_id, "Cancel ignored, workflow not running");
                false
            }
        }
    }

    /// 查询工作流状态
    pub fn get_workflow_status(&self, workflow_id: &str) -> WorkflowStatusReport {
        match self.active.lock().get(workflow_id) {
            Some(run) => WorkflowStatusReport {
                is_running: true,
                started_at: Some(run.entry.started_at),
                cancel_requested: run.entry.cancelled,
            },
            None => WorkflowStatusReport::default(),
        }
    }

    /// 活动工作流快照（按开始时间排序）
    pub fn active_workflows(&self) -> Vec<ActiveWorkflowEntry> {
        let mut entries: Vec<ActiveWorkflowEntry> = self
            .active
            .lock()
            .values()
            .map(|run| run.entry.clone())
            .collect();
        entries.sort_by_key(|e| e.started_at);
        entries
    }

    pub fn metrics(&self) -> OrchestratorMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// 熔断器指标
    pub fn breaker_metrics(&self) -> HashMap<String, CircuitBreakerMetricsSnapshot> {
        self.breakers().all_metrics()
    }

    /// 关闭编排器
    /// Cancel active runs, forget them, stop breaker timers and reset metrics
    pub fn shutdown(&self) {
        let drained: Vec<ActiveRun> = self.active.lock().drain().map(|(_, run)| run).collect();
        for run in &drained {
            run.cancel.cancel();
        }

        if self.owns_breakers {
            self.breakers().destroy_all();
        } else {
            for capability in self.agents.capabilities() {
                if let Some(breaker) = self.breakers().get(&capability) {
                    breaker.destroy();
                }
            }
        }

        self.metrics.reset();
        info!(cancelled_runs = drained.len(), "Orchestrator shut down");
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("agents", &self.agents)
            .field("active_workflows", &self.active.lock().len())
            .finish()
    }
}

fn build_executor(config: &OrchestratorConfig, breakers: Arc<CircuitBreakerRegistry>) -> TaskExecutor {
    config.capabilities.iter().fold(
        TaskExecutor::new(breakers).with_default_breaker(config.default_breaker.clone()),
        |executor, capability| executor.with_policy(&capability.capability, capability.policy()),
    )
}

/// 捕获 Agent panic，转换为任务失败
async fn guarded(executor: &TaskExecutor, task: &Task, agent: Arc<dyn Agent>) -> TaskOutcome {
    match AssertUnwindSafe(executor.execute(task, agent))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(task_id = %task.id, "Task panicked");
            TaskOutcome::aborted(task, "task panicked")
        }
    }
}
