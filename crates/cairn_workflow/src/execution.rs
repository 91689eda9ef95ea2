//! Workflow execution: a live run of one task graph.
//!
//! The execution owns the graph behind a single lock. Tasks run on the
//! worker pool; when one completes, the execution releases its dependents
//! and submits those left with no unmet dependency. Cycle detection is
//! incremental: if, after a completion, tasks remain but none of them can
//! run, the execution fails with a cyclic-dependency error instead of
//! waiting forever.
//!
//! Terminal events go to listeners outside the lock, and only then are
//! blocked waiters released. A caller returning from
//! [`WorkflowExecution::wait_for_completion`] therefore sees every listener
//! side effect.

use crate::error::{WorkflowError, WorkflowResult};
use crate::graph::TaskGraph;
use crate::listener::ExecutionListener;
use crate::metrics::ExecutionMetrics;
use crate::operation::{Outcome, Scope};
use crate::plan::{WorkflowKind, WorkflowPlan};
use crate::task::{Task, TaskId};
use cairn_core::{ExecutionId, InstanceId, RelationshipId};
use cairn_topology::{NodeInstance, RelationshipInstance};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    /// Tasks left
    Running,
    /// Every task completed
    Finished,
    /// A task failed or the graph got stuck
    Failed,
    /// Stopped from outside
    Stopped,
    /// Cancelled from outside
    Cancelled,
}

impl ExecutionStatus {
    /// Whether no further state change can happen
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

struct State {
    graph: TaskGraph,
    tasks_left: IndexSet<TaskId>,
    status: ExecutionStatus,
    errors: Vec<WorkflowError>,
    listeners: Vec<Arc<dyn ExecutionListener>>,
    /// Listeners have been called for the terminal status
    settled: bool,
    metrics: ExecutionMetrics,
}

/// A terminal event captured under the lock, delivered outside it
struct Terminal {
    status: ExecutionStatus,
    errors: Vec<WorkflowError>,
    listeners: Vec<Arc<dyn ExecutionListener>>,
}

struct Shared {
    id: ExecutionId,
    kind: WorkflowKind,
    instances: IndexMap<InstanceId, Arc<NodeInstance>>,
    relationships: IndexMap<RelationshipId, Arc<RelationshipInstance>>,
    handle: Handle,
    state: Mutex<State>,
    settled: Condvar,
}

/// A running install or uninstall
///
/// Cheap to clone; every clone observes the same run.
#[derive(Clone)]
pub struct WorkflowExecution {
    shared: Arc<Shared>,
}

impl WorkflowExecution {
    /// Take ownership of a plan and submit every runnable task
    #[must_use]
    pub fn start(plan: WorkflowPlan, handle: Handle) -> Self {
        Self::start_with_listeners(plan, handle, Vec::new())
    }

    /// Like [`WorkflowExecution::start`], with listeners registered before
    /// the first task is submitted
    #[must_use]
    pub fn start_with_listeners(
        plan: WorkflowPlan,
        handle: Handle,
        listeners: Vec<Arc<dyn ExecutionListener>>,
    ) -> Self {
        let (kind, graph, instances, relationships) = plan.into_parts();
        let id = ExecutionId::new();
        let tasks_left: IndexSet<TaskId> = graph.tasks().map(|t| t.id).collect();
        info!(
            execution = %id,
            kind = %kind,
            tasks = tasks_left.len(),
            instances = instances.len(),
            relationships = relationships.len(),
            "workflow execution started"
        );

        let shared = Arc::new(Shared {
            id,
            kind,
            instances,
            relationships,
            handle,
            state: Mutex::new(State {
                graph,
                tasks_left,
                status: ExecutionStatus::Running,
                errors: Vec::new(),
                listeners,
                settled: false,
                metrics: ExecutionMetrics::new(),
            }),
            settled: Condvar::new(),
        });
        shared.kickoff();
        Self { shared }
    }

    /// Execution id
    #[must_use]
    pub fn id(&self) -> ExecutionId {
        self.shared.id
    }

    /// Workflow direction
    #[must_use]
    pub fn kind(&self) -> WorkflowKind {
        self.shared.kind
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        self.shared.state.lock().status
    }

    /// Number of tasks not completed yet
    #[must_use]
    pub fn tasks_left(&self) -> usize {
        self.shared.state.lock().tasks_left.len()
    }

    /// Counters so far
    #[must_use]
    pub fn metrics(&self) -> ExecutionMetrics {
        self.shared.state.lock().metrics
    }

    /// Every error recorded, the terminal one first
    #[must_use]
    pub fn errors(&self) -> Vec<WorkflowError> {
        self.shared.state.lock().errors.clone()
    }

    /// Register a listener
    ///
    /// If the execution is already terminal the matching callback runs
    /// right away on the calling thread.
    pub fn add_listener(&self, listener: Arc<dyn ExecutionListener>) {
        let replay = {
            let mut state = self.shared.state.lock();
            if state.status.is_terminal() {
                Some((state.status, state.errors.clone()))
            } else {
                state.listeners.push(Arc::clone(&listener));
                None
            }
        };
        if let Some((status, errors)) = replay {
            notify(listener.as_ref(), self.shared.id, status, &errors);
        }
    }

    /// Block until the execution is terminal or `timeout` elapses
    ///
    /// Returns `Ok(true)` once finished and `Ok(false)` on timeout. Running
    /// tasks are never interrupted by a timeout.
    ///
    /// # Errors
    ///
    /// Returns the terminal error if the execution failed, was stopped or
    /// was cancelled
    pub fn wait_for_completion(&self, timeout: Duration) -> WorkflowResult<bool> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.wait().map(|()| true);
        };
        let mut state = self.shared.state.lock();
        while !state.settled {
            if self.shared.settled.wait_until(&mut state, deadline).timed_out() && !state.settled {
                return Ok(false);
            }
        }
        self.shared.outcome(&state).map(|()| true)
    }

    /// Block until the execution is terminal
    ///
    /// # Errors
    ///
    /// Returns the terminal error if the execution did not finish
    pub fn wait(&self) -> WorkflowResult<()> {
        let mut state = self.shared.state.lock();
        while !state.settled {
            self.shared.settled.wait(&mut state);
        }
        self.shared.outcome(&state)
    }

    /// Stop the execution: no new task is submitted, listeners get
    /// `on_stop`, waiters get [`WorkflowError::Stopped`]
    ///
    /// Returns `false` if the execution was already terminal.
    pub fn stop(&self) -> bool {
        self.shared.interrupt(ExecutionStatus::Stopped)
    }

    /// Cancel the execution: like [`WorkflowExecution::stop`] but reported
    /// as a cancellation
    pub fn cancel(&self) -> bool {
        self.shared.interrupt(ExecutionStatus::Cancelled)
    }
}

impl std::fmt::Display for WorkflowExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        writeln!(
            f,
            "{} execution {} [{}], {} tasks left",
            self.shared.kind,
            self.shared.id,
            state.status,
            state.tasks_left.len()
        )?;
        f.write_str(&state.graph.render(&state.tasks_left))
    }
}

impl std::fmt::Debug for WorkflowExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecution")
            .field("id", &self.shared.id)
            .field("kind", &self.shared.kind)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Shared {
    /// Submit the initial frontier, or settle right away when there is none
    fn kickoff(self: &Arc<Self>) {
        let (ready, terminal) = {
            let mut state = self.state.lock();
            if state.tasks_left.is_empty() {
                (Vec::new(), self.terminate(&mut state, ExecutionStatus::Finished, None))
            } else {
                let runnable = state.graph.runnable();
                let ready = claim(&mut state, runnable);
                if ready.is_empty() {
                    let stuck = self.stuck(&state);
                    (Vec::new(), self.terminate(&mut state, ExecutionStatus::Failed, Some(stuck)))
                } else {
                    (ready, None)
                }
            }
        };
        self.dispatch(ready);
        self.deliver(terminal);
    }

    fn dispatch(self: &Arc<Self>, ready: Vec<TaskId>) {
        for task in ready {
            let shared = Arc::clone(self);
            drop(self.handle.spawn_blocking(move || shared.run_task(task)));
        }
    }

    fn run_task(self: &Arc<Self>, id: TaskId) {
        let Some((instance, name, phase, mock)) = self
            .state
            .lock()
            .graph
            .task(id)
            .map(|t| (t.instance, t.instance_name.clone(), t.phase, t.mock))
        else {
            warn!(execution = %self.id, task = %id, "submitted task missing from graph");
            return;
        };
        debug!(execution = %self.id, instance = %name, phase = %phase, mock, "task started");

        let result = if mock {
            Ok(Outcome::default())
        } else {
            let scope = Scope {
                instances: &self.instances,
                relationships: &self.relationships,
            };
            catch_unwind(AssertUnwindSafe(|| scope.invoke(instance, phase))).unwrap_or_else(
                |payload| {
                    Err(WorkflowError::Panicked {
                        instance: name.clone(),
                        phase,
                        message: panic_message(payload.as_ref()),
                    })
                },
            )
        };

        match result {
            Ok(outcome) => self.on_task_completion(id, mock, outcome),
            Err(err) => self.on_task_failure(id, err),
        }
    }

    /// Remove a completed task and submit the dependents it released
    fn on_task_completion(self: &Arc<Self>, id: TaskId, mock: bool, outcome: Outcome) {
        let (ready, terminal) = {
            let mut state = self.state.lock();
            if !state.tasks_left.shift_remove(&id) {
                warn!(execution = %self.id, task = %id, "completion reported for unknown task");
                return;
            }
            let released = state.graph.complete(id);
            state.metrics.record_completion();
            state.metrics.record_operations(outcome.invoked, outcome.skipped);
            if mock {
                state.metrics.record_mock();
            }
            if let Some(task) = state.graph.task(id) {
                debug!(
                    execution = %self.id,
                    task = %task.label(),
                    left = state.tasks_left.len(),
                    "task completed"
                );
            }

            if state.status.is_terminal() {
                (Vec::new(), None)
            } else if state.tasks_left.is_empty() {
                (Vec::new(), self.terminate(&mut state, ExecutionStatus::Finished, None))
            } else {
                let ready = claim(&mut state, released);
                let any_runnable = !ready.is_empty()
                    || state
                        .tasks_left
                        .iter()
                        .any(|t| state.graph.task(*t).is_some_and(Task::can_run));
                if any_runnable {
                    (ready, None)
                } else {
                    let stuck = self.stuck(&state);
                    (Vec::new(), self.terminate(&mut state, ExecutionStatus::Failed, Some(stuck)))
                }
            }
        };
        self.dispatch(ready);
        self.deliver(terminal);
    }

    /// Record a failure; the first one becomes the terminal error
    fn on_task_failure(&self, id: TaskId, err: WorkflowError) {
        let terminal = {
            let mut state = self.state.lock();
            if !state.tasks_left.contains(&id) {
                warn!(execution = %self.id, task = %id, "failure reported for unknown task");
                return;
            }
            state.graph.mark_failed(id);
            state.metrics.record_failure();
            error!(execution = %self.id, task = %id, error = %err, "task failed");
            self.terminate(&mut state, ExecutionStatus::Failed, Some(err))
        };
        self.deliver(terminal);
    }

    fn interrupt(&self, status: ExecutionStatus) -> bool {
        let terminal = {
            let mut state = self.state.lock();
            self.terminate(&mut state, status, None)
        };
        let interrupted = terminal.is_some();
        self.deliver(terminal);
        interrupted
    }

    fn stuck(&self, state: &State) -> WorkflowError {
        WorkflowError::CyclicDependency {
            execution: self.id,
            remaining: state.tasks_left.len(),
            dump: state.graph.render(&state.tasks_left),
        }
    }

    /// Move to a terminal status; `None` if already terminal
    fn terminate(
        &self,
        state: &mut State,
        status: ExecutionStatus,
        error: Option<WorkflowError>,
    ) -> Option<Terminal> {
        if let Some(err) = error {
            state.errors.push(err);
        }
        if state.status.is_terminal() {
            return None;
        }
        state.status = status;
        match status {
            ExecutionStatus::Failed => error!(
                execution = %self.id,
                kind = %self.kind,
                left = state.tasks_left.len(),
                "workflow execution failed"
            ),
            _ => info!(
                execution = %self.id,
                kind = %self.kind,
                status = %status,
                completed = state.metrics.tasks_completed,
                "workflow execution ended"
            ),
        }
        Some(Terminal {
            status,
            errors: state.errors.clone(),
            listeners: std::mem::take(&mut state.listeners),
        })
    }

    /// Call listeners, then release waiters
    fn deliver(&self, terminal: Option<Terminal>) {
        let Some(terminal) = terminal else {
            return;
        };
        for listener in &terminal.listeners {
            notify(listener.as_ref(), self.id, terminal.status, &terminal.errors);
        }
        self.state.lock().settled = true;
        self.settled.notify_all();
    }

    fn outcome(&self, state: &State) -> WorkflowResult<()> {
        match state.status {
            ExecutionStatus::Running | ExecutionStatus::Finished => Ok(()),
            ExecutionStatus::Failed => match state.errors.first() {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            },
            ExecutionStatus::Stopped => Err(WorkflowError::Stopped(self.id)),
            ExecutionStatus::Cancelled => Err(WorkflowError::Cancelled(self.id)),
        }
    }
}

/// Mark tasks running; a task already claimed is dropped from the batch
fn claim(state: &mut State, candidates: Vec<TaskId>) -> Vec<TaskId> {
    let mut ready = Vec::with_capacity(candidates.len());
    for id in candidates {
        if state.graph.mark_running(id) {
            state.metrics.record_submission();
            ready.push(id);
        }
    }
    ready
}

fn notify(
    listener: &dyn ExecutionListener,
    id: ExecutionId,
    status: ExecutionStatus,
    errors: &[WorkflowError],
) {
    match status {
        ExecutionStatus::Finished => listener.on_finish(id),
        ExecutionStatus::Failed => listener.on_failure(id, errors),
        ExecutionStatus::Stopped => listener.on_stop(id),
        ExecutionStatus::Cancelled => listener.on_cancel(id),
        ExecutionStatus::Running => {}
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
