//! Tasks: one lifecycle phase bound to one node instance.
//!
//! A task only holds ids. Edges to other tasks live in its `depends_on` and
//! `depended_by` sets, the instance is looked up in the plan when the task
//! runs.

use cairn_core::{InstanceId, Phase};
use indexmap::IndexSet;

/// Index of a task in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Position in the graph's task arena
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Task state; transitions only `Pending -> Running -> Completed | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Not submitted yet
    Pending,
    /// Submitted to the worker pool
    Running,
    /// Operation returned successfully
    Completed,
    /// Operation returned an error or panicked
    Failed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A unit of work
#[derive(Debug, Clone)]
pub struct Task {
    /// Task id
    pub id: TaskId,
    /// Instance the phase runs on
    pub instance: InstanceId,
    /// Instance name, for logs and dumps
    pub instance_name: String,
    /// Lifecycle phase
    pub phase: Phase,
    /// Stand-in for an instance outside the current run
    pub mock: bool,
    pub(crate) state: TaskState,
    pub(crate) depends_on: IndexSet<TaskId>,
    pub(crate) depended_by: IndexSet<TaskId>,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        instance: InstanceId,
        instance_name: &str,
        phase: Phase,
        mock: bool,
    ) -> Self {
        Self {
            id,
            instance,
            instance_name: instance_name.to_string(),
            phase,
            mock,
            state: TaskState::Pending,
            depends_on: IndexSet::new(),
            depended_by: IndexSet::new(),
        }
    }

    /// True iff every dependency has completed
    #[must_use]
    pub fn can_run(&self) -> bool {
        self.depends_on.is_empty()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Tasks this one still waits for
    #[must_use]
    pub fn depends_on(&self) -> &IndexSet<TaskId> {
        &self.depends_on
    }

    /// Tasks waiting for this one
    #[must_use]
    pub fn depended_by(&self) -> &IndexSet<TaskId> {
        &self.depended_by
    }

    /// `instance.phase`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}.{}", self.instance_name, self.phase)
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}.{} [{}", self.id, self.instance_name, self.phase, self.state)?;
        if self.mock {
            f.write_str(", mock")?;
        }
        f.write_str("]")
    }
}
