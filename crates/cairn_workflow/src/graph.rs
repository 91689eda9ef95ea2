//! Task graph arena.
//!
//! Tasks are stored in a `Vec` and refer to each other by [`TaskId`]. Edges
//! can only be added through a [`GraphBuilder`], which is consumed before an
//! execution takes ownership of the graph, so no edge is ever added while
//! tasks run.

use crate::task::{Task, TaskId, TaskState};
use cairn_core::{InstanceId, Phase};
use indexmap::IndexMap;
use std::fmt::Write as _;

/// Builds a task graph
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: TaskGraph,
}

impl GraphBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task, or return the existing task for the same instance and phase
    pub fn add_task(
        &mut self,
        instance: InstanceId,
        instance_name: &str,
        phase: Phase,
        mock: bool,
    ) -> TaskId {
        if let Some(id) = self.graph.index.get(&(instance, phase)) {
            return *id;
        }
        let id = TaskId(self.graph.tasks.len());
        self.graph
            .tasks
            .push(Task::new(id, instance, instance_name, phase, mock));
        self.graph.index.insert((instance, phase), id);
        id
    }

    /// Make `task` depend on each of `others`
    ///
    /// Registers both directions of every edge. Self edges and unknown ids
    /// are ignored.
    pub fn depends_on(&mut self, task: TaskId, others: &[TaskId]) {
        let len = self.graph.tasks.len();
        if task.0 >= len {
            return;
        }
        for other in others {
            if *other == task || other.0 >= len {
                continue;
            }
            self.graph.tasks[task.0].depends_on.insert(*other);
            self.graph.tasks[other.0].depended_by.insert(task);
        }
    }

    /// Look up a task added earlier
    #[must_use]
    pub fn find(&self, instance: InstanceId, phase: Phase) -> Option<TaskId> {
        self.graph.find(instance, phase)
    }

    /// Finish construction
    #[must_use]
    pub fn build(self) -> TaskGraph {
        self.graph
    }
}

/// A wired set of tasks
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: IndexMap<(InstanceId, Phase), TaskId>,
}

impl TaskGraph {
    /// Look up a task
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.0)
    }

    /// Look up the task for an instance and phase
    #[must_use]
    pub fn find(&self, instance: InstanceId, phase: Phase) -> Option<TaskId> {
        self.index.get(&(instance, phase)).copied()
    }

    /// All tasks, in creation order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Number of tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the graph has no task
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Number of edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.tasks.iter().map(|t| t.depends_on.len()).sum()
    }

    /// Pending tasks with no dependency
    #[must_use]
    pub fn runnable(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Pending && t.can_run())
            .map(|t| t.id)
            .collect()
    }

    /// Whether `a` transitively depends on `b`
    #[must_use]
    pub fn reaches(&self, a: TaskId, b: TaskId) -> bool {
        let mut seen = vec![false; self.tasks.len()];
        let mut stack = vec![a];
        while let Some(current) = stack.pop() {
            let Some(task) = self.tasks.get(current.0) else {
                continue;
            };
            for dep in &task.depends_on {
                if *dep == b {
                    return true;
                }
                if !seen[dep.0] {
                    seen[dep.0] = true;
                    stack.push(*dep);
                }
            }
        }
        false
    }

    /// Move a pending task to running; `false` if it already left pending
    pub(crate) fn mark_running(&mut self, id: TaskId) -> bool {
        match self.tasks.get_mut(id.0) {
            Some(task) if task.state == TaskState::Pending => {
                task.state = TaskState::Running;
                true
            }
            _ => false,
        }
    }

    /// Mark a task failed
    pub(crate) fn mark_failed(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.get_mut(id.0) {
            task.state = TaskState::Failed;
        }
    }

    /// Mark a task completed and release its dependents
    ///
    /// Returns the dependents left with no unmet dependency.
    pub(crate) fn complete(&mut self, id: TaskId) -> Vec<TaskId> {
        let Some(task) = self.tasks.get_mut(id.0) else {
            return Vec::new();
        };
        task.state = TaskState::Completed;
        let dependents: Vec<TaskId> = task.depended_by.iter().copied().collect();

        let mut ready = Vec::new();
        for dependent in dependents {
            if let Some(dep) = self.tasks.get_mut(dependent.0) {
                dep.depends_on.shift_remove(&id);
                if dep.can_run() && dep.state == TaskState::Pending {
                    ready.push(dependent);
                }
            }
        }
        ready
    }

    /// Render the given tasks with their unmet dependencies
    pub fn render<'a>(&self, ids: impl IntoIterator<Item = &'a TaskId>) -> String {
        let mut out = String::new();
        for id in ids {
            let Some(task) = self.task(*id) else {
                continue;
            };
            let _ = write!(out, "  {task}");
            if !task.depends_on.is_empty() {
                let waits: Vec<String> = task
                    .depends_on
                    .iter()
                    .filter_map(|d| self.task(*d))
                    .map(Task::label)
                    .collect();
                let _ = write!(out, " waits on {}", waits.join(", "));
            }
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Display for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<TaskId> = self.tasks.iter().map(|t| t.id).collect();
        f.write_str(&self.render(&ids))
    }
}
