//! Checkpoint log.
//!
//! An append-only persister fed through the execution listener interface.
//! The deployment writes the `started` checkpoint itself when it launches an
//! execution; the terminal checkpoint arrives through the listener.

use cairn_core::ExecutionId;
use cairn_workflow::{ExecutionListener, WorkflowError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Checkpoint kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// Execution launched
    Started,
    /// Every task completed
    Finished,
    /// A task failed or the graph got stuck
    Failed,
    /// Stopped from outside
    Stopped,
    /// Cancelled from outside
    Cancelled,
}

impl CheckpointKind {
    /// Whether no later checkpoint follows for the same execution
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Started)
    }

    /// Whether the execution did not finish
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped | Self::Cancelled)
    }
}

/// One recorded checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Position in the log, starting at zero
    pub seq: u64,
    /// Execution the checkpoint belongs to
    pub execution: ExecutionId,
    /// What happened
    pub kind: CheckpointKind,
    /// Recording time
    pub at: DateTime<Utc>,
    /// What the execution was launched for, on `started` only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Error messages, on `failed` only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Checkpoint {
    /// Whether this is the last checkpoint of its execution
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

/// Append-only checkpoint log, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct CheckpointLog {
    entries: Arc<Mutex<Vec<Checkpoint>>>,
}

impl CheckpointLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an execution was launched
    pub fn started(&self, execution: ExecutionId, label: impl Into<String>) {
        self.append(execution, CheckpointKind::Started, Some(label.into()), Vec::new());
    }

    fn append(
        &self,
        execution: ExecutionId,
        kind: CheckpointKind,
        label: Option<String>,
        errors: Vec<String>,
    ) {
        let mut entries = self.entries.lock();
        let seq = entries.len() as u64;
        entries.push(Checkpoint {
            seq,
            execution,
            kind,
            at: Utc::now(),
            label,
            errors,
        });
    }

    /// Copy of every checkpoint
    #[must_use]
    pub fn entries(&self) -> Vec<Checkpoint> {
        self.entries.lock().clone()
    }

    /// Checkpoints of one execution
    #[must_use]
    pub fn for_execution(&self, execution: ExecutionId) -> Vec<Checkpoint> {
        self.entries
            .lock()
            .iter()
            .filter(|c| c.execution == execution)
            .cloned()
            .collect()
    }

    /// Latest checkpoint kind of one execution
    #[must_use]
    pub fn last_kind(&self, execution: ExecutionId) -> Option<CheckpointKind> {
        self.entries
            .lock()
            .iter()
            .rev()
            .find(|c| c.execution == execution)
            .map(|c| c.kind)
    }

    /// Kinds in recording order
    #[must_use]
    pub fn kinds(&self) -> Vec<CheckpointKind> {
        self.entries.lock().iter().map(|c| c.kind).collect()
    }

    /// Number of checkpoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Export as JSON lines
    ///
    /// # Errors
    ///
    /// Returns error if a checkpoint fails to serialize
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let entries = self.entries.lock();
        let mut out = String::new();
        for checkpoint in entries.iter() {
            out.push_str(&serde_json::to_string(checkpoint)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Write the log as JSON lines to a file
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    pub fn write_json_lines(&self, path: impl AsRef<Path>) -> crate::DeployResult<()> {
        let lines = self.to_json_lines()?;
        std::fs::write(path, lines)?;
        Ok(())
    }
}

impl ExecutionListener for CheckpointLog {
    fn on_finish(&self, execution: ExecutionId) {
        self.append(execution, CheckpointKind::Finished, None, Vec::new());
    }

    fn on_failure(&self, execution: ExecutionId, errors: &[WorkflowError]) {
        let errors = errors.iter().map(ToString::to_string).collect();
        self.append(execution, CheckpointKind::Failed, None, errors);
    }

    fn on_stop(&self, execution: ExecutionId) {
        self.append(execution, CheckpointKind::Stopped, None, Vec::new());
    }

    fn on_cancel(&self, execution: ExecutionId) {
        self.append(execution, CheckpointKind::Cancelled, None, Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert!(!CheckpointKind::Started.is_terminal());
        assert!(CheckpointKind::Finished.is_terminal());
        assert!(!CheckpointKind::Finished.is_error());
        assert!(CheckpointKind::Cancelled.is_error());
    }

    #[test]
    fn test_listener_appends_terminal_checkpoint() {
        let log = CheckpointLog::new();
        let exec = ExecutionId::new();
        log.started(exec, "install");
        log.on_failure(exec, &[WorkflowError::Stopped(exec)]);

        let entries = log.for_execution(exec);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label.as_deref(), Some("install"));
        assert_eq!(entries[1].seq, 1);
        assert!(entries[1].is_terminal());
        assert_eq!(entries[1].errors, vec![format!("execution {exec} was stopped")]);
        assert_eq!(log.last_kind(exec), Some(CheckpointKind::Failed));
        assert!(entries[0].at <= entries[1].at);
    }

    #[test]
    fn test_json_lines_file() {
        let log = CheckpointLog::new();
        let exec = ExecutionId::new();
        log.started(exec, "uninstall");
        log.on_finish(exec);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.jsonl");
        log.write_json_lines(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<Checkpoint> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed, log.entries());
        assert!(text.contains("\"finished\""));
    }
}
