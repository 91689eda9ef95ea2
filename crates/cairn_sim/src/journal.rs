//! Journal of operations performed by simulated drivers.
//!
//! Entries are appended in completion order, so the position of two entries
//! tells which operation finished first.

use cairn_core::Phase;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How an operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalOutcome {
    /// Completed normally
    Ok,
    /// Returned an injected error
    Failed,
    /// Panicked on purpose
    Panicked,
}

/// One recorded operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Sequence number, starting at zero
    pub seq: u64,
    /// Instance the operation ran on
    pub instance: String,
    /// Phase performed
    pub phase: Phase,
    /// Relationship instance name for relationship phases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    /// Outcome
    pub outcome: JournalOutcome,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    entries: Vec<JournalEntry>,
}

/// Shared, append-only operation journal
#[derive(Debug, Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<Inner>>,
}

impl Journal {
    /// Create an empty journal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(
        &self,
        instance: &str,
        phase: Phase,
        relationship: Option<&str>,
        outcome: JournalOutcome,
    ) {
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push(JournalEntry {
            seq,
            instance: instance.to_string(),
            phase,
            relationship: relationship.map(str::to_string),
            outcome,
        });
    }

    /// Copy of every entry
    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.inner.lock().entries.clone()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Forget every entry; sequence numbers keep increasing
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// How many times an instance performed a phase
    #[must_use]
    pub fn count(&self, instance: &str, phase: Phase) -> usize {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.instance == instance && e.phase == phase)
            .count()
    }

    /// Position of the first time an instance performed a phase
    #[must_use]
    pub fn position(&self, instance: &str, phase: Phase) -> Option<usize> {
        self.inner
            .lock()
            .entries
            .iter()
            .position(|e| e.instance == instance && e.phase == phase)
    }

    /// Entries for one instance
    #[must_use]
    pub fn entries_for(&self, instance: &str) -> Vec<JournalEntry> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|e| e.instance == instance)
            .cloned()
            .collect()
    }

    /// Export as JSON lines
    ///
    /// # Errors
    ///
    /// Returns error if an entry fails to serialize
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let inner = self.inner.lock();
        let mut out = String::new();
        for entry in &inner.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}
