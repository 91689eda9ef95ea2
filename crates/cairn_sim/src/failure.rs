//! Scripted failure injection.
//!
//! A rule names an instance (`WebServer_2`) or a whole node (`WebServer`),
//! a phase and whether the operation returns an error or panics. Rules are
//! parsed from `Target.phase` or `Target.phase!panic`.

use cairn_core::Phase;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// How an injected failure manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The operation returns an error
    Error,
    /// The operation panics
    Panic,
}

/// What a rule matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureTarget {
    /// One instance by name
    Instance(String),
    /// Every instance of a node
    Node(String),
}

impl FailureTarget {
    fn matches(&self, instance: &str, node: &str) -> bool {
        match self {
            FailureTarget::Instance(name) => name == instance,
            FailureTarget::Node(name) => name == node,
        }
    }
}

/// A single injected failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRule {
    /// Matched instances
    pub target: FailureTarget,
    /// Matched phase
    pub phase: Phase,
    /// Error or panic
    pub kind: FailureKind,
}

impl FailureRule {
    /// Create a rule
    #[must_use]
    pub fn new(target: FailureTarget, phase: Phase, kind: FailureKind) -> Self {
        Self { target, phase, kind }
    }
}

/// Error parsing a failure rule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRuleError {
    /// Missing `.phase` part
    #[error("expected TARGET.PHASE, got {0:?}")]
    Format(String),
    /// Unknown phase name
    #[error("unknown phase: {0}")]
    Phase(String),
    /// Unknown suffix after `!`
    #[error("unknown failure kind: {0}")]
    Kind(String),
}

impl FromStr for FailureRule {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, kind) = match s.split_once('!') {
            Some((body, "panic")) => (body, FailureKind::Panic),
            Some((body, "error")) => (body, FailureKind::Error),
            Some((_, other)) => return Err(ParseRuleError::Kind(other.to_string())),
            None => (s, FailureKind::Error),
        };
        let (target, phase) = body
            .rsplit_once('.')
            .filter(|(t, p)| !t.is_empty() && !p.is_empty())
            .ok_or_else(|| ParseRuleError::Format(s.to_string()))?;
        let phase = Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == phase)
            .ok_or_else(|| ParseRuleError::Phase(phase.to_string()))?;
        // Instance names end in `_<index>`
        let target = match target.rsplit_once('_') {
            Some((_, index)) if index.parse::<u32>().is_ok() => {
                FailureTarget::Instance(target.to_string())
            }
            _ => FailureTarget::Node(target.to_string()),
        };
        Ok(Self::new(target, phase, kind))
    }
}

/// Shared set of failure rules
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    rules: Arc<Mutex<Vec<FailureRule>>>,
}

impl FailurePlan {
    /// Create an empty plan
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule
    pub fn add(&self, rule: FailureRule) {
        self.rules.lock().push(rule);
    }

    /// Make one instance's phase return an error
    pub fn fail(&self, instance: &str, phase: Phase) {
        self.add(FailureRule::new(
            FailureTarget::Instance(instance.to_string()),
            phase,
            FailureKind::Error,
        ));
    }

    /// Make one instance's phase panic
    pub fn panic_on(&self, instance: &str, phase: Phase) {
        self.add(FailureRule::new(
            FailureTarget::Instance(instance.to_string()),
            phase,
            FailureKind::Panic,
        ));
    }

    /// Make every instance of a node fail a phase
    pub fn fail_node(&self, node: &str, phase: Phase) {
        self.add(FailureRule::new(
            FailureTarget::Node(node.to_string()),
            phase,
            FailureKind::Error,
        ));
    }

    /// Make every instance of a node panic in a phase
    pub fn panic_on_node(&self, node: &str, phase: Phase) {
        self.add(FailureRule::new(
            FailureTarget::Node(node.to_string()),
            phase,
            FailureKind::Panic,
        ));
    }

    /// Drop every rule
    pub fn clear(&self) {
        self.rules.lock().clear();
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.lock().len()
    }

    /// Whether no rule is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.lock().is_empty()
    }

    /// Failure injected for an operation, if any
    #[must_use]
    pub fn check(&self, instance: &str, node: &str, phase: Phase) -> Option<FailureKind> {
        self.rules
            .lock()
            .iter()
            .find(|rule| rule.phase == phase && rule.target.matches(instance, node))
            .map(|rule| rule.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instance_rule() {
        let rule: FailureRule = "WebServer_2.start".parse().unwrap();
        assert_eq!(rule.target, FailureTarget::Instance("WebServer_2".into()));
        assert_eq!(rule.phase, Phase::Start);
        assert_eq!(rule.kind, FailureKind::Error);
    }

    #[test]
    fn test_parse_node_rule_with_panic() {
        let rule: FailureRule = "Java.add_source!panic".parse().unwrap();
        assert_eq!(rule.target, FailureTarget::Node("Java".into()));
        assert_eq!(rule.phase, Phase::AddSource);
        assert_eq!(rule.kind, FailureKind::Panic);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("start".parse::<FailureRule>(), Err(ParseRuleError::Format(_))));
        assert!(matches!("Vm_1.boot".parse::<FailureRule>(), Err(ParseRuleError::Phase(_))));
        assert!(matches!("Vm_1.start!later".parse::<FailureRule>(), Err(ParseRuleError::Kind(_))));
    }

    #[test]
    fn test_check_matches_instance_or_node() {
        let plan = FailurePlan::new();
        plan.fail("Vm_2", Phase::Start);
        plan.panic_on_node("Db", Phase::Configure);
        assert_eq!(plan.check("Vm_2", "Vm", Phase::Start), Some(FailureKind::Error));
        assert_eq!(plan.check("Vm_1", "Vm", Phase::Start), None);
        assert_eq!(plan.check("Db_3", "Db", Phase::Configure), Some(FailureKind::Panic));
        assert_eq!(plan.len(), 2);
        plan.clear();
        assert!(plan.is_empty());
    }
}
