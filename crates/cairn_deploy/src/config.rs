//! Configuration loaded from a JSON file.

use crate::error::{DeployError, DeployResult};
use cairn_workflow::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Deployment behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// How long to wait for one workflow execution, in milliseconds
    pub workflow_timeout_ms: u64,
    /// Uninstall the new instances when a scale-up fails
    pub rollback_on_failure: bool,
}

impl DeploymentConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait limit for one workflow execution
    #[must_use]
    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_millis(self.workflow_timeout_ms)
    }

    /// Set the wait limit
    #[must_use]
    pub fn with_workflow_timeout(mut self, timeout: Duration) -> Self {
        self.workflow_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable rollback of failed scale-ups
    #[must_use]
    pub fn with_rollback(mut self, rollback_on_failure: bool) -> Self {
        self.rollback_on_failure = rollback_on_failure;
        self
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            workflow_timeout_ms: 300_000,
            rollback_on_failure: true,
        }
    }
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    /// Engine section
    pub engine: EngineConfig,
    /// Deployment section
    pub deployment: DeploymentConfig,
}

impl CairnConfig {
    /// Parse from JSON; missing sections and fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the document is not valid JSON for this shape
    pub fn from_json(json: &str) -> DeployResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> DeployResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serialize as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> DeployResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> DeployResult<()> {
        if self.engine.worker_threads == 0 {
            return Err(DeployError::Config("engine.worker_threads must be at least 1".to_string()));
        }
        if self.deployment.workflow_timeout_ms == 0 {
            return Err(DeployError::Config(
                "deployment.workflow_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
