//! CAIRN Deployments
//!
//! A [`Deployment`] owns a topology and an engine. Install and uninstall are
//! thin calls into the engine; scaling goes through the [`Impacter`], which
//! computes exactly which instances and relationship instances a scale
//! operation adds or removes. Every execution a deployment launches is
//! recorded in its [`CheckpointLog`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod config;
pub mod deployment;
pub mod error;
pub mod impacter;

// Re-exports
pub use checkpoint::{Checkpoint, CheckpointKind, CheckpointLog};
pub use config::{CairnConfig, DeploymentConfig};
pub use deployment::{Deployment, ScaleReport};
pub use error::{DeployError, DeployResult};
pub use impacter::{Impacter, ScaleImpact};
