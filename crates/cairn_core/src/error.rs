//! Core error types for CAIRN.

use thiserror::Error;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Lookup of an entity that does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of entity (node, instance, relationship, ...)
        kind: String,
        /// Identifier that was looked up
        id: String,
    },

    /// Insertion of an entity that already exists
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Kind of entity
        kind: String,
        /// Conflicting identifier
        id: String,
    },

    /// Invalid input
    #[error("validation error on {field}: {reason}")]
    Validation {
        /// Offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// A type name with no registration
    #[error("unknown {kind} type: {name}")]
    UnknownType {
        /// `node` or `relationship`
        kind: String,
        /// The type name
        name: String,
    },
}

impl CoreError {
    /// Shorthand for [`CoreError::NotFound`]
    pub fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// Shorthand for [`CoreError::AlreadyExists`]
    pub fn already_exists(kind: impl Into<String>, id: impl ToString) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    /// Shorthand for [`CoreError::Validation`]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
