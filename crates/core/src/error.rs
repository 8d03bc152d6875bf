//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Only deterministic business failures live here (validation, invariants,
/// conflicts). Storage and transport failures have their own error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation without a single offending field.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A specific input field failed validation.
    ///
    /// `field` uses a dotted/indexed path such as `client.email` or
    /// `line_items[1].quantity`.
    #[error("invalid {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found")]
    NotFound,

    /// Duplicate keys, stale versions, no-op transitions.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Name of the offending field, when the error is tied to one.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Re-root a field error under a parent path (`email` → `client.email`).
    pub fn nested(self, parent: &str) -> Self {
        match self {
            Self::InvalidField { field, message } => Self::InvalidField {
                field: format!("{parent}.{field}"),
                message,
            },
            other => other,
        }
    }
}
