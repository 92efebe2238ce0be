//! Domain error model.

use thiserror::Error;

/// Result type used across the repository layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// These are local, synchronous failures. Nothing here is retried; callers
/// surface them unchanged (the transport layer maps them to status codes).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input to a lifecycle/hierarchy/credentials operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A referenced entity, user or content model does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate id (or name) on creation.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A write did not follow the stored version (stale or skipped version).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected persistence failure, wrapped and propagated.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl DomainError {
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_message() {
        let err = DomainError::invalid_parameter("contentModelId may not be blank");
        assert_eq!(
            err.to_string(),
            "invalid parameter: contentModelId may not be blank"
        );
        assert!(DomainError::not_found("entity x").is_not_found());
        assert!(!DomainError::conflict("v").is_not_found());
    }
}
