//! Application-wide error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Classification shared by every error in the billing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// Bad input shape, negative amount, or an illegal state for the request.
    Validation,
    /// Illegal status transition or operation from a disallowed status.
    State,
    /// Idempotency-key or period collision on create.
    Duplicate,
    /// Referenced invoice, wallet or customer is missing.
    NotFound,
    /// Persistence or transport failure from a collaborator.
    System,
}

impl FaultKind {
    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::System)
    }
}

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not allowed from the current status.
    #[error("Invalid state: {0}")]
    State(String),

    /// Duplicate request (e.g., idempotency key already used).
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence or collaborator failure.
    #[error("System error: {0}")]
    System(String),
}

impl AppError {
    /// Builds an `AppError` of the given kind.
    #[must_use]
    pub fn from_kind(kind: FaultKind, message: String) -> Self {
        match kind {
            FaultKind::Validation => Self::Validation(message),
            FaultKind::State => Self::State(message),
            FaultKind::Duplicate => Self::Duplicate(message),
            FaultKind::NotFound => Self::NotFound(message),
            FaultKind::System => Self::System(message),
        }
    }

    /// Returns the fault classification.
    #[must_use]
    pub const fn kind(&self) -> FaultKind {
        match self {
            Self::Validation(_) => FaultKind::Validation,
            Self::State(_) => FaultKind::State,
            Self::Duplicate(_) => FaultKind::Duplicate,
            Self::NotFound(_) => FaultKind::NotFound,
            Self::System(_) => FaultKind::System,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::State(_) => 422,
            Self::Duplicate(_) => 409,
            Self::NotFound(_) => 404,
            Self::System(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::State(_) => "INVALID_STATE",
            Self::Duplicate(_) => "DUPLICATE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::System(_) => "SYSTEM_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FaultKind::Validation, 400, "VALIDATION_ERROR")]
    #[case(FaultKind::State, 422, "INVALID_STATE")]
    #[case(FaultKind::Duplicate, 409, "DUPLICATE")]
    #[case(FaultKind::NotFound, 404, "NOT_FOUND")]
    #[case(FaultKind::System, 500, "SYSTEM_ERROR")]
    fn test_kind_mapping(#[case] kind: FaultKind, #[case] status: u16, #[case] code: &str) {
        let err = AppError::from_kind(kind, "msg".to_string());
        assert_eq!(err.kind(), kind);
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Validation("msg".into()).to_string(),
            "Validation error: msg"
        );
        assert_eq!(AppError::State("msg".into()).to_string(), "Invalid state: msg");
        assert_eq!(AppError::Duplicate("msg".into()).to_string(), "Duplicate: msg");
        assert_eq!(AppError::NotFound("msg".into()).to_string(), "Not found: msg");
        assert_eq!(AppError::System("msg".into()).to_string(), "System error: msg");
    }

    #[test]
    fn test_only_system_faults_are_retryable() {
        assert!(FaultKind::System.is_retryable());
        assert!(!FaultKind::Validation.is_retryable());
        assert!(!FaultKind::Duplicate.is_retryable());
    }
}
