//! Rule pack error types

use errors::{EcErrorTrait, ErrorCategory};
use thiserror::Error;

/// Result type for rule pack operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Rule pack errors
#[derive(Debug, Error)]
pub enum RuleError {
    /// Invalid user input, attached to the offending field
    #[error("{message}")]
    User { field: String, message: String },

    /// Referenced pack or rule no longer exists (e.g. concurrent edit)
    #[error("{0} does not exist")]
    NotFound(String),

    /// Operation not allowed for the current packaging state
    #[error("{0}")]
    InvalidState(String),

    /// Destructive operation submitted without confirmation
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    /// Engine command or query failed
    #[error("Event Console error: {0}")]
    Engine(String),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RuleError {
    /// User error on `field`
    pub fn user(field: impl Into<String>, message: impl Into<String>) -> Self {
        RuleError::User {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        RuleError::Serialization(err.to_string())
    }
}

impl From<tempfile::PersistError> for RuleError {
    fn from(err: tempfile::PersistError) -> Self {
        RuleError::Io(err.error)
    }
}

impl EcErrorTrait for RuleError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::User { .. } => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::ConfirmationRequired(_) => "CONFIRMATION_REQUIRED",
            Self::Engine(_) => "ENGINE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::User { .. } => ErrorCategory::Validation,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::InvalidState(_) | Self::ConfirmationRequired(_) => ErrorCategory::InvalidState,
            Self::Engine(_) => ErrorCategory::Connection,
            Self::Io(_) => ErrorCategory::Storage,
            Self::Serialization(_) => ErrorCategory::DataCorruption,
        }
    }

    fn field(&self) -> Option<&str> {
        match self {
            Self::User { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_user_error_info() {
        let err = RuleError::user("id", "This ID is already in use");
        assert!(err.is_user_error());
        let info = err.to_error_info();
        assert_eq!(info.code, "VALIDATION_ERROR");
        assert_eq!(info.field_errors["id"], vec!["This ID is already in use".to_string()]);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            RuleError::NotFound("Rule pack 3".into()).to_string(),
            "Rule pack 3 does not exist"
        );
        assert!(RuleError::Engine("refused".into()).is_retryable());
        assert!(!RuleError::Serialization("bad".into()).is_user_error());
    }
}
