//! Unified error handling for the Event Console rule tooling
//!
//! Every crate keeps its own domain error enum (`RuleError`, `ClientError`)
//! and gains a common outward-facing interface by implementing
//! [`EcErrorTrait`]. [`ErrorInfo`] is the shape handed to callers that
//! re-render a form: user errors carry the name of the offending field.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// ErrorInfo - caller facing error description
// ============================================================================

/// Standard error information for callers (CLI output, forms)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Stable error code (e.g. `VALIDATION_ERROR`)
    pub code: String,
    /// Error message
    pub message: String,
    /// Detailed error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field-specific errors for validation
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_errors: HashMap<String, Vec<String>>,
}

impl ErrorInfo {
    /// Create a new ErrorInfo with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            details: None,
            field_errors: HashMap::new(),
        }
    }

    /// Set the error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Add details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Add a field error
    pub fn add_field_error(mut self, field: impl Into<String>, error: impl Into<String>) -> Self {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(error.into());
        self
    }
}

// ============================================================================
// Error categories
// ============================================================================

/// Error category enum - used for classification and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Storage,
    Network,
    Timeout,

    // Business logic layer
    Validation,
    NotFound,
    Conflict,
    /// Operation not allowed in the current state (e.g. MKP lifecycle)
    InvalidState,

    // Engine channel layer
    Protocol,
    Connection,

    // System level
    Internal,
    DataCorruption,

    // Others
    Unknown,
}

/// Event Console error capability trait
///
/// Defines a unified interface that all error types of the workspace
/// implement. Each crate keeps its domain-specific variants.
///
/// # Design principles
///
/// 1. Domain preservation: keep crate-specific error variants
/// 2. Unified interface: present a common outward-facing interface via the trait
/// 3. Sensible defaults: provide default behavior to reduce boilerplate
pub trait EcErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for callers and logs)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Field the error is attached to, for user input errors
    fn field(&self) -> Option<&str> {
        None
    }

    /// Whether the error is retryable (default implementation is category-based)
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Connection
        )
    }

    /// Whether the error was caused by the user and can be fixed by editing input
    fn is_user_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation
                | ErrorCategory::NotFound
                | ErrorCategory::Conflict
                | ErrorCategory::InvalidState
        )
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Storage | ErrorCategory::DataCorruption => {
                Level::ERROR
            },
            ErrorCategory::Network
            | ErrorCategory::Timeout
            | ErrorCategory::Connection
            | ErrorCategory::Protocol => Level::WARN,
            ErrorCategory::Validation
            | ErrorCategory::NotFound
            | ErrorCategory::Conflict
            | ErrorCategory::InvalidState => Level::INFO,
            _ => Level::WARN,
        }
    }

    /// Convert to caller-facing ErrorInfo
    fn to_error_info(&self) -> ErrorInfo {
        let info = ErrorInfo::new(self.to_string()).with_code(self.error_code());
        match self.field() {
            Some(field) => info.add_field_error(field, self.to_string()),
            None => info,
        }
    }
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    enum SampleError {
        #[error("Invalid value for {field}: {message}")]
        User { field: String, message: String },
        #[error("Connection refused")]
        Refused,
    }

    impl EcErrorTrait for SampleError {
        fn error_code(&self) -> &'static str {
            match self {
                Self::User { .. } => "VALIDATION_ERROR",
                Self::Refused => "CONNECTION_FAILED",
            }
        }

        fn category(&self) -> ErrorCategory {
            match self {
                Self::User { .. } => ErrorCategory::Validation,
                Self::Refused => ErrorCategory::Connection,
            }
        }

        fn field(&self) -> Option<&str> {
            match self {
                Self::User { field, .. } => Some(field),
                Self::Refused => None,
            }
        }
    }

    #[test]
    fn test_error_retryable() {
        assert!(SampleError::Refused.is_retryable());
        let user = SampleError::User {
            field: "rule_p_id".into(),
            message: "duplicate".into(),
        };
        assert!(!user.is_retryable());
        assert!(user.is_user_error());
        assert_eq!(user.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_error_info_carries_field() {
        let error = SampleError::User {
            field: "rule_p_match".into(),
            message: "too many groups".into(),
        };
        let info = error.to_error_info();
        assert_eq!(info.code, "VALIDATION_ERROR");
        assert!(info.field_errors.contains_key("rule_p_match"));

        let info = SampleError::Refused.to_error_info();
        assert!(info.field_errors.is_empty());
    }
}
