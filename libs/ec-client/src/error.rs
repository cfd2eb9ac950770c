//! Engine channel error types

use ec_rules::RuleError;
use errors::{EcErrorTrait, ErrorCategory};
use thiserror::Error;

/// Result type for engine channel operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Engine channel errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Endpoint string could not be parsed
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Engine socket not reachable
    #[error("Cannot connect to event daemon via {0}")]
    Connection(String),

    /// Connect or read exceeded the configured timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Socket error after the connection was established
    #[error("IO error: {0}")]
    Io(String),

    /// Engine answered with something unexpected
    #[error("Invalid response from event daemon: {0}")]
    Protocol(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Protocol(err.to_string())
    }
}

impl From<ClientError> for RuleError {
    fn from(err: ClientError) -> Self {
        RuleError::Engine(err.to_string())
    }
}

impl EcErrorTrait for ClientError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::Connection(_) => "CONNECTION_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Io(_) => "IO_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidEndpoint(_) => ErrorCategory::Configuration,
            Self::Connection(_) => ErrorCategory::Connection,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Io(_) => ErrorCategory::Network,
            Self::Protocol(_) => ErrorCategory::Protocol,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err = ClientError::Timeout("Connection to tmp/run/mkeventd/status timed out".into());
        assert!(err.is_retryable());
        assert_eq!(err.error_code(), "TIMEOUT");

        let rule_err: RuleError = ClientError::Connection("tcp:10.0.0.1:6558".into()).into();
        assert!(matches!(rule_err, RuleError::Engine(ref msg) if msg.contains("10.0.0.1")));
        assert!(!ClientError::Protocol("garbage".into()).is_retryable());
    }
}
