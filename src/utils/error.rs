//! Centralized error types for memsession
//!
//! Library code returns `SessionError` through the crate `Result` alias.
//! The binary wraps these with `anyhow` for context.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for memsession operations
///
/// The request path (lookup, insert, removal) never produces one of these;
/// they come from configuration loading and from strict attribute reads.
#[derive(Error, Debug)]
pub enum SessionError {
    /// IO errors with path context
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Strict attribute read on a key that is not set
    #[error("Attribute not found: {key}")]
    AttributeNotFound { key: String },

    /// Strict attribute read on a key holding another type
    #[error("Attribute {key} holds {actual}, expected {expected}")]
    AttributeType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl SessionError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn attribute_not_found(key: impl Into<String>) -> Self {
        Self::AttributeNotFound { key: key.into() }
    }

    pub fn attribute_type(
        key: impl Into<String>,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::AttributeType {
            key: key.into(),
            expected,
            actual,
        }
    }

    /// Returns true for the two strict-read failures, which callers usually
    /// treat as "no value" rather than as a fault
    pub fn is_attribute_miss(&self) -> bool {
        matches!(
            self,
            SessionError::AttributeNotFound { .. } | SessionError::AttributeType { .. }
        )
    }

    /// Returns the error severity level for logging
    pub fn severity(&self) -> tracing::Level {
        match self {
            SessionError::Config { .. } => tracing::Level::ERROR,
            SessionError::Serialization { .. } => tracing::Level::ERROR,
            SessionError::Io { .. } => tracing::Level::WARN,
            SessionError::AttributeNotFound { .. } => tracing::Level::DEBUG,
            SessionError::AttributeType { .. } => tracing::Level::DEBUG,
        }
    }

    /// Returns a hint for the operator, if one applies
    pub fn suggestion(&self) -> Option<String> {
        match self {
            SessionError::Config { .. } | SessionError::Serialization { .. } => Some(
                "Check ~/.memsession/config.json or the MEMSESSION_* environment variables."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Result type alias using SessionError
pub type Result<T> = std::result::Result<T, SessionError>;

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = SessionError::config("timeout must be a number");
        assert!(err.to_string().contains("timeout must be a number"));
        assert_eq!(err.severity(), tracing::Level::ERROR);
        assert!(err.suggestion().unwrap().contains("MEMSESSION_"));
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = SessionError::io("/test/path", io_err);
        assert!(err.to_string().contains("/test/path"));
        assert!(!err.is_attribute_miss());
    }

    #[test]
    fn test_attribute_errors() {
        let missing = SessionError::attribute_not_found("cart");
        assert!(missing.to_string().contains("cart"));
        assert!(missing.is_attribute_miss());

        let mismatch = SessionError::attribute_type("cart", "int", "string");
        assert_eq!(mismatch.to_string(), "Attribute cart holds string, expected int");
        assert!(mismatch.is_attribute_miss());
        assert!(mismatch.suggestion().is_none());
    }

    #[test]
    fn test_error_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let converted: SessionError = io_err.into();
        assert!(matches!(converted, SessionError::Io { .. }));

        let json_err = serde_json::from_str::<i32>("invalid").unwrap_err();
        let converted: SessionError = json_err.into();
        assert!(matches!(converted, SessionError::Serialization { .. }));
    }
}
