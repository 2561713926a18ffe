//! Engine error taxonomy
//!
//! Resolution-time errors abort an operation before any mutation is issued.
//! Mutation-time failures are captured per target and never surface here.

use thiserror::Error;

/// Error raised by the resolution, mutation and diff engines.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Required input is missing or malformed.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The raw value list contained no usable entries.
    #[error("no values provided: {what}")]
    EmptyInput { what: String },

    /// The remote index is not configured for the requested operation.
    #[error("configuration error on index '{index}': {message}")]
    Configuration { index: String, message: String },

    /// Transport-level failure talking to the service.
    #[error("network error: {message}")]
    Network {
        message: String,
        transient: bool,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// A destructive operation was requested without explicit confirmation.
    #[error("destructive operation '{operation}' requires explicit confirmation")]
    DestructiveAction { operation: String },

    /// Resolution succeeded but matched zero records for an export.
    #[error("nothing to export: no matching records found")]
    NothingToExport,

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV input or output failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn empty_input(what: impl Into<String>) -> Self {
        Self::EmptyInput { what: what.into() }
    }

    pub fn configuration(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            index: index.into(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            transient: true,
            source: None,
        }
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn destructive(operation: impl Into<String>) -> Self {
        Self::DestructiveAction {
            operation: operation.into(),
        }
    }

    /// Whether a retry may succeed: transport failures, throttling and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { transient, .. } => *transient,
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// The service reported that the index or object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Remote { status: 404, .. })
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::remote(status.as_u16(), e.to_string());
        }
        let transient = e.is_timeout() || e.is_connect() || e.is_request();
        Self::Network {
            message: e.to_string(),
            transient,
            source: Some(Box::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        assert!(EngineError::network("reset by peer").is_transient());
        assert!(EngineError::remote(429, "slow down").is_transient());
        assert!(EngineError::remote(503, "unavailable").is_transient());
        assert!(!EngineError::remote(404, "index does not exist").is_transient());
        assert!(!EngineError::validation("missing index").is_transient());
        assert!(EngineError::remote(404, "index does not exist").is_not_found());
        assert!(!EngineError::remote(400, "bad request").is_not_found());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::configuration("products", "no distinct attribute configured");
        assert_eq!(
            err.to_string(),
            "configuration error on index 'products': no distinct attribute configured"
        );
    }
}
