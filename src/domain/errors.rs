//! Domain error types
//!
//! This module defines the error hierarchy for Courier.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Courier error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// Lineage graph errors
    #[error("Lineage error: {0}")]
    Lineage(#[from] LineageError),

    /// Receiver filter errors
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Telemetry sink errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Lineage graph errors
///
/// Raised by graph walks. Read-side callers usually degrade these into
/// empty or partial results instead of propagating them.
#[derive(Debug, Error)]
pub enum LineageError {
    /// A walk revisited a node already on its own path
    #[error("Cycle detected in report lineage: {path}")]
    Cycle { path: String },

    /// A walk exceeded its iteration bound
    #[error("Lineage walk exceeded {limit} iterations")]
    IterationLimit { limit: usize },

    /// An edge referenced a parent report that was never persisted
    #[error("Parent report {parent} does not exist for child {child}")]
    MissingParent { parent: String, child: String },

    /// A graph query ran past its statement timeout
    #[error("Lineage query timed out after {0} ms")]
    Timeout(u64),
}

/// Receiver filter errors
#[derive(Debug, Error)]
pub enum FilterError {
    /// Strict evaluation rejected the bundle
    #[error("Bundle rejected by receiver {receiver}: {details}")]
    Rejected { receiver: String, details: String },

    /// An expression could not be parsed or evaluated
    #[error("Invalid filter expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// A report body could not be decoded into a bundle
    #[error("Failed to decode bundle: {0}")]
    Decode(String),

    /// A receiver sets both condition and mapped condition filters
    #[error("Receiver {receiver} has both condition_filter and mapped_condition_filter configured")]
    MisconfiguredConditionFilters { receiver: String },
}

// Conversion from std::io::Error
impl From<std::io::Error> for CourierError {
    fn from(err: std::io::Error) -> Self {
        CourierError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        CourierError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CourierError {
    fn from(err: toml::de::Error) -> Self {
        CourierError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_courier_error_display() {
        let err = CourierError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_lineage_error_conversion() {
        let lineage_err = LineageError::IterationLimit { limit: 10 };
        let err: CourierError = lineage_err.into();
        assert!(matches!(err, CourierError::Lineage(_)));
        assert!(err.to_string().contains("10 iterations"));
    }

    #[test]
    fn test_filter_error_conversion() {
        let filter_err = FilterError::Rejected {
            receiver: "me-phd.elr".to_string(),
            details: "JURISDICTIONAL_FILTER: state = 'ME'".to_string(),
        };
        let err: CourierError = filter_err.into();
        assert!(matches!(err, CourierError::Filter(_)));
        assert!(err.to_string().contains("state = 'ME'"));
    }

    #[test]
    fn test_cycle_error_display() {
        let err = LineageError::Cycle {
            path: "a->b->a".to_string(),
        };
        assert_eq!(err.to_string(), "Cycle detected in report lineage: a->b->a");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: CourierError = io_err.into();
        assert!(matches!(err, CourierError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: CourierError = json_err.into();
        assert!(matches!(err, CourierError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: CourierError = toml_err.into();
        assert!(matches!(err, CourierError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_courier_error_implements_std_error() {
        let err = CourierError::Validation("Test error".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
