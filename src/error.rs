//! Error types and handling for the surplus controller
//!
//! This module defines the error types used throughout the crate. Nothing in
//! here is fatal to the host process: a failed cycle is skipped and the next
//! trigger retries.

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, SurplusError>;

/// Main error type for the surplus controller
#[derive(Debug, Error)]
pub enum SurplusError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// One or more readings every cycle depends on were unavailable
    #[error("Missing mandatory telemetry: {}", names.join(", "))]
    MissingMandatoryTelemetry { names: Vec<String> },

    /// Readings required only by the active priority mode were unavailable
    #[error("Missing telemetry for mode {mode}: {}", names.join(", "))]
    MissingConditionalTelemetry { mode: u8, names: Vec<String> },

    /// The actuation sink rejected a command
    #[error("Actuation error: {message}")]
    Actuation { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl SurplusError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        SurplusError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        SurplusError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        SurplusError::Io {
            message: message.into(),
        }
    }

    /// Create a new missing-mandatory-telemetry error
    pub fn missing_mandatory(names: Vec<String>) -> Self {
        SurplusError::MissingMandatoryTelemetry { names }
    }

    /// Create a new missing-conditional-telemetry error
    pub fn missing_conditional(mode: u8, names: Vec<String>) -> Self {
        SurplusError::MissingConditionalTelemetry { mode, names }
    }

    /// Create a new actuation error
    pub fn actuation<S: Into<String>>(message: S) -> Self {
        SurplusError::Actuation {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        SurplusError::Generic {
            message: message.into(),
        }
    }

    /// Whether this error only means "skip this cycle"
    pub fn is_cycle_abort(&self) -> bool {
        matches!(
            self,
            SurplusError::MissingMandatoryTelemetry { .. }
                | SurplusError::MissingConditionalTelemetry { .. }
        )
    }
}

impl From<std::io::Error> for SurplusError {
    fn from(err: std::io::Error) -> Self {
        SurplusError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for SurplusError {
    fn from(err: serde_yaml::Error) -> Self {
        SurplusError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SurplusError {
    fn from(err: serde_json::Error) -> Self {
        SurplusError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SurplusError::config("test config error");
        assert!(matches!(err, SurplusError::Config { .. }));

        let err = SurplusError::validation("field", "test validation error");
        assert!(matches!(err, SurplusError::Validation { .. }));

        let err = SurplusError::missing_conditional(4, vec!["soc_min".to_string()]);
        assert!(matches!(
            err,
            SurplusError::MissingConditionalTelemetry { mode: 4, .. }
        ));
    }

    #[test]
    fn test_error_display() {
        let err = SurplusError::config("test error");
        assert_eq!(format!("{}", err), "Configuration error: test error");

        let err = SurplusError::missing_mandatory(vec![
            "sensor.grid".to_string(),
            "sensor.soc".to_string(),
        ]);
        assert_eq!(
            format!("{}", err),
            "Missing mandatory telemetry: sensor.grid, sensor.soc"
        );
    }

    #[test]
    fn telemetry_errors_are_cycle_aborts() {
        assert!(SurplusError::missing_mandatory(vec![]).is_cycle_abort());
        assert!(SurplusError::missing_conditional(7, vec![]).is_cycle_abort());
        assert!(!SurplusError::actuation("x").is_cycle_abort());
    }
}
