//! Error types for Daybreak operations

use crate::Timestamp;
use thiserror::Error;

/// Boundary calculation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoundaryError {
    /// The boundary function returned an instant that is not after its input.
    #[error("Boundary is not in the future: next boundary {next} is not after {from}")]
    NonFuture { from: Timestamp, next: Timestamp },

    #[error("No valid wall-clock instant found in {zone} after {from}")]
    Unresolvable { from: Timestamp, zone: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Daybreak errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DaybreakError {
    #[error("Boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Result type alias for Daybreak operations.
pub type DaybreakResult<T> = Result<T, DaybreakError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_boundary_error_display_non_future() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let err = BoundaryError::NonFuture { from: at, next: at };
        let msg = format!("{}", err);
        assert!(msg.contains("not in the future"));
        assert!(msg.contains("2024-03-01"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "time_zone".to_string(),
            value: "Mars/Olympus".to_string(),
            reason: "unknown IANA zone".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("time_zone"));
        assert!(msg.contains("Mars/Olympus"));
        assert!(msg.contains("unknown IANA zone"));
    }

    #[test]
    fn test_daybreak_error_from_config_error() {
        let err: DaybreakError = ConfigError::MissingField {
            field: "time_of_day".to_string(),
        }
        .into();
        assert!(matches!(err, DaybreakError::Config(_)));
        assert!(format!("{}", err).starts_with("Config error"));
    }

    #[test]
    fn test_daybreak_error_display_telemetry() {
        let err = DaybreakError::Telemetry("subscriber already set".to_string());
        assert_eq!(err.to_string(), "Telemetry error: subscriber already set");
    }
}
