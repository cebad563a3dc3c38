//! Boundary configuration.
//!
//! Configuration is loaded from environment variables with defaults that
//! match the newsletter's morning refresh (07:00 in Sydney). The struct also
//! derives `serde` traits so an application can embed it in its own config
//! file.

use serde::{Deserialize, Serialize};

use crate::boundary::DailyBoundary;
use crate::error::ConfigError;

pub const DEFAULT_TIME_OF_DAY: &str = "07:00";
pub const DEFAULT_TIME_ZONE: &str = "Australia/Sydney";
pub const DEFAULT_NAMESPACE: &str = "cache";

/// Where a cache's daily boundary falls and how it is labelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Wall-clock time of the daily reset, `HH:MM` or `HH:MM:SS`.
    pub time_of_day: String,

    /// IANA zone the wall-clock time is read in.
    pub time_zone: String,

    /// Label used in logs and stats.
    pub namespace: String,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            time_of_day: DEFAULT_TIME_OF_DAY.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl BoundaryConfig {
    /// Create BoundaryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DAYBREAK_BOUNDARY_TIME`: daily reset time (default: 07:00)
    /// - `DAYBREAK_BOUNDARY_TZ`: IANA zone (default: Australia/Sydney)
    /// - `DAYBREAK_CACHE_NAMESPACE`: log/stats label (default: cache)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let time_of_day = std::env::var("DAYBREAK_BOUNDARY_TIME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.time_of_day);

        let time_zone = std::env::var("DAYBREAK_BOUNDARY_TZ")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.time_zone);

        let namespace = std::env::var("DAYBREAK_CACHE_NAMESPACE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.namespace);

        Self {
            time_of_day,
            time_zone,
            namespace,
        }
    }

    pub fn with_time_of_day(mut self, time_of_day: impl Into<String>) -> Self {
        self.time_of_day = time_of_day.into();
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Check every field without building anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "namespace".to_string(),
            });
        }
        self.to_boundary().map(|_| ())
    }

    /// Build the daily boundary this config describes.
    pub fn to_boundary(&self) -> Result<DailyBoundary, ConfigError> {
        if self.time_of_day.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "time_of_day".to_string(),
            });
        }
        if self.time_zone.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "time_zone".to_string(),
            });
        }
        DailyBoundary::parse(&self.time_of_day, &self.time_zone)
    }
}
