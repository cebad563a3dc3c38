//! Daybreak Core - time, boundaries and errors
//!
//! Building blocks shared by the cache and its callers: the UTC timestamp
//! alias, injectable clocks, daily wall-clock boundaries in named zones,
//! configuration, the error taxonomy and the JSON response envelope.

use chrono::{DateTime, Utc};

pub mod boundary;
pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod telemetry;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use boundary::{parse_time_of_day, Boundary, DailyBoundary};
pub use clock::{Clock, SystemClock};
pub use config::BoundaryConfig;
pub use envelope::Envelope;
pub use error::{BoundaryError, ConfigError, DaybreakError, DaybreakResult};
pub use telemetry::init_tracing;

// Re-exported so callers can name zones without a direct chrono-tz dependency.
pub use chrono_tz::Tz;
