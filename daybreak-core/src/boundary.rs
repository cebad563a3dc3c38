//! Daily wall-clock boundaries.
//!
//! A boundary maps an instant to the next reset instant after it. The cache
//! uses it to decide when an entry stops being valid, so every
//! implementation must return something strictly later than its input.
//!
//! [`DailyBoundary`] does its wall-clock arithmetic in a named IANA zone,
//! never in the host's local zone: "07:00 in Australia/Sydney" is the same
//! absolute instant on a server in UTC and on a laptop in Los Angeles.

use std::fmt;
use std::time::Duration;

use chrono::{Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{BoundaryError, ConfigError};
use crate::Timestamp;

/// Longest daylight-saving gap we step across when a wall-clock time does
/// not exist on a given date.
const MAX_GAP_MINUTES: i64 = 180;

/// Computes the next reset instant after a given instant.
pub trait Boundary: Send + Sync {
    /// Next boundary after `from`.
    ///
    /// Implementations must be deterministic and return an instant strictly
    /// after `from`. Use [`Boundary::checked_next_after`] to enforce that.
    fn next_after(&self, from: Timestamp) -> Result<Timestamp, BoundaryError>;

    /// Like [`Boundary::next_after`], but rejects results that are not in the
    /// future relative to `from`.
    fn checked_next_after(&self, from: Timestamp) -> Result<Timestamp, BoundaryError> {
        let next = self.next_after(from)?;
        if next <= from {
            return Err(BoundaryError::NonFuture { from, next });
        }
        Ok(next)
    }

    /// Time remaining from `now` until the next boundary.
    fn duration_until_next(&self, now: Timestamp) -> Result<Duration, BoundaryError> {
        let next = self.checked_next_after(now)?;
        Ok(next
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO))
    }
}

impl<F> Boundary for F
where
    F: Fn(Timestamp) -> Timestamp + Send + Sync,
{
    fn next_after(&self, from: Timestamp) -> Result<Timestamp, BoundaryError> {
        Ok(self(from))
    }
}

/// A fixed time of day in a named time zone, e.g. 07:00 in `Australia/Sydney`.
///
/// Daylight-saving transitions are resolved as follows:
/// - an ambiguous wall-clock time (clocks fall back) maps to its earlier instant;
/// - a skipped wall-clock time (clocks spring forward) maps to the first
///   valid wall-clock minute after the gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyBoundary {
    at: NaiveTime,
    zone: Tz,
}

impl DailyBoundary {
    pub fn new(at: NaiveTime, zone: Tz) -> Self {
        Self { at, zone }
    }

    /// Midnight in the given zone.
    pub fn midnight(zone: Tz) -> Self {
        Self::new(NaiveTime::MIN, zone)
    }

    /// Parse a time of day (`HH:MM` or `HH:MM:SS`) and an IANA zone name.
    pub fn parse(at: &str, zone: &str) -> Result<Self, ConfigError> {
        let time = parse_time_of_day(at)?;
        let tz = zone.trim().parse::<Tz>().map_err(|e| ConfigError::InvalidValue {
            field: "time_zone".to_string(),
            value: zone.to_string(),
            reason: format!("unknown IANA zone: {}", e),
        })?;
        Ok(Self::new(time, tz))
    }

    /// The configured wall-clock time.
    pub fn time_of_day(&self) -> NaiveTime {
        self.at
    }

    /// The zone the wall-clock time is read in.
    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// The instant on `date` (local to the zone) whose wall clock reads the
    /// configured time, after DST resolution.
    fn on_date(&self, date: NaiveDate) -> Option<Timestamp> {
        let local = date.and_time(self.at);
        match self.zone.from_local_datetime(&local) {
            LocalResult::Single(t) => Some(t.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => self.after_gap(local),
        }
    }

    fn after_gap(&self, local: NaiveDateTime) -> Option<Timestamp> {
        (1..=MAX_GAP_MINUTES).find_map(|minutes| {
            let shifted = local + chrono::Duration::minutes(minutes);
            self.zone
                .from_local_datetime(&shifted)
                .earliest()
                .map(|t| t.with_timezone(&Utc))
        })
    }
}

impl Boundary for DailyBoundary {
    fn next_after(&self, from: Timestamp) -> Result<Timestamp, BoundaryError> {
        let local_date = from.with_timezone(&self.zone).date_naive();
        // Start a day early: when clocks fall back across midnight, the
        // previous local date can still hold the next boundary.
        let start = local_date
            .checked_sub_days(Days::new(1))
            .unwrap_or(local_date);

        start
            .iter_days()
            .take(4)
            .filter_map(|date| self.on_date(date))
            .find(|candidate| *candidate > from)
            .ok_or_else(|| BoundaryError::Unresolvable {
                from,
                zone: self.zone.name().to_string(),
            })
    }
}

impl fmt::Display for DailyBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.at.format("%H:%M:%S"), self.zone.name())
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ConfigError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|e| ConfigError::InvalidValue {
            field: "time_of_day".to_string(),
            value: value.to_string(),
            reason: format!("expected HH:MM or HH:MM:SS ({})", e),
        })
}

// ============================================================================
// TESTS
// ============================================================================
