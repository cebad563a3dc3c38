//! Daybreak Test Utilities
//!
//! Shared test infrastructure for the Daybreak workspace:
//! - A manually driven clock
//! - Scripted producers that count their invocations
//! - Proptest generators for instants, zones and daily boundaries
//! - Fixtures for wall-clock instants in a named zone

pub use daybreak_core::{Boundary, Clock, DailyBoundary, Timestamp, Tz};

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::collections::VecDeque;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

// ============================================================================
// CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new(at: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(at)),
        }
    }

    /// Jump to an absolute instant (backwards is allowed).
    pub fn set(&self, at: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// PRODUCERS
// ============================================================================

/// Error returned by scripted producers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct TestError {
    pub kind: String,
    pub detail: String,
}

impl TestError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self {
            kind: "NetworkError".to_string(),
            detail: detail.into(),
        }
    }
}

/// Producer that replays a script of results and counts invocations.
///
/// Once the script is exhausted it keeps returning the last scripted result.
#[derive(Debug, Clone)]
pub struct ScriptedProducer<T> {
    calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Result<T, TestError>>>>,
    last: Arc<Mutex<Option<Result<T, TestError>>>>,
}

impl<T: Clone> ScriptedProducer<T> {
    pub fn new(script: impl IntoIterator<Item = Result<T, TestError>>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Producer that always succeeds with `value`.
    pub fn always(value: T) -> Self {
        Self::new([Ok(value)])
    }

    /// Number of times [`ScriptedProducer::produce`] has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Next scripted result, as an already-resolved future.
    pub fn produce(&self) -> Ready<Result<T, TestError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let result = match next {
            Some(result) => {
                *last = Some(result.clone());
                result
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(TestError::network("script is empty"))),
        };
        ready(result)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// The UTC instant at which the wall clock in `zone` reads the given time.
///
/// Returns `None` for wall-clock times skipped by a DST transition; ambiguous
/// times resolve to the earlier instant.
pub fn local_instant(
    zone: Tz,
    date: (i32, u32, u32),
    time: (u32, u32, u32),
) -> Option<Timestamp> {
    let naive = NaiveDate::from_ymd_opt(date.0, date.1, date.2)?.and_hms_opt(
        time.0, time.1, time.2,
    )?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

/// `local_instant` for `Australia/Sydney`; panics on invalid input.
pub fn sydney(date: (i32, u32, u32), time: (u32, u32, u32)) -> Timestamp {
    local_instant(chrono_tz::Australia::Sydney, date, time)
        .unwrap_or_else(|| panic!("invalid Sydney wall-clock time {:?} {:?}", date, time))
}

/// 07:00 in `Australia/Sydney`.
pub fn seven_am_sydney() -> DailyBoundary {
    DailyBoundary::new(
        chrono::NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(chrono::NaiveTime::MIN),
        chrono_tz::Australia::Sydney,
    )
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Daybreak types.

    use super::*;
    use chrono::NaiveTime;
    use proptest::prelude::*;

    /// Zones with varied DST rules, including a half-hour shift and none at all.
    pub const ZONES: [Tz; 7] = [
        chrono_tz::Australia::Sydney,
        chrono_tz::Australia::Lord_Howe,
        chrono_tz::America::New_York,
        chrono_tz::Europe::London,
        chrono_tz::Asia::Kolkata,
        chrono_tz::Pacific::Auckland,
        chrono_tz::UTC,
    ];

    /// Instants between 1970 and 2100, whole seconds.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (0i64..4_102_444_800i64).prop_map(|secs| {
            Utc.timestamp_opt(secs, 0)
                .single()
                .unwrap_or_else(|| panic!("timestamp {} out of range", secs))
        })
    }

    pub fn arb_zone() -> impl Strategy<Value = Tz> {
        prop::sample::select(ZONES.to_vec())
    }

    /// Times of day on a whole minute.
    pub fn arb_time_of_day() -> impl Strategy<Value = NaiveTime> {
        (0u32..24, 0u32..60).prop_map(|(h, m)| {
            NaiveTime::from_hms_opt(h, m, 0)
                .unwrap_or_else(|| panic!("invalid time {}:{}", h, m))
        })
    }

    pub fn arb_daily_boundary() -> impl Strategy<Value = DailyBoundary> {
        (arb_time_of_day(), arb_zone()).prop_map(|(at, zone)| DailyBoundary::new(at, zone))
    }
}
