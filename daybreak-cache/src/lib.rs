//! Daybreak Cache
//!
//! A key-value cache whose entries expire at the next fixed wall-clock
//! boundary in a named time zone, with at most one recomputation per key in
//! flight at any time. See [`BoundaryCache`].

pub mod cache;

pub use cache::{BoundaryCache, CacheError, CacheRead, CacheStats, KeyStats, ReadSource};

// Re-export core types for convenience
pub use daybreak_core::{
    Boundary, BoundaryConfig, BoundaryError, Clock, ConfigError, DailyBoundary, DaybreakError,
    DaybreakResult, Envelope, SystemClock, Timestamp, Tz,
};
