//! Time sources.
//!
//! Everything that compares against "now" reads it through a [`Clock`] so
//! tests can move time across a boundary without sleeping.

use std::fmt::Debug;

use chrono::Utc;

use crate::Timestamp;

/// Source of the current instant.
pub trait Clock: Send + Sync + Debug {
    /// The current instant in UTC.
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
