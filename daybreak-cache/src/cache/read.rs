//! Cache reads carrying expiry metadata.
//!
//! Every read says when its value was computed, when it stops being valid and
//! whether this caller paid for the computation.

use std::time::Duration;

use daybreak_core::Timestamp;

/// How a read obtained its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadSource {
    /// Served from a stored entry that had not yet expired.
    Hit,
    /// This caller ran the producer.
    Computed,
    /// This caller joined a computation another caller was already running.
    Coalesced,
}

/// Result of a cache read.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    computed_at: Timestamp,
    expires_at: Timestamp,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub(crate) fn new(
        value: T,
        computed_at: Timestamp,
        expires_at: Timestamp,
        source: ReadSource,
    ) -> Self {
        Self {
            value,
            computed_at,
            expires_at,
            source,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// When the producer returned this value.
    pub fn computed_at(&self) -> Timestamp {
        self.computed_at
    }

    /// First instant at which this value is no longer served.
    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Hit
    }

    /// Whether the value is still servable at `now`.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }

    /// How old the value is at `now`.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.computed_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Time left before expiry at `now`; zero once expired.
    pub fn remaining_at(&self, now: Timestamp) -> Duration {
        self.expires_at
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            computed_at: self.computed_at,
            expires_at: self.expires_at,
            source: self.source,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
