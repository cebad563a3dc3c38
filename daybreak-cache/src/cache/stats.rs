//! Hit/miss accounting, per key and per cache.

use std::time::Duration;

/// Counters for a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyStats {
    /// Reads served from a valid stored entry.
    pub hits: u64,
    /// Reads that ran the producer.
    pub misses: u64,
    /// Reads that joined a computation already in flight.
    pub coalesced: u64,
    /// Producer runs that failed.
    pub failures: u64,
    /// Producer runs that finished, successfully or not. Abandoned runs
    /// count as misses but not here.
    pub runs: u64,
    /// Total time spent inside finished producer runs.
    pub total_compute_time: Duration,
}

impl KeyStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.hits, self.misses)
    }

    /// Mean producer duration over finished runs.
    pub fn average_compute_time(&self) -> Duration {
        average(self.total_compute_time, self.runs)
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub failures: u64,
    pub runs: u64,
    /// Number of entries currently stored, valid or not.
    pub entry_count: u64,
    /// Number of keys with a computation running.
    pub in_flight: u64,
    pub total_compute_time: Duration,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.hits, self.misses)
    }

    pub fn average_compute_time(&self) -> Duration {
        average(self.total_compute_time, self.runs)
    }

    pub(crate) fn absorb(&mut self, key: &KeyStats) {
        self.hits += key.hits;
        self.misses += key.misses;
        self.coalesced += key.coalesced;
        self.failures += key.failures;
        self.runs += key.runs;
        self.total_compute_time += key.total_compute_time;
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

fn average(total: Duration, runs: u64) -> Duration {
    match u32::try_from(runs) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / runs as f64),
    }
}
