//! Boundary-aligned cache with single-flight recomputation.
//!
//! Each key moves through `EMPTY -> COMPUTING -> VALID -> (expired) ->
//! COMPUTING -> ...`. Expiry is checked lazily against the clock on every
//! read; nothing runs in the background.
//!
//! The key map sits behind a `std::sync::Mutex` that is never held across an
//! `.await`. Deciding that a read is a miss and registering the in-flight
//! marker happen in one critical section, so two callers can never both
//! become the producer for the same key. The marker is a `watch` channel:
//! waiters clone its receiver and wait for the leader to publish.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use daybreak_core::{
    Boundary, BoundaryConfig, BoundaryError, Clock, DaybreakResult, SystemClock, Timestamp,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::CacheError;
use super::read::{CacheRead, ReadSource};
use super::stats::{CacheStats, KeyStats};

/// A successfully computed value and its validity window.
#[derive(Debug, Clone)]
struct Computed<T> {
    value: T,
    computed_at: Timestamp,
    expires_at: Timestamp,
}

impl<T: Clone> Computed<T> {
    fn read(&self, source: ReadSource) -> CacheRead<T> {
        CacheRead::new(self.value.clone(), self.computed_at, self.expires_at, source)
    }
}

type Outcome<T, E> = Result<Computed<T>, CacheError<E>>;

/// `None` until the leader publishes.
type InFlight<T, E> = watch::Receiver<Option<Outcome<T, E>>>;

struct Slot<T, E> {
    entry: Option<Computed<T>>,
    in_flight: Option<InFlight<T, E>>,
    stats: KeyStats,
}

impl<T, E> Default for Slot<T, E> {
    fn default() -> Self {
        Self {
            entry: None,
            in_flight: None,
            stats: KeyStats::default(),
        }
    }
}

type Slots<T, E> = Mutex<HashMap<String, Slot<T, E>>>;

// Every critical section leaves the map consistent, so a panic elsewhere
// while holding the lock does not invalidate it.
fn lock_slots<T, E>(slots: &Slots<T, E>) -> MutexGuard<'_, HashMap<String, Slot<T, E>>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Claim<T, E> {
    Hit(CacheRead<T>),
    Wait(InFlight<T, E>),
    Lead(Leader<T, E>),
}

/// The caller that registered the in-flight marker for a key.
///
/// Dropping a leader without completing it (its future was cancelled)
/// removes the marker and closes the channel, so waiters retry and one of
/// them takes over.
struct Leader<T, E> {
    slots: Arc<Slots<T, E>>,
    namespace: Arc<str>,
    key: String,
    marker: InFlight<T, E>,
    tx: watch::Sender<Option<Outcome<T, E>>>,
    completed: bool,
}

impl<T: Clone, E> Leader<T, E> {
    /// Install the outcome, clear the marker and wake every waiter.
    fn complete(mut self, outcome: Outcome<T, E>, elapsed: Duration) -> Outcome<T, E> {
        {
            let mut slots = lock_slots(&self.slots);
            let slot = slots.entry(self.key.clone()).or_default();
            if slot
                .in_flight
                .as_ref()
                .is_some_and(|rx| rx.same_channel(&self.marker))
            {
                slot.in_flight = None;
            }
            slot.stats.runs += 1;
            slot.stats.total_compute_time += elapsed;
            match &outcome {
                Ok(computed) => slot.entry = Some(computed.clone()),
                Err(_) => slot.stats.failures += 1,
            }
            self.tx.send_replace(Some(outcome.clone()));
        }
        self.completed = true;
        outcome
    }
}

impl<T, E> Drop for Leader<T, E> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut slots = lock_slots(&self.slots);
        if let Some(slot) = slots.get_mut(&self.key) {
            if slot
                .in_flight
                .as_ref()
                .is_some_and(|rx| rx.same_channel(&self.marker))
            {
                slot.in_flight = None;
            }
        }
        warn!(
            namespace = %self.namespace,
            key = %self.key,
            "Computation abandoned before completion; waiters will retry"
        );
    }
}

/// Key-value cache whose entries stay valid until the next boundary after
/// they were computed.
///
/// Cloning is cheap and clones share state, so one instance can be built at
/// startup and handed to every handler that needs it.
///
/// `T` is the cached payload; wrap it in `Arc` to share one allocation
/// between callers. `E` is the producer's error type.
///
/// # Example
///
/// ```ignore
/// let cache: BoundaryCache<Quote, FetchError> =
///     BoundaryCache::new(DailyBoundary::parse("07:00", "Australia/Sydney")?)?;
///
/// let quote = cache.get("daily-quote", || fetch_quote(&client)).await?;
/// ```
pub struct BoundaryCache<T, E> {
    namespace: Arc<str>,
    boundary: Arc<dyn Boundary>,
    clock: Arc<dyn Clock>,
    slots: Arc<Slots<T, E>>,
}

impl<T, E> BoundaryCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a cache reading time from the system clock.
    ///
    /// Fails if `boundary` does not return a future instant for the current time.
    pub fn new(boundary: impl Boundary + 'static) -> Result<Self, BoundaryError> {
        Self::with_clock(boundary, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit time source.
    pub fn with_clock(
        boundary: impl Boundary + 'static,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BoundaryError> {
        boundary.checked_next_after(clock.now())?;
        Ok(Self {
            namespace: Arc::from(daybreak_core::config::DEFAULT_NAMESPACE),
            boundary: Arc::new(boundary),
            clock,
            slots: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Build a cache from configuration, using the system clock.
    pub fn from_config(config: &BoundaryConfig) -> DaybreakResult<Self> {
        config.validate()?;
        let cache = Self::new(config.to_boundary()?)?;
        Ok(cache.with_namespace(config.namespace.as_str()))
    }

    /// Label used in log fields.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Arc::from(namespace);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Return the cached value for `key`, running `producer` if there is no
    /// valid entry.
    ///
    /// Concurrent calls for the same key share a single producer run and all
    /// receive its value or its error. Failures are never cached.
    pub async fn get<F, Fut>(&self, key: &str, producer: F) -> Result<T, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_with_meta(key, producer)
            .await
            .map(CacheRead::into_value)
    }

    /// Like [`BoundaryCache::get`], but returns the value with its validity
    /// window and how it was obtained.
    pub async fn get_with_meta<F, Fut>(
        &self,
        key: &str,
        producer: F,
    ) -> Result<CacheRead<T>, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        validate_key(key)?;

        let leader = loop {
            match self.claim(key) {
                Claim::Hit(read) => return Ok(read),
                Claim::Lead(leader) => break leader,
                Claim::Wait(mut rx) => {
                    let published = rx.wait_for(Option::is_some).await.map(|r| r.clone());
                    match published {
                        Ok(Some(Ok(computed))) => return Ok(computed.read(ReadSource::Coalesced)),
                        Ok(Some(Err(e))) => return Err(e),
                        // Leader dropped without publishing.
                        Ok(None) | Err(_) => continue,
                    }
                }
            }
        };

        let started = Instant::now();
        let result = producer().await;
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(value) => {
                let computed_at = self.clock.now();
                self.boundary
                    .checked_next_after(computed_at)
                    .map(|expires_at| Computed {
                        value,
                        computed_at,
                        expires_at,
                    })
                    .map_err(CacheError::from)
            }
            Err(e) => Err(CacheError::Producer(Arc::new(e))),
        };

        let elapsed_ms = elapsed.as_millis() as u64;
        match leader.complete(outcome, elapsed) {
            Ok(computed) => {
                info!(
                    namespace = %self.namespace,
                    key,
                    elapsed_ms,
                    expires_at = %computed.expires_at,
                    "Cache entry stored"
                );
                Ok(computed.read(ReadSource::Computed))
            }
            Err(e) => {
                warn!(
                    namespace = %self.namespace,
                    key,
                    elapsed_ms,
                    producer_failure = e.is_producer_failure(),
                    "Cache computation failed; nothing stored"
                );
                Err(e)
            }
        }
    }

    /// Decide hit / wait / lead for `key` in one critical section.
    fn claim(&self, key: &str) -> Claim<T, E> {
        let mut slots = lock_slots(&self.slots);
        let now = self.clock.now();
        let slot = slots.entry(key.to_string()).or_default();

        if let Some(entry) = &slot.entry {
            if now < entry.expires_at {
                slot.stats.hits += 1;
                debug!(namespace = %self.namespace, key, "Cache hit");
                return Claim::Hit(entry.read(ReadSource::Hit));
            }
        }

        if let Some(rx) = &slot.in_flight {
            slot.stats.coalesced += 1;
            debug!(namespace = %self.namespace, key, "Joining in-flight computation");
            return Claim::Wait(rx.clone());
        }

        let (tx, marker) = watch::channel(None);
        slot.in_flight = Some(marker.clone());
        slot.stats.misses += 1;
        debug!(namespace = %self.namespace, key, "Cache miss; computing");

        Claim::Lead(Leader {
            slots: Arc::clone(&self.slots),
            namespace: Arc::clone(&self.namespace),
            key: key.to_string(),
            marker,
            tx,
            completed: false,
        })
    }

    /// The valid entry for `key`, if any. Never computes and records nothing.
    pub fn peek(&self, key: &str) -> Option<CacheRead<T>> {
        let slots = lock_slots(&self.slots);
        let now = self.clock.now();
        slots
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.read(ReadSource::Hit))
    }

    /// Store `value` for `key` as if it had just been computed.
    ///
    /// Returns the instant the seeded entry expires.
    pub fn insert(&self, key: &str, value: T) -> Result<Timestamp, CacheError<E>> {
        validate_key(key)?;
        let computed_at = self.clock.now();
        let expires_at = self.boundary.checked_next_after(computed_at)?;

        lock_slots(&self.slots).entry(key.to_string()).or_default().entry = Some(Computed {
            value,
            computed_at,
            expires_at,
        });
        info!(namespace = %self.namespace, key, %expires_at, "Cache entry inserted");
        Ok(expires_at)
    }

    /// Drop the stored entry for `key`.
    ///
    /// A computation already running for the key is not affected and still
    /// stores its result.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = lock_slots(&self.slots)
            .get_mut(key)
            .and_then(|slot| slot.entry.take())
            .is_some();
        if removed {
            info!(namespace = %self.namespace, key, "Cache entry invalidated");
        }
        removed
    }

    /// Drop every stored entry and return how many there were.
    pub fn clear(&self) -> usize {
        let removed = lock_slots(&self.slots)
            .values_mut()
            .filter_map(|slot| slot.entry.take())
            .count();
        info!(namespace = %self.namespace, removed, "Cache cleared");
        removed
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        lock_slots(&self.slots)
            .values()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate counters over all keys.
    pub fn stats(&self) -> CacheStats {
        let slots = lock_slots(&self.slots);
        let mut stats = CacheStats::default();
        for slot in slots.values() {
            stats.absorb(&slot.stats);
            if slot.entry.is_some() {
                stats.entry_count += 1;
            }
            if slot.in_flight.is_some() {
                stats.in_flight += 1;
            }
        }
        stats
    }

    pub fn key_stats(&self, key: &str) -> Option<KeyStats> {
        lock_slots(&self.slots).get(key).map(|slot| slot.stats.clone())
    }

    /// Counters for every key the cache has seen.
    pub fn all_key_stats(&self) -> HashMap<String, KeyStats> {
        lock_slots(&self.slots)
            .iter()
            .map(|(key, slot)| (key.clone(), slot.stats.clone()))
            .collect()
    }

    /// Time until the next boundary, for callers that poll on the same schedule.
    pub fn next_refresh_in(&self) -> Result<Duration, BoundaryError> {
        self.boundary.duration_until_next(self.clock.now())
    }

    /// Next boundary after the current instant.
    pub fn next_boundary(&self) -> Result<Timestamp, BoundaryError> {
        self.boundary.checked_next_after(self.clock.now())
    }
}

fn validate_key<E>(key: &str) -> Result<(), CacheError<E>> {
    if key.trim().is_empty() {
        return Err(CacheError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty".to_string(),
        });
    }
    Ok(())
}

impl<T, E> Clone for BoundaryCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            namespace: Arc::clone(&self.namespace),
            boundary: Arc::clone(&self.boundary),
            clock: Arc::clone(&self.clock),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T, E> fmt::Debug for BoundaryCache<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryCache")
            .field("namespace", &self.namespace)
            .field("clock", &self.clock)
            .field("keys", &lock_slots(&self.slots).len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use daybreak_core::DailyBoundary;
    use daybreak_test_utils::{ManualClock, ScriptedProducer, TestError};

    fn midnight_cache(clock: &ManualClock) -> BoundaryCache<String, TestError> {
        BoundaryCache::with_clock(
            DailyBoundary::midnight(chrono_tz::UTC),
            Arc::new(clock.clone()),
        )
        .unwrap()
    }

    fn noon() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);
        let producer = ScriptedProducer::always("v1".to_string());

        let first = cache.get_with_meta("quote", || producer.produce()).await.unwrap();
        assert_eq!(first.source(), ReadSource::Computed);
        assert_eq!(first.computed_at(), noon());
        assert_eq!(
            first.expires_at(),
            Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap()
        );

        let second = cache.get_with_meta("quote", || producer.produce()).await.unwrap();
        assert_eq!(second.source(), ReadSource::Hit);
        assert_eq!(second.into_value(), "v1");
        assert_eq!(producer.calls(), 1);
    }

    #[tokio::test]
    async fn test_expiry_is_strict() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);
        let producer = ScriptedProducer::new([Ok("v1".to_string()), Ok("v2".to_string())]);

        cache.get("quote", || producer.produce()).await.unwrap();
        clock.set(Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap());
        let value = cache.get("quote", || producer.produce()).await.unwrap();
        assert_eq!(value, "v2");
        assert_eq!(producer.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);
        let producer = ScriptedProducer::new([
            Err(TestError::network("reset")),
            Ok("v1".to_string()),
        ]);

        let err = cache.get("news", || producer.produce()).await.unwrap_err();
        assert!(err.is_producer_failure());
        assert!(cache.peek("news").is_none());

        let value = cache.get("news", || producer.produce()).await.unwrap();
        assert_eq!(value, "v1");
        assert_eq!(producer.calls(), 2);

        let stats = cache.key_stats("news").unwrap();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.failures, 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_does_not_serve_expired_entry() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);
        let producer = ScriptedProducer::new([
            Ok("v1".to_string()),
            Err(TestError::network("reset")),
        ]);

        cache.get("quote", || producer.produce()).await.unwrap();
        clock.advance(ChronoDuration::days(1));
        assert!(cache.get("quote", || producer.produce()).await.is_err());
        assert!(cache.peek("quote").is_none());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);
        let producer = ScriptedProducer::always("v".to_string());

        let err = cache.get("  ", || producer.produce()).await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey { .. }));
        assert_eq!(producer.calls(), 0);
    }

    #[test]
    fn test_non_future_boundary_rejected_at_construction() {
        let clock = ManualClock::new(noon());
        let result: Result<BoundaryCache<String, TestError>, _> =
            BoundaryCache::with_clock(|from: Timestamp| from, Arc::new(clock));
        assert!(matches!(result, Err(BoundaryError::NonFuture { .. })));
    }

    #[tokio::test]
    async fn test_boundary_that_breaks_later_fails_the_read() {
        let cutoff = noon() + ChronoDuration::hours(1);
        let clock = ManualClock::new(noon());
        let cache: BoundaryCache<String, TestError> = BoundaryCache::with_clock(
            move |from: Timestamp| if from < cutoff { cutoff } else { from },
            Arc::new(clock.clone()),
        )
        .unwrap();
        let producer = ScriptedProducer::always("v".to_string());

        clock.set(cutoff);
        let err = cache.get("k", || producer.produce()).await.unwrap_err();
        assert!(matches!(err, CacheError::Boundary(BoundaryError::NonFuture { .. })));
        assert!(cache.peek("k").is_none());
    }

    #[tokio::test]
    async fn test_insert_invalidate_clear() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);

        let expires_at = cache.insert("a", "seeded".to_string()).unwrap();
        cache.insert("b", "other".to_string()).unwrap();
        assert_eq!(expires_at, Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap());
        assert_eq!(cache.peek("a").unwrap().into_value(), "seeded");
        assert_eq!(cache.len(), 2);

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert!(cache.peek("a").is_none());

        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_peek_ignores_expired_entries_and_stats() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);
        cache.insert("a", "v".to_string()).unwrap();

        assert!(cache.peek("a").is_some());
        clock.advance(ChronoDuration::hours(12));
        assert!(cache.peek("a").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.key_stats("a").unwrap(), KeyStats::default());
    }

    #[test]
    fn test_next_refresh_in() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);
        assert_eq!(cache.next_refresh_in().unwrap(), Duration::from_secs(12 * 3600));
        assert_eq!(
            cache.next_boundary().unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 11, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_from_config() {
        let config = BoundaryConfig::default()
            .with_time_zone("UTC")
            .with_namespace("movers");
        let cache: BoundaryCache<u32, TestError> = BoundaryCache::from_config(&config).unwrap();
        assert_eq!(cache.namespace(), "movers");

        let bad = BoundaryConfig::default().with_time_zone("Atlantis/Central");
        assert!(BoundaryCache::<u32, TestError>::from_config(&bad).is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);
        let handle = cache.clone();
        handle.insert("k", "v".to_string()).unwrap();
        assert_eq!(cache.peek("k").unwrap().into_value(), "v");
        assert!(format!("{:?}", cache).contains("BoundaryCache"));
    }

    #[tokio::test]
    async fn test_all_key_stats_lists_every_key() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);
        let quotes = ScriptedProducer::always("q".to_string());
        let news = ScriptedProducer::new([
            Err(TestError::network("reset")),
            Ok("n".to_string()),
        ]);

        cache.get("quote", || quotes.produce()).await.unwrap();
        cache.get("quote", || quotes.produce()).await.unwrap();
        assert!(cache.get("news", || news.produce()).await.is_err());
        cache.get("news", || news.produce()).await.unwrap();

        let all = cache.all_key_stats();
        assert_eq!(all.len(), 2);
        assert_eq!(all["quote"].hits, 1);
        assert_eq!(all["quote"].misses, 1);
        assert_eq!(all["news"].misses, 2);
        assert_eq!(all["news"].failures, 1);
        assert_eq!(all["news"].runs, 2);
    }

    #[tokio::test]
    async fn test_abandoned_run_does_not_skew_average() {
        let clock = ManualClock::new(noon());
        let cache = midnight_cache(&clock);

        let abandoned =
            cache.get("quote", || std::future::pending::<Result<String, TestError>>());
        assert!(tokio::time::timeout(Duration::from_millis(10), abandoned)
            .await
            .is_err());

        cache
            .get("quote", || async {
                std::thread::sleep(Duration::from_millis(20));
                Ok::<_, TestError>("v".to_string())
            })
            .await
            .unwrap();

        let stats = cache.key_stats("quote").unwrap();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.average_compute_time(), stats.total_compute_time);
        assert!(stats.average_compute_time() >= Duration::from_millis(20));
        assert_eq!(cache.stats().in_flight, 0);
    }
}
