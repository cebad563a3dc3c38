//! Boundary-aligned cache with single-flight semantics.
//!
//! Entries are valid until the next daily boundary after they were computed
//! (for example the next 07:00 in `Australia/Sydney`), not for a fixed TTL.
//! Concurrent misses for one key share a single producer run.
//!
//! # Example
//!
//! ```ignore
//! let cache: BoundaryCache<Movers, FetchError> =
//!     BoundaryCache::new(DailyBoundary::midnight(Tz::UTC))?;
//!
//! // Ten handlers racing after midnight trigger one upstream fetch.
//! let read = cache.get_with_meta("movers", || fetch_movers(&client)).await?;
//! if read.was_cache_hit() {
//!     tracing::debug!(expires_at = %read.expires_at(), "served from cache");
//! }
//! ```

pub mod boundary_cache;
pub mod error;
pub mod read;
pub mod stats;

pub use boundary_cache::BoundaryCache;
pub use error::CacheError;
pub use read::{CacheRead, ReadSource};
pub use stats::{CacheStats, KeyStats};
