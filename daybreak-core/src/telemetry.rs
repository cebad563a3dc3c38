//! Tracing subscriber bootstrap for binaries that embed the cache.
//!
//! The library crates only emit `tracing` events; installing a subscriber is
//! left to the process entry point.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{DaybreakError, DaybreakResult};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "daybreak=debug,info";

/// Install a global subscriber with an `EnvFilter` and a plain or JSON fmt layer.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> DaybreakResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| DaybreakError::Telemetry(format!("Failed to init subscriber: {}", e)))?;

    tracing::debug!(json, "Tracing initialized");
    Ok(())
}
