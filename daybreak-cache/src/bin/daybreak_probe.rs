/// Boundary probe - shows when a cache configured like this would next refresh.
///
/// Usage: cargo run --bin daybreak-probe [HH:MM[:SS]] [IANA zone]
///
/// Missing arguments fall back to DAYBREAK_BOUNDARY_TIME / DAYBREAK_BOUNDARY_TZ
/// and then to 07:00 Australia/Sydney.

use std::convert::Infallible;

use daybreak_cache::{BoundaryCache, BoundaryConfig};

fn main() {
    if let Err(e) = daybreak_core::init_tracing(false) {
        eprintln!("warning: {}", e);
    }

    let mut args = std::env::args().skip(1);
    let mut config = BoundaryConfig::from_env();
    if let Some(time) = args.next() {
        if time == "-h" || time == "--help" {
            eprintln!("Usage: daybreak-probe [HH:MM[:SS]] [IANA zone]");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  daybreak-probe 07:00 Australia/Sydney");
            std::process::exit(0);
        }
        config = config.with_time_of_day(time);
    }
    if let Some(zone) = args.next() {
        config = config.with_time_zone(zone);
    }

    let boundary = match config.to_boundary() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Invalid boundary: {}", e);
            std::process::exit(2);
        }
    };

    let cache: BoundaryCache<(), Infallible> = match BoundaryCache::from_config(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to build cache: {}", e);
            std::process::exit(2);
        }
    };

    let (next, remaining) = match (cache.next_boundary(), cache.next_refresh_in()) {
        (Ok(next), Ok(remaining)) => (next, remaining),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Boundary calculation failed: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(boundary = %boundary, next = %next, "Probed boundary");

    let secs = remaining.as_secs();
    println!("boundary:  {}", boundary);
    println!("next (UTC):   {}", next.to_rfc3339());
    println!(
        "next (local): {}",
        next.with_timezone(&boundary.zone()).to_rfc3339()
    );
    println!(
        "refresh in:   {}h {:02}m {:02}s",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    );
}
