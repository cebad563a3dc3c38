//! Handler-shaped tests: a cached read wrapped in the JSON response envelope.

use daybreak_cache::{BoundaryCache, Clock, Envelope};
use daybreak_test_utils::{seven_am_sydney, sydney, ManualClock, TestError};
use serde_json::{json, Value};
use std::sync::Arc;

async fn crypto_handler(
    cache: &BoundaryCache<Value, TestError>,
    clock: &ManualClock,
    upstream: Result<Value, TestError>,
) -> (u16, Value) {
    let result = cache.get("crypto-data", move || async move { upstream }).await;
    let envelope = Envelope::from_result(result, "Failed to fetch crypto data", clock.now());
    let status = envelope.status_code();
    (status, serde_json::to_value(&envelope).unwrap())
}

#[tokio::test]
async fn test_success_then_cached_response() {
    let clock = ManualClock::new(sydney((2024, 6, 10), (8, 0, 0)));
    let cache = BoundaryCache::with_clock(seven_am_sydney(), Arc::new(clock.clone())).unwrap();

    let (status, body) = crypto_handler(&cache, &clock, Ok(json!({"btc": 102_345.5}))).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["btc"], json!(102_345.5));

    // Upstream would now fail, but the entry is still valid.
    let (status, body) = crypto_handler(
        &cache,
        &clock,
        Err(TestError::network("rate limited")),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["btc"], json!(102_345.5));
}

#[tokio::test]
async fn test_failure_envelope() {
    let clock = ManualClock::new(sydney((2024, 6, 10), (8, 0, 0)));
    let cache = BoundaryCache::with_clock(seven_am_sydney(), Arc::new(clock.clone())).unwrap();

    let (status, body) = crypto_handler(
        &cache,
        &clock,
        Err(TestError::network("connection reset")),
    )
    .await;
    assert_eq!(status, 500);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Failed to fetch crypto data"));
    assert_eq!(
        body["message"],
        json!("Producer failed: NetworkError: connection reset")
    );
}
