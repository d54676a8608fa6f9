pub mod dedupe;
pub mod lock;
pub mod order_guard;
pub mod rate_limiter;

pub use dedupe::Deduplicator;
pub use lock::RedisLock;
pub use order_guard::OrderGuard;
pub use rate_limiter::RateLimiter;

/// Build a `ConnectionManager` for a Redis URL — thin wrapper kept here so
/// every concurrency primitive shares the same connection setup.
pub async fn connection_manager(url: &str) -> assure_core::error::Result<redis::aio::ConnectionManager> {
    let client = redis::Client::open(url).map_err(|e| assure_core::error::AssureError::Cache(e.to_string()))?;
    client
        .get_connection_manager()
        .await
        .map_err(|e| assure_core::error::AssureError::Cache(e.to_string()))
}
