use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// In-process counters. Surfaced as JSON from `/health` and, via a
/// hand-rolled text encoder in `http::health::metrics_handler`, as plain
/// Prometheus exposition format from `/metrics` — there's no
/// metrics-exposition crate anywhere in this stack to reach for, so the
/// text format is built directly off this same snapshot.
#[derive(Default)]
pub struct Metrics {
    requests_total: DashMap<(String, String), AtomicU64>,
    wa_messages_processed_total: DashMap<String, AtomicU64>,
    redis_lock_timeouts_total: DashMap<String, AtomicU64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, endpoint: &str, status: &str) {
        self.requests_total
            .entry((endpoint.to_string(), status.to_string()))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wa_message(&self, result: &str) {
        self.wa_messages_processed_total
            .entry(result.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lock_timeout(&self, scope: &str) {
        self.redis_lock_timeouts_total
            .entry(scope.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let requests: Vec<_> = self
            .requests_total
            .iter()
            .map(|e| {
                serde_json::json!({
                    "endpoint": e.key().0,
                    "status": e.key().1,
                    "count": e.value().load(Ordering::Relaxed),
                })
            })
            .collect();

        let wa_messages: Vec<_> = self
            .wa_messages_processed_total
            .iter()
            .map(|e| serde_json::json!({ "result": e.key(), "count": e.value().load(Ordering::Relaxed) }))
            .collect();

        let lock_timeouts: Vec<_> = self
            .redis_lock_timeouts_total
            .iter()
            .map(|e| serde_json::json!({ "scope": e.key(), "count": e.value().load(Ordering::Relaxed) }))
            .collect();

        serde_json::json!({
            "requests_total": requests,
            "wa_messages_processed_total": wa_messages,
            "redis_lock_timeouts_total": lock_timeouts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_requests_accumulate_per_endpoint_and_status() {
        let metrics = Metrics::new();
        metrics.record_request("/chat", "ok");
        metrics.record_request("/chat", "ok");
        metrics.record_request("/chat", "error");

        let snapshot = metrics.snapshot();
        let requests = snapshot["requests_total"].as_array().unwrap();
        assert_eq!(requests.len(), 2);

        let ok_count = requests
            .iter()
            .find(|e| e["status"] == "ok")
            .and_then(|e| e["count"].as_u64())
            .unwrap();
        assert_eq!(ok_count, 2);
    }

    #[test]
    fn wa_message_and_lock_timeout_counters_are_independent() {
        let metrics = Metrics::new();
        metrics.record_wa_message("duplicate");
        metrics.record_lock_timeout("whatsapp_session");
        metrics.record_lock_timeout("whatsapp_session");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot["wa_messages_processed_total"].as_array().unwrap().len(), 1);

        let timeouts = snapshot["redis_lock_timeouts_total"].as_array().unwrap();
        assert_eq!(timeouts[0]["count"].as_u64(), Some(2));
    }
}
