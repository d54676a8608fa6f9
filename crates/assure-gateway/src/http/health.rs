use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — liveness probe plus the in-process counters every other
/// endpoint contributes to.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "assure-gateway",
        "session_cache_hits_total": state.sessions.cache_hits(),
        "session_cache_misses_total": state.sessions.cache_misses(),
        "metrics": state.metrics.snapshot(),
    }))
}

/// GET /ready — checks the durable store and cache are actually reachable,
/// not just that the process is up.
pub async fn ready_handler(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let store_ok = state.sessions.store_healthy();

    let cache_ok = {
        let mut redis = state.redis.clone();
        redis::cmd("PING").query_async::<String>(&mut redis).await.is_ok()
    };

    let status = if store_ok && cache_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if store_ok && cache_ok { "ready" } else { "not_ready" },
            "components": {
                "session_store": if store_ok { "ok" } else { "unreachable" },
                "cache": if cache_ok { "ok" } else { "unreachable" },
            },
        })),
    )
}

/// GET /metrics — plain-text Prometheus exposition format, hand-rolled
/// from the same counters `/health` reports as JSON (no exposition crate
/// anywhere in this stack to reach for).
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    let snapshot = state.metrics.snapshot();
    let mut out = String::new();

    out.push_str("# TYPE assure_requests_total counter\n");
    if let Some(requests) = snapshot["requests_total"].as_array() {
        for entry in requests {
            let endpoint = entry["endpoint"].as_str().unwrap_or("unknown");
            let status = entry["status"].as_str().unwrap_or("unknown");
            let count = entry["count"].as_u64().unwrap_or(0);
            out.push_str(&format!(
                "assure_requests_total{{endpoint=\"{endpoint}\",status=\"{status}\"}} {count}\n"
            ));
        }
    }

    out.push_str("# TYPE assure_wa_messages_processed_total counter\n");
    if let Some(wa) = snapshot["wa_messages_processed_total"].as_array() {
        for entry in wa {
            let result = entry["result"].as_str().unwrap_or("unknown");
            let count = entry["count"].as_u64().unwrap_or(0);
            out.push_str(&format!("assure_wa_messages_processed_total{{result=\"{result}\"}} {count}\n"));
        }
    }

    out.push_str("# TYPE assure_redis_lock_timeouts_total counter\n");
    if let Some(timeouts) = snapshot["redis_lock_timeouts_total"].as_array() {
        for entry in timeouts {
            let scope = entry["scope"].as_str().unwrap_or("unknown");
            let count = entry["count"].as_u64().unwrap_or(0);
            out.push_str(&format!("assure_redis_lock_timeouts_total{{scope=\"{scope}\"}} {count}\n"));
        }
    }

    out.push_str("# TYPE assure_session_cache_hits_total counter\n");
    out.push_str(&format!("assure_session_cache_hits_total {}\n", state.sessions.cache_hits()));
    out.push_str("# TYPE assure_session_cache_misses_total counter\n");
    out.push_str(&format!("assure_session_cache_misses_total {}\n", state.sessions.cache_misses()));

    out
}
