use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use assure_concurrency::RedisLock;

use crate::app::AppState;
use crate::http::time_based_greeting;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ChatReply {
    pub response: String,
    pub sources: String,
}

#[derive(Serialize)]
pub struct ChatError {
    pub error: String,
}

/// POST /chat — the plain REST ingress, mirroring the WhatsApp path minus
/// the transport-specific bits (signature check, rate limiting, outbound
/// send). A bare "hi" resets the session before it's even loaded, exactly
/// as the WhatsApp handler does.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, Json<ChatError>)> {
    info!(session_id = %req.session_id, "chat request");

    if req.message.trim().eq_ignore_ascii_case("hi") {
        if let Err(e) = state.sessions.reset(&req.session_id).await {
            warn!(session_id = %req.session_id, err = %e, "failed to reset session for 'hi' greeting");
        }
        state.metrics.record_request("/chat", "ok");
        return Ok(Json(ChatReply {
            response: time_based_greeting(),
            sources: String::new(),
        }));
    }

    let mut lock = RedisLock::new(
        state.redis.clone(),
        &format!("session:{}", req.session_id),
        Duration::from_secs(state.config.redis.lock_ttl_secs),
        Duration::from_secs(state.config.redis.lock_wait_secs),
    );
    if let Err(e) = lock.acquire().await {
        warn!(session_id = %req.session_id, err = %e, "could not acquire session lock");
        state.metrics.record_lock_timeout("chat_session");
        state.metrics.record_request("/chat", "error");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ChatError { error: e.to_string() }),
        ));
    }

    let mut session = match state.sessions.get_or_create(&req.session_id).await {
        Ok(s) => s,
        Err(e) => {
            let _ = lock.release().await;
            warn!(session_id = %req.session_id, err = %e, "failed to load session");
            state.metrics.record_request("/chat", "error");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatError { error: e.to_string() }),
            ));
        }
    };

    let outcome = assure_flows::route(&mut session, &req.message, &state.flow_deps).await;

    let append_result = state
        .sessions
        .append_history(&mut session, req.message.clone(), &outcome.reply)
        .await;

    if let Err(e) = lock.release().await {
        warn!(session_id = %req.session_id, err = %e, "failed to release session lock");
    }

    if let Err(e) = append_result {
        warn!(session_id = %req.session_id, err = %e, "failed to persist chat turn");
        state.metrics.record_request("/chat", "error");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ChatError { error: e.to_string() }),
        ));
    }

    state.metrics.record_request("/chat", "ok");
    Ok(Json(ChatReply {
        response: outcome.reply,
        sources: outcome.sources.join("\n"),
    }))
}
