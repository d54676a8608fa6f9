//! Meta WhatsApp Cloud API ingress: GET for webhook verification, POST for
//! incoming messages. Grounded on the source's `WhatsAppMessageHandler` —
//! acknowledge immediately, process in the background, send the reply back
//! through the Graph API.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{error, info, warn};

use assure_core::types::MESSAGE_LENGTH_CAP;
use assure_concurrency::{Deduplicator, OrderGuard, RateLimiter, RedisLock};

use crate::app::AppState;
use crate::http::time_based_greeting;

type HmacSha256 = Hmac<Sha256>;

#[derive(Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /meta-whatsapp — Meta's webhook subscription handshake.
pub async fn verify_handler(State(state): State<Arc<AppState>>, Query(q): Query<VerifyQuery>) -> Response {
    match (q.mode.as_deref(), q.verify_token.as_deref(), q.challenge) {
        (Some("subscribe"), Some(token), Some(challenge)) if token == state.config.whatsapp.verify_token => {
            info!("WhatsApp webhook verification succeeded");
            (StatusCode::OK, challenge).into_response()
        }
        (Some(_), Some(_), Some(_)) => {
            warn!("WhatsApp webhook verification failed: token mismatch");
            (StatusCode::FORBIDDEN, "verification failed").into_response()
        }
        _ => (StatusCode::BAD_REQUEST, "missing parameters").into_response(),
    }
}

/// GET /whatsapp/health — transport-specific health, separate from the
/// general `/health`.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> axum::Json<Value> {
    axum::Json(json!({
        "status": "healthy",
        "timestamp": assure_core::time::now_sgt().to_rfc3339(),
        "verify_token_configured": !state.config.whatsapp.verify_token.is_empty(),
    }))
}

/// POST /meta-whatsapp — always ack 200 immediately, process in the
/// background, same as the source (a webhook that 5xxs gets disabled by
/// Meta after repeated failures).
pub async fn webhook_handler(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if !verify_signature(&headers, &body, &state.config.whatsapp.app_secret) {
        warn!("WhatsApp webhook signature verification failed");
        state.metrics.record_wa_message("bad_signature");
        return StatusCode::FORBIDDEN;
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(err = %e, "WhatsApp webhook body was not valid JSON");
            return StatusCode::OK;
        }
    };

    match extract_message(&payload) {
        Some((message, from, message_id)) => {
            let state = state.clone();
            tokio::spawn(async move {
                process_and_respond(&state, message, from, message_id).await;
            });
        }
        None => {
            info!("WhatsApp webhook payload carried no user message (status update or unrecognized shape)");
        }
    }

    StatusCode::OK
}

fn verify_signature(headers: &HeaderMap, body: &Bytes, app_secret: &str) -> bool {
    if app_secret.is_empty() {
        // No secret configured: accept, matching the source's permissive default.
        return true;
    }
    let Some(sig_header) = headers.get("x-hub-signature-256").and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(sig_hex) = sig_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Pull the first text message (sender, id) out of a webhook payload,
/// ignoring delivery/read status callbacks entirely. Tries the standard
/// Meta Cloud API shape first (`entry[0].changes[0].value`), then falls
/// back to treating the payload itself as the value object — tolerating
/// flattened bodies the same way the source's `.get(..., [{}])[0]`
/// chains tolerate a missing wrapper.
fn extract_message(payload: &Value) -> Option<(String, String, String)> {
    let value = payload
        .get("entry")
        .and_then(|e| e.get(0))
        .and_then(|e| e.get("changes"))
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("value"))
        .or_else(|| payload.get("value"))
        .unwrap_or(payload);

    if value.get("statuses").is_some() {
        return None;
    }

    let msg = value.get("messages")?.get(0)?;
    let text = msg.get("text")?.get("body")?.as_str()?;
    let from = msg.get("from")?.as_str()?;
    let id = msg.get("id").and_then(|v| v.as_str()).unwrap_or("unknown");

    let cleaned = clean_message(text)?;
    let phone = clean_phone(from)?;

    Some((cleaned, phone, id.to_string()))
}

fn clean_message(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    let truncated: String = collapsed.chars().take(MESSAGE_LENGTH_CAP).collect();
    Some(truncated)
}

fn clean_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    if cleaned.len() < 8 || cleaned.len() > 15 {
        return None;
    }
    Some(cleaned)
}

async fn process_and_respond(state: &Arc<AppState>, message: String, phone: String, message_id: String) {
    let session_id = format!("whatsapp_{phone}");

    let mut dedupe = Deduplicator::new(
        state.redis.clone(),
        state.config.redis.dedupe_ttl_secs,
        "whatsapp",
    );
    match dedupe.is_new(&message_id).await {
        Ok(false) => {
            info!(message_id = %message_id, "duplicate WhatsApp message, skipping");
            state.metrics.record_wa_message("duplicate");
            return;
        }
        Err(e) => warn!(err = %e, "dedupe check failed, processing anyway"),
        Ok(true) => {}
    }

    let mut order_guard = OrderGuard::new(
        state.redis.clone(),
        state.config.redis.order_guard_ttl_secs,
        "whatsapp",
    );
    let now_ts = assure_core::time::now_sgt().timestamp();
    match order_guard.allow(&phone, now_ts).await {
        Ok(false) => {
            info!(phone = %phone, "out-of-order WhatsApp message, skipping");
            state.metrics.record_wa_message("out_of_order");
            return;
        }
        Err(e) => warn!(err = %e, "order guard check failed, processing anyway"),
        Ok(true) => {}
    }

    let mut limiter = RateLimiter::new(
        state.redis.clone(),
        state.config.redis.rate_limit_window_secs,
        state.config.redis.rate_limit_max_requests,
        "whatsapp",
    );
    match limiter.allow(&phone).await {
        Ok(false) => {
            send_message(state, &phone, "You're sending messages too quickly! Please wait a moment and try again.").await;
            state.metrics.record_wa_message("rate_limited");
            return;
        }
        Err(e) => warn!(err = %e, "rate limit check failed, allowing anyway"),
        Ok(true) => {}
    }

    let mut lock = RedisLock::new(
        state.redis.clone(),
        &format!("session:{session_id}"),
        Duration::from_secs(state.config.redis.lock_ttl_secs),
        Duration::from_secs(state.config.redis.lock_wait_secs),
    );
    if let Err(e) = lock.acquire().await {
        warn!(session_id = %session_id, err = %e, "could not acquire session lock");
        state.metrics.record_lock_timeout("whatsapp_session");
        state.metrics.record_wa_message("lock_timeout");
        return;
    }

    let reply = handle_message(state, &session_id, &message).await;

    if let Err(e) = lock.release().await {
        warn!(session_id = %session_id, err = %e, "failed to release session lock");
    }

    send_message(state, &phone, &reply).await;
    state.metrics.record_wa_message("ok");
}

async fn handle_message(state: &Arc<AppState>, session_id: &str, message: &str) -> String {
    if message.trim().eq_ignore_ascii_case("hi") {
        if let Err(e) = state.sessions.reset(session_id).await {
            error!(session_id = %session_id, err = %e, "failed to reset session for 'hi' greeting");
        }
        return time_based_greeting();
    }

    let mut session = match state.sessions.get_or_create(session_id).await {
        Ok(s) => s,
        Err(e) => {
            error!(session_id = %session_id, err = %e, "failed to load session");
            return "I'm sorry, the service is temporarily unavailable. Please try again later.".to_string();
        }
    };

    let outcome = assure_flows::route(&mut session, message, &state.flow_deps).await;

    if let Err(e) = state.sessions.append_history(&mut session, message.to_string(), &outcome.reply).await {
        error!(session_id = %session_id, err = %e, "failed to persist WhatsApp turn");
    }

    if outcome.reply.is_empty() {
        "I'm sorry, I couldn't process your request. Please try again or ask for help.".to_string()
    } else if outcome.reply.chars().count() > MESSAGE_LENGTH_CAP {
        let truncated: String = outcome.reply.chars().take(MESSAGE_LENGTH_CAP - 50).collect();
        format!("{truncated}...\n\nMessage was truncated. Please ask for specific details!")
    } else {
        outcome.reply
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn signature_matches_hmac_sha256_of_body() {
        let secret = "shhh";
        let body = Bytes::from_static(b"{\"hello\":true}");
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(&body);
        let sig = hex::encode(mac.finalize().into_bytes());

        let mut headers = HeaderMap::new();
        headers.insert("x-hub-signature-256", format!("sha256={sig}").parse().unwrap());

        assert!(verify_signature(&headers, &body, secret));
    }

    #[test]
    fn signature_check_rejects_tampered_body() {
        let secret = "shhh";
        let body = Bytes::from_static(b"{\"hello\":true}");
        let mut headers = HeaderMap::new();
        headers.insert("x-hub-signature-256", "sha256=deadbeef".parse().unwrap());

        assert!(!verify_signature(&headers, &body, secret));
    }

    #[test]
    fn empty_secret_accepts_anything() {
        let headers = HeaderMap::new();
        let body = Bytes::from_static(b"{}");
        assert!(verify_signature(&headers, &body, ""));
    }

    #[test]
    fn clean_message_collapses_whitespace_and_caps_length() {
        assert_eq!(clean_message("  hi   there  \n\n").as_deref(), Some("hi there"));
        assert_eq!(clean_message("   "), None);

        let long = "a".repeat(MESSAGE_LENGTH_CAP + 100);
        assert_eq!(clean_message(&long).unwrap().chars().count(), MESSAGE_LENGTH_CAP);
    }

    #[test]
    fn clean_phone_keeps_digits_and_plus_within_length_bounds() {
        assert_eq!(clean_phone("+65 9123 4567"), Some("+6591234567".to_string()));
        assert_eq!(clean_phone("123"), None);
        assert_eq!(clean_phone("1".repeat(20).as_str()), None);
    }

    #[test]
    fn extract_message_ignores_status_callbacks() {
        let payload = json!({
            "entry": [{ "changes": [{ "value": { "statuses": [{ "status": "delivered" }] } }] }]
        });
        assert!(extract_message(&payload).is_none());
    }

    #[test]
    fn extract_message_pulls_text_sender_and_id() {
        let payload = json!({
            "entry": [{ "changes": [{ "value": {
                "messages": [{ "from": "6591234567", "id": "wamid.1", "text": { "body": "hello there" } }]
            } }] }]
        });
        let (msg, from, id) = extract_message(&payload).unwrap();
        assert_eq!(msg, "hello there");
        assert_eq!(from, "6591234567");
        assert_eq!(id, "wamid.1");
    }

    #[test]
    fn extract_message_tolerates_a_flattened_payload_without_the_entry_wrapper() {
        let payload = json!({
            "messages": [{ "from": "6591234567", "id": "wamid.2", "text": { "body": "flattened shape" } }]
        });
        let (msg, from, id) = extract_message(&payload).unwrap();
        assert_eq!(msg, "flattened shape");
        assert_eq!(from, "6591234567");
        assert_eq!(id, "wamid.2");
    }
}

const SEND_MAX_RETRIES: u32 = 3;
const SEND_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// POST to the Graph API with exponential-backoff retry (base 0.5s,
/// doubling), same shape as `RetryingProvider`'s loop over LLM calls —
/// transient failures and non-2xx responses both retry, up to three
/// attempts, before the send is given up on.
async fn send_message(state: &Arc<AppState>, recipient: &str, body: &str) {
    if state.config.whatsapp.phone_number_id.is_empty() || state.config.whatsapp.access_token.is_empty() {
        error!("WhatsApp phone_number_id/access_token not configured, cannot send reply");
        return;
    }

    let url = format!(
        "https://graph.facebook.com/{}/{}/messages",
        state.config.whatsapp.graph_api_version, state.config.whatsapp.phone_number_id
    );

    let payload = json!({
        "messaging_product": "whatsapp",
        "to": recipient,
        "type": "text",
        "text": { "body": body },
    });

    let client = reqwest::Client::new();

    for attempt in 0..=SEND_MAX_RETRIES {
        match client
            .post(&url)
            .bearer_auth(&state.config.whatsapp.access_token)
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                info!(recipient = %recipient, attempt, "WhatsApp message sent");
                return;
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                warn!(recipient = %recipient, %status, body = %text, attempt, "WhatsApp send attempt failed");
            }
            Err(e) => {
                warn!(recipient = %recipient, err = %e, attempt, "WhatsApp send attempt failed");
            }
        }

        if attempt < SEND_MAX_RETRIES {
            tokio::time::sleep(SEND_BACKOFF_BASE * 2u32.pow(attempt)).await;
        }
    }

    error!(recipient = %recipient, "WhatsApp message send exhausted all retries");
}
