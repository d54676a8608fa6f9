use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use redis::aio::ConnectionManager;
use rusqlite::Connection;
use tracing::info;

use assure_core::config::AssureConfig;
use assure_core::error::{AssureError, Result};
use assure_flows::FlowDeps;
use assure_llm::{AnthropicProvider, LlmProvider, RetryingProvider};
use assure_prompt::PromptRunner;
use assure_retrieval::{RetrievalClient, WeaviateClient};
use assure_sessions::{SessionCache, SessionManager, SessionStore};

use crate::metrics::Metrics;

/// Central shared state, passed as `Arc<AppState>` to every Axum handler.
pub struct AppState {
    pub config: AssureConfig,
    pub sessions: SessionManager,
    pub flow_deps: FlowDeps,
    pub redis: ConnectionManager,
    pub metrics: Metrics,
}

impl AppState {
    pub async fn new(config: AssureConfig) -> Result<Self> {
        let conn = Connection::open(&config.session.sqlite_path)
            .map_err(|e| AssureError::Database(e.to_string()))?;
        let store = SessionStore::new(conn)?;

        let redis_conn = assure_concurrency::connection_manager(&config.redis.url).await?;
        let cache = SessionCache::new(redis_conn.clone(), config.redis.cache_ttl_secs);
        let idle_threshold = Duration::from_secs(config.session.idle_threshold_secs);
        let sessions = SessionManager::new(store, cache, idle_threshold);

        let provider = AnthropicProvider::new(config.llm.api_key.clone(), config.llm.base_url.clone());
        let retrying = RetryingProvider::new(
            provider,
            config.llm.max_retries,
            Duration::from_millis(config.llm.backoff_base_ms),
        );
        let provider: Arc<dyn LlmProvider> = Arc::new(retrying);
        let prompt_runner = Arc::new(PromptRunner::new(provider, config.llm.model.clone(), 1024));

        let retrieval_api_key = (!config.retrieval.api_key.is_empty()).then(|| config.retrieval.api_key.clone());
        let retrieval: Arc<dyn RetrievalClient> = Arc::new(WeaviateClient::new(
            config.retrieval.vector_store_url.clone(),
            retrieval_api_key,
            config.retrieval.alpha,
        ));

        let flow_deps = FlowDeps {
            prompt_runner,
            retrieval,
            top_k: config.retrieval.top_k,
            fallback_k: config.retrieval.fallback_k,
        };

        Ok(Self {
            config,
            sessions,
            flow_deps,
            redis: redis_conn,
            metrics: Metrics::new(),
        })
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    info!("assembling gateway router");
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ready", get(crate::http::health::ready_handler))
        .route("/metrics", get(crate::http::health::metrics_handler))
        .route("/chat", post(crate::http::chat::chat_handler))
        .route(
            "/meta-whatsapp",
            get(crate::http::whatsapp::verify_handler).post(crate::http::whatsapp::webhook_handler),
        )
        .route("/whatsapp/health", get(crate::http::whatsapp::health_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
