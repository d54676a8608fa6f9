//! Layered configuration: defaults baked in here, overridden by
//! `config/assure.toml` if present, overridden again by `ASSURE_`-prefixed
//! environment variables — figment composition order matches the teacher's
//! own gateway config loader.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{AssureError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Session cache entry TTL, seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_rl_window")]
    pub rate_limit_window_secs: u64,
    #[serde(default = "default_rl_max")]
    pub rate_limit_max_requests: u32,
    #[serde(default = "default_dedupe_ttl")]
    pub dedupe_ttl_secs: u64,
    #[serde(default = "default_order_ttl")]
    pub order_guard_ttl_secs: u64,
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_lock_wait")]
    pub lock_wait_secs: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_cache_ttl() -> u64 {
    900
}
fn default_rl_window() -> u64 {
    60
}
fn default_rl_max() -> u32 {
    10
}
fn default_dedupe_ttl() -> u64 {
    86_400
}
fn default_order_ttl() -> u64 {
    86_400
}
fn default_lock_ttl() -> u64 {
    15
}
fn default_lock_wait() -> u64 {
    5
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            cache_ttl_secs: default_cache_ttl(),
            rate_limit_window_secs: default_rl_window(),
            rate_limit_max_requests: default_rl_max(),
            dedupe_ttl_secs: default_dedupe_ttl(),
            order_guard_ttl_secs: default_order_ttl(),
            lock_ttl_secs: default_lock_ttl(),
            lock_wait_secs: default_lock_wait(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    /// Inactivity threshold after which a returning session is reset,
    /// seconds.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_secs: u64,
}

fn default_sqlite_path() -> String {
    "data/assure-sessions.db3".to_string()
}
fn default_idle_threshold() -> u64 {
    900
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
            idle_threshold_secs: default_idle_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Read from `ASSURE_LLM__API_KEY` only — never stored in a TOML file.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_base_ms: u64,
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_llm_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}
fn default_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    500
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: String::new(),
            max_retries: default_retries(),
            backoff_base_ms: default_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_vector_store_url")]
    pub vector_store_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_fallback_k")]
    pub fallback_k: u32,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
}

fn default_vector_store_url() -> String {
    "http://127.0.0.1:8081".to_string()
}
fn default_top_k() -> u32 {
    10
}
fn default_fallback_k() -> u32 {
    5
}
fn default_alpha() -> f32 {
    0.7
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_store_url: default_vector_store_url(),
            api_key: String::new(),
            top_k: default_top_k(),
            fallback_k: default_fallback_k(),
            alpha: default_alpha(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub verify_token: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_phone_number_id")]
    pub phone_number_id: String,
    #[serde(default = "default_graph_api_version")]
    pub graph_api_version: String,
}

fn default_phone_number_id() -> String {
    String::new()
}
fn default_graph_api_version() -> String {
    "v18.0".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            app_secret: String::new(),
            access_token: String::new(),
            phone_number_id: default_phone_number_id(),
            graph_api_version: default_graph_api_version(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssureConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

impl AssureConfig {
    /// Load defaults, then `path` if it exists, then `ASSURE_`-prefixed env
    /// vars (double-underscore separated, e.g. `ASSURE_LLM__API_KEY`).
    pub fn load(path: &str) -> Result<Self> {
        Figment::from(Serialized::defaults(AssureConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("ASSURE_").split("__"))
            .extract()
            .map_err(|e| AssureError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = AssureConfig::default();
        assert_eq!(cfg.session.idle_threshold_secs, 900);
        assert_eq!(cfg.redis.cache_ttl_secs, 900);
        assert_eq!(cfg.redis.rate_limit_window_secs, 60);
        assert_eq!(cfg.redis.rate_limit_max_requests, 10);
        assert_eq!(cfg.redis.dedupe_ttl_secs, 86_400);
        assert_eq!(cfg.redis.order_guard_ttl_secs, 86_400);
        assert_eq!(cfg.redis.lock_ttl_secs, 15);
        assert_eq!(cfg.redis.lock_wait_secs, 5);
        assert_eq!(cfg.retrieval.alpha, 0.7);
        assert_eq!(cfg.retrieval.top_k, 10);
        assert_eq!(cfg.retrieval.fallback_k, 5);
        assert_eq!(cfg.llm.max_retries, 3);
        assert_eq!(cfg.llm.backoff_base_ms, 500);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_missing() {
        let cfg = AssureConfig::load("/nonexistent/assure.toml").unwrap();
        assert_eq!(cfg.gateway.port, 8080);
    }
}
