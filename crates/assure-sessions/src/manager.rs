use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, instrument};

use assure_core::error::Result;
use assure_core::time::now_sgt;
use assure_core::types::Session;

use crate::cache::SessionCache;
use crate::store::SessionStore;

/// Combines the durable store and the cache into the cache-first read /
/// idle-reset semantics the flows rely on.
pub struct SessionManager {
    store: SessionStore,
    cache: Mutex<SessionCache>,
    idle_threshold: Duration,
    cache_hits: StdMutex<u64>,
    cache_misses: StdMutex<u64>,
}

impl SessionManager {
    pub fn new(store: SessionStore, cache: SessionCache, idle_threshold: Duration) -> Self {
        Self {
            store,
            cache: Mutex::new(cache),
            idle_threshold,
            cache_hits: StdMutex::new(0),
            cache_misses: StdMutex::new(0),
        }
    }

    pub fn cache_hits(&self) -> u64 {
        *self.cache_hits.lock().expect("metrics mutex poisoned")
    }

    pub fn cache_misses(&self) -> u64 {
        *self.cache_misses.lock().expect("metrics mutex poisoned")
    }

    /// Connectivity check for the durable store, used by the readiness probe.
    pub fn store_healthy(&self) -> bool {
        self.store.ping().is_ok()
    }

    /// Cache-first read, falling back to the durable store, applying
    /// idle-reset, and re-populating the cache.
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, session_id: &str) -> Result<Session> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(session) = cache.get(session_id).await? {
                *self.cache_hits.lock().expect("metrics mutex poisoned") += 1;
                return Ok(session);
            }
        }
        *self.cache_misses.lock().expect("metrics mutex poisoned") += 1;

        let session = match self.store.get(session_id)? {
            Some(session) => session,
            None => Session::new(session_id),
        };

        let session = self.apply_idle_reset(session)?;

        let mut cache = self.cache.lock().await;
        cache.set(&session).await?;

        Ok(session)
    }

    fn apply_idle_reset(&self, mut session: Session) -> Result<Session> {
        let now = now_sgt();
        let idle_for = now.signed_duration_since(session.last_active);
        if idle_for.num_seconds() > self.idle_threshold.as_secs() as i64 {
            info!(session_id = %session.session_id, idle_secs = idle_for.num_seconds(), "idle-reset session");
            session.reset_transient();
            session.last_active = now;
            self.store.upsert(&session)?;
        }
        Ok(session)
    }

    /// Persist the full session document; bumps `last_active`.
    #[instrument(skip(self, session))]
    pub async fn save(&self, session: &mut Session) -> Result<()> {
        session.last_active = now_sgt();
        self.store.upsert(session)?;
        let mut cache = self.cache.lock().await;
        cache.set(session).await?;
        Ok(())
    }

    /// Append a turn to durable history and refresh the cache's bounded
    /// in-memory copy.
    #[instrument(skip(self, assistant_full))]
    pub async fn append_history(
        &self,
        session: &mut Session,
        user: impl Into<String>,
        assistant_full: &str,
    ) -> Result<()> {
        session.append_history(user, assistant_full);
        session.last_active = now_sgt();
        if let Some(last) = session.history.last() {
            self.store.append_history(&session.session_id, last)?;
        }
        self.store.upsert(session)?;
        let mut cache = self.cache.lock().await;
        cache.set(session).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn reset(&self, session_id: &str) -> Result<Session> {
        let mut session = self
            .store
            .get(session_id)?
            .unwrap_or_else(|| Session::new(session_id));
        session.reset_transient();
        session.last_active = now_sgt();
        self.store.upsert(&session)?;
        let mut cache = self.cache.lock().await;
        cache.set(&session).await?;
        Ok(session)
    }

    #[instrument(skip(self))]
    pub async fn invalidate_cache(&self, session_id: &str) -> Result<()> {
        let mut cache = self.cache.lock().await;
        cache.invalidate(session_id).await
    }
}
