use crate::config::Settings;
use crate::error::SignalError;
use crate::feed::{Session, SessionProvider};
use crate::storage::SignalStore;
use std::sync::Arc;

/// Session lookup: in-process cache, then the stored session, then the
/// configured bootstrap cookies (which are persisted once used).
pub struct StoredSessionProvider {
    store: Arc<dyn SignalStore>,
    bootstrap: Option<Session>,
    cache: tokio::sync::Mutex<Option<Session>>,
}

impl StoredSessionProvider {
    pub fn new(store: Arc<dyn SignalStore>, bootstrap: Option<Session>) -> Self {
        Self {
            store,
            bootstrap,
            cache: tokio::sync::Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &Settings, store: Arc<dyn SignalStore>) -> Self {
        let bootstrap = Session::from_parts(
            settings.twitter_auth_token.as_deref(),
            settings.twitter_ct0.as_deref(),
        );
        Self::new(store, bootstrap)
    }
}

#[async_trait::async_trait]
impl SessionProvider for StoredSessionProvider {
    async fn session(&self) -> Result<Session, SignalError> {
        let mut guard = self.cache.lock().await;
        if let Some(cached) = guard.as_ref() {
            return Ok(cached.clone());
        }

        match self.store.load_session().await {
            Ok(Some(stored)) => {
                *guard = Some(stored.clone());
                return Ok(stored);
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "failed to load stored feed session"),
        }

        let Some(fresh) = self.bootstrap.clone() else {
            return Err(SignalError::Configuration(
                "no stored feed session and TWITTER_AUTH_TOKEN/TWITTER_CT0 are not set".to_string(),
            ));
        };

        // Best-effort: a session we cannot persist is still usable this run.
        if let Err(err) = self.store.save_session(&fresh).await {
            tracing::warn!(error = %err, "failed to persist feed session");
        }
        tracing::info!("feed session bootstrapped from configured cookies");
        *guard = Some(fresh.clone());
        Ok(fresh)
    }

    async fn invalidate(&self) {
        *self.cache.lock().await = None;
        if let Err(err) = self.store.clear_session().await {
            tracing::warn!(error = %err, "failed to clear stored feed session");
        }
        tracing::info!("feed session invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;

    fn cookies(tag: &str) -> Session {
        Session {
            auth_token: format!("auth-{tag}"),
            ct0: format!("ct0-{tag}"),
        }
    }

    #[tokio::test]
    async fn prefers_stored_session_over_bootstrap() {
        let store = MemoryStore::default();
        store.save_session(&cookies("stored")).await.unwrap();
        let provider = StoredSessionProvider::new(Arc::new(store), Some(cookies("env")));

        assert_eq!(provider.session().await.unwrap(), cookies("stored"));
    }

    #[tokio::test]
    async fn bootstraps_and_persists_when_nothing_is_stored() {
        let store = MemoryStore::default();
        let provider = StoredSessionProvider::new(Arc::new(store.clone()), Some(cookies("env")));

        assert_eq!(provider.session().await.unwrap(), cookies("env"));
        assert_eq!(store.load_session().await.unwrap(), Some(cookies("env")));
    }

    #[tokio::test]
    async fn caches_within_the_process() {
        let store = MemoryStore::default();
        let provider = StoredSessionProvider::new(Arc::new(store.clone()), Some(cookies("env")));
        provider.session().await.unwrap();

        store.save_session(&cookies("rotated")).await.unwrap();
        assert_eq!(provider.session().await.unwrap(), cookies("env"));
    }

    #[tokio::test]
    async fn invalidate_drops_cache_and_stored_row() {
        let store = MemoryStore::default();
        store.save_session(&cookies("stale")).await.unwrap();
        let provider = StoredSessionProvider::new(Arc::new(store.clone()), Some(cookies("env")));
        assert_eq!(provider.session().await.unwrap(), cookies("stale"));

        provider.invalidate().await;
        assert_eq!(store.load_session().await.unwrap(), None);
        assert_eq!(provider.session().await.unwrap(), cookies("env"));
    }

    #[tokio::test]
    async fn missing_credentials_are_a_configuration_error() {
        let provider = StoredSessionProvider::new(Arc::new(MemoryStore::default()), None);
        let err = provider.session().await.unwrap_err();
        assert!(matches!(err, SignalError::Configuration(_)));
    }
}
