//! In-memory session store
//!
//! Uses DashMap for thread-safe concurrent access. Attribute writes are
//! applied in place under the map's shard lock, so they never clobber
//! attributes written by other requests.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::traits::{Session, SessionStore, generate_session_id};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};

/// In-memory session store
pub struct MemorySessionStore {
    config: SessionConfig,
    sessions: DashMap<String, Session>,
}

impl MemorySessionStore {
    /// Create a new in-memory store
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        debug!(default_ttl = ?config.default_ttl, "Creating in-memory session store");
        Ok(Self {
            config,
            sessions: DashMap::new(),
        })
    }

    /// Run `f` against a live session, evicting it if it has expired.
    fn with_live<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut Session) -> R,
    ) -> SessionResult<R> {
        match self.sessions.get_mut(session_id) {
            None => return Err(SessionError::NotFound(session_id.to_string())),
            Some(mut entry) if !entry.is_expired() => return Ok(f(entry.value_mut())),
            Some(_) => {}
        }

        // shard guard must be released before removing
        self.sessions.remove(session_id);
        trace!(session_id = %session_id, "Evicted expired session");
        Err(SessionError::Expired(session_id.to_string()))
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            sessions: DashMap::new(),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, ttl: Option<Duration>) -> SessionResult<Session> {
        let session = Session::new(generate_session_id(), self.config.effective_ttl(ttl));
        self.sessions.insert(session.id.clone(), session.clone());
        debug!(session_id = %session.id, "Session created");
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> SessionResult<Option<Session>> {
        match self.with_live(session_id, |session| session.clone()) {
            Ok(session) => Ok(Some(session)),
            Err(e) if e.is_missing() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, session: &Session) -> SessionResult<()> {
        if session.id.is_empty() {
            return Err(SessionError::InvalidSessionId(String::new()));
        }
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        self.sessions.remove(session_id);
        debug!(session_id = %session_id, "Session deleted");
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> SessionResult<bool> {
        Ok(self.get(session_id).await?.is_some())
    }

    async fn touch(&self, session_id: &str) -> SessionResult<()> {
        self.with_live(session_id, Session::touch)
    }

    async fn mark_joined(&self, session_id: &str) -> SessionResult<()> {
        self.with_live(session_id, |session| {
            session.is_new = false;
            session.touch();
        })
    }

    async fn get_attribute(&self, session_id: &str, key: &str) -> SessionResult<Option<Value>> {
        self.with_live(session_id, |session| session.attributes.get(key).cloned())
    }

    async fn set_attribute(&self, session_id: &str, key: &str, value: Value) -> SessionResult<()> {
        self.with_live(session_id, |session| {
            session.attributes.insert(key.to_string(), value);
        })
    }

    async fn remove_attribute(
        &self,
        session_id: &str,
        key: &str,
    ) -> SessionResult<Option<Value>> {
        self.with_live(session_id, |session| session.attributes.remove(key))
    }

    async fn count(&self) -> SessionResult<usize> {
        Ok(self.sessions.iter().filter(|s| !s.is_expired()).count())
    }

    async fn cleanup_expired(&self) -> SessionResult<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !session.is_expired());
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired sessions");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemorySessionStore {
        MemorySessionStore::default()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        let session = store.create(None).await.unwrap();

        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert!(loaded.is_new);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_attribute_roundtrip() {
        let store = store();
        let session = store.create(None).await.unwrap();

        store
            .set_attribute(&session.id, "key", json!("value"))
            .await
            .unwrap();
        assert_eq!(
            store.get_attribute(&session.id, "key").await.unwrap(),
            Some(json!("value"))
        );
        assert_eq!(
            store.remove_attribute(&session.id, "key").await.unwrap(),
            Some(json!("value"))
        );
        assert_eq!(store.get_attribute(&session.id, "key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_attribute_on_unknown_session() {
        let store = store();
        let err = store.get_attribute("nope", "key").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_joined() {
        let store = store();
        let session = store.create(None).await.unwrap();
        store.mark_joined(&session.id).await.unwrap();
        assert!(!store.get(&session.id).await.unwrap().unwrap().is_new);
    }

    #[tokio::test]
    async fn test_expired_session_evicted() {
        let store = store();
        let mut session = store.create(None).await.unwrap();
        session.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        store.save(&session).await.unwrap();

        let err = store.get_attribute(&session.id, "key").await.unwrap_err();
        assert!(matches!(err, SessionError::Expired(_)));
        assert!(store.get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = store();
        let live = store.create(None).await.unwrap();
        let mut stale = store.create(None).await.unwrap();
        stale.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        store.save(&stale).await.unwrap();

        assert_eq!(store.cleanup_expired().await.unwrap(), 1);
        assert!(store.exists(&live.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store();
        let session = store.create(None).await.unwrap();
        store.delete(&session.id).await.unwrap();
        assert!(!store.exists(&session.id).await.unwrap());
    }
}
