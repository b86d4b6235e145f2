//! Session shape and the store contract.

use crate::error::SessionResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// A host session as the guard sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Named attributes; the guard keeps its tokens here
    pub attributes: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// True until the client has come back with this session at least once
    #[serde(default)]
    pub is_new: bool,
}

impl Session {
    /// Start a fresh session that lives for `ttl`.
    pub fn new(id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            attributes: HashMap::new(),
            created_at: now,
            last_accessed_at: now,
            expires_at: chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|lifetime| now.checked_add_signed(lifetime))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            is_new: true,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Decode an attribute, `None` when absent or of another shape.
    pub fn attribute<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| T::deserialize(v).ok())
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}

/// Session store contract the guard consumes from its host.
///
/// Object safe, so a guard holds an `Arc<dyn SessionStore>`. Attribute
/// operations act on a single key and must not rewrite the rest of the
/// session: two requests writing different attributes both land.
///
/// Attribute operations fail with [`SessionError::NotFound`] or
/// [`SessionError::Expired`] when the session is gone.
///
/// [`SessionError::NotFound`]: crate::SessionError::NotFound
/// [`SessionError::Expired`]: crate::SessionError::Expired
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session, with `ttl` overriding the store default.
    async fn create(&self, ttl: Option<Duration>) -> SessionResult<Session>;

    /// Snapshot of a live session; `Ok(None)` if unknown or expired.
    async fn get(&self, session_id: &str) -> SessionResult<Option<Session>>;

    /// Replace a whole session.
    async fn save(&self, session: &Session) -> SessionResult<()>;

    /// Invalidate a session. Deleting an unknown id is not an error.
    async fn delete(&self, session_id: &str) -> SessionResult<()>;

    async fn exists(&self, session_id: &str) -> SessionResult<bool>;

    async fn touch(&self, session_id: &str) -> SessionResult<()>;

    /// Record that the client has joined the session, clearing `is_new`.
    async fn mark_joined(&self, session_id: &str) -> SessionResult<()>;

    async fn get_attribute(&self, session_id: &str, key: &str) -> SessionResult<Option<Value>>;

    async fn set_attribute(&self, session_id: &str, key: &str, value: Value) -> SessionResult<()>;

    /// Remove one attribute, returning its previous value.
    async fn remove_attribute(&self, session_id: &str, key: &str)
    -> SessionResult<Option<Value>>;

    /// Number of live sessions.
    async fn count(&self) -> SessionResult<usize>;

    /// Drop expired sessions, returning how many went.
    async fn cleanup_expired(&self) -> SessionResult<usize>;
}

/// Random v4 uuid used as a session id.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
