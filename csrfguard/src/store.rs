//! Per-session token state.
//!
//! The master token lives in the session attribute named by
//! [`GuardConfig::session_key`], and page tokens live in a `uri -> token` map
//! under [`PAGE_TOKENS_KEY`]. Every read-then-write operation holds the
//! session's lock, so concurrent requests of one session never mint two
//! tokens or interleave rotations. Locks exist only for live sessions; see
//! [`TokenStore::prune`].

use crate::config::GuardConfig;
use crate::error::{GuardError, Result};
use crate::token::TokenGenerator;
use csrfguard_session::{SessionError, SessionStore};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace};

/// Session attribute holding the page token map
pub const PAGE_TOKENS_KEY: &str = "Owasp_CsrfGuard_Pages_Tokens_Key";

/// Tokens relevant to one request, read under the session lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub master: Option<String>,
    pub page: Option<String>,
}

pub struct TokenStore {
    config: Arc<GuardConfig>,
    generator: TokenGenerator,
    sessions: Arc<dyn SessionStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TokenStore {
    pub fn new(
        config: Arc<GuardConfig>,
        generator: TokenGenerator,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            generator,
            sessions,
            locks: DashMap::new(),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Create the master token if the session has none. Idempotent.
    pub async fn ensure_master_token(&self, session_id: &str) -> Result<String> {
        let _guard = self.lock(session_id).await?;

        if let Some(token) = self.load_master(session_id).await? {
            return Ok(token);
        }

        let token = self.generator.generate(self.config.token_length)?;
        self.store_master(session_id, &token).await?;
        debug!(session_id = %session_id, "Master token issued");
        Ok(token)
    }

    /// Create a page token for `uri` if per-page mode is on, the uri is
    /// protected and it has no token yet.
    pub async fn ensure_page_token(&self, session_id: &str, uri: &str) -> Result<Option<String>> {
        if !self.config.token_per_page || self.config.is_unprotected(uri) {
            return Ok(None);
        }

        let _guard = self.lock(session_id).await?;
        let mut pages = self.load_pages(session_id).await?;

        if let Some(token) = pages.get(uri) {
            return Ok(Some(token.clone()));
        }

        let token = self.generator.generate(self.config.token_length)?;
        pages.insert(uri.to_string(), token.clone());
        self.store_pages(session_id, &pages).await?;
        debug!(session_id = %session_id, uri = %uri, "Page token issued");
        Ok(Some(token))
    }

    /// Ensure the master token and, in per-page mode, the token for `uri`.
    pub async fn update_tokens(&self, session_id: &str, uri: &str) -> Result<()> {
        self.ensure_master_token(session_id).await?;
        self.ensure_page_token(session_id, uri).await?;
        Ok(())
    }

    /// The token a client should submit to `uri`: its page token when per-page
    /// mode is on and one exists, otherwise the master token.
    pub async fn read_token(&self, session_id: &str, uri: &str) -> Result<Option<String>> {
        if self.config.token_per_page {
            if let Some(token) = self.load_pages(session_id).await?.remove(uri) {
                return Ok(Some(token));
            }
        }
        self.load_master(session_id).await
    }

    pub async fn master_token(&self, session_id: &str) -> Result<Option<String>> {
        self.load_master(session_id).await
    }

    pub async fn page_token(&self, session_id: &str, uri: &str) -> Result<Option<String>> {
        Ok(self.load_pages(session_id).await?.remove(uri))
    }

    pub async fn page_tokens(&self, session_id: &str) -> Result<BTreeMap<String, String>> {
        self.load_pages(session_id).await
    }

    /// Master and page token for `uri`, read together under the session lock.
    pub async fn snapshot(&self, session_id: &str, uri: &str) -> Result<TokenSnapshot> {
        let _guard = self.lock(session_id).await?;
        let master = self.load_master(session_id).await?;
        let page = if self.config.token_per_page {
            self.load_pages(session_id).await?.remove(uri)
        } else {
            None
        };
        Ok(TokenSnapshot { master, page })
    }

    /// Replace the master token unconditionally.
    pub async fn rotate_master(&self, session_id: &str) -> Result<String> {
        let _guard = self.lock(session_id).await?;
        self.rotate_master_locked(session_id).await
    }

    /// Replace (or create) the page token for `uri`. No-op unless per-page
    /// mode is on.
    pub async fn rotate_page(&self, session_id: &str, uri: &str) -> Result<Option<String>> {
        if !self.config.token_per_page {
            return Ok(None);
        }
        let _guard = self.lock(session_id).await?;
        self.rotate_page_locked(session_id, uri).await.map(Some)
    }

    /// Rotate the master token and the page token for `uri` as one step.
    pub async fn rotate(&self, session_id: &str, uri: &str) -> Result<()> {
        let _guard = self.lock(session_id).await?;
        self.rotate_master_locked(session_id).await?;
        if self.config.token_per_page {
            self.rotate_page_locked(session_id, uri).await?;
        }
        trace!(session_id = %session_id, uri = %uri, "Tokens rotated");
        Ok(())
    }

    /// Page tokens as a flat `uri:token` list, comma separated.
    pub async fn page_tokens_payload(&self, session_id: &str) -> Result<String> {
        Ok(self
            .load_pages(session_id)
            .await?
            .iter()
            .map(|(uri, token)| format!("{uri}:{token}"))
            .collect::<Vec<_>>()
            .join(","))
    }

    /// Forget the lock of a session that has ended.
    pub fn release(&self, session_id: &str) {
        if self.locks.remove(session_id).is_some() {
            trace!(session_id = %session_id, "Session lock released");
        }
    }

    /// Drop the locks of sessions that no longer exist, such as ones the
    /// session store expired without a destroy notification. Locks held by
    /// an in-flight request are kept. Returns how many were dropped.
    pub async fn prune(&self) -> Result<usize> {
        let ids: Vec<String> = self.locks.iter().map(|entry| entry.key().clone()).collect();

        let mut pruned = 0;
        for id in ids {
            if !self.sessions.exists(&id).await? && self.remove_idle_lock(&id) {
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!(pruned = pruned, "Pruned session locks");
        }
        Ok(pruned)
    }

    /// Number of sessions with a live lock entry
    pub fn tracked_sessions(&self) -> usize {
        self.locks.len()
    }

    async fn lock(&self, session_id: &str) -> Result<OwnedMutexGuard<()>> {
        if !self.sessions.exists(session_id).await? {
            self.remove_idle_lock(session_id);
            return Err(SessionError::NotFound(session_id.to_string()).into());
        }

        let mutex = self
            .locks
            .entry(session_id.to_string())
            .or_default()
            .value()
            .clone();
        Ok(mutex.lock_owned().await)
    }

    fn remove_idle_lock(&self, session_id: &str) -> bool {
        self.locks
            .remove_if(session_id, |_, mutex| Arc::strong_count(mutex) == 1)
            .is_some()
    }

    async fn rotate_master_locked(&self, session_id: &str) -> Result<String> {
        let token = self.generator.generate(self.config.token_length)?;
        self.store_master(session_id, &token).await?;
        Ok(token)
    }

    async fn rotate_page_locked(&self, session_id: &str, uri: &str) -> Result<String> {
        let mut pages = self.load_pages(session_id).await?;
        let token = self.generator.generate(self.config.token_length)?;
        pages.insert(uri.to_string(), token.clone());
        self.store_pages(session_id, &pages).await?;
        Ok(token)
    }

    async fn load_master(&self, session_id: &str) -> Result<Option<String>> {
        match self
            .sessions
            .get_attribute(session_id, &self.config.session_key)
            .await?
        {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(token)) => Ok(Some(token)),
            Some(other) => Err(GuardError::CorruptState(format!(
                "master token is not a string: {other}"
            ))),
        }
    }

    async fn store_master(&self, session_id: &str, token: &str) -> Result<()> {
        self.sessions
            .set_attribute(
                session_id,
                &self.config.session_key,
                Value::String(token.to_string()),
            )
            .await?;
        Ok(())
    }

    async fn load_pages(&self, session_id: &str) -> Result<BTreeMap<String, String>> {
        match self.sessions.get_attribute(session_id, PAGE_TOKENS_KEY).await? {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| GuardError::CorruptState(format!("page tokens: {e}"))),
        }
    }

    async fn store_pages(&self, session_id: &str, pages: &BTreeMap<String, String>) -> Result<()> {
        let value = serde_json::to_value(pages)
            .map_err(|e| GuardError::CorruptState(format!("page tokens: {e}")))?;
        self.sessions
            .set_attribute(session_id, PAGE_TOKENS_KEY, value)
            .await?;
        Ok(())
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("tracked_sessions", &self.locks.len())
            .finish_non_exhaustive()
    }
}
