//! Request filter and session listener
//!
//! Drives the guard for each request the way a host's middleware chain
//! would: prime new sessions, validate the rest, keep tokens issued.

use crate::engine::{ValidationFailure, ValidationOutcome};
use crate::error::Result;
use crate::guard::CsrfGuard;
use crate::log::LogLevel;
use csrfguard_core::{HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::debug;

/// What the host should do after [`CsrfGuardFilter::handle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    /// Pass the request on to the application
    Proceed(ValidationOutcome),
    /// The response holds whatever the failure actions wrote
    Blocked(ValidationFailure),
    /// The response holds the priming page; the application must not run
    LandingPage,
}

impl FilterDecision {
    pub fn should_proceed(&self) -> bool {
        matches!(self, FilterDecision::Proceed(_))
    }
}

#[derive(Debug, Clone)]
pub struct CsrfGuardFilter {
    guard: Arc<CsrfGuard>,
}

impl CsrfGuardFilter {
    pub fn new(guard: Arc<CsrfGuard>) -> Self {
        Self { guard }
    }

    pub fn guard(&self) -> &Arc<CsrfGuard> {
        &self.guard
    }

    /// Session listener hook: issue the master token
    pub async fn on_session_created(&self, session_id: &str) -> Result<()> {
        self.guard.tokens().ensure_master_token(session_id).await?;
        Ok(())
    }

    /// Session listener hook: drop per-session guard state
    pub fn on_session_destroyed(&self, session_id: &str) {
        self.guard.tokens().release(session_id);
    }

    /// Evict expired sessions and the guard state they leave behind.
    ///
    /// Stores expire sessions without notifying the listener, so hosts
    /// should call this periodically. Returns the number of sessions evicted.
    pub async fn cleanup_expired(&self) -> Result<usize> {
        let evicted = self.guard.sessions().cleanup_expired().await?;
        let pruned = self.guard.tokens().prune().await?;
        debug!(evicted = evicted, pruned = pruned, "Expired session cleanup");
        Ok(evicted)
    }

    /// Run the guard for one request.
    ///
    /// A request without a live session gets a new one, bound to
    /// `request.session_id`. A session the client has not joined yet is
    /// answered with the landing page.
    pub async fn handle(
        &self,
        request: &mut HttpRequest,
        response: &mut HttpResponse,
    ) -> Result<FilterDecision> {
        self.guard.logger().log(
            LogLevel::Debug,
            &format!("CsrfGuard analyzing request {}", request.path),
        );

        let sessions = self.guard.sessions();
        let existing = match request.session_id.as_deref() {
            Some(id) => sessions.get(id).await?,
            None => None,
        };

        let session = match existing {
            Some(session) => session,
            None => {
                let session = sessions.create(None).await?;
                self.on_session_created(&session.id).await?;
                request.session_id = Some(session.id.clone());
                debug!(session_id = %session.id, "Session created for request");
                session
            }
        };

        if session.is_new {
            self.guard.update_tokens(&session.id, &request.path).await?;
            self.guard.write_landing_page(request, response).await?;
            sessions.mark_joined(&session.id).await?;
            return Ok(FilterDecision::LandingPage);
        }

        match self.guard.validate(request, response).await? {
            ValidationOutcome::Invalid(failure) => Ok(FilterDecision::Blocked(failure)),
            outcome => {
                self.guard.update_tokens(&session.id, &request.path).await?;
                Ok(FilterDecision::Proceed(outcome))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionSpec, GuardConfig};
    use csrfguard_session::{MemorySessionStore, SessionStore};

    fn filter(config: GuardConfig) -> CsrfGuardFilter {
        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        CsrfGuardFilter::new(Arc::new(CsrfGuard::new(config, sessions).unwrap()))
    }

    #[tokio::test]
    async fn test_first_request_gets_landing_page() {
        let filter = filter(GuardConfig::new(vec![ActionSpec::of("Empty")]));
        let mut request = HttpRequest::new("GET", "/home");
        let mut response = HttpResponse::ok();

        let decision = filter.handle(&mut request, &mut response).await.unwrap();

        assert_eq!(decision, FilterDecision::LandingPage);
        assert!(!decision.should_proceed());
        let id = request.session_id.clone().unwrap();
        let session = filter.guard().sessions().get(&id).await.unwrap().unwrap();
        assert!(!session.is_new);
        assert!(response.body_text().contains("form.submit();"));
    }

    #[tokio::test]
    async fn test_session_destroyed_releases_lock() {
        let filter = filter(GuardConfig::new(vec![ActionSpec::of("Empty")]));
        let session = filter.guard().sessions().create(None).await.unwrap();
        filter.on_session_created(&session.id).await.unwrap();
        assert_eq!(filter.guard().tokens().tracked_sessions(), 1);

        filter.on_session_destroyed(&session.id);
        assert_eq!(filter.guard().tokens().tracked_sessions(), 0);
    }
}
