use super::{FailureAction, GuardContext};
use crate::config::ActionSpec;
use crate::engine::ValidationFailure;
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use csrfguard_core::{HttpRequest, HttpResponse};
use tracing::debug;

/// Ends the offending session
#[derive(Debug, Clone)]
pub struct InvalidateAction {
    name: String,
}

impl InvalidateAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn from_spec(spec: &ActionSpec) -> Result<Self> {
        Ok(Self::new(spec.name.clone()))
    }
}

#[async_trait]
impl FailureAction for InvalidateAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        request: &HttpRequest,
        _response: &mut HttpResponse,
        _failure: &ValidationFailure,
        context: &GuardContext<'_>,
    ) -> std::result::Result<(), ActionError> {
        // nothing to end without a session
        let Some(session_id) = request.session_id.as_deref() else {
            return Ok(());
        };

        context.sessions().delete(session_id).await?;
        context.tokens.release(session_id);
        debug!(session_id = %session_id, "Session invalidated after CSRF failure");
        Ok(())
    }
}
