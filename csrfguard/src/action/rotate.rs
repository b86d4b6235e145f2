use super::{FailureAction, GuardContext};
use crate::config::ActionSpec;
use crate::engine::ValidationFailure;
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use csrfguard_core::{HttpRequest, HttpResponse};

/// Replaces the session's master token and, in per-page mode, the token of
/// the requested uri.
#[derive(Debug, Clone)]
pub struct RotateAction {
    name: String,
}

impl RotateAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn from_spec(spec: &ActionSpec) -> Result<Self> {
        Ok(Self::new(spec.name.clone()))
    }
}

#[async_trait]
impl FailureAction for RotateAction {
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
        let session_id = request.session_id.as_deref().ok_or(ActionError::NoSession)?;
        context.tokens.rotate(session_id, &request.path).await?;
        Ok(())
    }
}
