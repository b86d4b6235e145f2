use super::{FailureAction, GuardContext};
use crate::config::ActionSpec;
use crate::engine::ValidationFailure;
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use csrfguard_core::{HttpRequest, HttpResponse};
use serde_json::Value;

/// Stores the failure message in the session under `AttributeName`, for the
/// application to report on its next page.
#[derive(Debug, Clone)]
pub struct SessionAttributeAction {
    name: String,
    attribute: String,
}

impl SessionAttributeAction {
    pub fn new(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute: attribute.into(),
        }
    }

    pub fn from_spec(spec: &ActionSpec) -> Result<Self> {
        Ok(Self::new(
            spec.name.clone(),
            spec.required_parameter("AttributeName")?,
        ))
    }
}

#[async_trait]
impl FailureAction for SessionAttributeAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        request: &HttpRequest,
        _response: &mut HttpResponse,
        failure: &ValidationFailure,
        context: &GuardContext<'_>,
    ) -> std::result::Result<(), ActionError> {
        let session_id = request.session_id.as_deref().ok_or(ActionError::NoSession)?;
        context
            .sessions()
            .set_attribute(session_id, &self.attribute, Value::String(failure.to_string()))
            .await?;
        Ok(())
    }
}
