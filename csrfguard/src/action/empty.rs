use super::{FailureAction, GuardContext};
use crate::config::ActionSpec;
use crate::engine::ValidationFailure;
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use csrfguard_core::{HttpRequest, HttpResponse};

/// Blocks the request and leaves the response untouched
#[derive(Debug, Clone)]
pub struct EmptyAction {
    name: String,
}

impl EmptyAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn from_spec(spec: &ActionSpec) -> Result<Self> {
        Ok(Self::new(spec.name.clone()))
    }
}

#[async_trait]
impl FailureAction for EmptyAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _request: &HttpRequest,
        _response: &mut HttpResponse,
        _failure: &ValidationFailure,
        _context: &GuardContext<'_>,
    ) -> std::result::Result<(), ActionError> {
        Ok(())
    }
}
