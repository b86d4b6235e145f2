use super::{FailureAction, GuardContext};
use crate::config::ActionSpec;
use crate::engine::ValidationFailure;
use crate::error::{ActionError, Result};
use async_trait::async_trait;
use csrfguard_core::{HttpRequest, HttpResponse};

/// Redirects the client to the `Page` parameter
#[derive(Debug, Clone)]
pub struct RedirectAction {
    name: String,
    page: String,
}

impl RedirectAction {
    pub fn new(name: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page: page.into(),
        }
    }

    pub fn from_spec(spec: &ActionSpec) -> Result<Self> {
        Ok(Self::new(spec.name.clone(), spec.required_parameter("Page")?))
    }

    pub fn page(&self) -> &str {
        &self.page
    }
}

#[async_trait]
impl FailureAction for RedirectAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        _request: &HttpRequest,
        response: &mut HttpResponse,
        _failure: &ValidationFailure,
        _context: &GuardContext<'_>,
    ) -> std::result::Result<(), ActionError> {
        response.send_redirect(&self.page)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::testing::Fixture;

    #[test]
    fn test_requires_page() {
        assert!(RedirectAction::from_spec(&ActionSpec::of("Redirect")).is_err());
        let action =
            RedirectAction::from_spec(&ActionSpec::of("Redirect").with_parameter("Page", "/error"))
                .unwrap();
        assert_eq!(action.page(), "/error");
    }

    #[tokio::test]
    async fn test_redirects() {
        let fixture = Fixture::basic().await;
        let action = RedirectAction::new("Redirect", "/error.html");
        let mut response = HttpResponse::ok();

        action
            .execute(
                &fixture.request("/pay"),
                &mut response,
                &ValidationFailure::missing(),
                &fixture.context(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 302);
        assert_eq!(response.location(), Some("/error.html"));
    }

    #[tokio::test]
    async fn test_fails_on_committed_response() {
        let fixture = Fixture::basic().await;
        let action = RedirectAction::new("Redirect", "/error.html");
        let mut response = HttpResponse::ok();
        response.send_redirect("/elsewhere").unwrap();

        let result = action
            .execute(
                &fixture.request("/pay"),
                &mut response,
                &ValidationFailure::missing(),
                &fixture.context(),
            )
            .await;

        assert!(matches!(result, Err(ActionError::Response(_))));
        assert_eq!(response.location(), Some("/elsewhere"));
    }
}
