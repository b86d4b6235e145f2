//! The guard: configuration, token state and failure actions wired together.

use crate::action::{ActionRegistry, FailurePipeline, GuardContext};
use crate::config::GuardConfig;
use crate::engine::{ValidationOutcome, is_ajax_request, select_mode, submitted_token, verify};
use crate::error::{GuardError, Result};
use crate::intercept::InterceptRedirectResponse;
use crate::landing::render_landing_page;
use crate::log::{LogLevel, Logger, TracingLogger};
use crate::store::TokenStore;
use crate::token::{OsRandom, RandomSource, TokenGenerator};
use csrfguard_core::{HttpRequest, HttpResponse};
use csrfguard_session::SessionStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// CSRF guard
///
/// Built once at startup and shared by every request.
///
/// ```rust,no_run
/// use csrfguard::{ActionSpec, CsrfGuard, GuardConfig};
/// use csrfguard_session::MemorySessionStore;
/// use std::sync::Arc;
///
/// # fn main() -> csrfguard::Result<()> {
/// let config = GuardConfig::new(vec![
///     ActionSpec::of("Log"),
///     ActionSpec::of("Redirect").with_parameter("Page", "/error.html"),
/// ])
/// .with_unprotected_page("/static/*")?;
///
/// let _guard = CsrfGuard::builder(config)
///     .sessions(Arc::new(MemorySessionStore::default()))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct CsrfGuard {
    config: Arc<GuardConfig>,
    tokens: TokenStore,
    pipeline: FailurePipeline,
    logger: Arc<dyn Logger>,
}

impl CsrfGuard {
    pub fn builder(config: GuardConfig) -> CsrfGuardBuilder {
        CsrfGuardBuilder::new(config)
    }

    /// Guard with the default logger, random source and action kinds
    pub fn new(config: GuardConfig, sessions: Arc<dyn SessionStore>) -> Result<Self> {
        Self::builder(config).sessions(sessions).build()
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        self.tokens.sessions()
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    pub fn pipeline(&self) -> &FailurePipeline {
        &self.pipeline
    }

    pub fn context(&self) -> GuardContext<'_> {
        GuardContext::new(&self.config, &self.tokens, self.logger.as_ref())
    }

    /// Check the request's token.
    ///
    /// Failure actions run before an `Invalid` outcome is returned. With
    /// rotation enabled, every non-AJAX protected request rotates its
    /// session's tokens, whether or not it passed.
    pub async fn validate(
        &self,
        request: &HttpRequest,
        response: &mut HttpResponse,
    ) -> Result<ValidationOutcome> {
        let uri = request.path.as_str();

        if self.config.is_unprotected(uri) {
            debug!(uri = %uri, "Unprotected page");
            return Ok(ValidationOutcome::Exempt);
        }

        let session_id = request
            .session_id
            .as_deref()
            .ok_or(GuardError::MissingSession)?;

        let snapshot = self.tokens.snapshot(session_id, uri).await?;
        let master = snapshot
            .master
            .ok_or_else(|| GuardError::MissingMasterToken {
                session_id: session_id.to_string(),
            })?;

        let mode = select_mode(&self.config, request);
        let submitted = submitted_token(&self.config, mode, request);

        let outcome = match verify(mode, submitted.as_deref(), &master, snapshot.page.as_deref()) {
            Ok(()) => ValidationOutcome::Valid,
            Err(failure) => {
                debug!(uri = %uri, ?mode, reason = %failure, "Request failed CSRF validation");
                self.pipeline
                    .run(request, response, &failure, &self.context())
                    .await;
                ValidationOutcome::Invalid(failure)
            }
        };

        if self.config.rotate && !is_ajax_request(&self.config, request) {
            match self.tokens.rotate(session_id, uri).await {
                Ok(()) => {}
                // an Invalidate action may already have ended the session
                Err(GuardError::Session(err)) if err.is_missing() && !outcome.is_allowed() => {
                    debug!(session_id = %session_id, "Session gone, rotation skipped");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(outcome)
    }

    /// Ensure the master token and, in per-page mode, the token for `uri`.
    pub async fn update_tokens(&self, session_id: &str, uri: &str) -> Result<()> {
        self.tokens.update_tokens(session_id, uri).await
    }

    /// Token a client should submit to `uri`
    pub async fn token_for(&self, session_id: &str, uri: &str) -> Result<Option<String>> {
        self.tokens.read_token(session_id, uri).await
    }

    /// Write the priming page that posts straight back with a valid token.
    pub async fn write_landing_page(
        &self,
        request: &HttpRequest,
        response: &mut HttpResponse,
    ) -> Result<()> {
        let session_id = request
            .session_id
            .as_deref()
            .ok_or(GuardError::MissingSession)?;
        self.tokens.ensure_master_token(session_id).await?;

        let landing = self
            .config
            .landing_page
            .as_deref()
            .unwrap_or(request.path.as_str());

        let token = if self.config.is_unprotected(landing) {
            None
        } else {
            let token = self
                .tokens
                .read_token(session_id, landing)
                .await?
                .ok_or_else(|| GuardError::MissingMasterToken {
                    session_id: session_id.to_string(),
                })?;
            Some(token)
        };

        let page = render_landing_page(landing, &self.config.token_name, token.as_deref());
        response.write_body("text/html", page)?;
        debug!(session_id = %session_id, landing = %landing, "Landing page written");
        Ok(())
    }

    /// Forward a redirect captured from the application, with the token for
    /// its target attached. Unprotected targets are forwarded as they are.
    ///
    /// Returns `false` when nothing was captured.
    pub async fn forward_redirect(
        &self,
        request: &HttpRequest,
        mut intercepted: InterceptRedirectResponse<'_>,
    ) -> Result<bool> {
        let Some(location) = intercepted.location().map(str::to_string) else {
            return Ok(false);
        };

        let target = redirect_path(&location);
        if self.config.is_unprotected(target) {
            intercepted.into_inner().send_redirect(&location)?;
            return Ok(true);
        }

        let session_id = request
            .session_id
            .as_deref()
            .ok_or(GuardError::MissingSession)?;
        let token = self
            .tokens
            .read_token(session_id, target)
            .await?
            .ok_or_else(|| GuardError::MissingMasterToken {
                session_id: session_id.to_string(),
            })?;

        intercepted.send_redirect_with_token(&location, &self.config.token_name, &token)?;
        Ok(true)
    }
}

impl fmt::Debug for CsrfGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfGuard")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Path part of a redirect target, without scheme, host, query or fragment
fn redirect_path(location: &str) -> &str {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    let location = &location[..end];

    match location.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |start| &rest[start..]),
        None => location,
    }
}

/// Builder for [`CsrfGuard`]
pub struct CsrfGuardBuilder {
    config: GuardConfig,
    sessions: Option<Arc<dyn SessionStore>>,
    logger: Arc<dyn Logger>,
    random: Arc<dyn RandomSource>,
    registry: ActionRegistry,
    print_config: bool,
}

impl CsrfGuardBuilder {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            sessions: None,
            logger: Arc::new(TracingLogger),
            random: Arc::new(OsRandom),
            registry: ActionRegistry::new(),
            print_config: false,
        }
    }

    /// Session store the guard keeps its tokens in (required)
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Action kinds available to the configuration
    pub fn registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Log the configuration banner once built
    pub fn print_config(mut self, print: bool) -> Self {
        self.print_config = print;
        self
    }

    pub fn build(self) -> Result<CsrfGuard> {
        self.config.validate()?;

        let sessions = self
            .sessions
            .ok_or_else(|| GuardError::config("a session store is required"))?;
        let pipeline = FailurePipeline::from_specs(&self.registry, &self.config.actions)?;

        let config = Arc::new(self.config);
        let tokens = TokenStore::new(config.clone(), TokenGenerator::new(self.random), sessions);

        if self.print_config {
            self.logger.log(LogLevel::Info, &config.to_string());
        }
        info!(
            token_name = %config.token_name,
            actions = pipeline.len(),
            rotate = config.rotate,
            token_per_page = config.token_per_page,
            ajax = config.ajax,
            "CsrfGuard initialized"
        );

        Ok(CsrfGuard {
            config,
            tokens,
            pipeline,
            logger: self.logger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionSpec;
    use crate::engine::{TokenSource, ValidationFailure};
    use csrfguard_session::MemorySessionStore;

    fn sessions() -> Arc<dyn SessionStore> {
        Arc::new(MemorySessionStore::default())
    }

    fn guard(config: GuardConfig) -> CsrfGuard {
        CsrfGuard::new(config, sessions()).unwrap()
    }

    fn config() -> GuardConfig {
        GuardConfig::new(vec![ActionSpec::of("Empty")])
    }

    async fn session(guard: &CsrfGuard) -> String {
        let session = guard.sessions().create(None).await.unwrap();
        guard.tokens().ensure_master_token(&session.id).await.unwrap();
        session.id
    }

    #[test]
    fn test_build_validates() {
        assert!(CsrfGuard::new(GuardConfig::default(), sessions()).is_err());
        assert!(CsrfGuard::builder(config()).build().is_err());
        let unknown = GuardConfig::new(vec![ActionSpec::of("Nope")]);
        assert!(matches!(
            CsrfGuard::new(unknown, sessions()),
            Err(GuardError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_exempt_skips_session_checks() {
        let guard = guard(config().with_unprotected_page("/login").unwrap());
        let outcome = guard
            .validate(&HttpRequest::new("POST", "/login"), &mut HttpResponse::ok())
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Exempt);
    }

    #[tokio::test]
    async fn test_missing_session() {
        let guard = guard(config());
        let err = guard
            .validate(&HttpRequest::new("POST", "/a"), &mut HttpResponse::ok())
            .await
            .unwrap_err();
        assert!(matches!(err, GuardError::MissingSession));
    }

    #[tokio::test]
    async fn test_missing_master_is_integration_error() {
        let guard = guard(config());
        let session = guard.sessions().create(None).await.unwrap();
        let request = HttpRequest::new("POST", "/a").with_session(session.id);
        let err = guard
            .validate(&request, &mut HttpResponse::ok())
            .await
            .unwrap_err();
        assert!(err.is_integration_error());
    }

    #[tokio::test]
    async fn test_valid_and_invalid() {
        let guard = guard(config());
        let id = session(&guard).await;
        let token = guard.token_for(&id, "/a").await.unwrap().unwrap();

        let ok = HttpRequest::new("POST", "/a")
            .with_session(id.clone())
            .with_form_param("OWASP_CSRFGUARD", token);
        assert_eq!(
            guard.validate(&ok, &mut HttpResponse::ok()).await.unwrap(),
            ValidationOutcome::Valid
        );

        let bad = HttpRequest::new("POST", "/a")
            .with_session(id)
            .with_form_param("OWASP_CSRFGUARD", "nope");
        assert_eq!(
            guard.validate(&bad, &mut HttpResponse::ok()).await.unwrap(),
            ValidationOutcome::Invalid(ValidationFailure::mismatch(TokenSource::Session))
        );
    }

    #[tokio::test]
    async fn test_rotation_skipped_after_invalidate() {
        let config = GuardConfig::new(vec![ActionSpec::of("Invalidate")]).with_rotate(true);
        let guard = guard(config);
        let id = session(&guard).await;

        let request = HttpRequest::new("POST", "/a").with_session(id.clone());
        let outcome = guard
            .validate(&request, &mut HttpResponse::ok())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ValidationOutcome::Invalid(ValidationFailure::missing())
        );
        assert!(!guard.sessions().exists(&id).await.unwrap());
    }

    #[test]
    fn test_redirect_path() {
        assert_eq!(redirect_path("/next?x=1"), "/next");
        assert_eq!(redirect_path("/next#top"), "/next");
        assert_eq!(redirect_path("https://example.com/a/b?c"), "/a/b");
        assert_eq!(redirect_path("https://example.com"), "/");
    }

    #[tokio::test]
    async fn test_forward_redirect_attaches_token() {
        let guard = guard(config().with_unprotected_page("/public/*").unwrap());
        let id = session(&guard).await;
        let token = guard.token_for(&id, "/next").await.unwrap().unwrap();
        let request = HttpRequest::new("POST", "/a").with_session(id);

        let mut response = HttpResponse::ok();
        let mut intercepted = InterceptRedirectResponse::new(&mut response);
        intercepted.send_redirect("/next?step=2");
        assert!(guard.forward_redirect(&request, intercepted).await.unwrap());
        assert_eq!(
            response.location(),
            Some(format!("/next?step=2&OWASP_CSRFGUARD={token}").as_str())
        );

        let mut response = HttpResponse::ok();
        let mut intercepted = InterceptRedirectResponse::new(&mut response);
        intercepted.send_redirect("/public/home");
        assert!(guard.forward_redirect(&request, intercepted).await.unwrap());
        assert_eq!(response.location(), Some("/public/home"));

        let mut response = HttpResponse::ok();
        let intercepted = InterceptRedirectResponse::new(&mut response);
        assert!(!guard.forward_redirect(&request, intercepted).await.unwrap());
        assert!(!response.is_committed());
    }

    #[tokio::test]
    async fn test_forwarded_redirect_with_fragment_validates() {
        let guard = guard(config());
        let id = session(&guard).await;
        let request = HttpRequest::new("POST", "/a").with_session(id.clone());

        let mut response = HttpResponse::ok();
        let mut intercepted = InterceptRedirectResponse::new(&mut response);
        intercepted.send_redirect("/next#section");
        assert!(guard.forward_redirect(&request, intercepted).await.unwrap());

        let location = response.location().unwrap().to_string();
        assert!(location.ends_with("#section"));

        // browsers drop the fragment from the follow-up request
        let (sent, _) = location.split_once('#').unwrap();
        let follow_up = HttpRequest::new("GET", sent).with_session(id);
        let outcome = guard
            .validate(&follow_up, &mut HttpResponse::ok())
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn test_landing_page_defaults_to_current_path() {
        let guard = guard(config());
        let session = guard.sessions().create(None).await.unwrap();
        let request = HttpRequest::new("GET", "/account").with_session(session.id.clone());
        let mut response = HttpResponse::ok();

        guard.write_landing_page(&request, &mut response).await.unwrap();

        let token = guard.token_for(&session.id, "/account").await.unwrap().unwrap();
        let body = response.body_text();
        assert_eq!(response.content_type(), Some("text/html"));
        assert!(body.contains("form.setAttribute(\"action\", \"/account\");"));
        assert!(body.contains(&format!("hiddenField.setAttribute(\"value\", \"{token}\");")));
    }

    #[tokio::test]
    async fn test_landing_page_unprotected_target_has_no_token() {
        let config = config()
            .with_landing_page("/welcome")
            .with_unprotected_page("/welcome")
            .unwrap();
        let guard = guard(config);
        let session = guard.sessions().create(None).await.unwrap();
        let request = HttpRequest::new("GET", "/account").with_session(session.id);
        let mut response = HttpResponse::ok();

        guard.write_landing_page(&request, &mut response).await.unwrap();

        let body = response.body_text();
        assert!(body.contains("\"/welcome\""));
        assert!(!body.contains("hiddenField"));
    }
}
