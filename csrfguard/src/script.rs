//! Script bootstrap endpoint
//!
//! Serves the host's client-side injection script with the session token
//! filled in (GET), and the page token list for per-page mode (POST).

use crate::error::{GuardError, Result};
use crate::guard::CsrfGuard;
use csrfguard_core::{HttpRequest, HttpResponse};
use regex::Regex;
use std::fs;
use tracing::debug;

pub const DEFAULT_CACHE_CONTROL: &str = "private, maxage=28800";
pub const DEFAULT_X_REQUESTED_WITH: &str = "OWASP CSRFGuard Project";

/// Settings of the script endpoint
#[derive(Debug, Clone)]
pub struct ScriptConfig {
    /// Referers allowed to fetch the script; the whole header must match
    pub referer_pattern: Regex,
    pub cache_control: String,
    pub inject_into_forms: bool,
    pub inject_into_attributes: bool,
    pub domain_strict: bool,
    /// Value the script sends in the AJAX marker header
    pub x_requested_with: String,
    /// Prefix the application is mounted under
    pub context_path: String,
    /// Script source containing `%...%` placeholders
    pub template: String,
}

impl ScriptConfig {
    pub fn new(referer_pattern: &str, template: impl Into<String>) -> Result<Self> {
        // anchored so the pattern must cover the whole referer
        let referer_pattern = Regex::new(&format!("^(?:{referer_pattern})$")).map_err(|e| {
            GuardError::config(format!("invalid referer pattern '{referer_pattern}': {e}"))
        })?;

        Ok(Self {
            referer_pattern,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            inject_into_forms: true,
            inject_into_attributes: true,
            domain_strict: true,
            x_requested_with: DEFAULT_X_REQUESTED_WITH.to_string(),
            context_path: String::new(),
            template: template.into(),
        })
    }

    /// Read the template from a file
    pub fn from_template_file(referer_pattern: &str, path: &str) -> Result<Self> {
        let template = fs::read_to_string(path)
            .map_err(|e| GuardError::config(format!("unable to read {path}: {e}")))?;
        Self::new(referer_pattern, template)
    }

    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = value.into();
        self
    }

    pub fn with_inject_into_forms(mut self, inject: bool) -> Self {
        self.inject_into_forms = inject;
        self
    }

    pub fn with_inject_into_attributes(mut self, inject: bool) -> Self {
        self.inject_into_attributes = inject;
        self
    }

    pub fn with_domain_strict(mut self, strict: bool) -> Self {
        self.domain_strict = strict;
        self
    }

    pub fn with_x_requested_with(mut self, value: impl Into<String>) -> Self {
        self.x_requested_with = value.into();
        self
    }

    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = path.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ScriptEndpoint {
    config: ScriptConfig,
}

impl ScriptEndpoint {
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    /// Dispatch on the request method; anything but GET and POST gets a 405
    pub async fn handle(
        &self,
        guard: &CsrfGuard,
        request: &HttpRequest,
        response: &mut HttpResponse,
    ) -> Result<()> {
        if request.method.eq_ignore_ascii_case("GET") {
            self.get(guard, request, response).await
        } else if request.method.eq_ignore_ascii_case("POST") {
            self.post(guard, request, response).await
        } else {
            response.send_error(405, None)?;
            Ok(())
        }
    }

    /// Serve the script, if the referer is allowed
    pub async fn get(
        &self,
        guard: &CsrfGuard,
        request: &HttpRequest,
        response: &mut HttpResponse,
    ) -> Result<()> {
        let allowed = request
            .header("Referer")
            .is_some_and(|referer| self.config.referer_pattern.is_match(referer));
        if !allowed {
            debug!(uri = %request.path, "Script request refused, referer not allowed");
            response.send_error(404, None)?;
            return Ok(());
        }

        let session_id = request
            .session_id
            .as_deref()
            .ok_or(GuardError::MissingSession)?;
        let token = guard.tokens().ensure_master_token(session_id).await?;

        let guard_config = guard.config();
        let cache_control = if guard_config.rotate || guard_config.token_per_page {
            "no-store"
        } else {
            self.config.cache_control.as_str()
        };

        let replacements = [
            ("%TOKEN_NAME%", guard_config.token_name.clone()),
            ("%TOKEN_VALUE%", token),
            ("%INJECT_FORMS%", self.config.inject_into_forms.to_string()),
            (
                "%INJECT_ATTRIBUTES%",
                self.config.inject_into_attributes.to_string(),
            ),
            ("%INJECT_XHR%", guard_config.ajax.to_string()),
            ("%DOMAIN_ORIGIN%", domain_origin(request)),
            ("%DOMAIN_STRICT%", self.config.domain_strict.to_string()),
            ("%CONTEXT_PATH%", self.config.context_path.clone()),
            ("%SERVLET_PATH%", request.path.clone()),
            ("%X_REQUESTED_WITH%", self.config.x_requested_with.clone()),
        ];
        let code = replacements
            .iter()
            .fold(self.config.template.clone(), |code, (placeholder, value)| {
                code.replace(placeholder, value)
            });

        response.set_header("Cache-Control", cache_control);
        response.write_body("text/javascript", code)?;
        Ok(())
    }

    /// Serve the page token list, in per-page mode only
    pub async fn post(
        &self,
        guard: &CsrfGuard,
        request: &HttpRequest,
        response: &mut HttpResponse,
    ) -> Result<()> {
        if !guard.config().token_per_page {
            response.send_error(404, None)?;
            return Ok(());
        }

        let session_id = request
            .session_id
            .as_deref()
            .ok_or(GuardError::MissingSession)?;
        let payload = guard.tokens().page_tokens_payload(session_id).await?;
        response.write_body("text/plain", payload)?;
        Ok(())
    }
}

/// Host name the page was served from: taken from the request url, else the
/// `Host` header, without any port.
fn domain_origin(request: &HttpRequest) -> String {
    let authority = match request.url.split_once("://") {
        Some((_, rest)) => rest,
        None => request.header("Host").unwrap_or_default(),
    };
    let end = authority.find(['/', ':']).unwrap_or(authority.len());
    authority[..end].to_string()
}
