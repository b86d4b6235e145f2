use super::{FailureAction, GuardContext};
use crate::config::ActionSpec;
use crate::engine::ValidationFailure;
use crate::error::{ActionError, Result};
use crate::log::LogLevel;
use async_trait::async_trait;
use csrfguard_core::{HttpRequest, HttpResponse};

/// Message used when a `Log` action has no `Message` parameter
pub const DEFAULT_LOG_MESSAGE: &str = "potential cross-site request forgery (CSRF) attack thwarted (user:%user%, ip:%remote_ip%, uri:%request_uri%, error:%exception_message%)";

const UNKNOWN: &str = "unknown";

/// Logs a templated message describing the rejected request.
///
/// Recognised placeholders: `%exception%`, `%exception_message%`,
/// `%remote_ip%`, `%remote_host%`, `%remote_port%`, `%local_ip%`,
/// `%local_host%`, `%local_port%`, `%request_uri%`, `%request_url%` and
/// `%user%`.
#[derive(Debug, Clone)]
pub struct LogAction {
    name: String,
    template: String,
}

impl LogAction {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    pub fn from_spec(spec: &ActionSpec) -> Result<Self> {
        Ok(Self::new(
            spec.name.clone(),
            spec.parameter("Message").unwrap_or(DEFAULT_LOG_MESSAGE),
        ))
    }

    pub fn render(&self, request: &HttpRequest, failure: &ValidationFailure) -> String {
        let remote = request.remote_addr;
        let local = request.local_addr;

        let replacements = [
            ("%exception%", format!("CsrfGuardException: {failure}")),
            ("%exception_message%", failure.to_string()),
            (
                "%remote_ip%",
                remote.map_or_else(|| UNKNOWN.to_string(), |a| a.ip().to_string()),
            ),
            (
                "%remote_host%",
                request
                    .remote_host
                    .clone()
                    .or_else(|| remote.map(|a| a.ip().to_string()))
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            (
                "%remote_port%",
                remote.map_or_else(|| UNKNOWN.to_string(), |a| a.port().to_string()),
            ),
            (
                "%local_ip%",
                local.map_or_else(|| UNKNOWN.to_string(), |a| a.ip().to_string()),
            ),
            (
                "%local_host%",
                request
                    .local_name
                    .clone()
                    .or_else(|| local.map(|a| a.ip().to_string()))
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            (
                "%local_port%",
                local.map_or_else(|| UNKNOWN.to_string(), |a| a.port().to_string()),
            ),
            ("%request_uri%", request.path.clone()),
            ("%request_url%", request.url.clone()),
            (
                "%user%",
                request
                    .remote_user
                    .clone()
                    .unwrap_or_else(|| "<anonymous>".to_string()),
            ),
        ];

        replacements
            .iter()
            .fold(self.template.clone(), |message, (placeholder, value)| {
                message.replace(placeholder, value)
            })
    }
}

#[async_trait]
impl FailureAction for LogAction {
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
        context
            .logger
            .log(LogLevel::Error, &self.render(request, failure));
        Ok(())
    }
}
