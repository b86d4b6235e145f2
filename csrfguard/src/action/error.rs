use super::{FailureAction, GuardContext};
use crate::config::ActionSpec;
use crate::engine::ValidationFailure;
use crate::error::{ActionError, GuardError, Result};
use async_trait::async_trait;
use csrfguard_core::{HttpRequest, HttpResponse};

/// Sends an HTTP error status, with an optional message body
#[derive(Debug, Clone)]
pub struct ErrorAction {
    name: String,
    code: u16,
    message: Option<String>,
}

impl ErrorAction {
    pub fn new(name: impl Into<String>, code: u16, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            code,
            message,
        }
    }

    pub fn from_spec(spec: &ActionSpec) -> Result<Self> {
        let raw = spec.required_parameter("Code")?;
        let code = raw
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|code| (100..=599).contains(code))
            .ok_or_else(|| {
                GuardError::config(format!(
                    "action '{}' has an invalid Code '{raw}'",
                    spec.name
                ))
            })?;

        Ok(Self::new(
            spec.name.clone(),
            code,
            spec.parameter("Message").map(str::to_string),
        ))
    }

    pub fn code(&self) -> u16 {
        self.code
    }
}

#[async_trait]
impl FailureAction for ErrorAction {
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
        response.send_error(self.code, self.message.as_deref())?;
        Ok(())
    }
}
