use crate::error::{GuardError, Result};
use crate::matcher::{PathPattern, is_exempt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_TOKEN_NAME: &str = "OWASP_CSRFGUARD";
pub const DEFAULT_TOKEN_LENGTH: usize = 32;
pub const DEFAULT_SESSION_KEY: &str = "OWASP_CSRFGUARD_KEY";
pub const DEFAULT_AJAX_HEADER: &str = "X-Requested-With";

/// One configured failure action: a name, the kind of action to build, and
/// its string parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Action whose name is also its kind, e.g. `ActionSpec::of("Log")`
    pub fn of(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self::new(kind.clone(), kind)
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Fetch a parameter that must be present
    pub fn required_parameter(&self, name: &str) -> Result<&str> {
        self.parameter(name).ok_or_else(|| {
            GuardError::config(format!(
                "action '{}' requires parameter '{name}'",
                self.name
            ))
        })
    }
}

/// Guard configuration, fixed once the guard is built
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Parameter and header name carrying the token
    pub token_name: String,

    /// Number of random bytes per token
    pub token_length: usize,

    /// Replace tokens after every non-AJAX protected request
    pub rotate: bool,

    /// Issue a distinct token for each protected uri
    pub token_per_page: bool,

    /// Accept tokens from a header on scripted requests
    pub ajax: bool,

    /// Session attribute holding the master token
    pub session_key: String,

    /// Target of the priming form (defaults to the current page)
    pub landing_page: Option<String>,

    /// Header whose presence marks a scripted request
    pub ajax_header: String,

    /// Pages skipped by validation
    pub unprotected_pages: Vec<PathPattern>,

    /// Actions run, in order, when validation fails
    pub actions: Vec<ActionSpec>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            token_name: DEFAULT_TOKEN_NAME.to_string(),
            token_length: DEFAULT_TOKEN_LENGTH,
            rotate: false,
            token_per_page: false,
            ajax: false,
            session_key: DEFAULT_SESSION_KEY.to_string(),
            landing_page: None,
            ajax_header: DEFAULT_AJAX_HEADER.to_string(),
            unprotected_pages: Vec::new(),
            actions: Vec::new(),
        }
    }
}

impl GuardConfig {
    /// Default configuration with the given failure actions
    pub fn new(actions: Vec<ActionSpec>) -> Self {
        Self {
            actions,
            ..Default::default()
        }
    }

    pub fn with_token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = name.into();
        self
    }

    pub fn with_token_length(mut self, length: usize) -> Self {
        self.token_length = length;
        self
    }

    pub fn with_rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn with_token_per_page(mut self, token_per_page: bool) -> Self {
        self.token_per_page = token_per_page;
        self
    }

    pub fn with_ajax(mut self, ajax: bool) -> Self {
        self.ajax = ajax;
        self
    }

    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    pub fn with_landing_page(mut self, page: impl Into<String>) -> Self {
        self.landing_page = Some(page.into());
        self
    }

    pub fn with_ajax_header(mut self, header: impl Into<String>) -> Self {
        self.ajax_header = header.into();
        self
    }

    /// Add an exemption pattern
    pub fn with_unprotected_page(mut self, pattern: &str) -> Result<Self> {
        self.unprotected_pages.push(PathPattern::parse(pattern)?);
        Ok(self)
    }

    pub fn with_action(mut self, action: ActionSpec) -> Self {
        self.actions.push(action);
        self
    }

    pub fn is_unprotected(&self, uri: &str) -> bool {
        is_exempt(uri, &self.unprotected_pages)
    }

    /// Check the invariants the guard relies on
    pub fn validate(&self) -> Result<()> {
        if self.actions.is_empty() {
            return Err(GuardError::config("failure to define at least one action"));
        }
        if self.token_length == 0 {
            return Err(GuardError::config("token length must be greater than zero"));
        }
        if self.token_name.trim().is_empty() {
            return Err(GuardError::config("token name must not be empty"));
        }
        if self.session_key.trim().is_empty() {
            return Err(GuardError::config("session key must not be empty"));
        }
        if self.ajax_header.trim().is_empty() {
            return Err(GuardError::config("ajax header must not be empty"));
        }
        Ok(())
    }
}

impl fmt::Display for GuardConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*****************************************************")?;
        writeln!(f, "* Owasp.CsrfGuard Properties")?;
        writeln!(f, "*")?;
        writeln!(
            f,
            "* NewTokenLandingPage: {}",
            self.landing_page.as_deref().unwrap_or("<current page>")
        )?;
        writeln!(f, "* SessionKey: {}", self.session_key)?;
        writeln!(f, "* TokenLength: {}", self.token_length)?;
        writeln!(f, "* TokenName: {}", self.token_name)?;
        writeln!(f, "* Ajax: {}", self.ajax)?;
        writeln!(f, "* Rotate: {}", self.rotate)?;
        writeln!(f, "* TokenPerPage: {}", self.token_per_page)?;
        for page in &self.unprotected_pages {
            writeln!(f, "* Unprotected: {page}")?;
        }
        for action in &self.actions {
            writeln!(f, "* Action: {} ({})", action.name, action.kind)?;
            for (name, value) in &action.parameters {
                writeln!(f, "*\tParameter: {name} = {value}")?;
            }
        }
        write!(f, "*****************************************************")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.token_name, "OWASP_CSRFGUARD");
        assert_eq!(config.token_length, 32);
        assert!(!config.rotate);
        assert!(!config.token_per_page);
        assert!(!config.ajax);
        assert!(config.landing_page.is_none());
    }

    #[test]
    fn test_requires_action() {
        let err = GuardConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("at least one action"));
        assert!(GuardConfig::new(vec![ActionSpec::of("Log")]).validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_length() {
        let config = GuardConfig::new(vec![ActionSpec::of("Log")]).with_token_length(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = GuardConfig::new(vec![ActionSpec::of("Empty")])
            .with_token_name("_csrf")
            .with_rotate(true)
            .with_token_per_page(true)
            .with_ajax(true)
            .with_landing_page("/home")
            .with_unprotected_page("/public/*")
            .unwrap();

        assert_eq!(config.token_name, "_csrf");
        assert!(config.rotate && config.token_per_page && config.ajax);
        assert_eq!(config.landing_page.as_deref(), Some("/home"));
        assert!(config.is_unprotected("/public/a.html"));
        assert!(!config.is_unprotected("/private"));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        assert!(GuardConfig::default().with_unprotected_page("/a*b").is_err());
    }

    #[test]
    fn test_required_parameter() {
        let action = ActionSpec::of("Redirect").with_parameter("Page", "/error");
        assert_eq!(action.required_parameter("Page").unwrap(), "/error");
        assert!(action.required_parameter("Missing").is_err());
    }

    #[test]
    fn test_display_lists_actions() {
        let config = GuardConfig::new(vec![
            ActionSpec::of("Redirect").with_parameter("Page", "/error"),
        ]);
        let banner = config.to_string();
        assert!(banner.contains("TokenName: OWASP_CSRFGUARD"));
        assert!(banner.contains("Action: Redirect"));
        assert!(banner.contains("Parameter: Page = /error"));
    }
}
