//! Token verification rules.
//!
//! A request is checked in one of three modes, picked in priority order:
//! AJAX (token in a header, compared to the master token), per-page (token
//! parameter, compared to the uri's page token when one exists, else the
//! master token), and session (token parameter compared to the master token).

use crate::config::GuardConfig;
use crate::token::tokens_match;
use csrfguard_core::HttpRequest;
use std::fmt;

/// Result of validating one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The uri is unprotected; no token was inspected
    Exempt,
    Valid,
    Invalid(ValidationFailure),
}

impl ValidationOutcome {
    /// Whether the request may proceed to the application
    pub fn is_allowed(&self) -> bool {
        !matches!(self, ValidationOutcome::Invalid(_))
    }

    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            ValidationOutcome::Invalid(failure) => Some(failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Missing,
    Mismatch,
}

/// Which stored token the request was compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Session,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationFailure {
    pub kind: FailureKind,
    pub against: TokenSource,
}

impl ValidationFailure {
    pub fn missing() -> Self {
        Self {
            kind: FailureKind::Missing,
            against: TokenSource::Session,
        }
    }

    pub fn mismatch(against: TokenSource) -> Self {
        Self {
            kind: FailureKind::Mismatch,
            against,
        }
    }

    pub fn message(&self) -> &'static str {
        match (self.kind, self.against) {
            (FailureKind::Missing, _) => "required token is missing from the request",
            (FailureKind::Mismatch, TokenSource::Session) => {
                "request token does not match session token"
            }
            (FailureKind::Mismatch, TokenSource::Page) => "request token does not match page token",
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ValidationFailure {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Ajax,
    Page,
    Session,
}

/// A request is scripted when it carries the configured AJAX marker header.
pub fn is_ajax_request(config: &GuardConfig, request: &HttpRequest) -> bool {
    request.header(&config.ajax_header).is_some()
}

pub fn select_mode(config: &GuardConfig, request: &HttpRequest) -> ValidationMode {
    if config.ajax && is_ajax_request(config, request) {
        ValidationMode::Ajax
    } else if config.token_per_page {
        ValidationMode::Page
    } else {
        ValidationMode::Session
    }
}

/// Token the client submitted, from wherever `mode` says it travels.
pub fn submitted_token(
    config: &GuardConfig,
    mode: ValidationMode,
    request: &HttpRequest,
) -> Option<String> {
    match mode {
        ValidationMode::Ajax => request.header(&config.token_name).map(str::to_string),
        ValidationMode::Page | ValidationMode::Session => request.parameter(&config.token_name),
    }
}

/// Compare a submitted token with the stored ones.
///
/// Page tokens are only consulted in [`ValidationMode::Page`], and only when
/// the uri has one; otherwise the master token decides.
pub fn verify(
    mode: ValidationMode,
    submitted: Option<&str>,
    master: &str,
    page: Option<&str>,
) -> Result<(), ValidationFailure> {
    let submitted = submitted.ok_or_else(ValidationFailure::missing)?;

    let (expected, against) = match (mode, page) {
        (ValidationMode::Page, Some(page)) => (page, TokenSource::Page),
        _ => (master, TokenSource::Session),
    };

    if tokens_match(expected, submitted) {
        Ok(())
    } else {
        Err(ValidationFailure::mismatch(against))
    }
}
