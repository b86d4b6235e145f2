//! Servlet-mapping style URI patterns used to exempt pages from validation.
//!
//! Three forms are understood:
//!
//! - exact: `/login` matches only `/login`
//! - path prefix: `/public/*` matches `/public`, `/public/` and anything below it,
//!   and `/*` matches everything
//! - extension: `*.css` matches any uri whose last segment ends in `.css`
//!
//! Matching is case-sensitive.

use crate::error::{GuardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Check whether `uri` matches `pattern`.
pub fn is_uri_match(pattern: &str, uri: &str) -> bool {
    if pattern == uri || pattern == "/*" {
        return true;
    }

    if let Some(prefix) = pattern.strip_suffix("/*") {
        let uri_bytes = uri.as_bytes();
        if uri_bytes.starts_with(prefix.as_bytes()) {
            match uri_bytes.get(prefix.len()) {
                None => return true,
                Some(b'/') => return true,
                Some(_) => {}
            }
        }
    }

    if let Some(extension) = pattern.strip_prefix("*.") {
        return extension_matches(extension, uri);
    }

    false
}

fn extension_matches(extension: &str, uri: &str) -> bool {
    let (Some(slash), Some(period)) = (uri.rfind('/'), uri.rfind('.')) else {
        return false;
    };

    period > slash && period != uri.len() - 1 && &uri[period + 1..] == extension
}

/// A validated exemption pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern(String);

impl PathPattern {
    /// Parse a pattern, rejecting wildcards outside the supported positions.
    pub fn parse(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();

        if pattern.is_empty() {
            return Err(GuardError::config("unprotected page pattern must not be empty"));
        }

        let body = pattern
            .strip_prefix("*.")
            .or_else(|| pattern.strip_suffix("/*"))
            .unwrap_or(&pattern);

        if body.contains('*') {
            return Err(GuardError::config(format!(
                "unparsable unprotected page pattern '{pattern}': '*' is only allowed as a leading '*.' or a trailing '/*'"
            )));
        }

        if pattern.starts_with("*.") && body.is_empty() {
            return Err(GuardError::config(format!(
                "unparsable unprotected page pattern '{pattern}': missing extension"
            )));
        }

        Ok(Self(pattern))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, uri: &str) -> bool {
        is_uri_match(&self.0, uri)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = GuardError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<PathPattern> for String {
    fn from(pattern: PathPattern) -> Self {
        pattern.0
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True if any of `patterns` matches `uri`.
pub fn is_exempt(uri: &str, patterns: &[PathPattern]) -> bool {
    patterns.iter().any(|pattern| pattern.matches(uri))
}
