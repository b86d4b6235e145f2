//! Redirect capture
//!
//! Lets the application's redirect be held back so the guard can forward
//! it with the token attached.

use csrfguard_core::{HttpResponse, Result};

/// Response wrapper whose `send_redirect` only records the target
#[derive(Debug)]
pub struct InterceptRedirectResponse<'a> {
    response: &'a mut HttpResponse,
    location: Option<String>,
}

impl<'a> InterceptRedirectResponse<'a> {
    pub fn new(response: &'a mut HttpResponse) -> Self {
        Self {
            response,
            location: None,
        }
    }

    /// Capture a redirect without sending it
    pub fn send_redirect(&mut self, location: impl Into<String>) {
        self.location = Some(location.into());
    }

    /// The captured redirect target
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Send a real redirect to `target` with `name=value` appended to its
    /// query string. A fragment stays at the end of the location.
    pub fn send_redirect_with_token(
        &mut self,
        target: &str,
        name: &str,
        value: &str,
    ) -> Result<()> {
        let (base, fragment) = match target.split_once('#') {
            Some((base, fragment)) => (base, Some(fragment)),
            None => (target, None),
        };
        let separator = if base.contains('?') { '&' } else { '?' };

        let mut location = format!("{base}{separator}{name}={value}");
        if let Some(fragment) = fragment {
            location.push('#');
            location.push_str(fragment);
        }
        self.response.send_redirect(&location)
    }

    /// The wrapped response, for writes that are not intercepted
    pub fn response_mut(&mut self) -> &mut HttpResponse {
        self.response
    }

    pub fn into_inner(self) -> &'a mut HttpResponse {
        self.response
    }
}
