// HTTP request and response types

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use tracing::warn;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// HTTP request as seen by the guard
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    /// Request URI without the query string
    pub path: String,
    /// Full request URL, falls back to `path` when the host does not supply one
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    /// Parameters the host already decoded (for example from a multipart body)
    pub form_params: HashMap<String, String>,
    pub body: Vec<u8>,
    pub session_id: Option<String>,
    pub remote_addr: Option<SocketAddr>,
    pub local_addr: Option<SocketAddr>,
    pub remote_host: Option<String>,
    pub local_name: Option<String>,
    pub remote_user: Option<String>,
}

impl HttpRequest {
    /// Create a request, splitting an optional query string off `uri`
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let (path, query_params) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query(query)),
            None => (uri.clone(), HashMap::new()),
        };

        Self {
            method: method.into(),
            url: path.clone(),
            path,
            query_params,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn with_form_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_params.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    pub fn with_remote_host(mut self, host: impl Into<String>) -> Self {
        self.remote_host = Some(host.into());
        self
    }

    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    pub fn with_remote_user(mut self, user: impl Into<String>) -> Self {
        self.remote_user = Some(user.into());
        self
    }

    /// Get a header by name, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Look up a request parameter regardless of HTTP method.
    ///
    /// Query parameters win over host-decoded form parameters, which win over
    /// an url-encoded body.
    pub fn parameter(&self, name: &str) -> Option<String> {
        if let Some(value) = self.query_params.get(name) {
            return Some(value.clone());
        }

        if let Some(value) = self.form_params.get(name) {
            return Some(value.clone());
        }

        if self.body.is_empty() || !self.has_form_body() {
            return None;
        }

        serde_urlencoded::from_bytes::<Vec<(String, String)>>(&self.body)
            .ok()?
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Parse the request body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization(e.to_string()))
    }

    fn has_form_body(&self) -> bool {
        match self.header("Content-Type") {
            Some(content_type) => content_type
                .split(';')
                .next()
                .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_URLENCODED)),
            None => true,
        }
    }
}

/// Decode a query string. A repeated name keeps its first value.
fn parse_query(query: &str) -> HashMap<String, String> {
    let pairs = match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed query string");
            return HashMap::new();
        }
    };

    let mut params = HashMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        params.entry(name).or_insert(value);
    }
    params
}

/// HTTP response written by the guard or its failure actions.
///
/// The first redirect, error or body write commits the response, and
/// any later one fails with [`Error::ResponseCommitted`].
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    committed: bool,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            committed: false,
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Redirect target, if a redirect was sent
    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    /// Body as UTF-8 text (lossy)
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Emit a `302 Found` redirect
    pub fn send_redirect(&mut self, location: &str) -> Result<()> {
        self.commit("send redirect")?;
        self.status = 302;
        self.set_header("Location", location);
        Ok(())
    }

    /// Emit an error status with an optional plain-text message
    pub fn send_error(&mut self, status: u16, message: Option<&str>) -> Result<()> {
        if !(100..=599).contains(&status) {
            return Err(Error::InvalidStatus(status));
        }

        self.commit("send error")?;
        self.status = status;
        if let Some(message) = message {
            self.set_header("Content-Type", "text/plain");
            self.body = message.as_bytes().to_vec();
            self.set_header("Content-Length", self.body.len().to_string());
        }
        Ok(())
    }

    /// Write a complete body with the given content type
    pub fn write_body(&mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Result<()> {
        self.commit("write body")?;
        self.body = body.into();
        self.set_header("Content-Type", content_type);
        self.set_header("Content-Length", self.body.len().to_string());
        Ok(())
    }

    fn commit(&mut self, operation: &'static str) -> Result<()> {
        if self.committed {
            return Err(Error::ResponseCommitted(operation));
        }
        self.committed = true;
        Ok(())
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::ok()
    }
}
