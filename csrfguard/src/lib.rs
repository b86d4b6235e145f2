//! # CsrfGuard
//!
//! Synchronizer-token protection against Cross-Site Request Forgery.
//!
//! ## Features
//!
//! - ✅ **Session Tokens** - One secret per session, checked on every protected request
//! - ✅ **Per-Page Tokens** - Optional distinct token for each protected uri
//! - ✅ **AJAX Support** - Tokens in a header for scripted requests
//! - ✅ **Rotation** - Optional fresh tokens after every request
//! - ✅ **Failure Actions** - Configurable log, redirect, error and session reactions
//! - ✅ **Unprotected Pages** - Servlet-style exemption patterns
//! - ✅ **Properties and TOML** - Load settings from the classic properties file or TOML
//!
//! ## Quick Start
//!
//! ```rust
//! use csrfguard::prelude::*;
//! use csrfguard_session::{MemorySessionStore, SessionStore};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> csrfguard::Result<()> {
//! let config = GuardConfig::new(vec![
//!     ActionSpec::of("Log"),
//!     ActionSpec::of("Error").with_parameter("Code", "403"),
//! ])
//! .with_unprotected_page("*.css")?;
//!
//! let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
//! let guard = CsrfGuard::new(config, sessions.clone())?;
//!
//! // the session listener issues the token when the session starts
//! let session = sessions.create(None).await?;
//! let token = guard.tokens().ensure_master_token(&session.id).await?;
//!
//! let request = HttpRequest::new("POST", "/transfer")
//!     .with_session(session.id.clone())
//!     .with_form_param("OWASP_CSRFGUARD", token);
//! let outcome = guard.validate(&request, &mut HttpResponse::ok()).await?;
//! assert_eq!(outcome, ValidationOutcome::Valid);
//!
//! let forged = HttpRequest::new("POST", "/transfer").with_session(session.id);
//! let mut response = HttpResponse::ok();
//! let outcome = guard.validate(&forged, &mut response).await?;
//! assert!(!outcome.is_allowed());
//! assert_eq!(response.status, 403);
//! # Ok(())
//! # }
//! ```
//!
//! ## Loading Configuration
//!
//! ```rust
//! use csrfguard::{ConfigLoader, FileFormat};
//!
//! let config = ConfigLoader::new(FileFormat::Properties)
//!     .parse(
//!         "org.owasp.csrfguard.Rotate=true\n\
//!          org.owasp.csrfguard.action.Redirect=org.owasp.csrfguard.action.Redirect\n\
//!          org.owasp.csrfguard.action.Redirect.Page=/error.html\n",
//!     )
//!     .unwrap();
//!
//! assert!(config.rotate);
//! assert_eq!(config.actions[0].parameter("Page"), Some("/error.html"));
//! ```
//!
//! ## Filter
//!
//! [`CsrfGuardFilter`] runs the whole request flow: it creates sessions,
//! answers the first request of a session with the landing page, and keeps
//! tokens issued for pages that pass.

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod guard;
pub mod intercept;
pub mod landing;
pub mod loader;
pub mod log;
pub mod matcher;
pub mod script;
pub mod store;
pub mod token;

pub use action::{ActionRegistry, FailureAction, FailurePipeline, GuardContext};
pub use config::{ActionSpec, GuardConfig};
pub use engine::{FailureKind, TokenSource, ValidationFailure, ValidationMode, ValidationOutcome};
pub use error::{ActionError, GuardError, Result};
pub use filter::{CsrfGuardFilter, FilterDecision};
pub use guard::{CsrfGuard, CsrfGuardBuilder};
pub use intercept::InterceptRedirectResponse;
pub use loader::{ConfigLoader, FileFormat};
pub use log::{LogLevel, Logger, TracingLogger};
pub use matcher::{PathPattern, is_exempt, is_uri_match};
pub use script::{ScriptConfig, ScriptEndpoint};
pub use store::{PAGE_TOKENS_KEY, TokenSnapshot, TokenStore};
pub use token::{OsRandom, RandomSource, TokenGenerator};

pub use csrfguard_core::{HttpRequest, HttpResponse};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ActionSpec, GuardConfig};
    pub use crate::engine::{ValidationFailure, ValidationOutcome};
    pub use crate::error::{GuardError, Result};
    pub use crate::filter::{CsrfGuardFilter, FilterDecision};
    pub use crate::guard::CsrfGuard;
    pub use csrfguard_core::{HttpRequest, HttpResponse};
}
