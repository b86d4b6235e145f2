//! Failure actions
//!
//! Reactions run, in configured order, when a request fails validation.
//! Each action is built from an [`ActionSpec`](crate::config::ActionSpec)
//! by the [`ActionRegistry`] and driven by the [`FailurePipeline`].
//!
//! ## Built-in kinds
//!
//! | Kind | Parameters | Effect |
//! |------|------------|--------|
//! | `Log` | `Message` (optional) | Logs the rendered template at `Error` |
//! | `Redirect` | `Page` | Redirects the client |
//! | `Error` | `Code`, `Message` (optional) | Sends an error status |
//! | `Empty` | | Blocks without writing a response |
//! | `Invalidate` | | Ends the session |
//! | `Rotate` | | Issues fresh tokens for the session |
//! | `SessionAttribute` | `AttributeName` | Stores the failure in the session |

mod empty;
mod error;
mod invalidate;
mod log;
mod pipeline;
mod redirect;
mod registry;
mod rotate;
mod session_attribute;

pub use empty::EmptyAction;
pub use error::ErrorAction;
pub use invalidate::InvalidateAction;
pub use log::{DEFAULT_LOG_MESSAGE, LogAction};
pub use pipeline::FailurePipeline;
pub use redirect::RedirectAction;
pub use registry::{ActionFactory, ActionRegistry};
pub use rotate::RotateAction;
pub use session_attribute::SessionAttributeAction;

use crate::config::GuardConfig;
use crate::engine::ValidationFailure;
use crate::error::ActionError;
use crate::log::Logger;
use crate::store::TokenStore;
use async_trait::async_trait;
use csrfguard_core::{HttpRequest, HttpResponse};
use csrfguard_session::SessionStore;
use std::sync::Arc;

/// Guard state handed to failure actions
#[derive(Clone, Copy)]
pub struct GuardContext<'a> {
    pub config: &'a GuardConfig,
    pub tokens: &'a TokenStore,
    pub logger: &'a dyn Logger,
}

impl<'a> GuardContext<'a> {
    pub fn new(config: &'a GuardConfig, tokens: &'a TokenStore, logger: &'a dyn Logger) -> Self {
        Self {
            config,
            tokens,
            logger,
        }
    }

    pub fn sessions(&self) -> &'a Arc<dyn SessionStore> {
        self.tokens.sessions()
    }
}

/// Reaction to a failed validation.
///
/// Implementations hold only their own configuration; everything about the
/// request arrives through `execute`.
#[async_trait]
pub trait FailureAction: Send + Sync {
    /// Configured name, used in log output
    fn name(&self) -> &str;

    async fn execute(
        &self,
        request: &HttpRequest,
        response: &mut HttpResponse,
        failure: &ValidationFailure,
        context: &GuardContext<'_>,
    ) -> Result<(), ActionError>;
}
