use csrfguard_session::SessionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CsrfGuard expects the token to exist in session {session_id} at this point")]
    MissingMasterToken { session_id: String },

    #[error("Request is not bound to a session")]
    MissingSession,

    #[error("Unable to generate the random token: {0}")]
    RandomSource(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Response error: {0}")]
    Response(#[from] csrfguard_core::Error),

    #[error("Corrupt token state in session: {0}")]
    CorruptState(String),
}

impl GuardError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the guard was wired up incorrectly
    pub fn is_integration_error(&self) -> bool {
        matches!(self, Self::MissingMasterToken { .. } | Self::MissingSession)
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;

/// Failure of a single failure action. Logged by the pipeline, never
/// returned to the host.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Response error: {0}")]
    Response(#[from] csrfguard_core::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("Request is not bound to a session")]
    NoSession,

    #[error("{0}")]
    Other(String),
}
