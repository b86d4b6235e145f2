use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session expired: {0}")]
    Expired(String),

    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("session configuration error: {0}")]
    Config(String),

    /// Failure reported by a storage backend
    #[error("session backend error: {0}")]
    Backend(String),
}

impl SessionError {
    /// Whether the session is gone (never existed or expired).
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Expired(_))
    }
}
