// Error types for host request/response handling

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Response already committed, cannot {0}")]
    ResponseCommitted(&'static str),

    #[error("Invalid status code: {0}")]
    InvalidStatus(u16),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from writing to an already committed response
    pub fn is_committed(&self) -> bool {
        matches!(self, Error::ResponseCommitted(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
