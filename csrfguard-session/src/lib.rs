//! Session contract for CsrfGuard.
//!
//! The guard keeps its tokens in the host's session. This crate defines the
//! session shape and the [`SessionStore`] contract the guard consumes, plus an
//! in-memory backend suitable for single-instance deployments and tests.
//!
//! # Examples
//!
//! ```
//! use csrfguard_session::*;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), SessionError> {
//! let store = MemorySessionStore::new(SessionConfig::default())?;
//!
//! // Create a new session
//! let session = store.create(None).await?;
//! assert!(session.is_new);
//!
//! // Attributes are written one key at a time
//! store.set_attribute(&session.id, "user_id", json!(123)).await?;
//! assert_eq!(
//!     store.get_attribute(&session.id, "user_id").await?,
//!     Some(json!(123))
//! );
//!
//! // Delete session (logout)
//! store.delete(&session.id).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod traits;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use memory::MemorySessionStore;
pub use traits::{Session, SessionStore, generate_session_id};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::memory::MemorySessionStore;
    pub use crate::traits::{Session, SessionStore, generate_session_id};
}
