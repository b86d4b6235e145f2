// Core library for CsrfGuard
// Request and response types consumed from the hosting server

pub mod error;
pub mod http;

// Re-export commonly used types
pub use error::*;
pub use http::*;
