//! Session configuration.

use crate::error::{SessionError, SessionResult};
use std::time::Duration;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default session TTL
    pub default_ttl: Duration,
    /// Maximum session TTL (for security)
    pub max_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(1800), // 30 minutes
            max_ttl: Duration::from_secs(86400), // 1 day
        }
    }
}

impl SessionConfig {
    /// Create a session configuration with the given default TTL.
    ///
    /// # Examples
    ///
    /// ```
    /// use csrfguard_session::SessionConfig;
    /// use std::time::Duration;
    ///
    /// let config = SessionConfig::new(Duration::from_secs(600)).unwrap();
    /// assert_eq!(config.default_ttl, Duration::from_secs(600));
    /// ```
    pub fn new(default_ttl: Duration) -> SessionResult<Self> {
        let config = Self {
            default_ttl,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the default session TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the maximum session TTL.
    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    /// Check TTL bounds.
    pub fn validate(&self) -> SessionResult<()> {
        if self.default_ttl.is_zero() {
            return Err(SessionError::Config(
                "default TTL must be greater than zero".to_string(),
            ));
        }
        if self.default_ttl > self.max_ttl {
            return Err(SessionError::Config(format!(
                "default TTL {:?} exceeds maximum TTL {:?}",
                self.default_ttl, self.max_ttl
            )));
        }
        Ok(())
    }

    /// Clamp a requested TTL to the configured maximum.
    pub fn effective_ttl(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.default_ttl).min(self.max_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(SessionConfig::new(Duration::ZERO).is_err());
    }

    #[test]
    fn test_default_above_max_rejected() {
        let config = SessionConfig::default()
            .with_max_ttl(Duration::from_secs(10))
            .with_default_ttl(Duration::from_secs(20));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_ttl_clamped() {
        let config = SessionConfig::default().with_max_ttl(Duration::from_secs(60));
        assert_eq!(
            config.effective_ttl(Some(Duration::from_secs(3600))),
            Duration::from_secs(60)
        );
        assert_eq!(config.effective_ttl(None), Duration::from_secs(60));
    }
}
