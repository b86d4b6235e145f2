use crate::error::{GuardError, Result};
use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Source of cryptographically secure random bytes.
///
/// Implementations must report failure instead of falling back to a weaker
/// generator.
pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| GuardError::RandomSource(e.to_string()))
    }
}

/// Generates CSRF tokens as upper-case hex strings.
///
/// A token of `length` random bytes renders as `2 * length` characters,
/// safe to carry in URLs and form fields.
#[derive(Clone)]
pub struct TokenGenerator {
    source: Arc<dyn RandomSource>,
}

impl TokenGenerator {
    pub fn new(source: Arc<dyn RandomSource>) -> Self {
        Self { source }
    }

    /// Generate a new token from `length` random bytes
    pub fn generate(&self, length: usize) -> Result<String> {
        if length == 0 {
            return Err(GuardError::config("token length must be greater than zero"));
        }

        let mut bytes = vec![0u8; length];
        self.source.fill(&mut bytes)?;
        Ok(hex::encode_upper(bytes))
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(Arc::new(OsRandom))
    }
}

impl fmt::Debug for TokenGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGenerator").finish_non_exhaustive()
    }
}

/// Compare two tokens without short-circuiting on the first differing byte.
pub fn tokens_match(expected: &str, submitted: &str) -> bool {
    expected.as_bytes().ct_eq(submitted.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct BrokenSource;

    impl RandomSource for BrokenSource {
        fn fill(&self, _buf: &mut [u8]) -> Result<()> {
            Err(GuardError::RandomSource("entropy pool unavailable".to_string()))
        }
    }

    #[test]
    fn test_token_length_and_alphabet() {
        let token = TokenGenerator::default().generate(32).unwrap();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(TokenGenerator::default().generate(0).is_err());
    }

    #[test]
    fn test_broken_source_fails() {
        let generator = TokenGenerator::new(Arc::new(BrokenSource));
        assert!(matches!(
            generator.generate(16),
            Err(GuardError::RandomSource(_))
        ));
    }

    #[test]
    fn test_no_collisions() {
        let generator = TokenGenerator::default();
        let tokens: HashSet<String> = (0..1000).map(|_| generator.generate(16).unwrap()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("ABCDEF", "ABCDEF"));
        assert!(!tokens_match("ABCDEF", "ABCDEE"));
        assert!(!tokens_match("ABCDEF", "ABCDE"));
        assert!(!tokens_match("ABCDEF", ""));
    }
}
