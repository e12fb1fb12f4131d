//! Session nonce used to trust shell-reported data
//!
//! The host injects the nonce into the shell's environment when it launches
//! the integration script. Sequences that can change what the terminal
//! believes was executed (`E`, `EnvJson`, `EnvSingle*`) echo it back; output
//! from an untrusted program cannot know it.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Per-session shell integration secret
#[derive(Clone)]
pub struct Nonce {
    secret: Zeroizing<String>,
}

impl Nonce {
    /// Wrap an existing secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }

    /// Generate a random secret
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Secret value, for exporting to the shell environment
    pub fn as_str(&self) -> &str {
        &self.secret
    }

    /// Whether a sequence argument carries this session's nonce
    ///
    /// A missing argument is never trusted.
    pub fn is_trusted(&self, candidate: Option<&str>) -> bool {
        match candidate {
            Some(candidate) => bool::from(self.secret.as_bytes().ct_eq(candidate.as_bytes())),
            None => false,
        }
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce(<redacted>)")
    }
}
