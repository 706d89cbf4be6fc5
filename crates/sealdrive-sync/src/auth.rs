//! Turning a caller credential into an owner

use std::collections::HashMap;

use sealdrive_core::config::AuthConfig;
use sealdrive_core::{OwnerId, SealError, SealResult};

pub trait SessionValidator: Send + Sync {
    /// The owner `credential` authenticates as, or [`SealError::Unauthenticated`].
    fn validate(&self, credential: &str) -> SealResult<OwnerId>;
}

/// Validator over a fixed token table, as configured under `[[auth.tokens]]`.
#[derive(Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, OwnerId>,
}

impl std::fmt::Debug for StaticTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenValidator")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}

impl StaticTokenValidator {
    pub fn new(tokens: impl IntoIterator<Item = (String, OwnerId)>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(auth.tokens.iter().map(|t| (t.token.clone(), t.owner)))
    }
}

impl SessionValidator for StaticTokenValidator {
    fn validate(&self, credential: &str) -> SealResult<OwnerId> {
        let credential = credential.trim();
        let credential = credential.strip_prefix("Bearer ").unwrap_or(credential);
        if credential.is_empty() {
            return Err(SealError::Unauthenticated);
        }
        self.tokens
            .get(credential)
            .copied()
            .ok_or(SealError::Unauthenticated)
    }
}
