use sha2::{Digest, Sha256};

use crate::config::ConfigLoader;

/// Holds a token taken from configuration and derives a signature from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Builder {
    token: String,
}

impl Builder {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// `None` when `key` is absent from the loader.
    pub fn from_config(config: &ConfigLoader, key: &str) -> Option<Self> {
        config.get(key).map(Self::new)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Lowercase hex SHA-256 of the token. Not a MAC; anyone holding the token
    /// can reproduce it.
    pub fn sign(&self) -> String {
        hex::encode(Sha256::digest(self.token.as_bytes()))
    }
}
