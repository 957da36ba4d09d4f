//! Credential blob and the persistence contract it is stored through.

use async_trait::async_trait;
use thiserror::Error;

/// Opaque pairing material for one session identity.
///
/// The bridge never interprets the blob; it is handed back to the
/// transport verbatim on the next connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials(Vec<u8>);

impl Credentials {
    /// Wrap raw pairing material.
    #[must_use]
    pub fn new<B: Into<Vec<u8>>>(blob: B) -> Self {
        Self(blob.into())
    }

    /// Raw blob bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the raw blob.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Credential persistence error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store error: {0}")]
    Internal(String),
}

/// Durable key-value persistence for session credentials.
///
/// Survives process restarts. Each `save` fully supersedes prior stored
/// credentials for the same session identity; there is no partial merge.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load previously stored credentials.
    ///
    /// "No prior credentials" is a valid result (`Ok(None)`), not a
    /// failure.
    async fn load(&self) -> Result<Option<Credentials>, StoreError>;

    /// Durably persist credentials; last write wins.
    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError>;

    /// Discard stored credentials so the next connect pairs from scratch.
    async fn clear(&self) -> Result<(), StoreError>;
}
