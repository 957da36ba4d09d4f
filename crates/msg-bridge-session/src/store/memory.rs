//! In-memory credential store.

use std::sync::Mutex;

use async_trait::async_trait;
use msg_bridge_core::{CredentialStore, Credentials, StoreError};

/// In-memory store implementation.
///
/// Useful for development and tests. Data is lost on restart.
pub struct MemoryStore {
    credentials: Mutex<Option<Credentials>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            credentials: Mutex::new(None),
        }
    }

    /// Create a store pre-seeded with credentials.
    #[must_use]
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: Mutex::new(Some(credentials)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Option<Credentials>, StoreError> {
        Ok(self
            .credentials
            .lock()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        *self
            .credentials
            .lock()
            .map_err(|e| StoreError::Internal(e.to_string()))? = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self
            .credentials
            .lock()
            .map_err(|e| StoreError::Internal(e.to_string()))? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_load_is_none_not_error() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryStore::new();
        store.save(&Credentials::new(b"first".to_vec())).await.unwrap();
        store.save(&Credentials::new(b"second".to_vec())).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.as_bytes(), b"second");
    }

    #[tokio::test]
    async fn clear_discards_credentials() {
        let store = MemoryStore::with_credentials(Credentials::new(b"blob".to_vec()));
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
