//! Filesystem credential store.

use std::path::PathBuf;

use async_trait::async_trait;
use msg_bridge_core::{CredentialStore, Credentials, StoreError};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const CREDENTIALS_FILE: &str = "credentials.bin";
const CREDENTIALS_TMP: &str = "credentials.bin.tmp";

/// Store that keeps the credential blob under a persistence root.
///
/// Writes go through a temp file, fsync, and rename, so a crash mid-save
/// leaves either the old blob or the new one, never a torn write.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`. The directory is created lazily
    /// on first save.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self) -> PathBuf {
        self.root.join(CREDENTIALS_FILE)
    }
}

#[async_trait]
impl CredentialStore for FsStore {
    async fn load(&self) -> Result<Option<Credentials>, StoreError> {
        match fs::read(self.blob_path()).await {
            Ok(blob) => Ok(Some(Credentials::new(blob))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).await?;

        let tmp = self.root.join(CREDENTIALS_TMP);
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(credentials.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp, self.blob_path()).await?;

        // The rename is durable only once the directory entry is synced.
        #[cfg(unix)]
        fs::File::open(&self.root).await?.sync_all().await?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(self.blob_path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
