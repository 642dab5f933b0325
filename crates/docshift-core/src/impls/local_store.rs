//! LocalObjectStore - ディレクトリを 1 バケットとして扱う
//!
//! Each key is one file directly under `root`. Writes go to a hidden
//! `.upload-*` temp file in the same directory and are renamed into place,
//! so readers and `list` never see a partial object.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::UrlSigner;
use crate::ports::{Clock, ObjectEntry, ObjectStore, StoreError, SystemClock, validate_key};

pub struct LocalObjectStore {
    root: PathBuf,
    signer: UrlSigner,
    clock: Arc<dyn Clock>,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, signer: UrlSigner) -> Self {
        Self {
            root: root.into(),
            signer,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn not_found_as(key: &str) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |err| {
        if err.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(key.to_string())
        } else {
            StoreError::Io(err)
        }
    }
}

fn write_atomically(root: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    std::fs::create_dir_all(root)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(root)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let root = self.root.clone();
        let size = bytes.len();
        tokio::task::spawn_blocking(move || write_atomically(&root, &path, &bytes))
            .await
            .map_err(|e| StoreError::Backend(format!("write task failed: {e}")))??;
        debug!(key, size, "object written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(not_found_as(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::remove_file(&path).await.map_err(not_found_as(key))
    }

    async fn list(&self) -> Result<Vec<ObjectEntry>, StoreError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let Ok(key) = entry.file_name().into_string() else {
                continue;
            };
            // temp files and anything else hidden are not objects
            if key.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            entries.push(ObjectEntry {
                key,
                size: metadata.len(),
                last_modified: DateTime::<Utc>::from(metadata.modified()?),
            });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn signed_url(
        &self,
        key: &str,
        ttl: Duration,
        download_name: Option<&str>,
    ) -> Result<String, StoreError> {
        validate_key(key)?;
        Ok(self.signer.sign(key, ttl, download_name, self.clock.now()))
    }
}
