//! InMemoryObjectStore - テスト・ローカル開発用
//!
//! Objects live in a map behind a tokio mutex. `last_modified` comes from the
//! injected clock so retention tests can age objects without sleeping.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::UrlSigner;
use crate::ports::{Clock, ObjectEntry, ObjectStore, StoreError, SystemClock, validate_key};

const MEMORY_BASE_URL: &str = "memory://objects";

struct StoredObject {
    bytes: Vec<u8>,
    last_modified: DateTime<Utc>,
}

pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    clock: Arc<dyn Clock>,
    signer: UrlSigner,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            clock,
            signer: UrlSigner::new(MEMORY_BASE_URL, "in-memory"),
        }
    }

    /// Replace the URL signer (base URL and secret).
    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = signer;
        self
    }

    /// Store `bytes` with an explicit modification time.
    pub async fn put_at(
        &self,
        key: &str,
        bytes: Vec<u8>,
        last_modified: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        validate_key(key)?;
        let mut objects = self.objects.lock().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                last_modified,
            },
        );
        Ok(())
    }

    /// Sorted list of stored keys.
    pub async fn keys(&self) -> Vec<String> {
        let objects = self.objects.lock().await;
        objects.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.put_at(key, bytes, self.clock.now()).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let objects = self.objects.lock().await;
        objects
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut objects = self.objects.lock().await;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list(&self) -> Result<Vec<ObjectEntry>, StoreError> {
        let objects = self.objects.lock().await;
        Ok(objects
            .iter()
            .map(|(key, o)| ObjectEntry {
                key: key.clone(),
                size: o.bytes.len() as u64,
                last_modified: o.last_modified,
            })
            .collect())
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
