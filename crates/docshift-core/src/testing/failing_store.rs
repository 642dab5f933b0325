//! Store wrapper that fails one kind of operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::impls::InMemoryObjectStore;
use crate::ports::{ObjectEntry, ObjectStore, StoreError};

/// Operation a [`FailingStore`] rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Put,
    Delete,
    List,
    Sign,
}

/// Delegates to an [`InMemoryObjectStore`] except for `fail_on`, which
/// returns `StoreError::Backend`.
pub struct FailingStore {
    inner: Arc<InMemoryObjectStore>,
    fail_on: StoreOp,
    failures: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Arc<InMemoryObjectStore>, fail_on: StoreOp) -> Self {
        Self {
            inner,
            fail_on,
            failures: AtomicUsize::new(0),
        }
    }

    /// How many operations were rejected.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        if op == self.fail_on {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Backend(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.check(StoreOp::Put)?;
        self.inner.put(key, bytes).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.check(StoreOp::Get)?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check(StoreOp::Delete)?;
        self.inner.delete(key).await
    }

    async fn list(&self) -> Result<Vec<ObjectEntry>, StoreError> {
        self.check(StoreOp::List)?;
        self.inner.list().await
    }

    async fn signed_url(
        &self,
        key: &str,
        ttl: Duration,
        download_name: Option<&str>,
    ) -> Result<String, StoreError> {
        self.check(StoreOp::Sign)?;
        self.inner.signed_url(key, ttl, download_name).await
    }
}
