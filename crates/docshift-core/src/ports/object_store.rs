//! ObjectStore port - Blob ストレージ（S3/Local/InMemory）
//!
//! The store holds both uploaded inputs and converted outputs. The core does
//! not tell them apart structurally; only the key naming convention does.
//!
//! # 実装
//! - [`crate::impls::InMemoryObjectStore`]: tests and local development
//! - [`crate::impls::LocalObjectStore`]: a directory on disk

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One stored object as reported by [`ObjectStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Durable byte storage keyed by string identifiers.
///
/// # 設計原則
/// - `put` は原子的（途中まで書かれたオブジェクトは見えない）
/// - `list` は last-modified 付きの全件スキャン
/// - 全操作が transport/service エラーで失敗しうる
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn list(&self) -> Result<Vec<ObjectEntry>, StoreError>;

    /// Time-limited retrieval URL. When `download_name` is given, fetching
    /// the URL should suggest it as the saved filename.
    async fn signed_url(
        &self,
        key: &str,
        ttl: Duration,
        download_name: Option<&str>,
    ) -> Result<String, StoreError>;
}

/// Rejects keys that could escape a storage namespace.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '\0') || c.is_whitespace() || c.is_control());
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// `Content-Disposition` value that suggests `name` as the download filename.
pub fn attachment_disposition(name: &str) -> String {
    let escaped: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if c == '"' { '\'' } else { c })
        .collect();
    format!("attachment; filename=\"{escaped}\"")
}
