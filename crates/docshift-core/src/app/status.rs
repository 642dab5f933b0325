//! Status - ジョブ ID から利用者向けステータスへの変換
//!
//! | stored state          | status                     |
//! |-----------------------|----------------------------|
//! | (no result yet)       | `processing`               |
//! | `PENDING`             | `processing`               |
//! | `SUCCESS`             | `done` + `resultUrl`       |
//! | `FAILURE`, `REVOKED`  | `error` + `error`          |
//! | anything else         | the state, lower-cased     |
//!
//! Resolution is read-only, so polling the same id after it reached a
//! terminal state always returns the same answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::JobId;
use crate::queue::{QueueError, ResultBackend, ResultRecord};

/// What to report for ids the back-end has no record of.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownJobPolicy {
    /// Report `processing`, indistinguishable from a queued job.
    #[default]
    Processing,
    /// Report `not_found` for ids that were never issued or do not parse.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "StatusBody")]
pub enum JobStatus {
    Processing,
    Done { result_url: String },
    Error { message: String },
    NotFound,
    /// A state this resolver has no mapping for, passed through lower-cased.
    Other(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Processing => "processing",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
            Self::NotFound => "not_found",
            Self::Other(state) => state,
        }
    }

    fn from_record(record: ResultRecord) -> Self {
        match record.state.as_str() {
            "PENDING" => Self::Processing,
            "SUCCESS" => match record.result_url {
                Some(result_url) => Self::Done { result_url },
                None => Self::Error {
                    message: "job succeeded without a result url".to_string(),
                },
            },
            "FAILURE" | "REVOKED" => Self::Error {
                message: record
                    .error_message
                    .unwrap_or_else(|| format!("job {}", record.state.to_lowercase())),
            },
            other => Self::Other(other.to_lowercase()),
        }
    }
}

/// Wire shape: `{"status": .., "resultUrl"?: .., "error"?: ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobStatus> for StatusBody {
    fn from(status: JobStatus) -> Self {
        let label = status.label().to_string();
        let (result_url, error) = match status {
            JobStatus::Done { result_url } => (Some(result_url), None),
            JobStatus::Error { message } => (None, Some(message)),
            _ => (None, None),
        };
        Self {
            status: label,
            result_url,
            error,
        }
    }
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status lookup failed: {0}")]
    Backend(#[from] QueueError),
}

/// Maps job ids to [`JobStatus`] using a result back-end.
pub struct StatusResolver {
    backend: Arc<dyn ResultBackend>,
    policy: UnknownJobPolicy,
}

impl StatusResolver {
    pub fn new(backend: Arc<dyn ResultBackend>, policy: UnknownJobPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> UnknownJobPolicy {
        self.policy
    }

    /// Resolve a caller-supplied id string.
    pub async fn resolve(&self, raw_id: &str) -> Result<JobStatus, StatusError> {
        match raw_id.parse::<JobId>() {
            Ok(job_id) => self.resolve_id(job_id).await,
            Err(err) => {
                debug!(raw_id, error = %err, "status requested for malformed job id");
                Ok(self.unknown())
            }
        }
    }

    pub async fn resolve_id(&self, job_id: JobId) -> Result<JobStatus, StatusError> {
        if let Some(record) = self.backend.lookup(job_id).await? {
            return Ok(JobStatus::from_record(record));
        }
        if self.policy == UnknownJobPolicy::NotFound && !self.backend.was_issued(job_id).await? {
            return Ok(JobStatus::NotFound);
        }
        Ok(JobStatus::Processing)
    }

    fn unknown(&self) -> JobStatus {
        match self.policy {
            UnknownJobPolicy::Processing => JobStatus::Processing,
            UnknownJobPolicy::NotFound => JobStatus::NotFound,
        }
    }
}
