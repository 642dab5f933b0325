//! Errors - エラー型と分類
//!
//! - [`InputError`]: rejected at intake, never becomes a job
//! - [`JobError`]: terminal failure of one job; its `Display` text is what
//!   the status resolver shows to pollers
//! - [`TimeoutError`]: soft/hard execution limits

use std::time::Duration;

use thiserror::Error;

use crate::ports::{ConversionError, StoreError};

/// Which execution limit a job ran into.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeoutError {
    /// The soft limit elapsed; the job stopped after its in-flight step.
    #[error("time limit exceeded: soft limit of {limit:?}")]
    Soft { limit: Duration },

    /// The hard limit elapsed; execution was cancelled mid-step.
    #[error("time limit exceeded: hard limit of {limit:?}, execution terminated")]
    Hard { limit: Duration },
}

/// Terminal failure of a job.
///
/// Each pipeline step maps its error into its own variant so the recorded
/// message says where the job died.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to download input {key}: {source}")]
    Download {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("conversion failed: {0}")]
    Convert(#[from] ConversionError),

    #[error("failed to upload output {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to sign result url for {key}: {source}")]
    Sign {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("worker crashed while executing job: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Submission rejected before a job exists.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no filename provided")]
    MissingFilename,

    #[error("only {expected} files are supported, got {filename:?}")]
    UnsupportedExtension { filename: String, expected: String },

    #[error("failed to store uploaded input: {0}")]
    Upload(#[source] StoreError),

    #[error("failed to enqueue job: {0}")]
    Enqueue(#[from] crate::queue::QueueError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_messages_name_the_limit() {
        let soft = JobError::from(TimeoutError::Soft {
            limit: Duration::from_secs(300),
        });
        let hard = JobError::from(TimeoutError::Hard {
            limit: Duration::from_secs(360),
        });

        assert_eq!(soft.to_string(), "time limit exceeded: soft limit of 300s");
        assert!(hard.to_string().contains("hard limit of 360s"));
        assert!(soft.is_timeout() && hard.is_timeout());
    }

    #[test]
    fn conversion_failures_read_differently_from_timeouts() {
        let err = JobError::from(ConversionError::Status {
            status: 500,
            body: "boom".to_string(),
        });

        let msg = err.to_string();
        assert!(msg.starts_with("conversion failed:"));
        assert!(msg.contains("500"));
        assert!(!msg.contains("time limit"));
        assert!(!err.is_timeout());
    }

    #[test]
    fn download_failure_keeps_the_cause() {
        let err = JobError::Download {
            key: "abc.pptx".to_string(),
            source: StoreError::NotFound("abc.pptx".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "failed to download input abc.pptx: object not found: abc.pptx"
        );
    }
}
