//! Outcome model: the terminal result of one job execution.

use serde::{Deserialize, Serialize};

use super::errors::JobError;

/// What a worker reports back to the queue when it is done with a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success { result_url: String },
    Failure { reason: String },
}

impl Outcome {
    pub fn success(result_url: impl Into<String>) -> Self {
        Self::Success {
            result_url: result_url.into(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<String, JobError>> for Outcome {
    fn from(result: Result<String, JobError>) -> Self {
        match result {
            Ok(url) => Self::success(url),
            Err(err) => Self::failure(err.to_string()),
        }
    }
}
