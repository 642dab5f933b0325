//! Job request: what a worker needs to run one conversion.

use serde::{Deserialize, Serialize};

use super::ids::JobId;

/// The immutable part of a job, handed to whichever worker picks it up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_id: JobId,

    /// Store key of the uploaded source file.
    pub input_key: String,

    /// Original filename without extension, if the caller gave one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
}

impl JobRequest {
    pub fn new(job_id: JobId, input_key: impl Into<String>, base_name: Option<String>) -> Self {
        Self {
            job_id,
            input_key: input_key.into(),
            base_name: base_name.filter(|b| !b.trim().is_empty()),
        }
    }

    /// Filename suggested to whoever downloads the result.
    pub fn download_name(&self, extension: &str) -> Option<String> {
        self.base_name
            .as_ref()
            .map(|base| format!("{base}.{}", extension.trim_start_matches('.')))
    }
}
