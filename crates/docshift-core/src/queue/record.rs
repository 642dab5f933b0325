//! Job record: request + lifecycle state, and the persisted result layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{JobState, QueueError};
use crate::domain::{JobId, JobRequest, Outcome};

/// The queue's single source of truth for one job.
///
/// Design:
/// - Queue structures (ready deque) hold JobId only.
/// - All state transitions happen here and are checked; a rejected
///   transition leaves the record untouched.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub request: JobRequest,
    pub state: JobState,

    pub result_url: Option<String>,
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(request: JobRequest, now: DateTime<Utc>) -> Self {
        Self {
            request,
            state: JobState::Pending,
            result_url: None,
            error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.request.job_id
    }

    fn transition(&mut self, next: JobState) -> Result<(), QueueError> {
        if !self.state.can_transition_to(next) {
            return Err(QueueError::InvalidTransition {
                job_id: self.job_id(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Mark as running.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), QueueError> {
        self.transition(JobState::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Apply the worker's terminal outcome.
    pub fn finish(&mut self, outcome: Outcome, now: DateTime<Utc>) -> Result<(), QueueError> {
        match outcome {
            Outcome::Success { result_url } => {
                self.transition(JobState::Succeeded)?;
                self.result_url = Some(result_url);
            }
            Outcome::Failure { reason } => {
                self.transition(JobState::Failed)?;
                self.error = Some(reason);
            }
        }
        self.finished_at = Some(now);
        Ok(())
    }

    /// Drop a job nobody picked up.
    pub fn revoke(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<(), QueueError> {
        self.transition(JobState::Revoked)?;
        self.error = Some(reason.into());
        self.finished_at = Some(now);
        Ok(())
    }

    /// The persisted result, once there is one.
    pub fn result_record(&self) -> Option<ResultRecord> {
        if !self.state.is_terminal() {
            return None;
        }
        Some(ResultRecord {
            id: self.job_id(),
            state: self.state.as_wire_str().to_string(),
            result_url: self.result_url.clone(),
            error_message: self.error.clone(),
            created_at: self.created_at,
            finished_at: self.finished_at,
        })
    }
}

/// Terminal result as a result back-end stores it.
///
/// `state` is kept as a string: a back-end shared with other producers may
/// hold states this crate does not model, and the status resolver passes
/// those through instead of hiding them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: JobId,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}
