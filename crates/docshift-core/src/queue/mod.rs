//! Queue module: job state machine, result records, and the in-memory queue.

mod memory;
mod record;
mod state;

pub use memory::InMemoryJobQueue;
pub use record::{JobRecord, ResultRecord};
pub use state::JobState;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{JobId, JobRequest, Outcome};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job {job_id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        job_id: JobId,
        from: JobState,
        to: JobState,
    },

    #[error("unknown job {0}")]
    UnknownJob(JobId),

    #[error("queue is closed")]
    Closed,

    #[error("result backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub revoked: usize,
}

impl QueueCounts {
    pub fn terminal(&self) -> usize {
        self.succeeded + self.failed + self.revoked
    }
}

/// A leased job.
/// The worker owns this lease and must `complete` it exactly once.
///
/// Design intent:
/// - Queue manages state transitions (Pending -> Running -> terminal).
/// - Worker executes side effects and reports the outcome.
#[async_trait]
pub trait JobLease: Send {
    fn request(&self) -> &JobRequest;

    /// Record the terminal outcome.
    async fn complete(self: Box<Self>, outcome: Outcome) -> Result<(), QueueError>;
}

/// Queue port (interface).
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Admit a job; a worker will pick it up later.
    async fn enqueue(&self, request: JobRequest) -> Result<(), QueueError>;

    /// Admit a job that the caller runs itself (inline execution).
    /// The returned lease is already in the Running state.
    async fn admit_claimed(&self, request: JobRequest) -> Result<Box<dyn JobLease>, QueueError>;

    /// Lease one pending job. Waits until one is available; `None` once the
    /// queue is closed.
    async fn lease(&self) -> Option<Box<dyn JobLease>>;

    /// Stop handing out work. Jobs still pending are revoked.
    async fn close(&self) -> Result<usize, QueueError>;

    async fn counts_by_state(&self) -> Result<QueueCounts, QueueError>;
}

/// Read side of the queue: where terminal results live.
#[async_trait]
pub trait ResultBackend: Send + Sync {
    /// Terminal result for `job_id`, or `None` while there is none yet.
    async fn lookup(&self, job_id: JobId) -> Result<Option<ResultRecord>, QueueError>;

    /// Whether this back-end ever admitted `job_id`.
    async fn was_issued(&self, job_id: JobId) -> Result<bool, QueueError>;
}
