//! In-memory queue implementation.
//!
//! Jobs and their results live in one process. This gives at-most-once
//! pickup (a job id leaves the ready deque under the lock, exactly once) but
//! no durability: results disappear with the process.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use super::{JobLease, JobQueue, JobRecord, JobState, QueueCounts, QueueError, ResultBackend, ResultRecord};
use crate::domain::{JobId, JobRequest, Outcome};
use crate::ports::{Clock, SystemClock};

const REVOKED_ON_CLOSE: &str = "job revoked: queue closed before a worker picked it up";

/// In-memory queue state.
#[derive(Default)]
struct InMemoryQueueState {
    /// All job records (single source of truth).
    records: HashMap<JobId, JobRecord>,

    /// Ready queue (JobIds only).
    ready: VecDeque<JobId>,

    closed: bool,
}

impl InMemoryQueueState {
    fn admit(&mut self, record: JobRecord) -> Result<(), QueueError> {
        if self.closed {
            return Err(QueueError::Closed);
        }
        let job_id = record.job_id();
        if self.records.contains_key(&job_id) {
            // ids come from the key generator; a repeat means a caller bug
            return Err(QueueError::Backend(format!("duplicate job id {job_id}")));
        }
        self.records.insert(job_id, record);
        Ok(())
    }

    fn counts_by_state(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state {
                JobState::Pending => counts.pending += 1,
                JobState::Running => counts.running += 1,
                JobState::Succeeded => counts.succeeded += 1,
                JobState::Failed => counts.failed += 1,
                JobState::Revoked => counts.revoked += 1,
            }
        }
        counts
    }
}

/// In-memory queue implementation.
pub struct InMemoryJobQueue {
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
    clock: Arc<dyn Clock>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryQueueState::default())),
            notify: Arc::new(Notify::new()),
            clock,
        }
    }

    /// Current record for `job_id` (any state).
    pub async fn get(&self, job_id: JobId) -> Option<JobRecord> {
        let state = self.state.lock().await;
        state.records.get(&job_id).cloned()
    }

    fn new_lease(&self, request: JobRequest) -> Box<dyn JobLease> {
        Box::new(InMemoryLease {
            request,
            queue: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        })
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, request: JobRequest) -> Result<(), QueueError> {
        let job_id = request.job_id;
        {
            let mut state = self.state.lock().await;
            state.admit(JobRecord::new(request, self.clock.now()))?;
            state.ready.push_back(job_id);
        }
        // Notify outside the lock
        self.notify.notify_one();
        debug!(%job_id, "job enqueued");
        Ok(())
    }

    async fn admit_claimed(&self, request: JobRequest) -> Result<Box<dyn JobLease>, QueueError> {
        let now = self.clock.now();
        let mut record = JobRecord::new(request.clone(), now);
        record.start(now)?;

        let mut state = self.state.lock().await;
        state.admit(record)?;
        drop(state);

        Ok(self.new_lease(request))
    }

    async fn lease(&self) -> Option<Box<dyn JobLease>> {
        loop {
            // Register interest before looking, so a close() between the
            // check and the await still wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                let now = self.clock.now();
                while let Some(job_id) = state.ready.pop_front() {
                    let Some(record) = state.records.get_mut(&job_id) else {
                        continue;
                    };
                    if record.start(now).is_err() {
                        continue;
                    }
                    let request = record.request.clone();
                    drop(state);
                    return Some(self.new_lease(request));
                }
            }

            notified.await;
        }
    }

    async fn close(&self) -> Result<usize, QueueError> {
        let revoked = {
            let mut state = self.state.lock().await;
            state.closed = true;
            let now = self.clock.now();
            let pending: Vec<JobId> = state.ready.drain(..).collect();
            let mut revoked = 0;
            for job_id in pending {
                if let Some(record) = state.records.get_mut(&job_id)
                    && record.revoke(REVOKED_ON_CLOSE, now).is_ok()
                {
                    revoked += 1;
                }
            }
            revoked
        };
        self.notify.notify_waiters();
        info!(revoked, "job queue closed");
        Ok(revoked)
    }

    async fn counts_by_state(&self) -> Result<QueueCounts, QueueError> {
        let state = self.state.lock().await;
        Ok(state.counts_by_state())
    }
}

#[async_trait]
impl ResultBackend for InMemoryJobQueue {
    async fn lookup(&self, job_id: JobId) -> Result<Option<ResultRecord>, QueueError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .get(&job_id)
            .and_then(JobRecord::result_record))
    }

    async fn was_issued(&self, job_id: JobId) -> Result<bool, QueueError> {
        let state = self.state.lock().await;
        Ok(state.records.contains_key(&job_id))
    }
}

/// Lease implementation for InMemoryJobQueue.
struct InMemoryLease {
    request: JobRequest,
    queue: Arc<Mutex<InMemoryQueueState>>,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl JobLease for InMemoryLease {
    fn request(&self) -> &JobRequest {
        &self.request
    }

    async fn complete(self: Box<Self>, outcome: Outcome) -> Result<(), QueueError> {
        let job_id = self.request.job_id;
        let mut state = self.queue.lock().await;
        let record = state
            .records
            .get_mut(&job_id)
            .ok_or(QueueError::UnknownJob(job_id))?;
        record.finish(outcome, self.clock.now())
    }
}
