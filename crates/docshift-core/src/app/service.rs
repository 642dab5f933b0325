//! ConversionService - submission and status behind one API
//!
//! `submit` is the same call for both execution strategies:
//! - **Deferred**: the job is queued and `submit` returns at once
//! - **Inline**: the caller's task runs the pipeline, so the job is already
//!   terminal when `submit` returns

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::pipeline::ConversionPipeline;
use super::status::{JobStatus, StatusError, StatusResolver};
use super::worker_pool::run_leased;
use crate::domain::{JobId, JobRequest};
use crate::ports::KeyGenerator;
use crate::queue::{JobQueue, QueueError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// Run in the submitting task.
    Inline,
    /// Hand off to the worker pool.
    #[default]
    Deferred,
}

pub struct ConversionService {
    queue: Arc<dyn JobQueue>,
    pipeline: Arc<ConversionPipeline>,
    keys: Arc<dyn KeyGenerator>,
    status: StatusResolver,
    strategy: ExecutionStrategy,
}

impl ConversionService {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        pipeline: Arc<ConversionPipeline>,
        keys: Arc<dyn KeyGenerator>,
        status: StatusResolver,
        strategy: ExecutionStrategy,
    ) -> Self {
        Self {
            queue,
            pipeline,
            keys,
            status,
            strategy,
        }
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    /// Admit a conversion of the object at `input_key`.
    pub async fn submit(
        &self,
        input_key: impl Into<String>,
        base_name: Option<String>,
    ) -> Result<JobId, QueueError> {
        let job_id = self.keys.new_job_id();
        let request = JobRequest::new(job_id, input_key, base_name);
        info!(%job_id, input_key = %request.input_key, strategy = ?self.strategy, "job submitted");

        match self.strategy {
            ExecutionStrategy::Deferred => self.queue.enqueue(request).await?,
            ExecutionStrategy::Inline => {
                let lease = self.queue.admit_claimed(request).await?;
                run_leased(&self.pipeline, lease).await;
            }
        }
        Ok(job_id)
    }

    pub async fn status(&self, raw_job_id: &str) -> Result<JobStatus, StatusError> {
        self.status.resolve(raw_job_id).await
    }
}
