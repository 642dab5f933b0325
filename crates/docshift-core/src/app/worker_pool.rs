use std::any::Any;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::pipeline::ConversionPipeline;
use crate::domain::{JobError, JobRequest, Outcome};
use crate::queue::{JobLease, JobQueue};

/// Worker pool handle.
/// - `request_shutdown()` で新しい lease の取得を止める（実行中のジョブは最後まで走る）
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, queue: Arc<dyn JobQueue>, pipeline: Arc<ConversionPipeline>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let p = Arc::clone(&pipeline);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, p, &mut rx).await;
            });
            joins.push(join);
        }
        info!(workers = n, "worker pool started");

        Self { shutdown_tx, joins }
    }

    pub fn size(&self) -> usize {
        self.joins.len()
    }

    /// Request shutdown for all workers.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
        info!("worker pool stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn JobQueue>,
    pipeline: Arc<ConversionPipeline>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease は待つので shutdown と競合させる
        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                // pool handle dropped without shutdown: nobody can stop us later
                if changed.is_err() {
                    debug!(worker_id, "pool handle dropped, worker exiting");
                    break;
                }
                continue;
            }
            lease = queue.lease() => lease,
        };

        let Some(lease) = lease else {
            debug!(worker_id, "queue closed, worker exiting");
            break;
        };

        run_leased(&pipeline, lease).await;
    }
}

/// Execute one leased job and record its outcome on the lease.
pub(crate) async fn run_leased(pipeline: &Arc<ConversionPipeline>, lease: Box<dyn JobLease>) {
    let request = lease.request().clone();
    let job_id = request.job_id;
    let outcome = execute_isolated(pipeline, request).await;

    if let Err(err) = lease.complete(outcome).await {
        error!(%job_id, error = %err, "failed to record job outcome");
    }
}

/// Runs the pipeline in its own task so a panic becomes a failed job
/// instead of taking the worker down with it.
async fn execute_isolated(pipeline: &Arc<ConversionPipeline>, request: JobRequest) -> Outcome {
    let pipeline = Arc::clone(pipeline);
    let job_id = request.job_id;
    let handle = tokio::spawn(async move { pipeline.execute(&request).await });

    match handle.await {
        Ok(outcome) => outcome,
        Err(join_err) => {
            let reason = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                "execution cancelled".to_string()
            };
            error!(%job_id, reason, "job execution crashed");
            Outcome::from(Err::<String, _>(JobError::Panicked(reason)))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::PipelineSettings;
    use crate::domain::JobId;
    use crate::impls::InMemoryObjectStore;
    use crate::ports::{ObjectStore, SystemClock, UlidKeyGenerator};
    use crate::queue::{InMemoryJobQueue, JobState, ResultBackend};
    use crate::testing::MockConverter;
    use std::time::Duration;
    use ulid::Ulid;

    async fn setup(
        converter: MockConverter,
    ) -> (Arc<InMemoryJobQueue>, Arc<ConversionPipeline>, Arc<InMemoryObjectStore>) {
        let store = Arc::new(InMemoryObjectStore::new());
        store.put("in.pptx", b"PK\x03\x04".to_vec()).await.unwrap();
        let pipeline = Arc::new(ConversionPipeline::new(
            store.clone(),
            Arc::new(converter),
            Arc::new(UlidKeyGenerator::new(SystemClock)),
            PipelineSettings::default(),
        ));
        (Arc::new(InMemoryJobQueue::new()), pipeline, store)
    }

    fn request() -> JobRequest {
        JobRequest::new(JobId::from_ulid(Ulid::new()), "in.pptx", None)
    }

    async fn wait_terminal(queue: &InMemoryJobQueue, job_id: JobId) -> JobState {
        for _ in 0..200 {
            if let Some(record) = queue.get(job_id).await
                && record.state.is_terminal()
            {
                return record.state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never finished");
    }

    #[tokio::test]
    async fn workers_drain_the_queue() {
        let (queue, pipeline, _store) = setup(MockConverter::returning(b"%PDF".to_vec())).await;
        let pool = WorkerPool::spawn(2, queue.clone(), pipeline);
        assert_eq!(pool.size(), 2);

        let ids: Vec<_> = (0..5).map(|_| request()).collect();
        for req in &ids {
            queue.enqueue(req.clone()).await.unwrap();
        }
        for req in &ids {
            assert_eq!(wait_terminal(&queue, req.job_id).await, JobState::Succeeded);
        }

        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn panic_is_recorded_as_failure_and_worker_survives() {
        let (queue, pipeline, _store) = setup(MockConverter::panicking()).await;
        let pool = WorkerPool::spawn(1, queue.clone(), pipeline);

        let first = request();
        let second = request();
        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        assert_eq!(wait_terminal(&queue, first.job_id).await, JobState::Failed);
        // the single worker is still alive to take the second job
        assert_eq!(wait_terminal(&queue, second.job_id).await, JobState::Failed);

        let result = queue.lookup(first.job_id).await.unwrap().unwrap();
        let message = result.error_message.unwrap();
        assert!(message.contains("worker crashed"), "{message}");
        assert!(message.contains("mock converter panicked"), "{message}");

        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn shutdown_lets_in_flight_job_finish() {
        let converter =
            MockConverter::returning(b"%PDF".to_vec()).with_delay(Duration::from_millis(200));
        let (queue, pipeline, _store) = setup(converter).await;
        let pool = WorkerPool::spawn(1, queue.clone(), pipeline);

        let req = request();
        queue.enqueue(req.clone()).await.unwrap();
        // let the worker pick it up
        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.shutdown_and_join().await;
        let record = queue.get(req.job_id).await.unwrap();
        assert_eq!(record.state, JobState::Succeeded);
    }

    #[tokio::test]
    async fn idle_workers_stop_on_shutdown() {
        let (queue, pipeline, _store) = setup(MockConverter::returning(b"x".to_vec())).await;
        let pool = WorkerPool::spawn(3, queue, pipeline);

        tokio::time::timeout(Duration::from_secs(1), pool.shutdown_and_join())
            .await
            .expect("workers did not stop");
    }

    #[tokio::test]
    async fn workers_exit_when_queue_closes() {
        let (queue, pipeline, _store) = setup(MockConverter::returning(b"x".to_vec())).await;
        let pool = WorkerPool::spawn(2, queue.clone(), pipeline);

        queue.close().await.unwrap();
        let joins = pool.joins;
        for j in joins {
            tokio::time::timeout(Duration::from_secs(1), j)
                .await
                .expect("worker still running")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn dropping_the_pool_handle_stops_idle_workers() {
        let (queue, pipeline, _store) = setup(MockConverter::returning(b"x".to_vec())).await;
        let pool = WorkerPool::spawn(2, queue.clone(), pipeline);
        let WorkerPool { shutdown_tx, joins } = pool;

        drop(shutdown_tx);
        for j in joins {
            tokio::time::timeout(Duration::from_secs(1), j)
                .await
                .expect("worker kept running after the pool was dropped")
                .unwrap();
        }
        // nothing was leased while the workers were winding down
        assert_eq!(queue.counts_by_state().await.unwrap().terminal(), 0);
    }
}
