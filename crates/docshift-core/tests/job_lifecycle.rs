//! Job lifecycle integration tests.
//!
//! These tests drive submissions through intake, the queue and the worker
//! pool, and check what a polling client sees:
//! processing -> done (with a signed URL) | error

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use docshift_core::{
    app::{App, AppBuilder, ExecutionStrategy, JobStatus, PipelineSettings, TimeLimits, UnknownJobPolicy},
    domain::JobId,
    impls::InMemoryObjectStore,
    ports::{Converter, ObjectStore},
    queue::JobQueue,
    testing::{MockConverter, fixtures},
};

const MEMORY_URL_PREFIX: &str = "memory://objects/";

/// Test helper wiring an app over an in-memory store.
struct TestHarness {
    app: App,
    store: Arc<InMemoryObjectStore>,
    converter: Arc<MockConverter>,
}

impl TestHarness {
    fn new(converter: MockConverter, strategy: ExecutionStrategy) -> Self {
        Self::with_settings(converter, strategy, PipelineSettings::default())
    }

    fn with_settings(
        converter: MockConverter,
        strategy: ExecutionStrategy,
        settings: PipelineSettings,
    ) -> Self {
        let store = Arc::new(InMemoryObjectStore::new());
        let converter = Arc::new(converter);
        let app = AppBuilder::new()
            .store(store.clone())
            .converter(converter.clone() as Arc<dyn Converter>)
            .strategy(strategy)
            .settings(settings)
            .unknown_job_policy(UnknownJobPolicy::Processing)
            .build()
            .expect("Failed to build app");

        Self {
            app,
            store,
            converter,
        }
    }

    async fn submit(&self, label: &str) -> JobId {
        let filename = format!("{label}.pptx");
        self.app
            .intake()
            .accept(fixtures::pptx_bytes(label), Some(filename.as_str()))
            .await
            .expect("Failed to submit")
    }

    async fn status(&self, job_id: JobId) -> JobStatus {
        self.app
            .service()
            .status(&job_id.to_string())
            .await
            .expect("Failed to resolve status")
    }

    async fn wait_terminal(&self, job_id: JobId) -> JobStatus {
        for _ in 0..500 {
            let status = self.status(job_id).await;
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} did not finish");
    }
}

/// Object key a signed in-memory URL points at.
fn key_of(url: &str) -> &str {
    let rest = url.strip_prefix(MEMORY_URL_PREFIX).expect("unexpected url");
    rest.split('?').next().unwrap_or(rest)
}

#[tokio::test]
async fn submission_reports_processing_immediately() {
    let h = TestHarness::new(MockConverter::echoing(), ExecutionStrategy::Deferred);

    let job_id = h.submit("deck").await;

    // no workers yet: nothing can have run
    assert_eq!(h.status(job_id).await, JobStatus::Processing);
    assert_eq!(h.converter.calls(), 0);
}

#[tokio::test]
async fn successful_job_publishes_exactly_one_output() {
    let h = TestHarness::new(MockConverter::echoing(), ExecutionStrategy::Deferred);
    let workers = h.app.spawn_workers(2);

    let job_id = h.submit("Quarterly Review").await;
    let JobStatus::Done { result_url } = h.wait_terminal(job_id).await else {
        panic!("expected done");
    };

    let keys = h.store.keys().await;
    let outputs: Vec<_> = keys.iter().filter(|k| k.ends_with(".pdf")).collect();
    assert_eq!(outputs.len(), 1);
    assert_eq!(key_of(&result_url), outputs[0]);
    assert!(outputs[0].ends_with("_Quarterly_Review.pdf"));
    assert_eq!(
        h.store.get(outputs[0]).await.unwrap(),
        MockConverter::echo_of(&fixtures::pptx_bytes("Quarterly Review"))
    );

    workers.shutdown_and_join().await;
}

#[tokio::test]
async fn remote_failure_reports_error_and_leaves_no_output() {
    let h = TestHarness::new(
        MockConverter::failing_with_status(500, "Internal Server Error"),
        ExecutionStrategy::Deferred,
    );
    let workers = h.app.spawn_workers(1);

    let job_id = h.submit("deck").await;
    let JobStatus::Error { message } = h.wait_terminal(job_id).await else {
        panic!("expected error");
    };

    assert!(message.starts_with("conversion failed"), "{message}");
    assert!(message.contains("500"), "{message}");
    assert!(!h.store.keys().await.iter().any(|k| k.ends_with(".pdf")));

    workers.shutdown_and_join().await;
}

#[tokio::test]
async fn status_is_idempotent_after_terminal_state() {
    let h = TestHarness::new(MockConverter::echoing(), ExecutionStrategy::Deferred);
    let workers = h.app.spawn_workers(1);

    let job_id = h.submit("deck").await;
    let first = h.wait_terminal(job_id).await;
    workers.shutdown_and_join().await;

    for _ in 0..10 {
        assert_eq!(h.status(job_id).await, first);
    }
}

#[tokio::test]
async fn concurrent_submissions_never_mix_results() {
    const JOBS: usize = 24;
    let h = Arc::new(TestHarness::new(
        MockConverter::echoing().with_delay(Duration::from_millis(5)),
        ExecutionStrategy::Deferred,
    ));
    let workers = h.app.spawn_workers(4);

    let mut submits = Vec::new();
    for i in 0..JOBS {
        let h = Arc::clone(&h);
        submits.push(tokio::spawn(async move {
            let label = format!("deck-{i}");
            (label.clone(), h.submit(&label).await)
        }));
    }
    let mut jobs = Vec::new();
    for s in submits {
        jobs.push(s.await.unwrap());
    }

    let ids: HashSet<_> = jobs.iter().map(|(_, id)| *id).collect();
    assert_eq!(ids.len(), JOBS);

    let mut output_keys = HashSet::new();
    for (label, job_id) in &jobs {
        let JobStatus::Done { result_url } = h.wait_terminal(*job_id).await else {
            panic!("job {job_id} failed");
        };
        let key = key_of(&result_url).to_string();
        assert_eq!(
            h.store.get(&key).await.unwrap(),
            MockConverter::echo_of(&fixtures::pptx_bytes(label)),
            "job {job_id} got someone else's result"
        );
        output_keys.insert(key);
    }
    assert_eq!(output_keys.len(), JOBS);

    let counts = h.app.queue().counts_by_state().await.unwrap();
    assert_eq!(counts.succeeded, JOBS);
    assert_eq!(counts.terminal(), JOBS);

    workers.shutdown_and_join().await;
}

#[tokio::test]
async fn repeated_filenames_still_get_distinct_jobs_and_outputs() {
    const JOBS: usize = 50;
    let h = Arc::new(TestHarness::new(MockConverter::echoing(), ExecutionStrategy::Deferred));
    let workers = h.app.spawn_workers(4);

    let mut submits = Vec::new();
    for i in 0..JOBS {
        let h = Arc::clone(&h);
        submits.push(tokio::spawn(async move {
            // same name, different contents
            let bytes = fixtures::pptx_bytes(&format!("copy-{i}"));
            let job_id = h
                .app
                .intake()
                .accept(bytes.clone(), Some("Weekly Sync.pptx"))
                .await
                .expect("Failed to submit");
            (bytes, job_id)
        }));
    }
    let mut jobs = Vec::new();
    for s in submits {
        jobs.push(s.await.unwrap());
    }

    let ids: HashSet<_> = jobs.iter().map(|(_, id)| *id).collect();
    assert_eq!(ids.len(), JOBS);

    let mut output_keys = HashSet::new();
    for (bytes, job_id) in &jobs {
        let JobStatus::Done { result_url } = h.wait_terminal(*job_id).await else {
            panic!("job {job_id} failed");
        };
        let key = key_of(&result_url).to_string();
        assert!(key.ends_with("_Weekly_Sync.pdf"), "{key}");
        assert_eq!(h.store.get(&key).await.unwrap(), MockConverter::echo_of(bytes));
        output_keys.insert(key);
    }
    assert_eq!(output_keys.len(), JOBS);

    let input_keys: HashSet<_> = h
        .store
        .keys()
        .await
        .into_iter()
        .filter(|k| k.ends_with("_Weekly_Sync.pptx"))
        .collect();
    assert_eq!(input_keys.len(), JOBS);

    workers.shutdown_and_join().await;
}

#[tokio::test]
async fn inline_strategy_finishes_before_submit_returns() {
    let h = TestHarness::new(MockConverter::echoing(), ExecutionStrategy::Inline);

    let job_id = h.submit("deck").await;

    assert!(matches!(h.status(job_id).await, JobStatus::Done { .. }));
    assert_eq!(h.converter.calls(), 1);
}

#[tokio::test]
async fn inline_strategy_records_failures_too() {
    let h = TestHarness::new(MockConverter::unreachable(), ExecutionStrategy::Inline);

    let job_id = h.submit("deck").await;

    let JobStatus::Error { message } = h.status(job_id).await else {
        panic!("expected error");
    };
    assert!(message.contains("unreachable"), "{message}");
}

#[tokio::test]
async fn soft_limit_failure_reads_as_timeout() {
    let h = TestHarness::with_settings(
        MockConverter::echoing().with_delay(Duration::from_millis(100)),
        ExecutionStrategy::Inline,
        PipelineSettings {
            limits: TimeLimits::new(Duration::from_millis(20), Duration::from_secs(5)),
            ..PipelineSettings::default()
        },
    );

    let job_id = h.submit("slow").await;

    let JobStatus::Error { message } = h.status(job_id).await else {
        panic!("expected error");
    };
    assert!(message.starts_with("time limit exceeded"), "{message}");
    assert!(!message.contains("conversion failed"));
}

#[tokio::test]
async fn closing_the_queue_revokes_unpicked_jobs() {
    let h = TestHarness::new(MockConverter::echoing(), ExecutionStrategy::Deferred);

    let job_id = h.submit("never-run").await;
    assert_eq!(h.app.queue().close().await.unwrap(), 1);

    let JobStatus::Error { message } = h.status(job_id).await else {
        panic!("expected error");
    };
    assert!(message.contains("revoked"));
    assert_eq!(h.converter.calls(), 0);
}
