//! ConversionPipeline - one job, five steps
//!
//! # フロー
//! 1. ObjectStore::get() で入力を取得
//! 2. Converter::convert() でリモート変換
//! 3. KeyGenerator で出力キーを生成して ObjectStore::put()
//! 4. ObjectStore::signed_url() で取得用 URL を発行
//! 5. Outcome::Success を返す（記録は呼び出し側の lease が行う）
//!
//! Two limits bound one execution. The soft limit is checked between steps:
//! the in-flight step finishes, then the job stops. The hard limit drops the
//! whole execution future, cancelling whatever I/O is in flight.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{JobError, JobRequest, Outcome, TimeoutError};
use crate::ports::{Converter, KeyGenerator, ObjectStore, StoreError};

/// Soft/hard execution budget for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLimits {
    pub soft: Duration,
    pub hard: Duration,
}

impl TimeLimits {
    pub fn new(soft: Duration, hard: Duration) -> Self {
        Self { soft, hard }
    }
}

impl Default for TimeLimits {
    fn default() -> Self {
        Self {
            soft: Duration::from_secs(300),
            hard: Duration::from_secs(360),
        }
    }
}

/// Tunables for [`ConversionPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub limits: TimeLimits,
    /// Lifetime of the signed result URL.
    pub url_ttl: Duration,
    /// Extension of produced files, also used in the download name.
    pub output_extension: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            limits: TimeLimits::default(),
            url_ttl: Duration::from_secs(3600),
            output_extension: "pdf".to_string(),
        }
    }
}

/// Ephemeral record of one remote conversion; dropped with the execution.
struct ConversionAttempt {
    output: Vec<u8>,
    elapsed: Duration,
}

impl ConversionAttempt {
    async fn run(converter: &dyn Converter, input: Vec<u8>) -> Result<Self, JobError> {
        let started = Instant::now();
        let output = converter.convert(&input).await?;
        // input is released here, before the upload starts
        drop(input);
        Ok(Self {
            output,
            elapsed: started.elapsed(),
        })
    }
}

struct SoftDeadline {
    started: Instant,
    limit: Duration,
}

impl SoftDeadline {
    fn check(&self) -> Result<(), TimeoutError> {
        if self.started.elapsed() >= self.limit {
            return Err(TimeoutError::Soft { limit: self.limit });
        }
        Ok(())
    }
}

/// Executes the conversion steps for one job against injected collaborators.
pub struct ConversionPipeline {
    store: Arc<dyn ObjectStore>,
    converter: Arc<dyn Converter>,
    keys: Arc<dyn KeyGenerator>,
    settings: PipelineSettings,
}

impl ConversionPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        converter: Arc<dyn Converter>,
        keys: Arc<dyn KeyGenerator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            converter,
            keys,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one job to a terminal outcome. Never returns an error: every
    /// failure, including the hard limit, becomes `Outcome::Failure`.
    pub async fn execute(&self, request: &JobRequest) -> Outcome {
        let job_id = request.job_id;
        let limits = self.settings.limits;
        let deadline = SoftDeadline {
            started: Instant::now(),
            limit: limits.soft,
        };
        // Output key is parked here before upload so it can be cleaned up
        // even if the hard limit drops the step future.
        let uploaded: Mutex<Option<String>> = Mutex::new(None);

        let steps = self.run_steps(request, &deadline, &uploaded);
        let result = match tokio::time::timeout(limits.hard, steps).await {
            Ok(result) => result,
            Err(_) => Err(JobError::from(TimeoutError::Hard { limit: limits.hard })),
        };

        match &result {
            Ok(_) => info!(%job_id, "job succeeded"),
            Err(err) => {
                warn!(%job_id, error = %err, "job failed");
                let orphan = uploaded.lock().unwrap_or_else(|e| e.into_inner()).take();
                if let Some(key) = orphan {
                    self.discard_output(&key).await;
                }
            }
        }
        Outcome::from(result)
    }

    async fn run_steps(
        &self,
        request: &JobRequest,
        deadline: &SoftDeadline,
        uploaded: &Mutex<Option<String>>,
    ) -> Result<String, JobError> {
        let job_id = request.job_id;

        // 1) download
        let input = self
            .store
            .get(&request.input_key)
            .await
            .map_err(|source| JobError::Download {
                key: request.input_key.clone(),
                source,
            })?;
        debug!(%job_id, key = %request.input_key, bytes = input.len(), "input downloaded");
        deadline.check()?;

        // 2) convert
        let attempt = ConversionAttempt::run(self.converter.as_ref(), input).await?;
        debug!(
            %job_id,
            converter = self.converter.name(),
            bytes = attempt.output.len(),
            elapsed_ms = attempt.elapsed.as_millis() as u64,
            "conversion finished"
        );
        deadline.check()?;

        // 3) upload
        let extension = &self.settings.output_extension;
        let output_key = self
            .keys
            .new_output_key(request.base_name.as_deref(), extension);
        *uploaded.lock().unwrap_or_else(|e| e.into_inner()) = Some(output_key.clone());
        self.store
            .put(&output_key, attempt.output)
            .await
            .map_err(|source| JobError::Upload {
                key: output_key.clone(),
                source,
            })?;
        debug!(%job_id, key = %output_key, "output uploaded");
        deadline.check()?;

        // 4) sign
        let download_name = request.download_name(extension);
        let url = self
            .store
            .signed_url(&output_key, self.settings.url_ttl, download_name.as_deref())
            .await
            .map_err(|source| JobError::Sign {
                key: output_key.clone(),
                source,
            })?;

        // 5) published: the output now belongs to the result
        uploaded.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(url)
    }

    async fn discard_output(&self, key: &str) {
        match self.store.delete(key).await {
            Ok(()) | Err(StoreError::NotFound(_)) => debug!(key, "discarded output of failed job"),
            Err(err) => warn!(key, error = %err, "failed to discard output of failed job"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobId;
    use crate::impls::InMemoryObjectStore;
    use crate::ports::{SystemClock, UlidKeyGenerator};
    use crate::testing::{FailingStore, MockConverter, StoreOp};
    use ulid::Ulid;

    fn request(base: Option<&str>) -> JobRequest {
        JobRequest::new(
            JobId::from_ulid(Ulid::new()),
            "src_deck.pptx",
            base.map(str::to_string),
        )
    }

    fn pipeline(
        store: Arc<dyn ObjectStore>,
        converter: Arc<dyn Converter>,
        limits: TimeLimits,
    ) -> ConversionPipeline {
        ConversionPipeline::new(
            store,
            converter,
            Arc::new(UlidKeyGenerator::new(SystemClock)),
            PipelineSettings {
                limits,
                ..PipelineSettings::default()
            },
        )
    }

    async fn seeded_store() -> Arc<InMemoryObjectStore> {
        let store = Arc::new(InMemoryObjectStore::new());
        store.put("src_deck.pptx", b"PK\x03\x04slides".to_vec()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn success_uploads_one_output_and_signs_it() {
        let store = seeded_store().await;
        let converter = Arc::new(MockConverter::returning(b"%PDF-1.4 deck".to_vec()));
        let p = pipeline(store.clone(), converter.clone(), TimeLimits::default());

        let outcome = p.execute(&request(Some("My Presentation"))).await;

        let Outcome::Success { result_url } = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        let keys = store.keys().await;
        assert_eq!(keys.len(), 2);
        let output_key = keys.iter().find(|k| k.ends_with(".pdf")).unwrap();
        assert!(output_key.ends_with("_My_Presentation.pdf"));
        assert!(result_url.contains(output_key.as_str()));
        assert!(result_url.contains("My%20Presentation.pdf"));
        assert_eq!(store.get(output_key).await.unwrap(), b"%PDF-1.4 deck");
        assert_eq!(converter.calls(), 1);
        assert_eq!(converter.inputs()[0], b"PK\x03\x04slides");
    }

    #[tokio::test]
    async fn missing_input_fails_without_calling_converter() {
        let store = Arc::new(InMemoryObjectStore::new());
        let converter = Arc::new(MockConverter::returning(b"pdf".to_vec()));
        let p = pipeline(store.clone(), converter.clone(), TimeLimits::default());

        let outcome = p.execute(&request(None)).await;

        let Outcome::Failure { reason } = outcome else {
            panic!("expected failure");
        };
        assert!(reason.starts_with("failed to download input src_deck.pptx"));
        assert_eq!(converter.calls(), 0);
    }

    #[tokio::test]
    async fn remote_failure_creates_no_output() {
        let store = seeded_store().await;
        let converter = Arc::new(MockConverter::failing_with_status(500, "Internal Server Error"));
        let p = pipeline(store.clone(), converter, TimeLimits::default());

        let outcome = p.execute(&request(Some("deck"))).await;

        let Outcome::Failure { reason } = outcome else {
            panic!("expected failure");
        };
        assert!(reason.starts_with("conversion failed:"));
        assert!(reason.contains("500"));
        assert_eq!(store.keys().await, vec!["src_deck.pptx".to_string()]);
    }

    #[tokio::test]
    async fn upload_failure_is_terminal() {
        let inner = seeded_store().await;
        let store = Arc::new(FailingStore::new(inner.clone(), StoreOp::Put));
        let converter = Arc::new(MockConverter::returning(b"pdf".to_vec()));
        let p = pipeline(store, converter, TimeLimits::default());

        let Outcome::Failure { reason } = p.execute(&request(None)).await else {
            panic!("expected failure");
        };
        assert!(reason.starts_with("failed to upload output"));
        assert_eq!(inner.keys().await.len(), 1);
    }

    #[tokio::test]
    async fn signing_failure_discards_uploaded_output() {
        let inner = seeded_store().await;
        let store = Arc::new(FailingStore::new(inner.clone(), StoreOp::Sign));
        let converter = Arc::new(MockConverter::returning(b"pdf".to_vec()));
        let p = pipeline(store, converter, TimeLimits::default());

        let Outcome::Failure { reason } = p.execute(&request(None)).await else {
            panic!("expected failure");
        };
        assert!(reason.starts_with("failed to sign result url"));
        assert_eq!(inner.keys().await, vec!["src_deck.pptx".to_string()]);
    }

    #[tokio::test]
    async fn soft_limit_lets_the_step_finish_then_stops() {
        let store = seeded_store().await;
        let converter = Arc::new(
            MockConverter::returning(b"pdf".to_vec()).with_delay(Duration::from_millis(150)),
        );
        let limits = TimeLimits::new(Duration::from_millis(50), Duration::from_secs(5));
        let p = pipeline(store.clone(), converter.clone(), limits);

        let Outcome::Failure { reason } = p.execute(&request(None)).await else {
            panic!("expected failure");
        };
        assert_eq!(reason, "time limit exceeded: soft limit of 50ms");
        assert_eq!(converter.calls(), 1);
        // stopped before the upload step
        assert_eq!(store.keys().await.len(), 1);
    }

    #[tokio::test]
    async fn hard_limit_cancels_the_in_flight_step() {
        let store = seeded_store().await;
        let converter = Arc::new(
            MockConverter::returning(b"pdf".to_vec()).with_delay(Duration::from_secs(30)),
        );
        let limits = TimeLimits::new(Duration::from_millis(20), Duration::from_millis(100));
        let p = pipeline(store.clone(), converter, limits);

        let started = std::time::Instant::now();
        let Outcome::Failure { reason } = p.execute(&request(None)).await else {
            panic!("expected failure");
        };
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(reason.contains("hard limit"), "{reason}");
        assert_eq!(store.keys().await.len(), 1);
    }
}
