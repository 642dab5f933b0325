//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! Collaborators are injected as trait objects; `build()` checks that the
//! required ones are present and the settings are coherent (Fail-fast).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::inbox::InboxWatcher;
use super::intake::{DEFAULT_INPUT_EXTENSION, Intake};
use super::pipeline::{ConversionPipeline, PipelineSettings};
use super::retention::{DEFAULT_RETENTION_WINDOW, RetentionSweeper};
use super::service::{ConversionService, ExecutionStrategy};
use super::status::{StatusResolver, UnknownJobPolicy};
use super::worker_pool::WorkerPool;
use crate::config::Config;
use crate::impls::{LocalObjectStore, UnoserverConverter, UrlSigner};
use crate::ports::{
    Clock, ConversionError, Converter, KeyGenerator, ObjectStore, SystemClock, UlidKeyGenerator,
};
use crate::queue::{InMemoryJobQueue, JobQueue, ResultBackend};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new()
///     .store(Arc::new(InMemoryObjectStore::new()))
///     .converter(Arc::new(MockConverter::echoing()))
///     .build()?;
/// let job_id = app.intake().accept(bytes, Some("deck.pptx")).await?;
/// ```
pub struct AppBuilder {
    store: Option<Arc<dyn ObjectStore>>,
    converter: Option<Arc<dyn Converter>>,
    clock: Arc<dyn Clock>,
    keys: Option<Arc<dyn KeyGenerator>>,
    queue: Option<(Arc<dyn JobQueue>, Arc<dyn ResultBackend>)>,
    settings: PipelineSettings,
    strategy: ExecutionStrategy,
    unknown_job_policy: UnknownJobPolicy,
    input_extension: String,
    retention_window: Duration,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no object store configured")]
    MissingStore,

    #[error("no converter configured")]
    MissingConverter,

    #[error("hard time limit {hard:?} is below soft time limit {soft:?}")]
    InvalidLimits {
        soft: Duration,
        hard: Duration,
    },

    #[error("failed to set up converter: {0}")]
    Converter(#[from] ConversionError),
}

impl AppBuilder {
    /// 新しい AppBuilder を作成
    pub fn new() -> Self {
        Self {
            store: None,
            converter: None,
            clock: Arc::new(SystemClock),
            keys: None,
            queue: None,
            settings: PipelineSettings::default(),
            strategy: ExecutionStrategy::default(),
            unknown_job_policy: UnknownJobPolicy::default(),
            input_extension: DEFAULT_INPUT_EXTENSION.to_string(),
            retention_window: DEFAULT_RETENTION_WINDOW,
        }
    }

    /// Production wiring from a loaded configuration: a local directory
    /// store and the Unoserver converter.
    pub fn from_config(config: &Config) -> Result<Self, BuildError> {
        let signer = UrlSigner::new(
            config.store.public_base_url.clone(),
            config.store.signing_secret.clone(),
        );
        let store = LocalObjectStore::new(config.store.root.clone(), signer);
        let converter = UnoserverConverter::new(&config.converter)?;

        Ok(Self::new()
            .store(Arc::new(store))
            .converter(Arc::new(converter))
            .settings(PipelineSettings {
                limits: config.worker.limits(),
                url_ttl: config.worker.url_ttl(),
                output_extension: config.converter.convert_to.clone(),
            })
            .strategy(config.worker.strategy)
            .unknown_job_policy(config.status.unknown_job_policy)
            .input_extension(config.converter.input_extension.clone())
            .retention_window(config.retention.window()))
    }

    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Clock for key generation and record timestamps (default: system).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn keys(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Queue that is also its own result back-end (default: in-memory).
    pub fn queue<Q>(mut self, queue: Arc<Q>) -> Self
    where
        Q: JobQueue + ResultBackend + 'static,
    {
        self.queue = Some((
            queue.clone() as Arc<dyn JobQueue>,
            queue as Arc<dyn ResultBackend>,
        ));
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn unknown_job_policy(mut self, policy: UnknownJobPolicy) -> Self {
        self.unknown_job_policy = policy;
        self
    }

    pub fn input_extension(mut self, extension: impl Into<String>) -> Self {
        self.input_extension = extension.into();
        self
    }

    pub fn retention_window(mut self, window: Duration) -> Self {
        self.retention_window = window;
        self
    }

    /// AppBuilder を構築して App を生成
    pub fn build(self) -> Result<App, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let converter = self.converter.ok_or(BuildError::MissingConverter)?;
        let limits = self.settings.limits;
        if limits.hard < limits.soft {
            return Err(BuildError::InvalidLimits {
                soft: limits.soft,
                hard: limits.hard,
            });
        }

        let clock = self.clock;
        let keys = self
            .keys
            .unwrap_or_else(|| Arc::new(UlidKeyGenerator::new(Arc::clone(&clock))));
        let (queue, results) = self.queue.unwrap_or_else(|| {
            let queue = Arc::new(InMemoryJobQueue::with_clock(Arc::clone(&clock)));
            (queue.clone() as Arc<dyn JobQueue>, queue as Arc<dyn ResultBackend>)
        });

        let pipeline = Arc::new(ConversionPipeline::new(
            Arc::clone(&store),
            converter,
            Arc::clone(&keys),
            self.settings,
        ));
        let service = Arc::new(ConversionService::new(
            Arc::clone(&queue),
            Arc::clone(&pipeline),
            Arc::clone(&keys),
            StatusResolver::new(results, self.unknown_job_policy),
            self.strategy,
        ));
        let intake = Arc::new(Intake::new(
            Arc::clone(&store),
            keys,
            Arc::clone(&service),
            self.input_extension,
        ));

        Ok(App {
            store,
            clock,
            queue,
            pipeline,
            service,
            intake,
            retention_window: self.retention_window,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// App は組み上がったアプリケーション
pub struct App {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    queue: Arc<dyn JobQueue>,
    pipeline: Arc<ConversionPipeline>,
    service: Arc<ConversionService>,
    intake: Arc<Intake>,
    retention_window: Duration,
}

impl App {
    pub fn service(&self) -> &Arc<ConversionService> {
        &self.service
    }

    pub fn intake(&self) -> &Intake {
        &self.intake
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Start `n` workers on this app's queue.
    pub fn spawn_workers(&self, n: usize) -> WorkerPool {
        WorkerPool::spawn(n, Arc::clone(&self.queue), Arc::clone(&self.pipeline))
    }

    /// Watcher feeding files dropped into `dir` through this app's intake.
    pub fn inbox(&self, dir: impl Into<PathBuf>, settle: Duration) -> InboxWatcher {
        InboxWatcher::new(dir, Arc::clone(&self.intake), Arc::clone(&self.service), settle)
    }

    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.retention_window,
        )
    }
}
