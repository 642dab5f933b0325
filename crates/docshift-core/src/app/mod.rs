//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてジョブのライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **ConversionPipeline**: 1 ジョブ分の download→convert→upload→sign
//! - **WorkerPool**: lease→execute→complete のループを N 本
//! - **ConversionService / Intake**: 投入とステータス照会
//! - **StatusResolver**: job id → processing / done / error
//! - **RetentionSweeper**: 保存期間切れオブジェクトの定期削除
//! - **InboxWatcher**: 受信ディレクトリのファイルを Intake に流す

pub mod builder;
pub mod inbox;
pub mod intake;
pub mod pipeline;
pub mod retention;
pub mod service;
pub mod status;
pub mod worker_pool;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::inbox::{
    DEFAULT_INBOX_POLL_INTERVAL, DEFAULT_SETTLE_TIME, InboxError, InboxReport, InboxWatcher,
};
pub use self::intake::{DEFAULT_INPUT_EXTENSION, Intake};
pub use self::pipeline::{ConversionPipeline, PipelineSettings, TimeLimits};
pub use self::retention::{
    DEFAULT_RETENTION_WINDOW, DEFAULT_SWEEP_INTERVAL, RetentionSweeper, SweepReport,
};
pub use self::service::{ConversionService, ExecutionStrategy};
pub use self::status::{JobStatus, StatusBody, StatusError, StatusResolver, UnknownJobPolicy};
pub use self::worker_pool::WorkerPool;
