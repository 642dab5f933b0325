//! RetentionSweeper - 保存期間を過ぎたオブジェクトの削除
//!
//! # フロー
//! 1. ObjectStore::list() で全件取得
//! 2. `now - last_modified > window` のものを削除
//! 3. 件数を SweepReport で返す
//!
//! A run stops at the first store error. The periodic loop logs it and tries
//! again on the next tick; nothing is persisted about failed runs.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::ports::{Clock, ObjectStore, StoreError};

pub const DEFAULT_RETENTION_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
}

pub struct RetentionSweeper {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    window: chrono::Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            store,
            clock,
            window: chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// One full scan.
    pub async fn sweep_once(&self) -> Result<SweepReport, StoreError> {
        let entries = self.store.list().await?;
        let mut report = SweepReport {
            scanned: entries.len(),
            deleted: 0,
        };
        if entries.is_empty() {
            debug!("retention sweep: store is empty");
            return Ok(report);
        }

        let now = self.clock.now();
        for entry in entries {
            let age = now.signed_duration_since(entry.last_modified);
            if age <= self.window {
                continue;
            }
            self.store.delete(&entry.key).await?;
            debug!(key = %entry.key, age_secs = age.num_seconds(), "expired object deleted");
            report.deleted += 1;
        }

        info!(scanned = report.scanned, deleted = report.deleted, "retention sweep finished");
        Ok(report)
    }

    /// Sweep every `interval` (first run immediately) until `shutdown` flips.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if let Err(err) = self.sweep_once().await {
                error!(error = %err, "retention sweep aborted");
            }
        }
        debug!("retention sweeper stopped");
    }
}
