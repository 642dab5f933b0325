//! InboxWatcher - 受信ディレクトリからの投入
//!
//! # フロー
//! 1. inbox を定期スキャンし、拡張子の合うファイルのサイズを記録
//! 2. サイズが `settle` の間変わらなければ [`Intake::accept`] で投入
//! 3. 投入済みファイルは `{name}.{job_id}.queued` に改名
//! 4. ジョブが終端に達したら `{name}.{job_id}.json` にステータスを書き出す
//!
//! Renamed files no longer carry the input extension, so later scans skip
//! them. Files rejected by intake are renamed to `{name}.rejected`. Hidden
//! files are ignored.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::intake::Intake;
use super::service::ConversionService;
use crate::domain::{InputError, JobId};

pub const DEFAULT_INBOX_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InboxReport {
    pub submitted: usize,
    pub rejected: usize,
    /// Candidates still being written (or seen for the first time).
    pub settling: usize,
    /// Receipts written for jobs that reached a terminal state.
    pub finished: usize,
}

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("failed to read inbox {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Size of a candidate and when it was first seen at that size.
#[derive(Debug, Clone, Copy)]
struct Sighting {
    len: u64,
    since: Instant,
}

/// A submitted job whose receipt is not written yet.
#[derive(Debug)]
struct Outstanding {
    job_id: JobId,
    receipt: PathBuf,
}

pub struct InboxWatcher {
    dir: PathBuf,
    intake: Arc<Intake>,
    service: Arc<ConversionService>,
    settle: Duration,
    pending: HashMap<PathBuf, Sighting>,
    outstanding: Vec<Outstanding>,
}

impl InboxWatcher {
    pub fn new(
        dir: impl Into<PathBuf>,
        intake: Arc<Intake>,
        service: Arc<ConversionService>,
        settle: Duration,
    ) -> Self {
        Self {
            dir: dir.into(),
            intake,
            service,
            settle,
            pending: HashMap::new(),
            outstanding: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// One pass over the inbox. A missing directory is an empty inbox.
    pub async fn scan_once(&mut self, now: Instant) -> Result<InboxReport, InboxError> {
        let mut report = InboxReport::default();
        let candidates = self.candidates().await?;

        let seen: HashSet<PathBuf> = candidates.iter().map(|(path, _)| path.clone()).collect();
        self.pending.retain(|path, _| seen.contains(path));

        for (path, len) in candidates {
            let sighting = self
                .pending
                .entry(path.clone())
                .and_modify(|s| {
                    if s.len != len {
                        *s = Sighting { len, since: now };
                    }
                })
                .or_insert(Sighting { len, since: now });
            if now.duration_since(sighting.since) < self.settle {
                report.settling += 1;
                continue;
            }

            self.pending.remove(&path);
            match self.submit(&path).await {
                Some(true) => report.submitted += 1,
                Some(false) => report.rejected += 1,
                None => {}
            }
        }

        report.finished = self.write_receipts().await;
        Ok(report)
    }

    /// Scan every `interval` until `shutdown` flips.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        if let Err(err) = tokio::fs::create_dir_all(&self.dir).await {
            error!(dir = %self.dir.display(), error = %err, "failed to create inbox");
        }
        info!(dir = %self.dir.display(), "watching inbox");

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

            if let Err(err) = self.scan_once(Instant::now()).await {
                error!(error = %err, "inbox scan failed");
            }
        }
        debug!(outstanding = self.outstanding.len(), "inbox watcher stopped");
    }

    /// Visible regular files with the intake's extension, and their sizes.
    async fn candidates(&self) -> Result<Vec<(PathBuf, u64)>, InboxError> {
        let read_err = |source| InboxError::Read {
            path: self.dir.clone(),
            source,
        };
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(read_err(err)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || !self.has_input_extension(name) {
                continue;
            }
            match entry.metadata().await {
                Ok(meta) if meta.is_file() => found.push((path, meta.len())),
                Ok(_) => {}
                // removed between read_dir and stat
                Err(err) => debug!(path = %path.display(), error = %err, "skipping entry"),
            }
        }
        found.sort();
        Ok(found)
    }

    fn has_input_extension(&self, name: &str) -> bool {
        name.rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(self.intake.extension()))
    }

    /// `Some(true)` when submitted, `Some(false)` when rejected for good,
    /// `None` when the file is left in place for a later scan.
    async fn submit(&mut self, path: &Path) -> Option<bool> {
        let name = path.file_name()?.to_str()?.to_string();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read inbox file");
                return None;
            }
        };

        match self.intake.accept(bytes, Some(&name)).await {
            Ok(job_id) => {
                let queued = self.dir.join(format!("{name}.{job_id}.queued"));
                if let Err(err) = tokio::fs::rename(path, &queued).await {
                    // the file stays a candidate and will be submitted again
                    error!(path = %path.display(), error = %err, "failed to mark inbox file as queued");
                }
                info!(%job_id, file = %name, "inbox file submitted");
                self.outstanding.push(Outstanding {
                    job_id,
                    receipt: self.dir.join(format!("{name}.{job_id}.json")),
                });
                Some(true)
            }
            Err(err @ (InputError::Upload(_) | InputError::Enqueue(_))) => {
                warn!(file = %name, error = %err, "inbox submission failed, will retry");
                None
            }
            Err(err) => {
                warn!(file = %name, error = %err, "inbox file rejected");
                let rejected = self.dir.join(format!("{name}.rejected"));
                if let Err(err) = tokio::fs::rename(path, &rejected).await {
                    error!(path = %path.display(), error = %err, "failed to mark inbox file as rejected");
                }
                Some(false)
            }
        }
    }

    /// Write the status body of every job that reached a terminal state.
    async fn write_receipts(&mut self) -> usize {
        let mut written = 0;
        let mut still_running = Vec::with_capacity(self.outstanding.len());

        for job in std::mem::take(&mut self.outstanding) {
            let status = match self.service.status(&job.job_id.to_string()).await {
                Ok(status) if status.is_terminal() => status,
                Ok(_) => {
                    still_running.push(job);
                    continue;
                }
                Err(err) => {
                    warn!(job_id = %job.job_id, error = %err, "failed to resolve inbox job status");
                    still_running.push(job);
                    continue;
                }
            };

            let body = match serde_json::to_vec_pretty(&status) {
                Ok(body) => body,
                Err(err) => {
                    error!(job_id = %job.job_id, error = %err, "failed to encode status");
                    continue;
                }
            };
            match tokio::fs::write(&job.receipt, body).await {
                Ok(()) => {
                    info!(job_id = %job.job_id, status = status.label(), "inbox job finished");
                    written += 1;
                }
                Err(err) => {
                    warn!(path = %job.receipt.display(), error = %err, "failed to write receipt");
                    still_running.push(job);
                }
            }
        }

        self.outstanding = still_running;
        written
    }
}
