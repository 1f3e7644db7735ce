//! `DirectoryMonitor`: poll-based watch-root scanning (§4.12).
//!
//! Deliberately poll-based rather than inotify-based (see DESIGN.md): a
//! two-scan size-stability check is what actually detects "download
//! finished" reliably across network filesystems and partial-write
//! patterns, which an event-based watcher can't give us for free.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::model::{is_loose_file, ProcessOutcome, ProcessedRecord, FAILED_SENTINEL};
use crate::processed_log::ProcessedLog;
use crate::tagio;

/// Errors raised while watching a directory tree.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watch root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("I/O error scanning {0}: {1}")]
    Io(PathBuf, std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeSample {
    /// Seen once this round; size recorded, not yet eligible.
    First(u64),
    /// Seen stable across two consecutive scans; ready to enqueue.
    Stable,
}

/// Poll-based watcher over one or more watch roots (§4.12).
///
/// A file becomes eligible for processing when: its extension is
/// supported, it is not already in `ProcessedLog`, its size has been
/// identical across two consecutive scans, and it is not a dotfile.
pub struct DirectoryMonitor {
    watch_roots: Vec<PathBuf>,
    scan_interval: Duration,
    processed_log: Arc<dyn ProcessedLog>,
    sizes: Mutex<HashMap<PathBuf, SizeSample>>,
    /// Per-path `NETWORK_ERROR_RETRY` count against `max_retries` (§4.12, §7).
    retries: Mutex<HashMap<PathBuf, u32>>,
    max_retries: u32,
    failed_dir: PathBuf,
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl DirectoryMonitor {
    pub fn new(
        watch_roots: Vec<PathBuf>,
        scan_interval: Duration,
        processed_log: Arc<dyn ProcessedLog>,
        max_retries: u32,
        failed_dir: PathBuf,
    ) -> Self {
        Self {
            watch_roots,
            scan_interval,
            processed_log,
            sizes: Mutex::new(HashMap::new()),
            retries: Mutex::new(HashMap::new()),
            max_retries,
            failed_dir,
            paused: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Run the poll loop until `stop()` is called, pushing every path that
    /// clears the stability/dedup checks this round onto `ingress` (§5's
    /// bounded mpsc ingress channel feeding the worker pool). Returns once
    /// `ingress` is gone too, since a dropped receiver means there's no one
    /// left to feed.
    pub async fn run(&self, ingress: mpsc::Sender<PathBuf>) -> Result<(), WatchError> {
        for root in &self.watch_roots {
            if !root.exists() {
                return Err(WatchError::RootMissing(root.clone()));
            }
        }

        let mut ticker = tokio::time::interval(self.scan_interval);
        while !self.stopped.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.paused.load(Ordering::SeqCst) {
                continue;
            }

            for path in self.scan_once().await? {
                if ingress.send(path).await.is_err() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Record the outcome of a processing attempt for `path` against the
    /// per-path retry budget (§4.12, §7). Only `NetworkErrorRetry` consumes
    /// budget; `DelayRetry` means "not ready yet" rather than "attempted and
    /// failed" and leaves the counter untouched. `Success`/`PermanentFail`
    /// clear any counter so a later re-sighting of the same path starts
    /// fresh.
    pub async fn record_outcome(&self, path: &Path, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::NetworkErrorRetry => {
                let exhausted = {
                    let mut retries = self.retries.lock().await;
                    let count = retries.entry(path.to_path_buf()).or_insert(0);
                    *count += 1;
                    *count >= self.max_retries
                };
                if exhausted {
                    self.retries.lock().await.remove(path);
                    self.exhaust_retry_budget(path).await;
                }
            }
            ProcessOutcome::Success | ProcessOutcome::PermanentFail => {
                self.retries.lock().await.remove(path);
            }
            ProcessOutcome::DelayRetry => {}
        }
    }

    /// `maxRetries` exhausted on a `NETWORK_ERROR_RETRY` path (§7): copy it
    /// to `failedDir` the same way a permanent failure would, and mark it
    /// `FAILED` so `scan_once` never re-enqueues it.
    async fn exhaust_retry_budget(&self, path: &Path) {
        let watch_root = self.watch_roots.iter().find(|root| path.starts_with(root));
        let dest = match watch_root {
            Some(root) if is_loose_file(root, path) => self.failed_dir.join(path.file_name().unwrap_or_default()),
            Some(_) | None => {
                let folder_name = path.parent().and_then(|p| p.file_name()).unwrap_or_default();
                self.failed_dir.join(folder_name).join(path.file_name().unwrap_or_default())
            }
        };
        if let Some(parent) = dest.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::copy(path, &dest);

        let record = ProcessedRecord {
            file_path: path.to_path_buf(),
            file_hash: crate::health::hash::compute_file_hash(path).unwrap_or_default(),
            file_size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            processed_at: chrono::Utc::now(),
            recording_id: FAILED_SENTINEL.to_string(),
            artist: String::new(),
            title: String::new(),
            album: String::new(),
        };
        let _ = self.processed_log.mark(&record).await;
    }

    /// One scan pass: walk every watch root, update size samples, return
    /// the paths that just became stable and aren't already processed.
    async fn scan_once(&self) -> Result<Vec<PathBuf>, WatchError> {
        let mut eligible = Vec::new();
        let mut sizes = self.sizes.lock().await;
        let mut seen_this_round = std::collections::HashSet::new();

        for root in &self.watch_roots {
            for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path().to_path_buf();

                if is_dotfile(&path) || !tagio::is_supported_extension(&path) {
                    continue;
                }

                let Ok(metadata) = entry.metadata() else { continue };
                let size = metadata.len();
                seen_this_round.insert(path.clone());

                let stable = match sizes.get(&path) {
                    Some(SizeSample::First(prev_size)) if *prev_size == size => true,
                    Some(SizeSample::Stable) => true,
                    _ => false,
                };

                if stable {
                    sizes.insert(path.clone(), SizeSample::Stable);
                    if !self.processed_log.is_processed(&path).await.unwrap_or(false) {
                        eligible.push(path);
                    }
                } else {
                    sizes.insert(path, SizeSample::First(size));
                }
            }
        }

        sizes.retain(|path, _| seen_this_round.contains(path));
        Ok(eligible)
    }
}

fn is_dotfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
