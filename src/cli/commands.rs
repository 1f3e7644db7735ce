//! CLI command definitions and handlers.
//!
//! Headless daemon surface: each subcommand takes the parsed arguments and
//! returns an `anyhow::Result<()>`. There is no GUI — this binary is meant
//! to run unattended.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::config::{self, Config, ProcessedLogBackend};
use crate::enrichment::fingerprint::fpcalc;
use crate::enrichment::{CoverClient, FingerprintClient, LyricsClient, MetadataClient};
use crate::enrichment::cover::CoverCache;
use crate::folder_cache::FolderAlbumCache;
use crate::album_batch::AlbumBatchProcessor;
use crate::model::FAILED_SENTINEL;
use crate::monitor::DirectoryMonitor;
use crate::processed_log::{FileProcessedLog, ProcessedLog, RelationalProcessedLog};
use crate::processor::{AudioFileProcessor, NoCueSplitter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch configured roots and process new files as they arrive.
    Watch {
        /// Override the configured watch roots for this run.
        roots: Vec<PathBuf>,
    },
    /// Scan a single root once, processing whatever is already stable, then exit.
    Scan {
        /// Directory to scan.
        root: PathBuf,
    },
    /// Check whether the fpcalc fingerprinting tool is installed.
    CheckTools,
    /// Print processed-file counts from the configured ProcessedLog.
    Stats,
    /// Force-reprocess a path that was previously marked FAILED.
    ReprocessFailed {
        /// Path to clear from the processed log.
        path: PathBuf,
    },
}

/// Dispatch a parsed CLI invocation. Returns `true` if a subcommand ran (so
/// `main` knows not to fall through to anything else).
pub fn run_command(args: &Cli) -> anyhow::Result<bool> {
    let Some(command) = &args.command else {
        return Ok(false);
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let config = config::load();
        match command {
            Commands::Watch { roots } => watch(config, roots.clone()).await,
            Commands::Scan { root } => scan_once(config, root.clone()).await,
            Commands::CheckTools => check_tools(),
            Commands::Stats => stats(config).await,
            Commands::ReprocessFailed { path } => reprocess_failed(config, path.clone()).await,
        }
    })?;

    Ok(true)
}

async fn open_processed_log(config: &Config) -> anyhow::Result<Arc<dyn ProcessedLog>> {
    let log: Arc<dyn ProcessedLog> = match config.processed_log.backend {
        ProcessedLogBackend::File => Arc::new(FileProcessedLog::open(&config.processed_log.path)?),
        ProcessedLogBackend::Relational => Arc::new(RelationalProcessedLog::connect(&config.processed_log.path).await?),
    };
    Ok(log)
}

fn build_collaborators(config: &Config) -> (Arc<FingerprintClient>, Arc<MetadataClient>, Arc<CoverClient>, Arc<LyricsClient>) {
    let api_key = config.credentials.acoustid_api_key.clone().unwrap_or_default();
    let fingerprint = Arc::new(FingerprintClient::new(api_key));
    let metadata = Arc::new(MetadataClient::with_max_retries(config.tuning.max_retries));
    let cover = Arc::new(CoverClient::new(CoverCache::default_location()));
    let lyrics = Arc::new(LyricsClient::new());
    (fingerprint, metadata, cover, lyrics)
}

/// `processBeforeShutdown()` (§5): force-finalize and write out every
/// folder still holding a buffered-but-undecided queue, so files that were
/// already identified are never lost when the process exits.
async fn drain_pending_folders(album_batch: &AlbumBatchProcessor, config: &Config, processed_log: &dyn ProcessedLog) {
    for folder in album_batch.folders_pending_shutdown() {
        let Some(decision) = album_batch.force_finalize_decision(&folder) else {
            continue;
        };
        match album_batch.finalize_all(&folder, &decision, &config.library.output_dir, processed_log).await {
            Ok(written) => info!(?folder, count = written.len(), "drained pending folder on shutdown"),
            Err(err) => tracing::warn!(?folder, %err, "failed to drain pending folder on shutdown"),
        }
    }
}

async fn watch(config: Config, override_roots: Vec<PathBuf>) -> anyhow::Result<()> {
    let roots = if override_roots.is_empty() { config.library.watch_roots.clone() } else { override_roots };
    if roots.is_empty() {
        anyhow::bail!("no watch roots configured; pass one or set library.watch_roots in config.toml");
    }

    let processed_log = open_processed_log(&config).await?;
    let (fingerprint, metadata, cover, lyrics) = build_collaborators(&config);
    let folder_cache = Arc::new(FolderAlbumCache::new(config.tuning.duration_match_threshold));
    let album_batch = Arc::new(AlbumBatchProcessor::new(Arc::clone(&folder_cache), config.tuning.vote_sample_size));

    let processor = Arc::new(AudioFileProcessor {
        fingerprint,
        metadata,
        cover,
        lyrics,
        cue_splitter: Arc::new(NoCueSplitter),
        folder_cache: Arc::clone(&folder_cache),
        album_batch: Arc::clone(&album_batch),
        processed_log: processed_log.clone(),
        config: config.clone(),
    });

    let monitor = Arc::new(DirectoryMonitor::new(
        roots.clone(),
        Duration::from_secs(config.tuning.scan_interval_secs),
        processed_log.clone(),
        config.tuning.max_retries,
        config.library.failed_dir.clone(),
    ));

    let worker_count = config
        .tuning
        .worker_pool_size
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4));

    // Bounded so a burst of eligible files applies backpressure to the
    // scanner rather than piling up unboundedly in memory (§5).
    let (tx, rx) = mpsc::channel::<PathBuf>(worker_count * 4);
    let rx = Arc::new(Mutex::new(rx));
    let watch_roots = Arc::new(roots.clone());

    info!(roots = ?roots, workers = worker_count, "starting watch loop");

    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let rx = Arc::clone(&rx);
        let processor = Arc::clone(&processor);
        let monitor = Arc::clone(&monitor);
        let watch_roots = Arc::clone(&watch_roots);
        workers.push(tokio::spawn(async move {
            loop {
                let path = {
                    let mut rx = rx.lock().await;
                    rx.recv().await
                };
                let Some(path) = path else { break };
                let watch_root = watch_roots
                    .iter()
                    .find(|r| path.starts_with(r))
                    .cloned()
                    .unwrap_or_else(|| path.parent().unwrap_or(&path).to_path_buf());
                let outcome = processor.process(&watch_root, &path).await;
                info!(?path, ?outcome, "processed");
                monitor.record_outcome(&path, outcome).await;
            }
        }));
    }

    // Ctrl-C drops `monitor.run`'s future, which drops `tx`, closing the
    // channel; workers drain whatever's already buffered then exit on their
    // own rather than being killed mid-file.
    tokio::select! {
        result = monitor.run(tx) => result?,
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received, draining in-flight work"),
    }

    for worker in workers {
        let _ = worker.await;
    }

    drain_pending_folders(&album_batch, &config, processed_log.as_ref()).await;

    Ok(())
}

async fn scan_once(config: Config, root: PathBuf) -> anyhow::Result<()> {
    if !root.exists() {
        anyhow::bail!("root does not exist: {}", root.display());
    }

    let processed_log = open_processed_log(&config).await?;
    let (fingerprint, metadata, cover, lyrics) = build_collaborators(&config);
    let folder_cache = Arc::new(FolderAlbumCache::new(config.tuning.duration_match_threshold));
    let album_batch = Arc::new(AlbumBatchProcessor::new(Arc::clone(&folder_cache), config.tuning.vote_sample_size));

    let processor = AudioFileProcessor {
        fingerprint,
        metadata,
        cover,
        lyrics,
        cue_splitter: Arc::new(NoCueSplitter),
        folder_cache: Arc::clone(&folder_cache),
        album_batch: Arc::clone(&album_batch),
        processed_log: processed_log.clone(),
        config: config.clone(),
    };

    for entry in walkdir::WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !crate::tagio::is_supported_extension(path) {
            continue;
        }
        let outcome = processor.process(&root, path).await;
        info!(?path, ?outcome, "processed");
    }

    drain_pending_folders(&album_batch, &config, processed_log.as_ref()).await;

    Ok(())
}

fn check_tools() -> anyhow::Result<()> {
    if fpcalc::is_fpcalc_available() {
        let version = fpcalc::get_fpcalc_version().unwrap_or_else(|| "unknown version".to_string());
        println!("fpcalc found: {version}");
    } else {
        println!("fpcalc not found. Install Chromaprint: https://acoustid.org/chromaprint");
    }
    Ok(())
}

async fn stats(config: Config) -> anyhow::Result<()> {
    match config.processed_log.backend {
        ProcessedLogBackend::File => {
            let contents = std::fs::read_to_string(&config.processed_log.path).unwrap_or_default();
            println!("processed rows: {}", contents.lines().count());
        }
        ProcessedLogBackend::Relational => {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&format!("sqlite:{}?mode=ro", config.processed_log.path.display()))
                .await?;
            let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_files").fetch_one(&pool).await?;
            let (failed,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_files WHERE recording_id = ?")
                .bind(FAILED_SENTINEL)
                .fetch_one(&pool)
                .await?;
            println!("processed rows: {total} ({failed} failed)");
        }
    }
    Ok(())
}

async fn reprocess_failed(config: Config, path: PathBuf) -> anyhow::Result<()> {
    match config.processed_log.backend {
        ProcessedLogBackend::File => {
            anyhow::bail!("reprocess-failed requires the relational ProcessedLog backend");
        }
        ProcessedLogBackend::Relational => {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&format!("sqlite:{}?mode=rwc", config.processed_log.path.display()))
                .await?;
            let path_str = path.to_string_lossy().to_string();
            sqlx::query("DELETE FROM processed_files WHERE file_path = ? AND recording_id = ?")
                .bind(&path_str)
                .bind(FAILED_SENTINEL)
                .execute(&pool)
                .await?;
            println!("cleared failed record for {}", path.display());
        }
    }
    Ok(())
}
