// src/scheduler/engine.rs

//! Cron wiring for every source plus the control surface.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::{Materializer, SyncReport, Syncer};
use crate::scheduler::worker::{ProbeOutcome, SourceWorker, WorkerStatus};
use crate::services::{ChangeNotifier, HtmlScheduleScraper, build_notifier};
use crate::storage::DocumentStore;
use crate::utils::http::create_async_client;

/// Prefix marking a control secret stored as a SHA-256 hex digest.
pub const DIGEST_PREFIX: &str = "sha256:";

/// Owns one worker per enabled source and the cron scheduler driving them.
pub struct Engine {
    workers: BTreeMap<String, Arc<SourceWorker>>,
    scheduler: Mutex<Option<JobScheduler>>,
}

impl Engine {
    pub fn new(workers: impl IntoIterator<Item = SourceWorker>) -> Self {
        Self {
            workers: workers
                .into_iter()
                .map(|w| (w.id().to_string(), Arc::new(w)))
                .collect(),
            scheduler: Mutex::new(None),
        }
    }

    /// Build workers for every enabled source in `config`.
    pub fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let client = create_async_client(&config.crawler)?;
        let notifier = ChangeNotifier::new(
            build_notifier(&config.notifier, client.clone()),
            config.notifier.clone(),
        );
        let materializer =
            Materializer::new(store, Duration::from_secs(config.store.timeout_secs));

        let mut workers = Vec::new();
        for source in config.enabled_sources() {
            let source = Arc::new(source.clone());
            let scraper = HtmlScheduleScraper::new(Arc::clone(&source), client.clone())?;
            let syncer = Syncer::new(
                source,
                Arc::new(scraper),
                materializer.clone(),
                config.crawler.max_concurrent,
            );
            workers.push(SourceWorker::new(syncer, notifier.clone()));
        }
        Ok(Self::new(workers))
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.workers.keys().map(String::as_str)
    }

    pub fn worker(&self, source_id: &str) -> Result<&Arc<SourceWorker>> {
        self.workers
            .get(source_id)
            .ok_or_else(|| AppError::UnknownSource(source_id.to_string()))
    }

    /// Seed every source, then register and start both cadences per source.
    pub async fn start(&self) -> Result<()> {
        self.seed_all().await;

        let sched = JobScheduler::new().await.map_err(AppError::scheduler)?;
        for worker in self.workers.values() {
            sched
                .add(probe_job(Arc::clone(worker))?)
                .await
                .map_err(AppError::scheduler)?;
            sched
                .add(sync_job(Arc::clone(worker))?)
                .await
                .map_err(AppError::scheduler)?;
            log::info!(
                "[{}] scheduled probe '{}' and full sync '{}'",
                worker.id(),
                worker.source().probe_cron,
                worker.source().sync_cron
            );
        }
        sched.start().await.map_err(AppError::scheduler)?;
        *self.scheduler.lock().await = Some(sched);
        Ok(())
    }

    /// Stop scheduling further ticks. Running ticks finish on their own.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(mut sched) = self.scheduler.lock().await.take() {
            sched.shutdown().await.map_err(AppError::scheduler)?;
        }
        Ok(())
    }

    /// Initial sync of every source. Failures are logged per source.
    pub async fn seed_all(&self) {
        join_all(self.workers.values().map(|worker| async move {
            if let Err(e) = worker.seed(Utc::now()).await {
                log::error!("[{}] seed sync failed: {e}", worker.id());
            }
        }))
        .await;
    }

    /// One full sync of every source, outside the cadences.
    pub async fn sync_all_once(&self) -> Vec<(String, Result<SyncReport>)> {
        join_all(self.workers.values().map(|worker| async move {
            (worker.id().to_string(), worker.force_full_sync(Utc::now()).await)
        }))
        .await
    }

    pub async fn arm_probe(&self, source_id: &str) -> Result<()> {
        self.worker(source_id)?.arm().await;
        log::info!("[{source_id}] probe armed by control request");
        Ok(())
    }

    pub async fn disarm_probe(&self, source_id: &str) -> Result<()> {
        self.worker(source_id)?.disarm().await;
        log::info!("[{source_id}] probe disarmed by control request");
        Ok(())
    }

    pub async fn force_full_sync(&self, source_id: &str) -> Result<SyncReport> {
        self.worker(source_id)?.force_full_sync(Utc::now()).await
    }

    pub fn status(&self, source_id: &str) -> Result<WorkerStatus> {
        Ok(self.worker(source_id)?.status())
    }

    /// Check a caller-supplied secret against the source's control secret.
    ///
    /// The configured secret is either plain text or `sha256:<hex digest>`.
    /// An empty configured secret rejects everything.
    pub fn verify_secret(&self, source_id: &str, secret: &str) -> Result<bool> {
        let configured = self.worker(source_id)?.source().control_secret.trim();
        if configured.is_empty() {
            return Ok(false);
        }

        let given = Sha256::digest(secret.as_bytes());
        let expected = match configured.strip_prefix(DIGEST_PREFIX) {
            Some(digest) => match hex::decode(digest.trim()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("[{source_id}] control secret digest is not valid hex: {e}");
                    return Ok(false);
                }
            },
            None => Sha256::digest(configured.as_bytes()).to_vec(),
        };
        Ok(given.as_slice() == expected.as_slice())
    }
}

fn probe_job(worker: Arc<SourceWorker>) -> Result<Job> {
    let cron = worker.source().probe_cron.clone();
    Job::new_async(cron.as_str(), move |_uuid, _l| {
        let worker = Arc::clone(&worker);
        Box::pin(async move {
            match worker.probe_tick(Utc::now()).await {
                Ok(ProbeOutcome::Skipped) => log::debug!("[{}] probe disarmed, skipping", worker.id()),
                Ok(ProbeOutcome::NoData) => log::warn!("[{}] probe got no slot states", worker.id()),
                Ok(ProbeOutcome::Unchanged) => {}
                Ok(ProbeOutcome::Changed { report, notified }) => log::info!(
                    "[{}] probe-triggered sync done: {} lessons, notified: {notified}",
                    worker.id(),
                    report.lesson_count
                ),
                Err(e) => log::error!("[{}] probe tick failed: {e}", worker.id()),
            }
        })
    })
    .map_err(|e| AppError::config(format!("invalid probe_cron '{cron}': {e:?}")))
}

fn sync_job(worker: Arc<SourceWorker>) -> Result<Job> {
    let cron = worker.source().sync_cron.clone();
    Job::new_async(cron.as_str(), move |_uuid, _l| {
        let worker = Arc::clone(&worker);
        Box::pin(async move {
            if let Err(e) = worker.full_sync_tick(Utc::now()).await {
                log::error!("[{}] full sync tick failed: {e}", worker.id());
            }
        })
    })
    .map_err(|e| AppError::config(format!("invalid sync_cron '{cron}': {e:?}")))
}
