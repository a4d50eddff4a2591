use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::sync_manager::{BatchSummary, SyncManager, SyncOptions, SyncResult};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub completed_runs: u64,
    pub failed_runs: u64,
    /// Ticks dropped because the previous run was still going.
    pub skipped_ticks: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_summary: Option<BatchSummary>,
    pub last_error: Option<String>,
}

/// Shared by the cron job closure and the scheduler handle.
pub struct StaleSyncRunner {
    manager: Arc<SyncManager>,
    running: AtomicBool,
    idle: Notify,
    shutdown: CancellationToken,
    stats: RwLock<SchedulerStats>,
}

/// Clears the running flag and wakes shutdown waiters when the run ends, even by panic.
struct RunGuard<'a>(&'a StaleSyncRunner);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
        self.0.idle.notify_waiters();
    }
}

impl StaleSyncRunner {
    pub fn new(manager: Arc<SyncManager>, shutdown: CancellationToken) -> Self {
        Self {
            manager,
            running: AtomicBool::new(false),
            idle: Notify::new(),
            shutdown,
            stats: RwLock::new(SchedulerStats::default()),
        }
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunGuard(self))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// One scheduled tick. Returns `None` when a previous run is still in
    /// progress or shutdown has begun.
    pub async fn run_once(&self) -> Option<Vec<SyncResult>> {
        if self.shutdown.is_cancelled() {
            return None;
        }

        let Some(_guard) = self.try_begin() else {
            tracing::warn!("Stale sync still running, skipping this tick");
            self.stats.write().await.skipped_ticks += 1;
            return None;
        };

        let outcome = self
            .manager
            .sync_stale_with_cancel(&SyncOptions::default(), &self.shutdown)
            .await;

        let mut stats = self.stats.write().await;
        stats.last_run = Some(Utc::now());
        match outcome {
            Ok(results) => {
                stats.completed_runs += 1;
                stats.last_summary = Some(BatchSummary::from_results(&results));
                stats.last_error = None;
                Some(results)
            }
            Err(e) => {
                tracing::error!("Stale sync run failed: {}", e);
                stats.failed_runs += 1;
                stats.last_error = Some(e.to_string());
                Some(Vec::new())
            }
        }
    }

    /// Resolves once no run is in progress.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if !self.is_running() {
                return;
            }
            idle.await;
        }
    }

    /// Refuse new ticks, stop the current batch between products, and wait
    /// for the product in flight to finish and be audited.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if self.is_running() {
            tracing::info!("Waiting for the running stale sync to finish");
        }
        self.wait_idle().await;
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }
}

/// Runs the stale-product sync on a cron schedule.
pub struct StaleSyncScheduler {
    scheduler: JobScheduler,
    runner: Arc<StaleSyncRunner>,
    config: SchedulerConfig,
    shutdown: CancellationToken,
}

impl StaleSyncScheduler {
    pub async fn new(manager: Arc<SyncManager>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduler(format!("{:?}", e)))?;
        let shutdown = CancellationToken::new();
        let runner = Arc::new(StaleSyncRunner::new(manager, shutdown.clone()));

        Ok(Self {
            scheduler,
            runner,
            config,
            shutdown,
        })
    }

    pub fn runner(&self) -> Arc<StaleSyncRunner> {
        Arc::clone(&self.runner)
    }

    pub async fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("Stale sync scheduler disabled by configuration");
            return Ok(());
        }

        let runner = Arc::clone(&self.runner);
        let job = Job::new_async(self.config.stale_sync_cron.as_str(), move |_uuid, _l| {
            let runner = Arc::clone(&runner);
            Box::pin(async move {
                if let Some(results) = runner.run_once().await {
                    tracing::debug!("Scheduled stale sync handled {} products", results.len());
                }
            })
        })
        .map_err(|e| AppError::Scheduler(format!("invalid cron {}: {:?}", self.config.stale_sync_cron, e)))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Scheduler(format!("{:?}", e)))?;
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduler(format!("{:?}", e)))?;

        tracing::info!("Stale sync scheduled with cron: {}", self.config.stale_sync_cron);
        Ok(())
    }

    /// Stop scheduling and return once an in-flight run has wound down.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.shutdown.cancel();
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduler(format!("{:?}", e)))?;
        self.runner.shutdown().await;
        tracing::info!("Stale sync scheduler shutdown");
        Ok(())
    }
}
