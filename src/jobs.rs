//! Scheduled jobs
//!
//! Background maintenance: retrying pending outbox entries and purging
//! completed ones past their retention window. Jobs never take locks held
//! by request paths; each tick is independent and a failed tick is logged
//! and retried on the next one.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::interval;

use crate::outbox::{Outbox, OutboxError, RetryReport};

/// Configuration for the job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval between outbox retry sweeps (default: 30 seconds)
    pub outbox_retry_interval: Duration,
    /// Interval between purge sweeps (default: 1 hour)
    pub outbox_purge_interval: Duration,
    /// Completed entries older than this many hours are purged (default: 72)
    pub outbox_retention_hours: i64,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            outbox_retry_interval: Duration::from_secs(30),
            outbox_purge_interval: Duration::from_secs(3600),
            outbox_retention_hours: 72,
        }
    }
}

/// Retry every pending outbox entry once.
pub async fn retry_pending_outbox(pool: &PgPool) -> Result<RetryReport, JobError> {
    let report = Outbox::new(pool.clone()).retry_pending().await?;

    if report.completed > 0 || report.failed > 0 {
        tracing::info!(
            completed = report.completed,
            pending = report.pending,
            failed = report.failed,
            "Outbox retry sweep finished"
        );
    }

    Ok(report)
}

/// Purge completed outbox entries older than the retention window.
pub async fn purge_completed_outbox(pool: &PgPool, retention_hours: i64) -> Result<u64, JobError> {
    let rows_deleted = Outbox::new(pool.clone())
        .purge_completed(retention_hours)
        .await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted, "Purged completed outbox entries");
    }

    Ok(rows_deleted)
}

/// Job scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    pool: PgPool,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: JobSchedulerConfig::default(),
        }
    }

    pub fn with_config(pool: PgPool, config: JobSchedulerConfig) -> Self {
        Self { pool, config }
    }

    /// Start the scheduler in the background.
    /// Returns a handle that can be used to abort it.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!("Job scheduler started");

        let mut retry_interval = interval(self.config.outbox_retry_interval);
        let mut purge_interval = interval(self.config.outbox_purge_interval);

        loop {
            tokio::select! {
                _ = retry_interval.tick() => {
                    if let Err(e) = retry_pending_outbox(&self.pool).await {
                        tracing::error!(error = %e, "Outbox retry sweep failed");
                    }
                }
                _ = purge_interval.tick() => {
                    if let Err(e) = purge_completed_outbox(
                        &self.pool,
                        self.config.outbox_retention_hours,
                    ).await {
                        tracing::error!(error = %e, "Outbox purge failed");
                    }
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing).
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match retry_pending_outbox(&self.pool).await {
            Ok(retry) => report.outbox_retry = retry,
            Err(e) => report.errors.push(format!("Outbox retry: {}", e)),
        }

        match purge_completed_outbox(&self.pool, self.config.outbox_retention_hours).await {
            Ok(count) => report.outbox_entries_purged = count,
            Err(e) => report.errors.push(format!("Outbox purge: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub outbox_retry: RetryReport,
    pub outbox_entries_purged: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Outbox error: {0}")]
    Outbox(#[from] OutboxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.outbox_retry_interval, Duration::from_secs(30));
        assert_eq!(config.outbox_purge_interval, Duration::from_secs(3600));
        assert_eq!(config.outbox_retention_hours, 72);
    }

    #[test]
    fn test_maintenance_report_default() {
        let report = MaintenanceReport::default();
        assert_eq!(report.outbox_retry, RetryReport::default());
        assert_eq!(report.errors.len(), 0);
    }
}
