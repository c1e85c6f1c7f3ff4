//! Health monitoring
//!
//! A background ticker probes the database and keeps the latest snapshot in
//! an `Arc<RwLock<_>>` owned by the monitor. Readers never touch the
//! database: `snapshot()` is a lock read, cheap enough for any path.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::interval;

/// Default probe cadence.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Last observed health state.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub healthy: bool,
    /// Round-trip latency of the last probe
    pub latency: Duration,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl Default for HealthSnapshot {
    fn default() -> Self {
        Self {
            healthy: false,
            latency: Duration::ZERO,
            checked_at: Utc::now(),
            error: Some("not probed yet".to_string()),
        }
    }
}

/// Owns the shared snapshot and the pool it probes.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    pool: PgPool,
    snapshot: Arc<RwLock<HealthSnapshot>>,
    refresh_interval: Duration,
}

impl HealthMonitor {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            snapshot: Arc::new(RwLock::new(HealthSnapshot::default())),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn with_interval(pool: PgPool, refresh_interval: Duration) -> Self {
        Self {
            pool,
            snapshot: Arc::new(RwLock::new(HealthSnapshot::default())),
            refresh_interval,
        }
    }

    /// Latest snapshot. Never queries the database.
    pub async fn snapshot(&self) -> HealthSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Probe once and store the result.
    pub async fn refresh(&self) -> HealthSnapshot {
        let started = Instant::now();
        let result: Result<i32, sqlx::Error> =
            sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await;
        let latency = started.elapsed();

        let snapshot = match result {
            Ok(_) => HealthSnapshot {
                healthy: true,
                latency,
                checked_at: Utc::now(),
                error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Health probe failed");
                HealthSnapshot {
                    healthy: false,
                    latency,
                    checked_at: Utc::now(),
                    error: Some(e.to_string()),
                }
            }
        };

        *self.snapshot.write().await = snapshot.clone();
        snapshot
    }

    /// Start the background ticker. Returns a handle that can be aborted.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.refresh_interval);
            loop {
                ticker.tick().await;
                self.refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_unhealthy() {
        let snapshot = HealthSnapshot::default();
        assert!(!snapshot.healthy);
        assert!(snapshot.error.is_some());
    }
}
