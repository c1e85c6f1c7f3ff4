//! Outbox for secondary writes
//!
//! Multi-step workflows (debt payment -> ledger entry, inventory completion
//! -> movement + rapport, rate update -> history row) execute the primary
//! write first, then each dependent write as an outbox entry. Entry ids are
//! deterministic (a UUID folded from SHA-256 of the kind and primary id) and
//! every target insert is keyed by that same id with ON CONFLICT DO NOTHING,
//! so a retried step can never double-apply.
//!
//! A failed execution leaves the entry pending; the job scheduler retries it
//! with bounded attempts. The submitting workflow logs the failure and still
//! reports success for its primary write.

mod entry;

pub use entry::{
    LedgerEntryPayload, MovementPayload, OutboxEntry, OutboxKind, OutboxStatus,
    RapportPayload, RateHistoryPayload,
};

use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

/// Maximum delivery attempts before an entry is marked failed.
const MAX_ATTEMPTS: i32 = 5;

/// Outbox errors
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown outbox kind: {0}")]
    UnknownKind(String),
}

/// Deterministic operation id for a secondary write.
///
/// Folds SHA-256(kind, primary id) into a UUID. The same (kind, primary id)
/// always yields the same id, across retries and across processes.
pub fn operation_id(kind: OutboxKind, primary_id: Uuid) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(primary_id.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Fold two ids into one, for secondary writes keyed by a pair (one stock
/// adjustment per inventory per product).
pub fn composite_id(a: Uuid, b: Uuid) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(a.as_bytes());
    hasher.update(b.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

/// Outbox over the `outbox_entries` table.
#[derive(Debug, Clone)]
pub struct Outbox {
    pool: PgPool,
}

impl Outbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a secondary write and attempt it once, immediately.
    ///
    /// The pending row is persisted first so a crash between the two steps
    /// leaves a retryable entry. An execution failure is logged and reported
    /// as `Ok` with a pending status; the primary operation must not fail
    /// because of it.
    pub async fn submit<P: Serialize>(
        &self,
        kind: OutboxKind,
        primary_id: Uuid,
        payload: &P,
    ) -> Result<OutboxEntry, OutboxError> {
        let id = operation_id(kind, primary_id);
        let payload = serde_json::to_value(payload)?;

        sqlx::query(
            r#"
            INSERT INTO outbox_entries (id, kind, payload, status, attempts)
            VALUES ($1, $2, $3, 'pending', 0)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        let mut entry = OutboxEntry {
            id,
            kind,
            payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
        };

        match self.execute(&entry).await {
            Ok(()) => {
                self.mark_completed(id).await?;
                entry.status = OutboxStatus::Completed;
            }
            Err(e) => {
                tracing::warn!(
                    entry_id = %id,
                    kind = %kind,
                    error = %e,
                    "Secondary write failed, left pending for retry"
                );
                self.record_attempt(id, &e.to_string()).await?;
                entry.attempts = 1;
                entry.last_error = Some(e.to_string());
            }
        }

        Ok(entry)
    }

    /// Apply one entry to its target table. Idempotent by construction:
    /// every insert is keyed by the entry id.
    async fn execute(&self, entry: &OutboxEntry) -> Result<(), OutboxError> {
        match entry.kind {
            OutboxKind::LedgerEntry => {
                let p: LedgerEntryPayload = serde_json::from_value(entry.payload.clone())?;
                sqlx::query(
                    r#"
                    INSERT INTO transactions
                        (id, amount, operation, currency, store_id, operator_id, date, description)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(entry.id)
                .bind(p.amount)
                .bind(p.operation.as_str())
                .bind(p.currency.as_str())
                .bind(p.store_id)
                .bind(p.operator_id)
                .bind(p.date)
                .bind(&p.description)
                .execute(&self.pool)
                .await?;
            }
            OutboxKind::StockMovement => {
                let p: MovementPayload = serde_json::from_value(entry.payload.clone())?;
                sqlx::query(
                    r#"
                    INSERT INTO stock_movements
                        (id, product_id, store_id, quantity, kind, date)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(entry.id)
                .bind(p.product_id)
                .bind(p.store_id)
                .bind(p.quantity)
                .bind(p.kind.as_str())
                .bind(p.date)
                .execute(&self.pool)
                .await?;
            }
            OutboxKind::StoreRapport => {
                let p: RapportPayload = serde_json::from_value(entry.payload.clone())?;
                sqlx::query(
                    r#"
                    INSERT INTO store_rapports
                        (id, store_id, product_id, quantity, kind, date, note)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(entry.id)
                .bind(p.store_id)
                .bind(p.product_id)
                .bind(p.quantity)
                .bind(p.kind.as_str())
                .bind(p.date)
                .bind(&p.note)
                .execute(&self.pool)
                .await?;
            }
            OutboxKind::RateHistory => {
                let p: RateHistoryPayload = serde_json::from_value(entry.payload.clone())?;
                sqlx::query(
                    r#"
                    INSERT INTO exchange_rate_history
                        (id, company_id, from_currency, to_currency, rate,
                         previous_rate, updated_by, updated_at, reason)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(entry.id)
                .bind(p.company_id)
                .bind(p.from.as_str())
                .bind(p.to.as_str())
                .bind(p.rate)
                .bind(p.previous_rate)
                .bind(p.updated_by)
                .bind(p.updated_at)
                .bind(&p.reason)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    /// Retry every pending entry once. Entries that exhaust their attempts
    /// are marked failed. Returns (completed, still pending, failed).
    pub async fn retry_pending(&self) -> Result<RetryReport, OutboxError> {
        let rows: Vec<(Uuid, String, serde_json::Value, i32)> = sqlx::query_as(
            r#"
            SELECT id, kind, payload, attempts
            FROM outbox_entries
            WHERE status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut report = RetryReport::default();

        for (id, kind, payload, attempts) in rows {
            let kind = match kind.parse::<OutboxKind>() {
                Ok(k) => k,
                Err(_) => {
                    tracing::error!(entry_id = %id, kind = %kind, "Unknown outbox kind, marking failed");
                    self.mark_failed(id, "unknown kind").await?;
                    report.failed += 1;
                    continue;
                }
            };

            let entry = OutboxEntry {
                id,
                kind,
                payload,
                status: OutboxStatus::Pending,
                attempts,
                last_error: None,
            };

            match self.execute(&entry).await {
                Ok(()) => {
                    self.mark_completed(id).await?;
                    report.completed += 1;
                }
                Err(e) if attempts + 1 >= MAX_ATTEMPTS => {
                    tracing::error!(
                        entry_id = %id,
                        kind = %kind,
                        attempts = attempts + 1,
                        error = %e,
                        "Outbox entry exhausted retries"
                    );
                    self.mark_failed(id, &e.to_string()).await?;
                    report.failed += 1;
                }
                Err(e) => {
                    self.record_attempt(id, &e.to_string()).await?;
                    report.pending += 1;
                }
            }
        }

        Ok(report)
    }

    /// Remove completed entries older than the retention window.
    pub async fn purge_completed(&self, older_than_hours: i64) -> Result<u64, OutboxError> {
        let rows = sqlx::query(
            r#"
            DELETE FROM outbox_entries
            WHERE status = 'completed'
              AND completed_at < NOW() - ($1 || ' hours')::interval
            "#,
        )
        .bind(older_than_hours.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows)
    }

    /// Load one entry (test and inspection hook).
    pub async fn get(&self, id: Uuid) -> Result<Option<OutboxEntry>, OutboxError> {
        let row: Option<(Uuid, String, serde_json::Value, String, i32, Option<String>)> =
            sqlx::query_as(
                r#"
                SELECT id, kind, payload, status, attempts, last_error
                FROM outbox_entries
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(id, kind, payload, status, attempts, last_error)| {
            let kind = kind
                .parse::<OutboxKind>()
                .map_err(OutboxError::UnknownKind)?;
            Ok(OutboxEntry {
                id,
                kind,
                payload,
                status: OutboxStatus::from(status),
                attempts,
                last_error,
            })
        })
        .transpose()
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            UPDATE outbox_entries
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            UPDATE outbox_entries
            SET status = 'failed', attempts = attempts + 1, last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_attempt(&self, id: Uuid, error: &str) -> Result<(), OutboxError> {
        sqlx::query(
            r#"
            UPDATE outbox_entries
            SET attempts = attempts + 1, last_error = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Outcome of one retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub completed: u64,
    pub pending: u64,
    pub failed: u64,
}
