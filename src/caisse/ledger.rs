//! Cash ledger operations
//!
//! Records journal entries and derives balances and profit by replaying
//! the append-only transaction log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::config::DEFAULT_OPERATION_TIMEOUT;
use crate::domain::{Amount, Currency, DateRange, Operation, OperationContext, Period};
use crate::error::{with_timeout, AppError, AppResult};
use crate::store::StoreDirectory;

use super::{fold_totals, Caisse, CaisseFilter, Transaction};

/// The cash-register ledger.
#[derive(Debug, Clone)]
pub struct CashLedger {
    pool: PgPool,
    directory: StoreDirectory,
    timeout: Duration,
}

impl CashLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            directory: StoreDirectory::new(pool.clone()),
            pool,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Override the per-operation timeout (from `Config::operation_timeout`).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Append one entrée/sortie transaction to the journal.
    ///
    /// Fails `Validation` when the store does not accept the currency.
    /// This is a primary write: a database failure surfaces to the caller.
    pub async fn record(
        &self,
        operation: Operation,
        amount: Amount,
        currency: Currency,
        store_id: Uuid,
        ctx: &OperationContext,
        description: &str,
        date: Option<DateTime<Utc>>,
    ) -> AppResult<Transaction> {
        with_timeout(
            self.timeout,
            self.record_inner(operation, amount, currency, store_id, ctx, description, date),
        )
        .await
    }

    async fn record_inner(
        &self,
        operation: Operation,
        amount: Amount,
        currency: Currency,
        store_id: Uuid,
        ctx: &OperationContext,
        description: &str,
        date: Option<DateTime<Utc>>,
    ) -> AppResult<Transaction> {
        if !self
            .directory
            .validate_store_currency(store_id, currency)
            .await?
        {
            return Err(AppError::Validation(format!(
                "Store {} does not accept currency {}",
                store_id, currency
            )));
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            amount: amount.value(),
            operation,
            currency,
            store_id,
            operator_id: ctx.operator_id,
            date: date.unwrap_or_else(Utc::now),
            description: description.to_string(),
        };

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, amount, operation, currency, store_id, operator_id, date, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.amount)
        .bind(transaction.operation.as_str())
        .bind(transaction.currency.as_str())
        .bind(transaction.store_id)
        .bind(transaction.operator_id)
        .bind(transaction.date)
        .bind(&transaction.description)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            transaction_id = %transaction.id,
            operation = %transaction.operation,
            amount = %transaction.amount,
            currency = %transaction.currency,
            "Caisse transaction recorded"
        );

        Ok(transaction)
    }

    /// Derived caisse view for a store set, optional currency and period.
    pub async fn balance(
        &self,
        store_ids: &[Uuid],
        currency: Option<Currency>,
        period: Option<Period>,
    ) -> AppResult<Caisse> {
        let filter = CaisseFilter {
            store_ids: store_ids.to_vec(),
            currency,
            range: period.map(|p| p.to_range()),
        };

        let transactions = self.transactions(&filter).await?;
        let (total_in, total_out) = fold_totals(&transactions);
        let total_benefice = self
            .benefice(store_ids, currency, filter.range)
            .await;

        Ok(Caisse {
            current_balance: total_in - total_out,
            total_in,
            total_out,
            total_benefice,
            currency,
            store_ids: store_ids.to_vec(),
        })
    }

    /// Total profit over sold basket items: (sale unit price − current
    /// product purchase price) × quantity.
    ///
    /// The join uses the product's *current* purchase price, not the price
    /// at sale time. A failed pipeline is logged and yields 0 so balance
    /// queries never fail on report errors.
    pub async fn benefice(
        &self,
        store_ids: &[Uuid],
        currency: Option<Currency>,
        range: Option<DateRange>,
    ) -> Decimal {
        let result: Result<Option<Decimal>, sqlx::Error> = sqlx::query_scalar(
            r#"
            SELECT SUM((si.unit_price - p.prix_achat) * si.quantity)
            FROM sale_items si
            JOIN sales s ON si.sale_id = s.id
            JOIN products p ON si.product_id = p.id
            WHERE s.store_id = ANY($1)
              AND ($2::text IS NULL OR s.currency = $2)
              AND ($3::timestamptz IS NULL OR s.date >= $3)
              AND ($4::timestamptz IS NULL OR s.date < $4)
            "#,
        )
        .bind(store_ids)
        .bind(currency.map(|c| c.as_str()))
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(total) => total.unwrap_or(Decimal::ZERO),
            Err(e) => {
                tracing::warn!(error = %e, "Benefice pipeline failed, reporting 0");
                Decimal::ZERO
            }
        }
    }

    /// Signed sum of all transactions strictly before `before`, for the
    /// report opening balance.
    pub async fn balance_before(
        &self,
        store_ids: &[Uuid],
        currency: Option<Currency>,
        before: DateTime<Utc>,
    ) -> AppResult<Decimal> {
        let total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(CASE WHEN operation = 'entree' THEN amount ELSE -amount END)
            FROM transactions
            WHERE store_id = ANY($1)
              AND ($2::text IS NULL OR currency = $2)
              AND date < $3
            "#,
        )
        .bind(store_ids)
        .bind(currency.map(|c| c.as_str()))
        .bind(before)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }

    /// Journal entries matching a filter, oldest first.
    pub async fn transactions(&self, filter: &CaisseFilter) -> AppResult<Vec<Transaction>> {
        let rows: Vec<(
            Uuid,
            Decimal,
            String,
            String,
            Uuid,
            Uuid,
            DateTime<Utc>,
            String,
        )> = sqlx::query_as(
            r#"
            SELECT id, amount, operation, currency, store_id, operator_id, date, description
            FROM transactions
            WHERE store_id = ANY($1)
              AND ($2::text IS NULL OR currency = $2)
              AND ($3::timestamptz IS NULL OR date >= $3)
              AND ($4::timestamptz IS NULL OR date < $4)
            ORDER BY date ASC
            "#,
        )
        .bind(&filter.store_ids)
        .bind(filter.currency.map(|c| c.as_str()))
        .bind(filter.range.map(|r| r.start))
        .bind(filter.range.map(|r| r.end))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(id, amount, operation, currency, store_id, operator_id, date, description)| {
                    Ok(Transaction {
                        id,
                        amount,
                        operation: operation.parse()?,
                        currency: currency.parse()?,
                        store_id,
                        operator_id,
                        date,
                        description,
                    })
                },
            )
            .collect()
    }
}
