//! Debt tracker
//!
//! Opens debts, applies payments and cascades the caisse entry. The payment
//! mutation is a compare-and-swap conditioned on the previously read
//! `amount_due`: two concurrent payments cannot both consume the same
//! outstanding amount.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::config::DEFAULT_OPERATION_TIMEOUT;
use crate::domain::{Amount, Currency, DebtStatus, OperationContext, PaymentType};
use crate::error::{with_timeout, AppError, AppResult};
use crate::outbox::{LedgerEntryPayload, Outbox, OutboxKind};

use super::{Debt, DebtPayment, DebtSide};

/// Result of a successful payment: the updated debt and the appended
/// payment record.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub debt: Debt,
    pub payment: DebtPayment,
}

/// Tracks one side of the debt ledger (client or provider).
#[derive(Debug, Clone)]
pub struct DebtTracker {
    pool: PgPool,
    outbox: Outbox,
    side: DebtSide,
    timeout: Duration,
}

impl DebtTracker {
    /// Tracker for client debts (opened by sales).
    pub fn client(pool: PgPool) -> Self {
        Self::new(pool, DebtSide::Client)
    }

    /// Tracker for provider debts (opened by supplies).
    pub fn provider(pool: PgPool) -> Self {
        Self::new(pool, DebtSide::Provider)
    }

    fn new(pool: PgPool, side: DebtSide) -> Self {
        Self {
            outbox: Outbox::new(pool.clone()),
            pool,
            side,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Override the per-operation timeout (from `Config::operation_timeout`).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn side(&self) -> DebtSide {
        self.side
    }

    /// Open a debt at sale/supply time.
    ///
    /// `paid + due` must equal `total`; the status is derived from the
    /// amounts, never passed in.
    pub async fn open(
        &self,
        origin_id: Uuid,
        counterparty_id: Uuid,
        store_id: Uuid,
        total: Amount,
        paid: Decimal,
        due: Decimal,
        currency: Currency,
        payment_type: PaymentType,
    ) -> AppResult<Debt> {
        if paid < Decimal::ZERO || due < Decimal::ZERO {
            return Err(AppError::Validation(
                "Debt amounts cannot be negative".to_string(),
            ));
        }
        if paid + due != total.value() {
            return Err(AppError::Validation(format!(
                "Debt amounts do not add up: paid {} + due {} != total {}",
                paid,
                due,
                total.value()
            )));
        }

        let now = Utc::now();
        let status = DebtStatus::from_amounts(paid, due);
        let debt = Debt {
            id: Uuid::new_v4(),
            origin_id,
            counterparty_id,
            store_id,
            total_amount: total.value(),
            amount_paid: paid,
            amount_due: due,
            currency,
            status,
            payment_type,
            paid_at: (status == DebtStatus::Paid).then_some(now),
            created_at: now,
        };

        let sql = format!(
            r#"
            INSERT INTO {}
                (id, origin_id, counterparty_id, store_id, total_amount,
                 amount_paid, amount_due, currency, status, payment_type,
                 paid_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
            self.side.debts_table()
        );
        sqlx::query(&sql)
            .bind(debt.id)
            .bind(debt.origin_id)
            .bind(debt.counterparty_id)
            .bind(debt.store_id)
            .bind(debt.total_amount)
            .bind(debt.amount_paid)
            .bind(debt.amount_due)
            .bind(debt.currency.as_str())
            .bind(debt.status.as_str())
            .bind(debt.payment_type.as_str())
            .bind(debt.paid_at)
            .bind(debt.created_at)
            .execute(&self.pool)
            .await?;

        Ok(debt)
    }

    /// Apply a payment to a debt on behalf of `store_id`.
    ///
    /// Errors: `NotFound` if the debt is missing, `Conflict` on overpayment,
    /// store mismatch or concurrent modification. The debt mutation and the
    /// payment row commit in one transaction (the primary write); the
    /// cascading caisse entry is a secondary write whose failure is logged
    /// while the payment still succeeds (the outbox retries it).
    pub async fn pay(
        &self,
        debt_id: Uuid,
        amount: Amount,
        store_id: Uuid,
        ctx: &OperationContext,
        description: &str,
    ) -> AppResult<PaymentOutcome> {
        with_timeout(
            self.timeout,
            self.apply_payment(debt_id, amount, store_id, ctx, description),
        )
        .await
    }

    async fn apply_payment(
        &self,
        debt_id: Uuid,
        amount: Amount,
        store_id: Uuid,
        ctx: &OperationContext,
        description: &str,
    ) -> AppResult<PaymentOutcome> {
        let debt = self
            .find(debt_id)
            .await?
            .ok_or_else(|| AppError::not_found(self.side.debt_entity(), debt_id))?;

        if store_id != debt.store_id {
            return Err(AppError::Conflict(format!(
                "Payment store {} does not match debt store {}",
                store_id, debt.store_id
            )));
        }

        if amount.value() > debt.amount_due {
            return Err(AppError::Conflict(format!(
                "Payment of {} exceeds outstanding amount {}",
                amount.value(),
                debt.amount_due
            )));
        }

        let now = Utc::now();
        let new_paid = debt.amount_paid + amount.value();
        let new_due = (debt.amount_due - amount.value()).max(Decimal::ZERO);
        let new_status = DebtStatus::from_amounts(new_paid, new_due);
        let paid_at = (new_due <= Decimal::ZERO).then_some(now);

        // The debt mutation and the payment row commit together, so a
        // cancelled or failed call can never leave one without the other.
        // The compare-and-swap on the previously read amount_due makes a
        // concurrent payment that got there first match zero rows.
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE {}
            SET amount_paid = $2,
                amount_due = $3,
                status = $4,
                paid_at = COALESCE(paid_at, $5)
            WHERE id = $1 AND amount_due = $6
            "#,
            self.side.debts_table()
        );
        let rows = sqlx::query(&sql)
            .bind(debt.id)
            .bind(new_paid)
            .bind(new_due)
            .bind(new_status.as_str())
            .bind(paid_at)
            .bind(debt.amount_due)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::Conflict(format!(
                "{} {} was modified concurrently, re-read and retry",
                self.side.debt_entity(),
                debt.id
            )));
        }

        let payment = DebtPayment {
            id: Uuid::new_v4(),
            debt_id: debt.id,
            amount: amount.value(),
            currency: debt.currency,
            operator_id: ctx.operator_id,
            store_id: debt.store_id,
            description: description.to_string(),
            created_at: now,
        };
        let sql = format!(
            r#"
            INSERT INTO {}
                (id, debt_id, amount, currency, operator_id, store_id, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            self.side.payments_table()
        );
        sqlx::query(&sql)
            .bind(payment.id)
            .bind(payment.debt_id)
            .bind(payment.amount)
            .bind(payment.currency.as_str())
            .bind(payment.operator_id)
            .bind(payment.store_id)
            .bind(payment.description.as_str())
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        // Second, independent step: the cascading caisse transaction.
        let ledger = LedgerEntryPayload {
            operation: self.side.ledger_operation(),
            amount: payment.amount,
            currency: payment.currency,
            store_id: payment.store_id,
            operator_id: payment.operator_id,
            date: payment.created_at,
            description: format!(
                "Paiement {} {}: {}",
                self.side.debt_entity(),
                debt.id,
                description
            ),
        };
        if let Err(e) = self
            .outbox
            .submit(OutboxKind::LedgerEntry, payment.id, &ledger)
            .await
        {
            tracing::error!(
                payment_id = %payment.id,
                debt_id = %debt.id,
                error = %e,
                "Cascading caisse entry could not be enqueued"
            );
        }

        let updated = Debt {
            amount_paid: new_paid,
            amount_due: new_due,
            status: new_status,
            paid_at: debt.paid_at.or(paid_at),
            ..debt
        };

        tracing::info!(
            debt_id = %updated.id,
            amount = %payment.amount,
            due = %updated.amount_due,
            status = %updated.status,
            "Debt payment applied"
        );

        Ok(PaymentOutcome {
            debt: updated,
            payment,
        })
    }

    /// Find one debt by id.
    pub async fn find(&self, debt_id: Uuid) -> AppResult<Option<Debt>> {
        let sql = format!(
            "{} WHERE id = $1",
            self.select_base()
        );
        let row: Option<DebtRow> = sqlx::query_as(&sql)
            .bind(debt_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Debt::try_from).transpose()
    }

    /// Debts owed by one counterparty, optionally scoped to a store.
    pub async fn by_counterparty(
        &self,
        counterparty_id: Uuid,
        store_id: Option<Uuid>,
    ) -> AppResult<Vec<Debt>> {
        let sql = format!(
            r#"
            {} WHERE counterparty_id = $1
               AND ($2::uuid IS NULL OR store_id = $2)
            ORDER BY created_at DESC
            "#,
            self.select_base()
        );
        let rows: Vec<DebtRow> = sqlx::query_as(&sql)
            .bind(counterparty_id)
            .bind(store_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Debt::try_from).collect()
    }

    /// Debt opened by one sale/supply. `None`, not an error, when the
    /// origin was settled fully in cash and no debt was opened.
    pub async fn by_origin(&self, origin_id: Uuid) -> AppResult<Option<Debt>> {
        let sql = format!("{} WHERE origin_id = $1", self.select_base());
        let row: Option<DebtRow> = sqlx::query_as(&sql)
            .bind(origin_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Debt::try_from).transpose()
    }

    /// Debts across a store set, optionally filtered by status.
    pub async fn by_store(
        &self,
        store_ids: &[Uuid],
        status: Option<DebtStatus>,
    ) -> AppResult<Vec<Debt>> {
        let sql = format!(
            r#"
            {} WHERE store_id = ANY($1)
               AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            self.select_base()
        );
        let rows: Vec<DebtRow> = sqlx::query_as(&sql)
            .bind(store_ids)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Debt::try_from).collect()
    }

    /// Payments recorded against one debt, oldest first.
    pub async fn payments(&self, debt_id: Uuid) -> AppResult<Vec<DebtPayment>> {
        let sql = format!(
            r#"
            SELECT id, debt_id, amount, currency, operator_id, store_id, description, created_at
            FROM {}
            WHERE debt_id = $1
            ORDER BY created_at ASC
            "#,
            self.side.payments_table()
        );
        let rows: Vec<(
            Uuid,
            Uuid,
            Decimal,
            String,
            Uuid,
            Uuid,
            String,
            DateTime<Utc>,
        )> = sqlx::query_as(&sql)
            .bind(debt_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(
                |(id, debt_id, amount, currency, operator_id, store_id, description, created_at)| {
                    Ok(DebtPayment {
                        id,
                        debt_id,
                        amount,
                        currency: currency.parse()?,
                        operator_id,
                        store_id,
                        description,
                        created_at,
                    })
                },
            )
            .collect()
    }

    fn select_base(&self) -> String {
        format!(
            r#"
            SELECT id, origin_id, counterparty_id, store_id, total_amount,
                   amount_paid, amount_due, currency, status, payment_type,
                   paid_at, created_at
            FROM {}
            "#,
            self.side.debts_table()
        )
    }
}

type DebtRow = (
    Uuid,
    Uuid,
    Uuid,
    Uuid,
    Decimal,
    Decimal,
    Decimal,
    String,
    String,
    String,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
);

impl TryFrom<DebtRow> for Debt {
    type Error = AppError;

    fn try_from(row: DebtRow) -> Result<Self, Self::Error> {
        let (
            id,
            origin_id,
            counterparty_id,
            store_id,
            total_amount,
            amount_paid,
            amount_due,
            currency,
            status,
            payment_type,
            paid_at,
            created_at,
        ) = row;

        Ok(Debt {
            id,
            origin_id,
            counterparty_id,
            store_id,
            total_amount,
            amount_paid,
            amount_due,
            currency: currency.parse()?,
            status: DebtStatus::from(status),
            payment_type: PaymentType::from(payment_type),
            paid_at,
            created_at,
        })
    }
}
