//! Caisse reports
//!
//! Point-in-time balance sheet over a date range: opening balance from all
//! transactions strictly before the range, totals within it, and, when the
//! range spans more than one day, per-day buckets in date order with an
//! accumulated running balance.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::{day_bounds, Currency, DateRange};
use crate::error::AppResult;

use super::{fold_totals, CaisseFilter, CashLedger, Transaction};

/// One calendar-day bucket of a multi-day report.
#[derive(Debug, Clone)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub benefice: Decimal,
    /// Balance accumulated across days, starting from the opening balance.
    pub running_balance: Decimal,
}

/// Balance sheet over a date range.
#[derive(Debug, Clone)]
pub struct CaisseRapport {
    pub range: DateRange,
    pub opening_balance: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub closing_balance: Decimal,
    pub benefice: Decimal,
    /// Present only when the range spans more than one calendar day.
    pub daily: Vec<DailyBucket>,
    pub transactions: Vec<Transaction>,
}

impl CashLedger {
    /// Build the caisse report for a store (or all stores) over a range.
    pub async fn report(
        &self,
        store_ids: &[Uuid],
        currency: Option<Currency>,
        range: DateRange,
    ) -> AppResult<CaisseRapport> {
        let opening_balance = self
            .balance_before(store_ids, currency, range.start)
            .await?;

        let filter = CaisseFilter {
            store_ids: store_ids.to_vec(),
            currency,
            range: Some(range),
        };
        let transactions = self.transactions(&filter).await?;
        let (total_in, total_out) = fold_totals(&transactions);
        let benefice = self.benefice(store_ids, currency, Some(range)).await;

        let daily = if range.spans_multiple_days() {
            self.daily_buckets(store_ids, currency, range, &transactions, opening_balance)
                .await?
        } else {
            Vec::new()
        };

        Ok(CaisseRapport {
            range,
            opening_balance,
            total_in,
            total_out,
            closing_balance: opening_balance + total_in - total_out,
            benefice,
            daily,
            transactions,
        })
    }

    /// Bucket the range's transactions per local calendar day, in date
    /// order, each day with its own benefice and the running balance.
    async fn daily_buckets(
        &self,
        store_ids: &[Uuid],
        currency: Option<Currency>,
        range: DateRange,
        transactions: &[Transaction],
        opening_balance: Decimal,
    ) -> AppResult<Vec<DailyBucket>> {
        // Ordered container from the outset: grouping by date key keeps the
        // buckets deterministic without a post-hoc sort.
        let mut grouped: BTreeMap<NaiveDate, Vec<Transaction>> = BTreeMap::new();
        for day in range.days() {
            grouped.insert(day, Vec::new());
        }
        for transaction in transactions {
            let day = transaction
                .date
                .with_timezone(&chrono::Local)
                .date_naive();
            grouped.entry(day).or_default().push(transaction.clone());
        }

        let mut buckets = Vec::with_capacity(grouped.len());
        let mut running_balance = opening_balance;

        for (date, day_transactions) in grouped {
            let (total_in, total_out) = fold_totals(&day_transactions);
            let benefice = self
                .benefice(store_ids, currency, Some(day_bounds(date)))
                .await;
            running_balance += total_in - total_out;

            buckets.push(DailyBucket {
                date,
                total_in,
                total_out,
                benefice,
                running_balance,
            });
        }

        Ok(buckets)
    }
}
