//! Report aggregator
//!
//! Read-only views over the stock movement log and the product table:
//! per-product movement reports with daily buckets and store-level stock
//! statistics. Reports never mutate state; a report over an empty range is
//! an empty report, not an error.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::{DateRange, MovementKind};
use crate::error::AppResult;

/// Products with 0 < stock below this count as low stock.
const LOW_STOCK_THRESHOLD: i64 = 10;
/// How many top movers stock_stats returns.
const TOP_MOVERS_LIMIT: i64 = 10;

/// One calendar-day bucket of a product's movement report.
#[derive(Debug, Clone)]
pub struct StockDayBucket {
    pub date: NaiveDate,
    pub total_in: Decimal,
    pub total_out: Decimal,
    /// The product's quantity at range start, repeated on every bucket.
    /// Kept for compatibility with the historical report shape; use
    /// `running_balance` for the per-day quantity.
    pub opening_balance: Decimal,
    /// Cumulative quantity through the end of this day.
    pub running_balance: Decimal,
}

/// Movement report for one product over the range.
#[derive(Debug, Clone)]
pub struct ProductStockReport {
    pub product_id: Uuid,
    pub product_name: String,
    /// Signed sum of movements strictly before the range.
    pub opening_quantity: Decimal,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub closing_quantity: Decimal,
    pub daily: Vec<StockDayBucket>,
}

/// Full stock report: per-product sections in name order.
#[derive(Debug, Clone)]
pub struct StockReportData {
    pub store_id: Uuid,
    pub range: DateRange,
    pub products: Vec<ProductStockReport>,
}

/// One entry of the top-movers list.
#[derive(Debug, Clone)]
pub struct TopMover {
    pub product_id: Uuid,
    pub product_name: String,
    /// Total movement volume (entrées + sorties) within the range.
    pub volume: Decimal,
}

/// Store-level stock statistics.
#[derive(Debug, Clone)]
pub struct StockStatsData {
    pub store_id: Uuid,
    pub total_products: i64,
    /// Σ stock × prix_vente over the product set.
    pub total_stock_value: Decimal,
    /// Products with stock ≤ 0.
    pub out_of_stock: i64,
    /// Products with 0 < stock < threshold.
    pub low_stock: i64,
    pub top_movers: Vec<TopMover>,
}

/// Read-only aggregator over movements and products.
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    pool: PgPool,
}

impl ReportAggregator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Movement report for a store over a range, optionally narrowed to one
    /// product and one movement kind. Products sorted by name, days in date
    /// order.
    pub async fn stock_report(
        &self,
        store_id: Uuid,
        product_id: Option<Uuid>,
        range: DateRange,
        kind: Option<MovementKind>,
    ) -> AppResult<StockReportData> {
        let openings = self.openings_before(store_id, product_id, range.start).await?;

        let rows: Vec<(Uuid, String, Decimal, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT m.product_id, p.name, m.quantity, m.kind, m.date
            FROM stock_movements m
            JOIN products p ON m.product_id = p.id
            WHERE m.store_id = $1
              AND ($2::uuid IS NULL OR m.product_id = $2)
              AND m.date >= $3 AND m.date < $4
              AND ($5::text IS NULL OR m.kind = $5)
            ORDER BY p.name ASC, m.date ASC
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(range.start)
        .bind(range.end)
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await?;

        // Product sections keyed by (name, id), days within each keyed by
        // local date: both orderings fall out of the map.
        let mut grouped: BTreeMap<(String, Uuid), BTreeMap<NaiveDate, (Decimal, Decimal)>> =
            BTreeMap::new();
        for (product_id, name, quantity, kind, date) in rows {
            let day = date.with_timezone(&chrono::Local).date_naive();
            let (total_in, total_out) = grouped
                .entry((name, product_id))
                .or_default()
                .entry(day)
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            match kind.parse::<MovementKind>()? {
                MovementKind::Sortie => *total_out += quantity,
                _ => *total_in += quantity,
            }
        }

        let products = grouped
            .into_iter()
            .map(|((product_name, product_id), days)| {
                let opening_quantity = openings
                    .get(&product_id)
                    .copied()
                    .unwrap_or(Decimal::ZERO);

                let mut running_balance = opening_quantity;
                let mut total_in = Decimal::ZERO;
                let mut total_out = Decimal::ZERO;
                let daily = days
                    .into_iter()
                    .map(|(date, (day_in, day_out))| {
                        total_in += day_in;
                        total_out += day_out;
                        running_balance += day_in - day_out;
                        StockDayBucket {
                            date,
                            total_in: day_in,
                            total_out: day_out,
                            opening_balance: opening_quantity,
                            running_balance,
                        }
                    })
                    .collect();

                ProductStockReport {
                    product_id,
                    product_name,
                    opening_quantity,
                    total_in,
                    total_out,
                    closing_quantity: opening_quantity + total_in - total_out,
                    daily,
                }
            })
            .collect();

        Ok(StockReportData {
            store_id,
            range,
            products,
        })
    }

    /// Store statistics: product counts, valuation and the range's top
    /// movers by volume.
    pub async fn stock_stats(
        &self,
        store_id: Uuid,
        product_id: Option<Uuid>,
        range: DateRange,
    ) -> AppResult<StockStatsData> {
        let (total_products, total_stock_value, out_of_stock, low_stock): (
            i64,
            Option<Decimal>,
            i64,
            i64,
        ) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   SUM(stock * prix_vente),
                   COUNT(*) FILTER (WHERE stock <= 0),
                   COUNT(*) FILTER (WHERE stock > 0 AND stock < $3)
            FROM products
            WHERE store_id = $1
              AND ($2::uuid IS NULL OR id = $2)
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(Decimal::from(LOW_STOCK_THRESHOLD))
        .fetch_one(&self.pool)
        .await?;

        let movers: Vec<(Uuid, String, Decimal)> = sqlx::query_as(
            r#"
            SELECT m.product_id, p.name, SUM(m.quantity) AS volume
            FROM stock_movements m
            JOIN products p ON m.product_id = p.id
            WHERE m.store_id = $1
              AND ($2::uuid IS NULL OR m.product_id = $2)
              AND m.date >= $3 AND m.date < $4
            GROUP BY m.product_id, p.name
            ORDER BY volume DESC
            LIMIT $5
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(range.start)
        .bind(range.end)
        .bind(TOP_MOVERS_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(StockStatsData {
            store_id,
            total_products,
            total_stock_value: total_stock_value.unwrap_or(Decimal::ZERO),
            out_of_stock,
            low_stock,
            top_movers: movers
                .into_iter()
                .map(|(product_id, product_name, volume)| TopMover {
                    product_id,
                    product_name,
                    volume,
                })
                .collect(),
        })
    }

    /// Per-product signed quantity from all movements strictly before
    /// `before`.
    async fn openings_before(
        &self,
        store_id: Uuid,
        product_id: Option<Uuid>,
        before: DateTime<Utc>,
    ) -> AppResult<BTreeMap<Uuid, Decimal>> {
        let rows: Vec<(Uuid, Option<Decimal>)> = sqlx::query_as(
            r#"
            SELECT product_id,
                   SUM(CASE WHEN kind = 'sortie' THEN -quantity ELSE quantity END)
            FROM stock_movements
            WHERE store_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND date < $3
            GROUP BY product_id
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, total)| (id, total.unwrap_or(Decimal::ZERO)))
            .collect())
    }
}
