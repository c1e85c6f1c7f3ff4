//! Stock movement log

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{DateRange, MovementKind};
use crate::error::{AppError, AppResult};

use super::StockReconciliationEngine;

/// One append-only movement. Quantity is always positive; the direction
/// lives in `kind`.
#[derive(Debug, Clone)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub quantity: Decimal,
    pub kind: MovementKind,
    pub date: DateTime<Utc>,
}

impl StockReconciliationEngine {
    /// Append one entrée/sortie movement to the log.
    ///
    /// The product must belong to the store (`Conflict` otherwise) and the
    /// quantity must be positive. Ajustement movements are not recorded
    /// directly; they come out of inventory completion.
    pub async fn record_movement(
        &self,
        product_id: Uuid,
        store_id: Uuid,
        quantity: Decimal,
        kind: MovementKind,
    ) -> AppResult<StockMovement> {
        if quantity <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Movement quantity must be positive, got {}",
                quantity
            )));
        }
        if kind == MovementKind::Ajustement {
            return Err(AppError::Validation(
                "Ajustement movements are produced by inventory completion only".to_string(),
            ));
        }

        let product = self.directory.find_product(product_id).await?;
        if product.store_id != store_id {
            return Err(AppError::Conflict(format!(
                "Product {} belongs to store {}, not {}",
                product_id, product.store_id, store_id
            )));
        }

        let movement = StockMovement {
            id: Uuid::new_v4(),
            product_id,
            store_id,
            quantity,
            kind,
            date: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, store_id, quantity, kind, date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(movement.id)
        .bind(movement.product_id)
        .bind(movement.store_id)
        .bind(movement.quantity)
        .bind(movement.kind.as_str())
        .bind(movement.date)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            movement_id = %movement.id,
            product_id = %movement.product_id,
            kind = %movement.kind,
            quantity = %movement.quantity,
            "Stock movement recorded"
        );

        Ok(movement)
    }

    /// Movements for a store, optionally narrowed to a product, a range and
    /// a kind. Oldest first.
    pub async fn movements(
        &self,
        store_id: Uuid,
        product_id: Option<Uuid>,
        range: Option<DateRange>,
        kind: Option<MovementKind>,
    ) -> AppResult<Vec<StockMovement>> {
        let rows: Vec<(Uuid, Uuid, Uuid, Decimal, String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, product_id, store_id, quantity, kind, date
            FROM stock_movements
            WHERE store_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::timestamptz IS NULL OR date >= $3)
              AND ($4::timestamptz IS NULL OR date < $4)
              AND ($5::text IS NULL OR kind = $5)
            ORDER BY date ASC
            "#,
        )
        .bind(store_id)
        .bind(product_id)
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, product_id, store_id, quantity, kind, date)| {
                Ok(StockMovement {
                    id,
                    product_id,
                    store_id,
                    quantity,
                    kind: kind.parse()?,
                    date,
                })
            })
            .collect()
    }
}
