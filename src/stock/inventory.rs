//! Inventory engine
//!
//! An inventory counts physical stock against the system quantity. It is
//! mutable until it reaches a terminal state; completion can write the
//! counted differences back into product stock, one product at a time, with
//! the movement and rapport entries going through the outbox.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{InventoryStatus, MovementKind, OperationContext};
use crate::error::{with_timeout, AppError, AppResult};
use crate::outbox::{composite_id, MovementPayload, OutboxKind, RapportPayload};

use super::{fold_items, upsert_item, StockReconciliationEngine};

/// One counted product within an inventory. A re-count replaces the whole
/// item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub product_id: Uuid,
    pub product_name: String,
    /// System stock at count time
    pub expected: Decimal,
    /// Physically counted quantity
    pub counted: Decimal,
    /// counted − expected; negative means missing stock
    pub difference: Decimal,
    pub unit_price: Decimal,
    pub total_value: Decimal,
    /// Free-form explanation for the difference, when the operator gave one
    pub reason: Option<String>,
    pub counted_by: Uuid,
    pub counted_at: DateTime<Utc>,
}

/// An inventory session.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub id: Uuid,
    pub store_id: Uuid,
    pub operator_id: Uuid,
    pub status: InventoryStatus,
    pub items: Vec<InventoryItem>,
    pub total_items: i64,
    pub total_value: Decimal,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl StockReconciliationEngine {
    /// Open a new draft inventory for a store.
    pub async fn open(
        &self,
        store_id: Uuid,
        ctx: &OperationContext,
        description: &str,
    ) -> AppResult<Inventory> {
        self.directory.find_store(store_id).await?;

        let inventory = Inventory {
            id: Uuid::new_v4(),
            store_id,
            operator_id: ctx.operator_id,
            status: InventoryStatus::Draft,
            items: Vec::new(),
            total_items: 0,
            total_value: Decimal::ZERO,
            description: description.to_string(),
            start_date: Utc::now(),
            end_date: None,
        };

        sqlx::query(
            r#"
            INSERT INTO inventories
                (id, store_id, operator_id, status, items, total_items,
                 total_value, description, start_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(inventory.id)
        .bind(inventory.store_id)
        .bind(inventory.operator_id)
        .bind(inventory.status.as_str())
        .bind(serde_json::to_value(&inventory.items)?)
        .bind(inventory.total_items)
        .bind(inventory.total_value)
        .bind(&inventory.description)
        .bind(inventory.start_date)
        .execute(&self.pool)
        .await?;

        tracing::debug!(inventory_id = %inventory.id, store_id = %store_id, "Inventory opened");

        Ok(inventory)
    }

    /// Record a physical count for one product, attributed to the operator
    /// in `ctx`, with an optional reason for the difference.
    ///
    /// The first count flips Draft to InProgress. Counting the same product
    /// again replaces its item. Totals are recomputed from the item set.
    /// `Conflict` in terminal states.
    pub async fn count_item(
        &self,
        inventory_id: Uuid,
        product_id: Uuid,
        counted: Decimal,
        ctx: &OperationContext,
        reason: Option<&str>,
    ) -> AppResult<Inventory> {
        if counted < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Counted quantity cannot be negative, got {}",
                counted
            )));
        }

        let mut inventory = self.find(inventory_id).await?;
        if inventory.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Inventory {} is {}, items can no longer be counted",
                inventory.id, inventory.status
            )));
        }

        let product = self.directory.find_product(product_id).await?;
        if product.store_id != inventory.store_id {
            return Err(AppError::Conflict(format!(
                "Product {} belongs to store {}, not {}",
                product_id, product.store_id, inventory.store_id
            )));
        }

        upsert_item(
            &mut inventory.items,
            InventoryItem {
                product_id,
                product_name: product.name,
                expected: product.stock,
                counted,
                difference: counted - product.stock,
                unit_price: product.prix_vente,
                total_value: counted * product.prix_vente,
                reason: reason.map(str::to_string),
                counted_by: ctx.operator_id,
                counted_at: Utc::now(),
            },
        );
        let (total_items, total_value) = fold_items(&inventory.items);
        inventory.total_items = total_items;
        inventory.total_value = total_value;
        if inventory.status == InventoryStatus::Draft {
            inventory.status = InventoryStatus::InProgress;
        }

        sqlx::query(
            r#"
            UPDATE inventories
            SET status = $2, items = $3, total_items = $4, total_value = $5
            WHERE id = $1
            "#,
        )
        .bind(inventory.id)
        .bind(inventory.status.as_str())
        .bind(serde_json::to_value(&inventory.items)?)
        .bind(inventory.total_items)
        .bind(inventory.total_value)
        .execute(&self.pool)
        .await?;

        Ok(inventory)
    }

    /// Complete an inventory. `Conflict` if already terminal.
    ///
    /// With `adjust_stock`, every item whose counted quantity differs from
    /// the system quantity gets its signed difference applied to product
    /// stock (the primary write), then one movement and one rapport entry
    /// through the outbox. A failure on one product is logged and the next
    /// product is still reconciled.
    pub async fn complete(&self, inventory_id: Uuid, adjust_stock: bool) -> AppResult<Inventory> {
        with_timeout(self.timeout, self.complete_inner(inventory_id, adjust_stock)).await
    }

    async fn complete_inner(&self, inventory_id: Uuid, adjust_stock: bool) -> AppResult<Inventory> {
        let mut inventory = self.find(inventory_id).await?;
        if inventory.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Inventory {} is already {}",
                inventory.id, inventory.status
            )));
        }

        if adjust_stock {
            for item in &inventory.items {
                if item.difference == Decimal::ZERO {
                    continue;
                }
                if let Err(e) = self.reconcile_item(&inventory, item).await {
                    tracing::error!(
                        inventory_id = %inventory.id,
                        product_id = %item.product_id,
                        error = %e,
                        "Stock adjustment failed, continuing with remaining items"
                    );
                }
            }
        }

        let now = Utc::now();
        inventory.status = InventoryStatus::Completed;
        inventory.end_date = Some(now);
        self.close(&inventory).await?;

        tracing::info!(
            inventory_id = %inventory.id,
            adjust_stock,
            total_items = inventory.total_items,
            "Inventory completed"
        );

        Ok(inventory)
    }

    /// Cancel an inventory. No stock side effects. `Conflict` if terminal.
    pub async fn cancel(&self, inventory_id: Uuid) -> AppResult<Inventory> {
        let mut inventory = self.find(inventory_id).await?;
        if inventory.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Inventory {} is already {}",
                inventory.id, inventory.status
            )));
        }

        inventory.status = InventoryStatus::Cancelled;
        inventory.end_date = Some(Utc::now());
        self.close(&inventory).await?;

        Ok(inventory)
    }

    /// Most recent open (draft or in-progress) inventory for a store.
    pub async fn active_for(&self, store_id: Uuid) -> AppResult<Option<Inventory>> {
        let row: Option<InventoryRow> = sqlx::query_as(
            r#"
            SELECT id, store_id, operator_id, status, items, total_items,
                   total_value, description, start_date, end_date
            FROM inventories
            WHERE store_id = $1 AND status IN ('draft', 'in_progress')
            ORDER BY start_date DESC
            LIMIT 1
            "#,
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Inventory::try_from).transpose()
    }

    /// Load one inventory by id.
    pub async fn find(&self, inventory_id: Uuid) -> AppResult<Inventory> {
        let row: Option<InventoryRow> = sqlx::query_as(
            r#"
            SELECT id, store_id, operator_id, status, items, total_items,
                   total_value, description, start_date, end_date
            FROM inventories
            WHERE id = $1
            "#,
        )
        .bind(inventory_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Inventory::try_from)
            .transpose()?
            .ok_or_else(|| AppError::not_found("Inventory", inventory_id))
    }

    /// Apply one item's difference: atomic stock increment first, then the
    /// movement and rapport entries. The outbox ids fold (inventory,
    /// product), so a retried completion cannot double-write either entry.
    async fn reconcile_item(&self, inventory: &Inventory, item: &InventoryItem) -> AppResult<()> {
        self.directory
            .adjust_product_stock(item.product_id, item.difference)
            .await?;

        let kind = if item.difference > Decimal::ZERO {
            MovementKind::Entree
        } else {
            MovementKind::Sortie
        };
        let quantity = item.difference.abs();
        let date = Utc::now();
        let pair_id = composite_id(inventory.id, item.product_id);

        let movement = MovementPayload {
            product_id: item.product_id,
            store_id: inventory.store_id,
            quantity,
            kind,
            date,
        };
        if let Err(e) = self
            .outbox
            .submit(OutboxKind::StockMovement, pair_id, &movement)
            .await
        {
            tracing::warn!(
                inventory_id = %inventory.id,
                product_id = %item.product_id,
                error = %e,
                "Inventory movement could not be enqueued"
            );
        }

        let rapport = RapportPayload {
            store_id: inventory.store_id,
            product_id: item.product_id,
            quantity,
            kind: MovementKind::Ajustement,
            date,
            note: Some(format!(
                "Inventaire {}: {} compté {}, système {}",
                inventory.id, item.product_name, item.counted, item.expected
            )),
        };
        if let Err(e) = self
            .outbox
            .submit(OutboxKind::StoreRapport, pair_id, &rapport)
            .await
        {
            tracing::warn!(
                inventory_id = %inventory.id,
                product_id = %item.product_id,
                error = %e,
                "Inventory rapport could not be enqueued"
            );
        }

        Ok(())
    }

    async fn close(&self, inventory: &Inventory) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE inventories
            SET status = $2, end_date = $3
            WHERE id = $1
            "#,
        )
        .bind(inventory.id)
        .bind(inventory.status.as_str())
        .bind(inventory.end_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

type InventoryRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    serde_json::Value,
    i64,
    Decimal,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

impl TryFrom<InventoryRow> for Inventory {
    type Error = AppError;

    fn try_from(row: InventoryRow) -> Result<Self, Self::Error> {
        let (
            id,
            store_id,
            operator_id,
            status,
            items,
            total_items,
            total_value,
            description,
            start_date,
            end_date,
        ) = row;

        Ok(Inventory {
            id,
            store_id,
            operator_id,
            status: InventoryStatus::from(status),
            items: serde_json::from_value(items)?,
            total_items,
            total_value,
            description,
            start_date,
            end_date,
        })
    }
}
