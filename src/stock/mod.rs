//! Stock reconciliation
//!
//! Two layers: an append-only stock movement log (direction in `kind`,
//! quantity always positive) and the inventory engine, a small state machine
//! (draft → in progress → completed | cancelled) whose completion can
//! reconcile counted quantities back into product stock.

mod inventory;
mod movement;

pub use inventory::{Inventory, InventoryItem};
pub use movement::StockMovement;

use rust_decimal::Decimal;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DEFAULT_OPERATION_TIMEOUT;
use crate::outbox::Outbox;
use crate::store::StoreDirectory;

/// Stock movement log + inventory reconciliation engine.
#[derive(Debug, Clone)]
pub struct StockReconciliationEngine {
    pool: PgPool,
    directory: StoreDirectory,
    outbox: Outbox,
    timeout: Duration,
}

impl StockReconciliationEngine {
    pub fn new(pool: PgPool) -> Self {
        Self {
            directory: StoreDirectory::new(pool.clone()),
            outbox: Outbox::new(pool.clone()),
            pool,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Override the per-operation timeout (from `Config::operation_timeout`).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Replace-or-insert one counted item, keyed by product.
pub(crate) fn upsert_item(items: &mut Vec<InventoryItem>, item: InventoryItem) {
    match items.iter_mut().find(|i| i.product_id == item.product_id) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

/// (total items, total value) over a counted item set.
pub(crate) fn fold_items(items: &[InventoryItem]) -> (i64, Decimal) {
    items.iter().fold((0, Decimal::ZERO), |(count, value), i| {
        (count + 1, value + i.total_value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn item(product_id: Uuid, counted: Decimal, unit_price: Decimal) -> InventoryItem {
        InventoryItem {
            product_id,
            product_name: "test".to_string(),
            expected: dec!(10),
            counted,
            difference: counted - dec!(10),
            unit_price,
            total_value: counted * unit_price,
            reason: None,
            counted_by: Uuid::new_v4(),
            counted_at: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_replaces_same_product() {
        let product_id = Uuid::new_v4();
        let mut items = vec![item(product_id, dec!(5), dec!(2))];
        upsert_item(&mut items, item(product_id, dec!(8), dec!(2)));

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].counted, dec!(8));
    }

    #[test]
    fn test_upsert_appends_new_product() {
        let mut items = vec![item(Uuid::new_v4(), dec!(5), dec!(2))];
        upsert_item(&mut items, item(Uuid::new_v4(), dec!(3), dec!(4)));

        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_fold_items_totals() {
        let items = vec![
            item(Uuid::new_v4(), dec!(5), dec!(2)),
            item(Uuid::new_v4(), dec!(3), dec!(4)),
        ];
        let (count, value) = fold_items(&items);
        assert_eq!(count, 2);
        assert_eq!(value, dec!(22));
    }
}
