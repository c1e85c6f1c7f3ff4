//! Database module
//!
//! Schema verification at startup. Schema itself lives in raw SQL files
//! under migrations/.

use sqlx::PgPool;

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let required_tables = vec![
        "companies",
        "stores",
        "products",
        "clients",
        "providers",
        "sales",
        "sale_items",
        "transactions",
        "debts",
        "debt_payments",
        "provider_debts",
        "provider_debt_payments",
        "stock_movements",
        "store_rapports",
        "inventories",
        "exchange_rate_history",
        "outbox_entries",
    ];

    for table in required_tables {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    Ok(true)
}
