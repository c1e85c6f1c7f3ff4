//! Store directory
//!
//! Read-side contracts consumed from the basic CRUD layer: entity lookups
//! with typed not-found errors, store/currency validation, and the atomic
//! stock increment. Reads are idempotent; `adjust_product_stock` is a single
//! atomic UPDATE so repeated invocations with the same delta are the only
//! way to double-apply.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::Currency;
use crate::error::{AppError, AppResult};

/// Product row as seen by the ledger/inventory engines.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    /// Live stock quantity
    pub stock: Decimal,
    /// Purchase price (used by benefice)
    pub prix_achat: Decimal,
    /// Sale price (used by stock valuation)
    pub prix_vente: Decimal,
}

/// Store row.
#[derive(Debug, Clone)]
pub struct Store {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
}

/// Client row.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
}

/// Lookup facade over the CRUD-owned tables.
#[derive(Debug, Clone)]
pub struct StoreDirectory {
    pool: PgPool,
}

impl StoreDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a product by id.
    pub async fn find_product(&self, product_id: Uuid) -> AppResult<Product> {
        let row: Option<(Uuid, Uuid, String, Decimal, Decimal, Decimal)> = sqlx::query_as(
            r#"
            SELECT id, store_id, name, stock, prix_achat, prix_vente
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, store_id, name, stock, prix_achat, prix_vente)| Product {
            id,
            store_id,
            name,
            stock,
            prix_achat,
            prix_vente,
        })
        .ok_or_else(|| AppError::not_found("Product", product_id))
    }

    /// Find a store by id.
    pub async fn find_store(&self, store_id: Uuid) -> AppResult<Store> {
        let row: Option<(Uuid, Uuid, String)> = sqlx::query_as(
            r#"
            SELECT id, company_id, name FROM stores WHERE id = $1
            "#,
        )
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, company_id, name)| Store {
            id,
            company_id,
            name,
        })
        .ok_or_else(|| AppError::not_found("Store", store_id))
    }

    /// Find a client by id.
    pub async fn find_client(&self, client_id: Uuid) -> AppResult<Client> {
        let row: Option<(Uuid, Uuid, String)> = sqlx::query_as(
            r#"
            SELECT id, store_id, name FROM clients WHERE id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, store_id, name)| Client {
            id,
            store_id,
            name,
        })
        .ok_or_else(|| AppError::not_found("Client", client_id))
    }

    /// Check whether a store accepts a currency.
    pub async fn validate_store_currency(
        &self,
        store_id: Uuid,
        currency: Currency,
    ) -> AppResult<bool> {
        let accepted: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT $2 = ANY(currencies) FROM stores WHERE id = $1
            "#,
        )
        .bind(store_id)
        .bind(currency.as_str())
        .fetch_optional(&self.pool)
        .await?;

        accepted.ok_or_else(|| AppError::not_found("Store", store_id))
    }

    /// Atomically apply a signed stock delta to a product.
    pub async fn adjust_product_stock(&self, product_id: Uuid, delta: Decimal) -> AppResult<()> {
        let rows = sqlx::query(
            r#"
            UPDATE products SET stock = stock + $2 WHERE id = $1
            "#,
        )
        .bind(product_id)
        .bind(delta)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Product", product_id));
        }

        Ok(())
    }
}
