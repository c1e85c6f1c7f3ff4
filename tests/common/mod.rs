//! Common test utilities

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/001_initial.sql");

/// Connect to the test database and ensure the schema exists.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    // Idempotent: everything is IF NOT EXISTS
    pool.execute(SCHEMA).await.expect("Failed to apply schema");

    pool
}

/// One seeded tenant: a company with one store (USD + CDF), two products,
/// a client and a provider. Every test seeds its own tenant so tests never
/// step on each other's rows.
pub struct TestTenant {
    pub company_id: Uuid,
    pub store_id: Uuid,
    /// stock 50, prix_achat 8, prix_vente 12
    pub product_a: Uuid,
    /// stock 0, prix_achat 3, prix_vente 5
    pub product_b: Uuid,
    pub client_id: Uuid,
    pub provider_id: Uuid,
    pub operator_id: Uuid,
}

pub async fn seed_tenant(pool: &PgPool) -> TestTenant {
    let tenant = TestTenant {
        company_id: Uuid::new_v4(),
        store_id: Uuid::new_v4(),
        product_a: Uuid::new_v4(),
        product_b: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        provider_id: Uuid::new_v4(),
        operator_id: Uuid::new_v4(),
    };

    sqlx::query("INSERT INTO companies (id, name) VALUES ($1, 'Test Company')")
        .bind(tenant.company_id)
        .execute(pool)
        .await
        .expect("Failed to seed company");

    sqlx::query(
        r#"
        INSERT INTO stores (id, company_id, name, currencies)
        VALUES ($1, $2, 'Test Store', ARRAY['USD', 'CDF'])
        "#,
    )
    .bind(tenant.store_id)
    .bind(tenant.company_id)
    .execute(pool)
    .await
    .expect("Failed to seed store");

    for (id, name, stock, prix_achat, prix_vente) in [
        (tenant.product_a, "Produit A", 50, 8, 12),
        (tenant.product_b, "Produit B", 0, 3, 5),
    ] {
        sqlx::query(
            r#"
            INSERT INTO products (id, store_id, name, stock, prix_achat, prix_vente)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(tenant.store_id)
        .bind(name)
        .bind(Decimal::from(stock))
        .bind(Decimal::from(prix_achat))
        .bind(Decimal::from(prix_vente))
        .execute(pool)
        .await
        .expect("Failed to seed product");
    }

    sqlx::query("INSERT INTO clients (id, store_id, name) VALUES ($1, $2, 'Test Client')")
        .bind(tenant.client_id)
        .bind(tenant.store_id)
        .execute(pool)
        .await
        .expect("Failed to seed client");

    sqlx::query("INSERT INTO providers (id, store_id, name) VALUES ($1, $2, 'Test Provider')")
        .bind(tenant.provider_id)
        .bind(tenant.store_id)
        .execute(pool)
        .await
        .expect("Failed to seed provider");

    tenant
}

/// Current product stock, straight from the table.
pub async fn product_stock(pool: &PgPool, product_id: Uuid) -> Decimal {
    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read product stock")
}
