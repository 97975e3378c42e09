//! # Product Repository
//!
//! Database operations for catalog products and their stock.
//!
//! ## Stock Mutation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │               Version-Guarded Stock Updates                         │
//! │                                                                     │
//! │  Reservation (decrement) is conditional on the version token:       │
//! │                                                                     │
//! │    UPDATE products                                                  │
//! │    SET available_qty = available_qty - ?, version = version + 1     │
//! │    WHERE id = ? AND version = ? AND available_qty >= ?              │
//! │                                                                     │
//! │  rows_affected = 1  → the caller's read was still current; the      │
//! │                       decrement and the price it read are one       │
//! │                       consistent snapshot                           │
//! │  rows_affected = 0  → another writer got there first; the caller    │
//! │                       re-reads and retries                          │
//! │                                                                     │
//! │  Release (increment) is a plain atomic delta - no precondition,     │
//! │  stock only grows:                                                  │
//! │                                                                     │
//! │    UPDATE products                                                  │
//! │    SET available_qty = available_qty + ?, version = version + 1     │
//! │    WHERE id = ?                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The CAS retry loop around `try_reserve` lives in the service layer
//! (`vesta-orders::stock`); this repository only issues single statements.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use vesta_core::Product;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, description,
                price_cents, available_qty, is_active,
                created_at, updated_at, version
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, description,
                price_cents, available_qty, is_active,
                created_at, updated_at, version
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products, sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, description,
                price_cents, available_qty, is_active,
                created_at, updated_at, version
            FROM products
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, description,
                price_cents, available_qty, is_active,
                created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.available_qty)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Attempts a version-guarded stock decrement.
    ///
    /// ## Arguments
    /// * `id` - product ID
    /// * `quantity` - units to reserve (>= 1)
    /// * `expected_version` - the version the caller read the row at
    ///
    /// ## Returns
    /// * `Ok(true)` - decrement applied, version bumped
    /// * `Ok(false)` - conflict: the row changed since the caller's read
    ///   (or stock dropped below the requested quantity); re-read and retry
    pub async fn try_reserve(
        &self,
        id: &str,
        quantity: i64,
        expected_version: i64,
    ) -> DbResult<bool> {
        debug!(id = %id, quantity = %quantity, expected_version = %expected_version, "Attempting stock reservation");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                available_qty = available_qty - ?2,
                updated_at = ?3,
                version = version + 1
            WHERE id = ?1 AND version = ?4 AND available_qty >= ?2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Restores stock by `quantity` units (atomic delta, version bump).
    ///
    /// Used on order cancellation rollback paths. At-most-once semantics per
    /// transition are the caller's responsibility.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - product doesn't exist
    pub async fn restock(&self, id: &str, quantity: i64) -> DbResult<()> {
        debug!(id = %id, quantity = %quantity, "Restoring stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                available_qty = available_qty + ?2,
                updated_at = ?3,
                version = version + 1
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical order lines still reference the row, so it is never
    /// removed.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET
                is_active = 0,
                updated_at = ?2,
                version = version + 1
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    fn sample_product(sku: &str, qty: i64, price_cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            sku: sku.to_string(),
            name: format!("{sku} (test)"),
            description: None,
            price_cents,
            available_qty: qty,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let repo = db.products();

        let product = sample_product("COLA-330", 5, 199);
        repo.insert(&product).await.unwrap();

        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.sku, "COLA-330");
        assert_eq!(loaded.available_qty, 5);
        assert_eq!(loaded.version, 0);

        let by_sku = repo.get_by_sku("COLA-330").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = test_db().await;
        let repo = db.products();

        repo.insert(&sample_product("DUP-1", 1, 100)).await.unwrap();
        let err = repo.insert(&sample_product("DUP-1", 1, 100)).await;
        assert!(matches!(err, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_try_reserve_decrements_and_bumps_version() {
        let db = test_db().await;
        let repo = db.products();

        let product = sample_product("RSV-1", 5, 1000);
        repo.insert(&product).await.unwrap();

        let ok = repo.try_reserve(&product.id, 3, 0).await.unwrap();
        assert!(ok);

        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.available_qty, 2);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_try_reserve_stale_version_conflicts() {
        let db = test_db().await;
        let repo = db.products();

        let product = sample_product("RSV-2", 5, 1000);
        repo.insert(&product).await.unwrap();

        // First write at version 0 wins; a second write against the stale
        // version affects zero rows.
        assert!(repo.try_reserve(&product.id, 1, 0).await.unwrap());
        assert!(!repo.try_reserve(&product.id, 1, 0).await.unwrap());

        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.available_qty, 4);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_try_reserve_never_oversells() {
        let db = test_db().await;
        let repo = db.products();

        let product = sample_product("RSV-3", 2, 1000);
        repo.insert(&product).await.unwrap();

        // Even with the correct version, a decrement past zero is refused.
        assert!(!repo.try_reserve(&product.id, 3, 0).await.unwrap());

        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.available_qty, 2);
    }

    #[tokio::test]
    async fn test_restock_round_trip() {
        let db = test_db().await;
        let repo = db.products();

        let product = sample_product("RST-1", 5, 1000);
        repo.insert(&product).await.unwrap();

        assert!(repo.try_reserve(&product.id, 4, 0).await.unwrap());
        repo.restock(&product.id, 4).await.unwrap();

        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.available_qty, 5);
        // Two mutations, two version bumps.
        assert_eq!(loaded.version, 2);
    }

    #[tokio::test]
    async fn test_restock_unknown_product() {
        let db = test_db().await;
        let repo = db.products();

        let err = repo.restock("no-such-id", 1).await;
        assert!(matches!(err, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_soft_delete_and_count() {
        let db = test_db().await;
        let repo = db.products();

        let product = sample_product("DEL-1", 1, 100);
        repo.insert(&product).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.soft_delete(&product.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);

        // Row still exists for historical lines.
        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert!(!loaded.is_active);
    }
}
