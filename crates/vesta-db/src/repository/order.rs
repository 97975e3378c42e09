//! # Order Repository
//!
//! Database operations for orders and their lines.
//!
//! ## Aggregate Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Order Aggregate                                 │
//! │                                                                     │
//! │  orders                         order_lines                         │
//! │  ──────────────────             ───────────────────────────         │
//! │  id (PK)               ◄──────  order_id (FK, CASCADE)              │
//! │  buyer_user_id                  product_id                          │
//! │  status                         sku_snapshot / name_snapshot        │
//! │  total_cents                    unit_price_cents (frozen)           │
//! │  status_updated_at              quantity                            │
//! │  version (OCC token)            line_total_cents                    │
//! │                                                                     │
//! │  Lines are created atomically with placement and immutable after;   │
//! │  cancel/refund operate at order granularity.                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Status writes are version-guarded; `rows_affected() == 0` means the
//! caller's read went stale and the read-validate-write cycle must retry.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use vesta_core::{Order, OrderLine, OrderStatus};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, buyer_user_id, status, total_cents,
                created_at, status_updated_at, updated_at, version
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Inserts a new order row.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, buyer = %order.buyer_user_id, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, buyer_user_id, status, total_cents,
                created_at, status_updated_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&order.id)
        .bind(&order.buyer_user_id)
        .bind(order.status)
        .bind(order.total_cents)
        .bind(order.created_at)
        .bind(order.status_updated_at)
        .bind(order.updated_at)
        .bind(order.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Adds a line to an order.
    ///
    /// ## Snapshot Pattern
    /// Product details (sku, name, unit price) are copied onto the line,
    /// so order history survives later catalog edits.
    pub async fn insert_line(&self, line: &OrderLine) -> DbResult<()> {
        debug!(order_id = %line.order_id, product_id = %line.product_id, "Adding order line");

        sqlx::query(
            r#"
            INSERT INTO order_lines (
                order_id, product_id,
                sku_snapshot, name_snapshot, unit_price_cents,
                quantity, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&line.order_id)
        .bind(&line.product_id)
        .bind(&line.sku_snapshot)
        .bind(&line.name_snapshot)
        .bind(line.unit_price_cents)
        .bind(line.quantity)
        .bind(line.line_total_cents)
        .bind(line.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets all lines for an order, in insertion order.
    pub async fn get_lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT
                order_id, product_id,
                sku_snapshot, name_snapshot, unit_price_cents,
                quantity, line_total_cents, created_at
            FROM order_lines
            WHERE order_id = ?1
            ORDER BY created_at, product_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Persists the recomputed order total (version bump).
    pub async fn set_total(&self, order_id: &str, total_cents: i64) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET
                total_cents = ?2,
                updated_at = ?3,
                version = version + 1
            WHERE id = ?1
            "#,
        )
        .bind(order_id)
        .bind(total_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }

    /// Attempts a version-guarded status transition.
    ///
    /// ## Returns
    /// * `Ok(true)` - status written, `status_updated_at` set, version bumped
    /// * `Ok(false)` - conflict: the order changed since the caller's read
    pub async fn try_transition_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        expected_version: i64,
    ) -> DbResult<bool> {
        debug!(order_id = %order_id, new_status = %new_status, expected_version = %expected_version, "Attempting status transition");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET
                status = ?2,
                status_updated_at = ?3,
                updated_at = ?3,
                version = version + 1
            WHERE id = ?1 AND version = ?4
            "#,
        )
        .bind(order_id)
        .bind(new_status)
        .bind(now)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancels an order and restores stock for every line, atomically.
    ///
    /// ## Transaction Shape
    /// ```text
    /// BEGIN
    ///   UPDATE orders SET status = 'cancelled', ... WHERE id AND version  ─┐
    ///   (0 rows → ROLLBACK, Ok(false))                                     │
    ///   for each line:                                                     │ one
    ///     UPDATE products SET available_qty += qty, version += 1           │ commit
    ///     (0 rows → ROLLBACK, Err(NotFound))                               │
    /// COMMIT                                                              ─┘
    /// ```
    ///
    /// Either the status write and every restock land together, or none do.
    ///
    /// ## Returns
    /// * `Ok(true)` - cancelled, stock restored
    /// * `Ok(false)` - version conflict; caller re-reads and retries
    pub async fn cancel_with_restock(
        &self,
        order_id: &str,
        expected_version: i64,
        lines: &[OrderLine],
    ) -> DbResult<bool> {
        debug!(order_id = %order_id, lines = lines.len(), "Cancelling order with stock restore");

        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET
                status = ?2,
                status_updated_at = ?3,
                updated_at = ?3,
                version = version + 1
            WHERE id = ?1 AND version = ?4
            "#,
        )
        .bind(order_id)
        .bind(OrderStatus::Cancelled)
        .bind(now)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
            return Ok(false);
        }

        for line in lines {
            let restocked = sqlx::query(
                r#"
                UPDATE products
                SET
                    available_qty = available_qty + ?2,
                    updated_at = ?3,
                    version = version + 1
                WHERE id = ?1
                "#,
            )
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if restocked.rows_affected() == 0 {
                tx.rollback()
                    .await
                    .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
                return Err(DbError::not_found("Product", &line.product_id));
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(true)
    }

    /// Deletes an order and its lines.
    ///
    /// Only for placement rollback of an uncommitted placeholder; committed
    /// orders are never deleted (cancellation is a status).
    pub async fn delete_order(&self, order_id: &str) -> DbResult<()> {
        debug!(order_id = %order_id, "Deleting placeholder order");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query("DELETE FROM order_lines WHERE order_id = ?1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    /// Counts all orders (for diagnostics and rollback tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Generates a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::generate_product_id;
    use vesta_core::Product;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn pending_order(buyer: &str) -> Order {
        let now = Utc::now();
        Order {
            id: generate_order_id(),
            buyer_user_id: buyer.to_string(),
            status: OrderStatus::Pending,
            total_cents: 0,
            created_at: now,
            status_updated_at: None,
            updated_at: now,
            version: 0,
        }
    }

    fn product(sku: &str, qty: i64, price_cents: i64) -> Product {
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

    fn line_for(order: &Order, product: &Product, quantity: i64) -> OrderLine {
        OrderLine {
            order_id: order.id.clone(),
            product_id: product.id.clone(),
            sku_snapshot: product.sku.clone(),
            name_snapshot: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity,
            line_total_cents: product.price_cents * quantity,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_with_lines() {
        let db = test_db().await;

        let p = product("ORD-P1", 10, 250);
        db.products().insert(&p).await.unwrap();

        let order = pending_order("user-1");
        db.orders().insert(&order).await.unwrap();
        db.orders().insert_line(&line_for(&order, &p, 4)).await.unwrap();

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.buyer_user_id, "user-1");
        assert!(loaded.status_updated_at.is_none());

        let lines = db.orders().get_lines(&order.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 4);
        assert_eq!(lines[0].unit_price_cents, 250);
        assert_eq!(lines[0].line_total_cents, 1000);
    }

    #[tokio::test]
    async fn test_duplicate_line_for_same_product_rejected() {
        let db = test_db().await;

        let p = product("ORD-P2", 10, 100);
        db.products().insert(&p).await.unwrap();

        let order = pending_order("user-1");
        db.orders().insert(&order).await.unwrap();
        db.orders().insert_line(&line_for(&order, &p, 1)).await.unwrap();

        let err = db.orders().insert_line(&line_for(&order, &p, 2)).await;
        assert!(matches!(err, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_set_total() {
        let db = test_db().await;

        let order = pending_order("user-1");
        db.orders().insert(&order).await.unwrap();
        db.orders().set_total(&order.id, 3000).await.unwrap();

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_cents, 3000);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_transition_status_version_guard() {
        let db = test_db().await;

        let order = pending_order("user-1");
        db.orders().insert(&order).await.unwrap();

        assert!(db
            .orders()
            .try_transition_status(&order.id, OrderStatus::Paid, 0)
            .await
            .unwrap());

        // Stale version: no effect.
        assert!(!db
            .orders()
            .try_transition_status(&order.id, OrderStatus::Shipped, 0)
            .await
            .unwrap());

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Paid);
        assert_eq!(loaded.version, 1);
        assert!(loaded.status_updated_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_with_restock_restores_every_line() {
        let db = test_db().await;

        let p1 = product("CXL-P1", 2, 500);
        let p2 = product("CXL-P2", 7, 300);
        db.products().insert(&p1).await.unwrap();
        db.products().insert(&p2).await.unwrap();

        // Simulate a reserved state.
        assert!(db.products().try_reserve(&p1.id, 2, 0).await.unwrap());
        assert!(db.products().try_reserve(&p2.id, 3, 0).await.unwrap());

        let order = pending_order("user-1");
        db.orders().insert(&order).await.unwrap();
        let lines = vec![line_for(&order, &p1, 2), line_for(&order, &p2, 3)];
        for line in &lines {
            db.orders().insert_line(line).await.unwrap();
        }

        let cancelled = db
            .orders()
            .cancel_with_restock(&order.id, 0, &lines)
            .await
            .unwrap();
        assert!(cancelled);

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Cancelled);

        // Round-trip: stock back to its pre-reservation values.
        let p1_after = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        let p2_after = db.products().get_by_id(&p2.id).await.unwrap().unwrap();
        assert_eq!(p1_after.available_qty, 2);
        assert_eq!(p2_after.available_qty, 7);
    }

    #[tokio::test]
    async fn test_cancel_with_restock_conflict_changes_nothing() {
        let db = test_db().await;

        let p = product("CXL-P3", 5, 100);
        db.products().insert(&p).await.unwrap();
        assert!(db.products().try_reserve(&p.id, 2, 0).await.unwrap());

        let order = pending_order("user-1");
        db.orders().insert(&order).await.unwrap();
        let lines = vec![line_for(&order, &p, 2)];
        db.orders().insert_line(&lines[0]).await.unwrap();

        // Stale order version: the whole transaction backs out.
        let cancelled = db
            .orders()
            .cancel_with_restock(&order.id, 99, &lines)
            .await
            .unwrap();
        assert!(!cancelled);

        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);

        let p_after = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(p_after.available_qty, 3);
    }

    #[tokio::test]
    async fn test_cancel_with_restock_unknown_product_rolls_back() {
        let db = test_db().await;

        let p = product("CXL-P4", 5, 100);
        db.products().insert(&p).await.unwrap();

        let order = pending_order("user-1");
        db.orders().insert(&order).await.unwrap();

        let mut bad_line = line_for(&order, &p, 1);
        db.orders().insert_line(&bad_line).await.unwrap();
        bad_line.product_id = "missing-product".to_string();

        let err = db
            .orders()
            .cancel_with_restock(&order.id, 0, &[bad_line])
            .await;
        assert!(matches!(err, Err(DbError::NotFound { .. })));

        // The status write rolled back with the failed restock.
        let loaded = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn test_delete_order_removes_lines() {
        let db = test_db().await;

        let p = product("DEL-P1", 5, 100);
        db.products().insert(&p).await.unwrap();

        let order = pending_order("user-1");
        db.orders().insert(&order).await.unwrap();
        db.orders().insert_line(&line_for(&order, &p, 1)).await.unwrap();

        db.orders().delete_order(&order.id).await.unwrap();

        assert!(db.orders().get_by_id(&order.id).await.unwrap().is_none());
        assert!(db.orders().get_lines(&order.id).await.unwrap().is_empty());
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }
}
