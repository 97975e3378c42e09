//! # Product Stock Service
//!
//! Atomic stock reservation and release on top of the version-guarded
//! repository primitives.
//!
//! ## The CAS Retry Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    reserve(product, qty)                            │
//! │                                                                     │
//! │  attempt = 0                                                        │
//! │     │                                                               │
//! │     ▼                                                               │
//! │  read product row ──── missing/inactive ──► NotFound                │
//! │     │                                                               │
//! │     ▼                                                               │
//! │  available < qty? ────────────────────────► InsufficientStock       │
//! │     │                                                               │
//! │     ▼                                                               │
//! │  UPDATE ... WHERE id = ? AND version = <read version>               │
//! │     │                                                               │
//! │     ├── 1 row  ──► Ok(Reservation with the price just read)         │
//! │     │                                                               │
//! │     └── 0 rows ──► another writer won; backoff, re-read, retry      │
//! │                    (bounded: MAX_CAS_ATTEMPTS, then                 │
//! │                     ConcurrencyExhausted)                           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The version match guarantees that the availability check and the price
//! snapshot refer to the exact row state the decrement lands on: two
//! concurrent reservations can never both succeed against stale state.

use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{OrderError, OrderResult};
use vesta_db::{Database, ProductRepository};

// =============================================================================
// Constants
// =============================================================================

/// Bound on CAS retries before surfacing `ConcurrencyExhausted`.
pub const MAX_CAS_ATTEMPTS: u32 = 4;

/// Base backoff between CAS attempts; grows linearly per attempt.
const CAS_BACKOFF_BASE: Duration = Duration::from_millis(2);

// =============================================================================
// Reservation
// =============================================================================

/// The result of a successful stock reservation: the decremented quantity
/// plus the product state frozen at the instant of the decrement.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub product_id: String,
    pub quantity: i64,
    /// The product's version after the decrement.
    pub new_version: i64,
    /// Unit price in effect when the decrement landed (the snapshot).
    pub unit_price_cents: i64,
    /// SKU at reservation time, for the line snapshot.
    pub sku: String,
    /// Name at reservation time, for the line snapshot.
    pub name: String,
}

// =============================================================================
// Product Stock
// =============================================================================

/// Stock reservation/release service for a product catalog.
#[derive(Debug, Clone)]
pub struct ProductStock {
    products: ProductRepository,
}

impl ProductStock {
    /// Creates a ProductStock over the given database.
    pub fn new(db: &Database) -> Self {
        ProductStock {
            products: db.products(),
        }
    }

    /// Atomically reserves `quantity` units of a product.
    ///
    /// ## Errors
    /// * `NotFound` - product unknown or soft-deleted
    /// * `InsufficientStock` - fewer than `quantity` units available
    /// * `ConcurrencyExhausted` - lost the version race on every attempt
    pub async fn reserve(&self, product_id: &str, quantity: i64) -> OrderResult<Reservation> {
        for attempt in 0..MAX_CAS_ATTEMPTS {
            let product = self
                .products
                .get_by_id(product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or_else(|| OrderError::not_found("Product", product_id))?;

            if !product.can_fulfill(quantity) {
                return Err(OrderError::InsufficientStock {
                    product_id: product_id.to_string(),
                    available: product.available_qty,
                    requested: quantity,
                });
            }

            if self
                .products
                .try_reserve(product_id, quantity, product.version)
                .await?
            {
                debug!(
                    product_id = %product_id,
                    quantity = %quantity,
                    new_version = product.version + 1,
                    "Stock reserved"
                );
                return Ok(Reservation {
                    product_id: product_id.to_string(),
                    quantity,
                    new_version: product.version + 1,
                    unit_price_cents: product.price_cents,
                    sku: product.sku,
                    name: product.name,
                });
            }

            debug!(
                product_id = %product_id,
                attempt = attempt + 1,
                "Lost stock version race, retrying"
            );
            sleep(CAS_BACKOFF_BASE * (attempt + 1)).await;
        }

        Err(OrderError::ConcurrencyExhausted {
            product_id: product_id.to_string(),
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    /// Releases `quantity` units back to a product's stock.
    ///
    /// Used on cancellation and on placement rollback. The caller guarantees
    /// at-most-once invocation per reservation.
    pub async fn release(&self, product_id: &str, quantity: i64) -> OrderResult<()> {
        self.products.restock(product_id, quantity).await?;
        debug!(product_id = %product_id, quantity = %quantity, "Stock released");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use vesta_core::Product;
    use vesta_db::DbConfig;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, sku: &str, qty: i64, price_cents: i64) -> Product {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            name: format!("{sku} (test)"),
            description: None,
            price_cents,
            available_qty: qty,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        db.products().insert(&product).await.unwrap();
        product
    }

    #[tokio::test]
    async fn test_reserve_returns_price_snapshot_and_version() {
        let db = test_db().await;
        let stock = ProductStock::new(&db);
        let product = seed_product(&db, "STK-1", 5, 1000).await;

        let reservation = stock.reserve(&product.id, 3).await.unwrap();
        assert_eq!(reservation.quantity, 3);
        assert_eq!(reservation.unit_price_cents, 1000);
        assert_eq!(reservation.new_version, 1);
        assert_eq!(reservation.sku, "STK-1");

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 2);
        assert_eq!(after.version, 1);
    }

    #[tokio::test]
    async fn test_reserve_unknown_product() {
        let db = test_db().await;
        let stock = ProductStock::new(&db);

        let err = stock.reserve("no-such-product", 1).await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reserve_inactive_product_is_not_found() {
        let db = test_db().await;
        let stock = ProductStock::new(&db);
        let product = seed_product(&db, "STK-2", 5, 1000).await;
        db.products().soft_delete(&product.id).await.unwrap();

        let err = stock.reserve(&product.id, 1).await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reserve_insufficient_stock() {
        let db = test_db().await;
        let stock = ProductStock::new(&db);
        let product = seed_product(&db, "STK-3", 2, 1000).await;

        let err = stock.reserve(&product.id, 3).await.unwrap_err();
        match err {
            OrderError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Nothing was decremented.
        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 2);
        assert_eq!(after.version, 0);
    }

    #[tokio::test]
    async fn test_release_round_trips_stock() {
        let db = test_db().await;
        let stock = ProductStock::new(&db);
        let product = seed_product(&db, "STK-4", 5, 1000).await;

        stock.reserve(&product.id, 4).await.unwrap();
        stock.release(&product.id, 4).await.unwrap();

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 5);
    }

    /// Concurrent reservations summing past the available stock: exactly the
    /// reservations that fit succeed, the rest see InsufficientStock, and
    /// stock never goes negative.
    ///
    /// Each CAS failure implies another task committed in between, and only
    /// successful decrements bump the version, so with 5 tasks the retry
    /// bound can never be hit - outcomes are deterministic.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_oversell() {
        let db = test_db().await;
        let stock = ProductStock::new(&db);
        let product = seed_product(&db, "STK-5", 3, 1000).await;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let stock = stock.clone();
            let product_id = product.id.clone();
            handles.push(tokio::spawn(
                async move { stock.reserve(&product_id, 1).await },
            ));
        }

        let mut successes = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(OrderError::InsufficientStock { .. }) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(successes, 3);
        assert_eq!(insufficient, 2);

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 0);
        assert_eq!(after.version, 3);
    }

    /// Two concurrent multi-unit reservations against stock that only fits
    /// one of them: one wins, the loser fails cleanly.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_bulk_reservations() {
        let db = test_db().await;
        let stock = ProductStock::new(&db);
        let product = seed_product(&db, "STK-6", 5, 1000).await;

        let a = {
            let stock = stock.clone();
            let id = product.id.clone();
            tokio::spawn(async move { stock.reserve(&id, 3).await })
        };
        let b = {
            let stock = stock.clone();
            let id = product.id.clone();
            tokio::spawn(async move { stock.reserve(&id, 3).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let failures = results
            .iter()
            .filter(|r| matches!(r, Err(OrderError::InsufficientStock { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(failures, 1);

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 2);
    }
}
