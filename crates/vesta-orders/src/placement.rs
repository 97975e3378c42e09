//! # Order Placement Service
//!
//! All-or-nothing order placement: reserve stock line-by-line, snapshot
//! prices, compute the exact total, and compensate fully on any mid-flight
//! failure.
//!
//! ## Placement Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      place(buyer, items)                            │
//! │                                                                     │
//! │  1. merge + validate items (pure, no storage touched yet)           │
//! │  2. insert Pending order, total 0                                   │
//! │  3. for each merged item:                                           │
//! │       ProductStock::reserve ── failure ──► ROLLBACK:                │
//! │                                             release every taken     │
//! │                                             reservation, delete     │
//! │                                             the placeholder order,  │
//! │                                             return the error        │
//! │  4. insert one line per reservation (qty + frozen snapshots)        │
//! │  5. total = Σ(line totals); persist on the order                    │
//! │  6. enqueue "order_placed" notification                             │
//! │       └─ enqueue failure is logged, the order stays committed       │
//! │                                                                     │
//! │  Partial orders are never left visible: by the time an error        │
//! │  returns, stock deltas are released and the placeholder is gone.    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tracing::{error, info, warn};

use crate::confirmation::OrderConfirmation;
use crate::error::{OrderError, OrderResult};
use crate::notify::{queue_notification, OrderNotification};
use crate::stock::{ProductStock, Reservation};
use vesta_core::{merge_order_items, Money, Order, OrderItemRequest, OrderLine, OrderStatus};
use vesta_db::repository::order::generate_order_id;
use vesta_db::Database;

// =============================================================================
// Service
// =============================================================================

/// Orchestrates "place order" against the catalog and order storage.
#[derive(Debug, Clone)]
pub struct OrderPlacementService {
    db: Database,
    stock: ProductStock,
}

impl OrderPlacementService {
    /// Creates a placement service over the given database.
    pub fn new(db: Database) -> Self {
        let stock = ProductStock::new(&db);
        OrderPlacementService { db, stock }
    }

    /// Places an order for `buyer_user_id`.
    ///
    /// Duplicate product IDs in `items` are merged (quantities summed), not
    /// rejected. The call is all-or-nothing: on any reservation or
    /// persistence failure every already-applied effect is compensated
    /// before the error returns.
    ///
    /// ## Errors
    /// * `Validation` - empty list, non-positive quantity, blank IDs
    /// * `NotFound` - a product is unknown or inactive
    /// * `InsufficientStock` - a product can't cover its merged quantity
    /// * `ConcurrencyExhausted` - a product kept losing version races
    /// * `Unavailable` / `Storage` - storage faults
    pub async fn place(
        &self,
        buyer_user_id: &str,
        items: &[OrderItemRequest],
    ) -> OrderResult<OrderConfirmation> {
        if buyer_user_id.trim().is_empty() {
            return Err(OrderError::Validation(
                vesta_core::ValidationError::Required {
                    field: "buyerUserId".to_string(),
                },
            ));
        }

        let merged = merge_order_items(items)?;

        let orders = self.db.orders();
        let now = Utc::now();

        // Placeholder row first: lines need the order ID, and a failed
        // placement deletes it again on the way out.
        let order = Order {
            id: generate_order_id(),
            buyer_user_id: buyer_user_id.to_string(),
            status: OrderStatus::Pending,
            total_cents: 0,
            created_at: now,
            status_updated_at: None,
            updated_at: now,
            version: 0,
        };
        orders.insert(&order).await?;

        // Reserve stock item by item. Earlier reservations are released if a
        // later one fails.
        let mut reservations: Vec<Reservation> = Vec::with_capacity(merged.len());
        for item in &merged {
            match self.stock.reserve(&item.product_id, item.quantity).await {
                Ok(reservation) => reservations.push(reservation),
                Err(err) => {
                    warn!(
                        order_id = %order.id,
                        product_id = %item.product_id,
                        %err,
                        "Reservation failed, rolling back placement"
                    );
                    self.rollback(&order.id, &reservations).await;
                    return Err(err);
                }
            }
        }

        // Persist lines with the frozen snapshots.
        let mut lines: Vec<OrderLine> = Vec::with_capacity(reservations.len());
        for reservation in &reservations {
            let line = OrderLine {
                order_id: order.id.clone(),
                product_id: reservation.product_id.clone(),
                sku_snapshot: reservation.sku.clone(),
                name_snapshot: reservation.name.clone(),
                unit_price_cents: reservation.unit_price_cents,
                quantity: reservation.quantity,
                line_total_cents: Money::from_cents(reservation.unit_price_cents)
                    .multiply_quantity(reservation.quantity)
                    .cents(),
                created_at: now,
            };

            if let Err(err) = orders.insert_line(&line).await {
                error!(order_id = %order.id, product_id = %line.product_id, %err, "Line insert failed, rolling back placement");
                self.rollback(&order.id, &reservations).await;
                return Err(err.into());
            }

            lines.push(line);
        }

        // The total is the exact sum of persisted line totals.
        let total: Money = lines.iter().map(|l| l.line_total()).sum();
        if let Err(err) = orders.set_total(&order.id, total.cents()).await {
            error!(order_id = %order.id, %err, "Total update failed, rolling back placement");
            self.rollback(&order.id, &reservations).await;
            return Err(err.into());
        }

        // Post-commit notification; a failing outbox never unwinds the order.
        let notification = OrderNotification::placed(&order.id, buyer_user_id, total.cents());
        if let Err(err) = queue_notification(&self.db, &notification).await {
            warn!(order_id = %order.id, %err, "Failed to enqueue order placed notification");
        }

        info!(
            order_id = %order.id,
            buyer = %buyer_user_id,
            total = %total,
            lines = lines.len(),
            "Order placed"
        );

        let committed = Order {
            total_cents: total.cents(),
            version: order.version + 1,
            ..order
        };
        Ok(OrderConfirmation::from_parts(&committed, &lines))
    }

    /// Compensates a failed placement: releases every taken reservation and
    /// deletes the placeholder order (with any lines already written).
    ///
    /// Compensation failures are logged and do not mask the original error;
    /// stock release and row deletion are retried by ops tooling, not here.
    async fn rollback(&self, order_id: &str, reservations: &[Reservation]) {
        for reservation in reservations {
            if let Err(err) = self
                .stock
                .release(&reservation.product_id, reservation.quantity)
                .await
            {
                error!(
                    order_id = %order_id,
                    product_id = %reservation.product_id,
                    quantity = reservation.quantity,
                    %err,
                    "Failed to release reservation during placement rollback"
                );
            }
        }

        if let Err(err) = self.db.orders().delete_order(order_id).await {
            error!(order_id = %order_id, %err, "Failed to delete placeholder order during placement rollback");
        }
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

    fn item(product: &Product, qty: i64) -> OrderItemRequest {
        OrderItemRequest::new(product.id.clone(), qty)
    }

    /// The concrete scenario: stock 5, price $10.00, place 3 units.
    #[tokio::test]
    async fn test_place_reserves_stock_and_snapshots_price() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let product = seed_product(&db, "PLC-1", 5, 1000).await;

        let confirmation = service.place("user-1", &[item(&product, 3)]).await.unwrap();

        assert_eq!(confirmation.status, OrderStatus::Pending);
        assert_eq!(confirmation.total_cents, 3000);
        assert_eq!(confirmation.lines.len(), 1);
        assert_eq!(confirmation.lines[0].quantity, 3);
        assert_eq!(confirmation.lines[0].unit_price_cents, 1000);
        assert_eq!(confirmation.lines[0].line_total_cents, 3000);
        assert_eq!(confirmation.lines[0].sku, "PLC-1");

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 2);

        // The persisted order matches the confirmation.
        let order = db
            .orders()
            .get_by_id(&confirmation.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.total_cents, 3000);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    /// Second placement for the same product must fail once stock is short,
    /// leaving the decremented stock untouched.
    #[tokio::test]
    async fn test_second_placement_fails_on_remaining_stock() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let product = seed_product(&db, "PLC-2", 5, 1000).await;

        service.place("user-1", &[item(&product, 3)]).await.unwrap();

        let err = service
            .place("user-2", &[item(&product, 3)])
            .await
            .unwrap_err();
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

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 2);
        assert_eq!(db.orders().count().await.unwrap(), 1);
    }

    /// Total must equal Σ(quantity × unit price snapshot) exactly, across
    /// multiple lines.
    #[tokio::test]
    async fn test_total_is_exact_sum_of_line_totals() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let p1 = seed_product(&db, "SUM-1", 10, 199).await;
        let p2 = seed_product(&db, "SUM-2", 10, 1049).await;
        let p3 = seed_product(&db, "SUM-3", 10, 1).await;

        let confirmation = service
            .place(
                "user-1",
                &[item(&p1, 3), item(&p2, 2), item(&p3, 7)],
            )
            .await
            .unwrap();

        let expected = 3 * 199 + 2 * 1049 + 7;
        assert_eq!(confirmation.total_cents, expected);

        let line_sum: i64 = confirmation.lines.iter().map(|l| l.line_total_cents).sum();
        assert_eq!(confirmation.total_cents, line_sum);
    }

    /// Duplicate product IDs merge into one line with summed quantity.
    #[tokio::test]
    async fn test_duplicate_products_merge() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let product = seed_product(&db, "MRG-1", 10, 500).await;

        let confirmation = service
            .place("user-1", &[item(&product, 2), item(&product, 3)])
            .await
            .unwrap();

        assert_eq!(confirmation.lines.len(), 1);
        assert_eq!(confirmation.lines[0].quantity, 5);
        assert_eq!(confirmation.total_cents, 2500);

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 5);
    }

    /// An unknown product anywhere in the request leaves zero new rows
    /// visible: earlier reservations released, placeholder deleted.
    #[tokio::test]
    async fn test_unknown_product_rolls_back_everything() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let good = seed_product(&db, "RB-1", 5, 1000).await;

        let err = service
            .place(
                "user-1",
                &[
                    item(&good, 2),
                    OrderItemRequest::new("missing-product", 1),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));

        // No stock delta survives.
        let after = db.products().get_by_id(&good.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 5);

        // No order or lines survive.
        assert_eq!(db.orders().count().await.unwrap(), 0);

        // No notification was queued.
        assert_eq!(db.notifications().count_pending().await.unwrap(), 0);
    }

    /// Insufficient stock on a later line releases the earlier reservations.
    #[tokio::test]
    async fn test_insufficient_later_line_releases_earlier_reservations() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let p1 = seed_product(&db, "RB-2", 5, 1000).await;
        let p2 = seed_product(&db, "RB-3", 1, 1000).await;

        let err = service
            .place("user-1", &[item(&p1, 5), item(&p2, 2)])
            .await
            .unwrap_err();
        match err {
            OrderError::InsufficientStock { product_id, .. } => assert_eq!(product_id, p2.id),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        let p1_after = db.products().get_by_id(&p1.id).await.unwrap().unwrap();
        let p2_after = db.products().get_by_id(&p2.id).await.unwrap().unwrap();
        assert_eq!(p1_after.available_qty, 5);
        assert_eq!(p2_after.available_qty, 1);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_items_rejected() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());

        let err = service.place("user-1", &[]).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let product = seed_product(&db, "VAL-1", 5, 1000).await;

        let err = service.place("user-1", &[item(&product, 0)]).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));

        let after = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.available_qty, 5);
    }

    #[tokio::test]
    async fn test_blank_buyer_rejected() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let product = seed_product(&db, "VAL-2", 5, 1000).await;

        let err = service.place("  ", &[item(&product, 1)]).await.unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    /// Successful placement queues exactly one "order_placed" notification.
    #[tokio::test]
    async fn test_placement_enqueues_notification() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let product = seed_product(&db, "NTF-1", 5, 1000).await;

        let confirmation = service.place("user-1", &[item(&product, 1)]).await.unwrap();

        let pending = db.notifications().get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, "order_placed");
        assert_eq!(pending[0].order_id, confirmation.order_id);

        let payload: OrderNotification = serde_json::from_str(&pending[0].payload).unwrap();
        assert_eq!(payload.total_cents, 1000);
        assert_eq!(payload.buyer_user_id, "user-1");
    }

    /// Price snapshots are frozen: a later catalog price change doesn't
    /// alter persisted lines or totals.
    #[tokio::test]
    async fn test_price_snapshot_survives_catalog_change() {
        let db = test_db().await;
        let service = OrderPlacementService::new(db.clone());
        let product = seed_product(&db, "SNAP-1", 5, 1000).await;

        let confirmation = service.place("user-1", &[item(&product, 2)]).await.unwrap();

        // Catalog price changes after placement.
        sqlx::query("UPDATE products SET price_cents = 9999, version = version + 1 WHERE id = ?1")
            .bind(&product.id)
            .execute(db.pool())
            .await
            .unwrap();

        let lines = db.orders().get_lines(&confirmation.order_id).await.unwrap();
        assert_eq!(lines[0].unit_price_cents, 1000);
        assert_eq!(lines[0].line_total_cents, 2000);

        let order = db
            .orders()
            .get_by_id(&confirmation.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.total_cents, 2000);
    }
}
