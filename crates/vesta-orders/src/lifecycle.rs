//! # Order Lifecycle Service
//!
//! Applies status transitions with optimistic-concurrency retry, restores
//! stock on cancellation, and serves the stable order read shape.
//!
//! ## Transition Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │          transition(order_id, requested, actor, privileged)         │
//! │                                                                     │
//! │  attempt = 0                                                        │
//! │     │                                                               │
//! │     ▼                                                               │
//! │  load order ─── missing ──► NotFound                                │
//! │     │                                                               │
//! │     ▼                                                               │
//! │  validate_transition(current, requested, privileged, owns)          │
//! │     │         └── InvalidTransition / Forbidden pass through        │
//! │     ▼                                                               │
//! │  requested == Cancelled?                                            │
//! │     ├── yes: status write + per-line restock in ONE transaction     │
//! │     └── no:  version-guarded status write                           │
//! │     │                                                               │
//! │     ├── applied ──► reload, enqueue notification (cancel only),     │
//! │     │               return the updated order                        │
//! │     └── conflict ──► backoff, retry full read-validate-write        │
//! │                      (bounded: MAX_TRANSITION_ATTEMPTS → Conflict)  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Re-validating after every conflict matters: if a concurrent writer
//! already cancelled the order, the retry sees the terminal status and
//! reports `InvalidTransition` instead of double-applying - which is also
//! what keeps stock restoration at most-once per order.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::confirmation::OrderConfirmation;
use crate::error::{OrderError, OrderResult};
use crate::notify::{queue_notification, OrderNotification};
use vesta_core::{validate_transition, Order, OrderStatus};
use vesta_db::Database;

// =============================================================================
// Constants
// =============================================================================

/// Bound on read-validate-write retries before surfacing `Conflict`.
pub const MAX_TRANSITION_ATTEMPTS: u32 = 4;

/// Base backoff between transition attempts; grows linearly per attempt.
const TRANSITION_BACKOFF_BASE: Duration = Duration::from_millis(2);

// =============================================================================
// Service
// =============================================================================

/// Orchestrates order status transitions and reads.
#[derive(Debug, Clone)]
pub struct OrderLifecycleService {
    db: Database,
}

impl OrderLifecycleService {
    /// Creates a lifecycle service over the given database.
    pub fn new(db: Database) -> Self {
        OrderLifecycleService { db }
    }

    /// Transitions an order to `requested`, on behalf of an actor.
    ///
    /// The caller's auth layer resolves `actor_user_id` and `privileged`
    /// before this is invoked; ownership is derived from the order row.
    ///
    /// ## Errors
    /// * `NotFound` - unknown order
    /// * `InvalidTransition` / `Forbidden` - rejected by the state machine
    /// * `Conflict` - concurrent writers won every bounded retry
    /// * `Unavailable` / `Storage` - storage faults
    pub async fn transition(
        &self,
        order_id: &str,
        requested: OrderStatus,
        actor_user_id: &str,
        privileged: bool,
    ) -> OrderResult<Order> {
        let orders = self.db.orders();

        for attempt in 0..MAX_TRANSITION_ATTEMPTS {
            let order = orders
                .get_by_id(order_id)
                .await?
                .ok_or_else(|| OrderError::not_found("Order", order_id))?;

            let owns_order = order.buyer_user_id == actor_user_id;
            validate_transition(order.status, requested, privileged, owns_order)?;

            let applied = if requested == OrderStatus::Cancelled {
                // Status write and stock restoration commit together or not
                // at all.
                let lines = orders.get_lines(order_id).await?;
                orders
                    .cancel_with_restock(order_id, order.version, &lines)
                    .await?
            } else {
                orders
                    .try_transition_status(order_id, requested, order.version)
                    .await?
            };

            if applied {
                let updated = orders
                    .get_by_id(order_id)
                    .await?
                    .ok_or_else(|| OrderError::not_found("Order", order_id))?;

                if requested == OrderStatus::Cancelled {
                    let notification = OrderNotification::cancelled(
                        order_id,
                        &updated.buyer_user_id,
                        updated.total_cents,
                    );
                    if let Err(err) = queue_notification(&self.db, &notification).await {
                        warn!(order_id = %order_id, %err, "Failed to enqueue order cancelled notification");
                    }
                }

                info!(
                    order_id = %order_id,
                    from = %order.status,
                    to = %requested,
                    privileged,
                    "Order transitioned"
                );
                return Ok(updated);
            }

            debug!(
                order_id = %order_id,
                attempt = attempt + 1,
                "Order version conflict, retrying transition"
            );
            sleep(TRANSITION_BACKOFF_BASE * (attempt + 1)).await;
        }

        Err(OrderError::Conflict {
            order_id: order_id.to_string(),
        })
    }

    /// Reads an order as the stable confirmation shape.
    pub async fn get_order(&self, order_id: &str) -> OrderResult<OrderConfirmation> {
        let orders = self.db.orders();

        let order = orders
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Order", order_id))?;
        let lines = orders.get_lines(order_id).await?;

        Ok(OrderConfirmation::from_parts(&order, &lines))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
