//! # Notifications
//!
//! The outbound notification contract and the outbox-draining worker.
//!
//! ## Decoupling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                   Post-Commit Notification Flow                     │
//! │                                                                     │
//! │  placement / lifecycle service                                      │
//! │       │  (after the order commit)                                   │
//! │       ▼                                                             │
//! │  notification_outbox  ← enqueue failure is logged, never fails      │
//! │       │                 the committed order                         │
//! │       ▼                                                             │
//! │  NotificationWorker (background task)                               │
//! │       │  poll pending, oldest first                                 │
//! │       ▼                                                             │
//! │  Notifier collaborator (email service, webhook, ...)                │
//! │       ├── Ok  → mark_delivered                                      │
//! │       └── Err → mark_failed (attempts += 1); past the attempt cap   │
//! │                 the entry is skipped with a warning                 │
//! │                                                                     │
//! │  A slow or failing collaborator can never block or fail an order.   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use vesta_db::{Database, DbResult};

// =============================================================================
// Constants
// =============================================================================

/// Maximum delivery attempts before an entry is skipped.
pub const MAX_NOTIFY_ATTEMPTS: i64 = 10;

/// How many pending entries one drain pass picks up.
const DRAIN_BATCH_SIZE: u32 = 100;

/// Default poll interval for the background worker.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

// =============================================================================
// Notification Payload
// =============================================================================

/// What happened to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    OrderCancelled,
}

impl NotificationKind {
    /// The storage representation used in the outbox `kind` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::OrderPlaced => "order_placed",
            NotificationKind::OrderCancelled => "order_cancelled",
        }
    }
}

/// The notification payload stored in the outbox and handed to the
/// [`Notifier`]. Carries the buyer's user ID; resolving it to an actual
/// contact (email, phone) is the delivery collaborator's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotification {
    pub kind: NotificationKind,
    pub order_id: String,
    pub buyer_user_id: String,
    pub total_cents: i64,
}

impl OrderNotification {
    /// Builds an "order placed" notification.
    pub fn placed(order_id: &str, buyer_user_id: &str, total_cents: i64) -> Self {
        OrderNotification {
            kind: NotificationKind::OrderPlaced,
            order_id: order_id.to_string(),
            buyer_user_id: buyer_user_id.to_string(),
            total_cents,
        }
    }

    /// Builds an "order cancelled" notification.
    pub fn cancelled(order_id: &str, buyer_user_id: &str, total_cents: i64) -> Self {
        OrderNotification {
            kind: NotificationKind::OrderCancelled,
            order_id: order_id.to_string(),
            buyer_user_id: buyer_user_id.to_string(),
            total_cents,
        }
    }
}

/// Serializes and enqueues a notification. Callers treat failure as
/// log-and-continue; the order commit must never depend on this.
pub(crate) async fn queue_notification(
    db: &Database,
    notification: &OrderNotification,
) -> DbResult<()> {
    let payload = serde_json::to_string(notification).unwrap_or_default();
    db.notifications()
        .enqueue(
            notification.kind.as_str(),
            &notification.order_id,
            &payload,
        )
        .await?;
    Ok(())
}

// =============================================================================
// Notifier Contract
// =============================================================================

/// Delivery failure reported by a [`Notifier`].
#[derive(Debug, Clone, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget outbound notification contract.
///
/// Implemented by excluded collaborators (email delivery, webhooks). Errors
/// are recorded on the outbox entry and retried; they never propagate to the
/// order path.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn order_placed(&self, notification: &OrderNotification) -> Result<(), NotifyError>;

    async fn order_cancelled(&self, notification: &OrderNotification) -> Result<(), NotifyError>;
}

/// Default collaborator: logs each notification and succeeds.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn order_placed(&self, notification: &OrderNotification) -> Result<(), NotifyError> {
        info!(
            order_id = %notification.order_id,
            buyer = %notification.buyer_user_id,
            total_cents = notification.total_cents,
            "Order placed notification"
        );
        Ok(())
    }

    async fn order_cancelled(&self, notification: &OrderNotification) -> Result<(), NotifyError> {
        info!(
            order_id = %notification.order_id,
            buyer = %notification.buyer_user_id,
            "Order cancelled notification"
        );
        Ok(())
    }
}

// =============================================================================
// Notification Worker
// =============================================================================

/// Background worker draining the notification outbox.
pub struct NotificationWorker {
    db: Database,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling a running [`NotificationWorker`].
#[derive(Clone)]
pub struct NotificationWorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl NotificationWorkerHandle {
    /// Triggers graceful shutdown. The worker finishes its current drain
    /// pass and stops.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl NotificationWorker {
    /// Creates a new worker and its control handle.
    pub fn new(db: Database, notifier: Arc<dyn Notifier>) -> (Self, NotificationWorkerHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = NotificationWorker {
            db,
            notifier,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_rx,
        };

        (worker, NotificationWorkerHandle { shutdown_tx })
    }

    /// Overrides the poll interval (mainly for tests).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Runs the drain loop until shutdown. Spawn as a background task.
    pub async fn run(mut self) {
        info!("Notification worker starting");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.drain_pending().await {
                        error!(?e, "Failed to drain notification outbox");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Notification worker shutting down");
                    break;
                }
            }
        }

        info!("Notification worker stopped");
    }

    /// Drains one batch of pending outbox entries.
    ///
    /// ## Returns
    /// Number of entries delivered in this pass.
    pub async fn drain_pending(&self) -> DbResult<usize> {
        let outbox = self.db.notifications();
        let entries = outbox.get_pending(DRAIN_BATCH_SIZE).await?;

        if entries.is_empty() {
            debug!("No pending notifications");
            return Ok(0);
        }

        debug!(count = entries.len(), "Draining notification outbox");

        let mut delivered = 0;

        for entry in entries {
            if entry.attempts >= MAX_NOTIFY_ATTEMPTS {
                warn!(
                    id = %entry.id,
                    order_id = %entry.order_id,
                    attempts = entry.attempts,
                    "Skipping notification that exceeded max delivery attempts"
                );
                continue;
            }

            let notification: OrderNotification = match serde_json::from_str(&entry.payload) {
                Ok(n) => n,
                Err(e) => {
                    warn!(id = %entry.id, ?e, "Malformed outbox payload");
                    outbox
                        .mark_failed(&entry.id, &format!("malformed payload: {e}"))
                        .await?;
                    continue;
                }
            };

            let result = match notification.kind {
                NotificationKind::OrderPlaced => self.notifier.order_placed(&notification).await,
                NotificationKind::OrderCancelled => {
                    self.notifier.order_cancelled(&notification).await
                }
            };

            match result {
                Ok(()) => {
                    outbox.mark_delivered(&entry.id).await?;
                    delivered += 1;
                }
                Err(e) => {
                    warn!(id = %entry.id, order_id = %entry.order_id, %e, "Notification delivery failed");
                    outbox.mark_failed(&entry.id, &e.to_string()).await?;
                }
            }
        }

        Ok(delivered)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
