//! # Notification Outbox Repository
//!
//! Manages the post-commit notification queue.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 Outbox Pattern Implementation                       │
//! │                                                                     │
//! │  SERVICE OPERATION (e.g., place order)                              │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  1. Commit the order (order + lines + total)                        │
//! │  2. INSERT INTO notification_outbox (kind, order_id, payload)       │
//! │     - enqueue failure is logged, never fails the committed order    │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  BACKGROUND WORKER (vesta-orders::notify)                           │
//! │  1. SELECT * WHERE delivered_at IS NULL ORDER BY created_at         │
//! │  2. For each entry:                                                 │
//! │     a. Hand to the Notifier collaborator                            │
//! │     b. On success: mark_delivered                                   │
//! │     c. On failure: mark_failed (attempts += 1, last_error)          │
//! │                                                                     │
//! │  KEY GUARANTEE: a slow or failing mail server can never block or    │
//! │  fail an order - delivery is fully decoupled from the commit path.  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

// =============================================================================
// Entry Type
// =============================================================================

/// A queued notification awaiting delivery.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationOutboxEntry {
    pub id: String,
    /// Notification kind: "order_placed" or "order_cancelled".
    pub kind: String,
    /// The order this notification is about.
    pub order_id: String,
    /// The full notification payload as JSON.
    pub payload: String,
    /// Number of delivery attempts so far.
    pub attempts: i64,
    /// Last error message if delivery failed.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// When delivery was last attempted.
    pub attempted_at: Option<DateTime<Utc>>,
    /// When successfully delivered.
    pub delivered_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for notification outbox operations.
#[derive(Debug, Clone)]
pub struct NotificationOutboxRepository {
    pool: SqlitePool,
}

impl NotificationOutboxRepository {
    /// Creates a new NotificationOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NotificationOutboxRepository { pool }
    }

    /// Queues a notification for delivery.
    ///
    /// ## Arguments
    /// * `kind` - "order_placed" or "order_cancelled"
    /// * `order_id` - the order's UUID
    /// * `payload` - JSON serialization of the notification
    pub async fn enqueue(
        &self,
        kind: &str,
        order_id: &str,
        payload: &str,
    ) -> DbResult<NotificationOutboxEntry> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        debug!(kind = %kind, order_id = %order_id, "Queuing notification");

        let entry = NotificationOutboxEntry {
            id: id.clone(),
            kind: kind.to_string(),
            order_id: order_id.to_string(),
            payload: payload.to_string(),
            attempts: 0,
            last_error: None,
            created_at: now,
            attempted_at: None,
            delivered_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (
                id, kind, order_id, payload,
                attempts, last_error, created_at, attempted_at, delivered_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.kind)
        .bind(&entry.order_id)
        .bind(&entry.payload)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.attempted_at)
        .bind(entry.delivered_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Gets pending entries (never delivered), oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<NotificationOutboxEntry>> {
        let entries = sqlx::query_as::<_, NotificationOutboxEntry>(
            r#"
            SELECT
                id, kind, order_id, payload,
                attempts, last_error, created_at, attempted_at, delivered_at
            FROM notification_outbox
            WHERE delivered_at IS NULL
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry as successfully delivered.
    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE notification_outbox SET
                delivered_at = ?2,
                attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE notification_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts pending entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE delivered_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Deletes delivered entries older than `days_old` days (cleanup).
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn cleanup_delivered(&self, days_old: u32) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM notification_outbox
            WHERE delivered_at IS NOT NULL
            AND delivered_at < datetime('now', '-' || ?1 || ' days')
            "#,
        )
        .bind(days_old)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_and_pending() {
        let db = test_db().await;
        let repo = db.notifications();

        repo.enqueue("order_placed", "o-1", r#"{"totalCents":3000}"#)
            .await
            .unwrap();
        repo.enqueue("order_cancelled", "o-2", "{}").await.unwrap();

        assert_eq!(repo.count_pending().await.unwrap(), 2);

        let pending = repo.get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        // Oldest first.
        assert_eq!(pending[0].order_id, "o-1");
        assert_eq!(pending[0].kind, "order_placed");
        assert_eq!(pending[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_mark_delivered_removes_from_pending() {
        let db = test_db().await;
        let repo = db.notifications();

        let entry = repo.enqueue("order_placed", "o-1", "{}").await.unwrap();
        repo.mark_delivered(&entry.id).await.unwrap();

        assert_eq!(repo.count_pending().await.unwrap(), 0);
        assert!(repo.get_pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_failed_tracks_attempts() {
        let db = test_db().await;
        let repo = db.notifications();

        let entry = repo.enqueue("order_placed", "o-1", "{}").await.unwrap();
        repo.mark_failed(&entry.id, "smtp timeout").await.unwrap();
        repo.mark_failed(&entry.id, "smtp timeout").await.unwrap();

        let pending = repo.get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 2);
        assert_eq!(pending[0].last_error.as_deref(), Some("smtp timeout"));
        assert!(pending[0].attempted_at.is_some());
    }
}
