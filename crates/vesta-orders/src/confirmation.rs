//! # Order Confirmation
//!
//! The stable, serializable read shape handed to invoicing/reporting
//! collaborators. Independent of the storage schema: renames there don't
//! ripple into consumers of this DTO.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vesta_core::{Order, OrderLine, OrderStatus};

// =============================================================================
// DTOs
// =============================================================================

/// Confirmation of a placed (or later read) order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_id: String,
    pub buyer_user_id: String,
    pub status: OrderStatus,
    /// Exact sum of line totals, in cents.
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<ConfirmationLine>,
}

/// One confirmed line, carrying the frozen placement-time snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    /// Unit price at the instant of reservation, in cents.
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl OrderConfirmation {
    /// Builds a confirmation from a persisted order and its lines.
    pub fn from_parts(order: &Order, lines: &[OrderLine]) -> Self {
        OrderConfirmation {
            order_id: order.id.clone(),
            buyer_user_id: order.buyer_user_id.clone(),
            status: order.status,
            total_cents: order.total_cents,
            created_at: order.created_at,
            lines: lines.iter().map(ConfirmationLine::from_line).collect(),
        }
    }
}

impl ConfirmationLine {
    fn from_line(line: &OrderLine) -> Self {
        ConfirmationLine {
            product_id: line.product_id.clone(),
            sku: line.sku_snapshot.clone(),
            name: line.name_snapshot.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price_cents,
            line_total_cents: line.line_total_cents,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
