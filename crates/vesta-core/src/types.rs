//! # Domain Types
//!
//! Core domain types used throughout Vesta OMS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Domain Types                               │
//! │                                                                     │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐    │
//! │  │    Product      │   │     Order       │   │   OrderLine     │    │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │    │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  (order_id,     │    │
//! │  │  sku (business) │   │  buyer_user_id  │   │   product_id)   │    │
//! │  │  price_cents    │   │  status         │   │  qty, snapshots │    │
//! │  │  available_qty  │   │  total_cents    │   │  line_total     │    │
//! │  │  version        │   │  version        │   │                 │    │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘    │
//! │                                                                     │
//! │  ┌─────────────────┐                                                │
//! │  │  OrderStatus    │   Pending → Paid → Shipped → Delivered         │
//! │  │  ─────────────  │      └───────┴────────┴──→ Cancelled           │
//! │  └─────────────────┘                                                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Version Tokens
//! Product and Order both carry a `version` column: a per-row counter used
//! for optimistic concurrency. A write succeeds only if the token matches the
//! value last read (`UPDATE ... WHERE id = ? AND version = ?`), and every
//! successful mutation increments it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog, with its price and available stock.
///
/// `available_qty` must never go negative; mutations go through the
/// version-guarded stock primitives, never through plain field writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique in the catalog.
    pub sku: String,

    /// Display name, snapshotted onto order lines at placement.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Unit price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Stock available for reservation. Never negative.
    pub available_qty: i64,

    /// Whether the product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,

    /// Optimistic-concurrency token; strictly increases on every mutation.
    pub version: i64,
}

impl Product {
    /// Returns the unit price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether the requested quantity fits the current stock.
    #[inline]
    pub fn can_fulfill(&self, quantity: i64) -> bool {
        self.available_qty >= quantity
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle status of an order.
///
/// `Pending` is the only initial status; `Delivered` and `Cancelled` are
/// terminal. The allowed edges live in [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting payment.
    Pending,
    /// Payment received.
    Paid,
    /// Handed to the carrier.
    Shipped,
    /// Received by the buyer. Terminal.
    Delivered,
    /// Cancelled; stock restored. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order. Handy for table-driven tests.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// A terminal status has no outgoing transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// The storage/wire representation (matches the serde rename).
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// An order aggregate root.
///
/// Created only by the placement service; status mutated only via the
/// lifecycle service; never deleted once placement commits (cancellation is
/// a status, not a row removal).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub buyer_user_id: String,
    pub status: OrderStatus,
    /// Must equal the sum of line totals at all times after placement.
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    /// Set on the first status transition; None while still freshly placed.
    pub status_updated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token.
    pub version: i64,
}

impl Order {
    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Order Line
// =============================================================================

/// A line item in an order, identified by (order_id, product_id).
///
/// Uses the snapshot pattern to freeze product data at placement time:
/// `unit_price_cents`, `sku_snapshot` and `name_snapshot` never change after
/// creation, regardless of later catalog edits. Lines are immutable; cancel
/// and refund operate at order granularity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub order_id: String,
    pub product_id: String,
    /// SKU at placement time (frozen).
    pub sku_snapshot: String,
    /// Product name at placement time (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at the instant of stock reservation (frozen).
    pub unit_price_cents: i64,
    /// Quantity ordered; always >= 1.
    pub quantity: i64,
    /// unit_price_cents × quantity, persisted.
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderLine {
    /// Returns the unit price snapshot as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
