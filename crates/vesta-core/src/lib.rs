//! # vesta-core: Pure Business Logic for Vesta OMS
//!
//! This crate is the heart of the order engine. It contains all business
//! rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Vesta OMS Architecture                         │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │             Callers (HTTP controllers, CLI, jobs)             │ │
//! │  └───────────────────────────────┬───────────────────────────────┘ │
//! │                                  │                                 │
//! │  ┌───────────────────────────────▼───────────────────────────────┐ │
//! │  │                  vesta-orders (services)                      │ │
//! │  │     OrderPlacementService, OrderLifecycleService, stock       │ │
//! │  └───────────────────────────────┬───────────────────────────────┘ │
//! │                                  │                                 │
//! │  ┌───────────────────────────────▼───────────────────────────────┐ │
//! │  │               ★ vesta-core (THIS CRATE) ★                     │ │
//! │  │                                                               │ │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐ ┌────────────┐     │ │
//! │  │   │  types   │ │  money   │ │ lifecycle │ │ validation │     │ │
//! │  │   │ Product  │ │  Money   │ │  status   │ │   rules    │     │ │
//! │  │   │  Order   │ │          │ │   edges   │ │   checks   │     │ │
//! │  │   └──────────┘ └──────────┘ └───────────┘ └────────────┘     │ │
//! │  │                                                               │ │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS          │ │
//! │  └───────────────────────────────┬───────────────────────────────┘ │
//! │                                  │                                 │
//! │  ┌───────────────────────────────▼───────────────────────────────┐ │
//! │  │                  vesta-db (Database Layer)                    │ │
//! │  │          SQLite queries, migrations, repositories             │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, OrderLine, OrderStatus)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`lifecycle`] - Order status state machine
//! - [`items`] - Order item request normalization
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, always
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are cents (i64), never floats
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod items;
pub mod lifecycle;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{TransitionError, ValidationError};
pub use items::{merge_order_items, OrderItemRequest};
pub use lifecycle::{can_transition, validate_transition};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of distinct product lines in a single order.
///
/// Bounds request size before any storage work starts; can be made
/// configurable per deployment later.
pub const MAX_ORDER_LINES: usize = 100;

/// Maximum quantity of a single product per order line.
///
/// Catches obvious over-ordering (e.g. typing 1000 instead of 10) before it
/// reaches stock reservation.
pub const MAX_LINE_QUANTITY: i64 = 999;
