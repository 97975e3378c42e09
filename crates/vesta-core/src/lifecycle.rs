//! # Order Status State Machine
//!
//! Pure decision functions for order status transitions. No I/O; the
//! lifecycle service applies the decision against storage.
//!
//! ## The Transition Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                                                                     │
//! │   Pending ──────► Paid ──────► Shipped ──────► Delivered (terminal) │
//! │      │              │             │                                 │
//! │      │              │             │                                 │
//! │      └──────────────┴─────────────┴──────────► Cancelled (terminal) │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Actor Rules
//! - Privileged actors (admin/manager) may take any allowed edge, on any
//!   order.
//! - Non-privileged actors get exactly one self-service edge:
//!   Pending → Cancelled, and only on an order they own. Everything else is
//!   `Forbidden`.
//!
//! The edge check runs first, so an impossible edge is `InvalidTransition`
//! for every actor (Shipped → Pending is never `Forbidden`).

use crate::error::TransitionError;
use crate::types::OrderStatus;

// =============================================================================
// Edge Table
// =============================================================================

/// The complete allowed-edge set. Everything not listed is invalid.
const ALLOWED_EDGES: [(OrderStatus, OrderStatus); 6] = [
    (OrderStatus::Pending, OrderStatus::Paid),
    (OrderStatus::Pending, OrderStatus::Cancelled),
    (OrderStatus::Paid, OrderStatus::Shipped),
    (OrderStatus::Paid, OrderStatus::Cancelled),
    (OrderStatus::Shipped, OrderStatus::Delivered),
    (OrderStatus::Shipped, OrderStatus::Cancelled),
];

/// Checks whether `from → to` is in the allowed-edge set, ignoring actors.
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    ALLOWED_EDGES.contains(&(from, to))
}

// =============================================================================
// Validation
// =============================================================================

/// Validates a requested transition for a specific actor.
///
/// ## Arguments
/// * `current` - the order's status as last read
/// * `next` - the requested status
/// * `privileged` - whether the actor holds an admin/manager role (resolved
///   by the caller's auth layer)
/// * `owns_order` - whether the actor is the order's buyer
///
/// ## Decision Order
/// 1. Edge not allowed → `InvalidTransition` (regardless of actor)
/// 2. Privileged actor → Ok
/// 3. Owner cancelling a Pending order → Ok
/// 4. Anything else → `Forbidden`
///
/// Total over the full status grid; a pure function with no side effects.
pub fn validate_transition(
    current: OrderStatus,
    next: OrderStatus,
    privileged: bool,
    owns_order: bool,
) -> Result<(), TransitionError> {
    if !can_transition(current, next) {
        return Err(TransitionError::InvalidTransition {
            from: current,
            to: next,
        });
    }

    if privileged {
        return Ok(());
    }

    // The only self-service edge: cancel your own order before payment.
    if current == OrderStatus::Pending && next == OrderStatus::Cancelled && owns_order {
        return Ok(());
    }

    Err(TransitionError::Forbidden {
        from: current,
        to: next,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
