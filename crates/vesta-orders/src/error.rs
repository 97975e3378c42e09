//! # Service Error Types
//!
//! The caller-facing error kinds for the order engine. HTTP controllers (out
//! of scope here) map these to transport responses.
//!
//! ## Error Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  NotFound              unknown product or order                     │
//! │  InsufficientStock     quantity exceeds availability                │
//! │  InvalidTransition     edge not allowed by the state machine        │
//! │  Forbidden             actor lacks rights for the transition        │
//! │  Conflict              order version retries exhausted              │
//! │  ConcurrencyExhausted  stock CAS retries exhausted                  │
//! │  Validation            empty item list, non-positive quantity, ...  │
//! │  Unavailable           storage connectivity (caller may retry)      │
//! │  Storage               other storage faults, never swallowed        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation is locally atomic: by the time one of these surfaces, any
//! partial effects have been compensated (stock released, placeholder order
//! deleted). Nothing is ever reported as "partially applied".

use thiserror::Error;

use vesta_core::{OrderStatus, TransitionError, ValidationError};
use vesta_db::DbError;

// =============================================================================
// Order Error
// =============================================================================

/// Errors surfaced by the placement and lifecycle services.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Unknown (or inactive) product, or unknown order.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Requested quantity exceeds the product's available stock.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// The requested edge is not in the state machine's allowed set.
    #[error("Cannot transition order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The edge exists, but the actor may not take it.
    #[error("Actor is not permitted to transition order from {from} to {to}")]
    Forbidden { from: OrderStatus, to: OrderStatus },

    /// Optimistic-concurrency retries exhausted on an order mutation.
    #[error("Order {order_id} was modified concurrently, retries exhausted")]
    Conflict { order_id: String },

    /// Bounded CAS retries exhausted on a stock mutation.
    #[error("Stock update for product {product_id} kept losing concurrent races ({attempts} attempts)")]
    ConcurrencyExhausted { product_id: String, attempts: u32 },

    /// Caller input rejected before any storage work.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage is unreachable; the caller can retry later.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Any other storage fault, preserved for diagnostics.
    #[error("Storage error: {0}")]
    Storage(DbError),
}

impl OrderError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        OrderError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Storage errors fold into the service kinds: row lookups that missed stay
/// `NotFound`, connectivity problems become `Unavailable`, everything else
/// is preserved as `Storage`.
impl From<DbError> for OrderError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => OrderError::NotFound { entity, id },
            e if e.is_unavailable() => OrderError::Unavailable(e.to_string()),
            e => OrderError::Storage(e),
        }
    }
}

/// State machine rejections pass through with their kind unchanged.
impl From<TransitionError> for OrderError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { from, to } => {
                OrderError::InvalidTransition { from, to }
            }
            TransitionError::Forbidden { from, to } => OrderError::Forbidden { from, to },
        }
    }
}

/// Result type for service operations.
pub type OrderResult<T> = Result<T, OrderError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_not_found_maps_to_not_found() {
        let err: OrderError = DbError::not_found("Product", "p-1").into();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[test]
    fn test_db_pool_exhausted_maps_to_unavailable() {
        let err: OrderError = DbError::PoolExhausted.into();
        assert!(matches!(err, OrderError::Unavailable(_)));
    }

    #[test]
    fn test_transition_error_kinds_pass_through() {
        let err: OrderError = TransitionError::Forbidden {
            from: OrderStatus::Paid,
            to: OrderStatus::Cancelled,
        }
        .into();
        assert!(matches!(err, OrderError::Forbidden { .. }));

        let err: OrderError = TransitionError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Pending,
        }
        .into();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }
}
