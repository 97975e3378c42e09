//! # Error Types
//!
//! Domain-specific error types for vesta-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Error Types                                │
//! │                                                                     │
//! │  vesta-core errors (this file)                                      │
//! │  ├── ValidationError  - Input validation failures                   │
//! │  └── TransitionError  - Status transitions the rules reject         │
//! │                                                                     │
//! │  vesta-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                 │
//! │                                                                     │
//! │  vesta-orders errors (service boundary)                             │
//! │  └── OrderError       - What callers see                            │
//! │                                                                     │
//! │  Flow: ValidationError / TransitionError → OrderError → caller      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Transition Error
// =============================================================================

/// Outcomes of the order-status state machine when a transition is rejected.
///
/// `InvalidTransition` is decided from the edge table alone and holds for
/// every actor; `Forbidden` means the edge exists but the requesting actor
/// may not take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The requested edge is not in the allowed-transition set.
    #[error("Cannot transition order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The edge exists, but the actor lacks the rights to take it.
    ///
    /// Non-privileged actors may only cancel their own `Pending` orders;
    /// every other request from them lands here.
    #[error("Actor is not permitted to transition order from {from} to {to}")]
    Forbidden { from: OrderStatus, to: OrderStatus },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when caller input doesn't meet requirements. Used for early
/// validation before any storage work runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A required collection is empty.
    #[error("{field} must contain at least one entry")]
    Empty { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience alias for validation results.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================
