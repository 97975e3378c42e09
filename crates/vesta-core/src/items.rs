//! # Order Item Request Normalization
//!
//! Turns raw caller input into a clean, merged item list before any storage
//! work begins.
//!
//! ## Normalization Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Input:  [(P1, 2), (P2, 1), (P1, 3)]                                │
//! │       │                                                             │
//! │       ▼  validate: non-empty, every quantity in [1, MAX]            │
//! │       ▼  merge duplicates, first-seen order preserved               │
//! │       │                                                             │
//! │  Output: [(P1, 5), (P2, 1)]                                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Requesting the same product twice in one order is not an error; the
//! quantities are summed so the aggregate keeps one line per product.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::{MAX_LINE_QUANTITY, MAX_ORDER_LINES};

// =============================================================================
// Request Type
// =============================================================================

/// One requested item in a placement call: a product and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

impl OrderItemRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        OrderItemRequest {
            product_id: product_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Merge & Validate
// =============================================================================

/// Validates and normalizes a placement item list.
///
/// ## Rules
/// - The list must be non-empty.
/// - Every quantity must be >= 1 and <= [`MAX_LINE_QUANTITY`] (checked per
///   entry before merging, and again on the merged sums).
/// - Duplicate product IDs are merged by summing quantities; the merged list
///   preserves the order in which products first appeared.
/// - The merged list may hold at most [`MAX_ORDER_LINES`] distinct products.
///
/// Pure function; the placement service calls this before touching storage.
pub fn merge_order_items(items: &[OrderItemRequest]) -> ValidationResult<Vec<OrderItemRequest>> {
    if items.is_empty() {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    let mut merged: Vec<OrderItemRequest> = Vec::with_capacity(items.len());

    for item in items {
        if item.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "productId".to_string(),
            });
        }
        validate_line_quantity(item.quantity)?;

        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity += item.quantity;
                // The merged sum must still respect the per-line cap.
                validate_line_quantity(existing.quantity)?;
            }
            None => merged.push(item.clone()),
        }
    }

    if merged.len() > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    Ok(merged)
}

fn validate_line_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
