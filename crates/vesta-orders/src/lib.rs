//! # vesta-orders: Order Placement & Lifecycle Engine
//!
//! The service layer of Vesta OMS. This is where correctness under
//! concurrent mutation, multi-entity invariants, and partial-failure
//! recovery live; everything below it is storage, everything above it is
//! transport.
//!
//! ## Control Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Place an Order                             │
//! │                                                                     │
//! │  caller ──► OrderPlacementService::place(buyer, items)              │
//! │               │                                                     │
//! │               ├─ 1. merge + validate items        (vesta-core)      │
//! │               ├─ 2. insert Pending order, total 0 (vesta-db)        │
//! │               ├─ 3. ProductStock::reserve per item (CAS loop)       │
//! │               │      └─ any failure → release taken reservations,   │
//! │               │         delete placeholder, surface the error       │
//! │               ├─ 4. insert lines with price snapshots               │
//! │               ├─ 5. total = Σ(qty × snapshot), persist              │
//! │               └─ 6. enqueue "order_placed" notification             │
//! │                      (failure logged, never propagated)             │
//! │                                                                     │
//! │                        Transition an Order                          │
//! │                                                                     │
//! │  caller ──► OrderLifecycleService::transition(id, status, actor)    │
//! │               │                                                     │
//! │               ├─ load order → validate_transition (pure)            │
//! │               ├─ version-guarded write; conflict → re-read, retry   │
//! │               └─ Cancelled: status write + per-line restock in one  │
//! │                  storage transaction, then notification             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`stock`] - atomic stock reservation/release with bounded CAS retry
//! - [`placement`] - all-or-nothing order placement
//! - [`lifecycle`] - status transitions, cancellation restock, reads
//! - [`confirmation`] - the stable serializable read shape for collaborators
//! - [`notify`] - notification contract and outbox-draining worker
//! - [`error`] - the caller-facing error kinds

// =============================================================================
// Module Declarations
// =============================================================================

pub mod confirmation;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod placement;
pub mod stock;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use confirmation::{ConfirmationLine, OrderConfirmation};
pub use error::{OrderError, OrderResult};
pub use lifecycle::OrderLifecycleService;
pub use notify::{
    LogNotifier, NotificationKind, NotificationWorker, NotificationWorkerHandle, Notifier,
    NotifyError, OrderNotification,
};
pub use placement::OrderPlacementService;
pub use stock::{ProductStock, Reservation};
