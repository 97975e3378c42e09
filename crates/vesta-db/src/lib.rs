//! # vesta-db: Database Layer for Vesta OMS
//!
//! Provides SQLite storage for the order engine via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Vesta OMS Data Flow                          │
//! │                                                                     │
//! │  Service call (place_order, transition)                             │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐  │
//! │  │                    vesta-db (THIS CRATE)                      │  │
//! │  │                                                               │  │
//! │  │  ┌──────────────┐   ┌────────────────┐   ┌───────────────┐   │  │
//! │  │  │   Database   │   │  Repositories  │   │  Migrations   │   │  │
//! │  │  │  (pool.rs)   │◄──│ product/order/ │   │  (embedded)   │   │  │
//! │  │  │  SqlitePool  │   │    outbox      │   │ 001_init.sql  │   │  │
//! │  │  └──────────────┘   └────────────────┘   └───────────────┘   │  │
//! │  └───────────────────────────────────────────────────────────────┘  │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database (WAL mode, foreign keys on)                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, order, outbox)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vesta_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/vesta.db")).await?;
//! let product = db.products().get_by_id("uuid-here").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::order::OrderRepository;
pub use repository::outbox::{NotificationOutboxEntry, NotificationOutboxRepository};
pub use repository::product::ProductRepository;
