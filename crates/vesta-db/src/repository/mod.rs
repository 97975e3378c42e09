//! # Repositories
//!
//! One repository per aggregate:
//!
//! - [`product`] - catalog rows plus the version-guarded stock primitives
//! - [`order`] - order + line aggregates, status transitions, cancel restock
//! - [`outbox`] - post-commit notification queue

pub mod order;
pub mod outbox;
pub mod product;
