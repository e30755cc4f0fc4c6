//! PostgreSQL implementation of the Overture [`JobStore`] contract.
//!
//! [`PgJobStore`] persists job records in a single `jobs` table. Status
//! transitions are guarded by a `WHERE status_id = $expected` clause so the
//! compare-and-set semantics hold across processes, not just within one.
//!
//! [`JobStore`]: overture_core::JobStore

mod store;

pub use store::PgJobStore;

/// Shared connection pool alias.
pub type DbPool = sqlx::PgPool;
