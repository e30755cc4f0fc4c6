//! Domain types and storage contract for the Overture job engine.
//!
//! This crate is the leaf of the workspace: it defines the [`Job`] record,
//! its [`JobStatus`] lifecycle, the [`JobStore`] persistence contract, and
//! an in-memory store used by tests and single-process deployments.

pub mod job;
pub mod memory;
pub mod status;
pub mod store;
pub mod types;

pub use job::{Job, JobOutcome, JobRequest};
pub use memory::MemoryJobStore;
pub use status::JobStatus;
pub use store::{CasResult, JobStore, StatusUpdate, StoreError};
pub use types::{ExternalId, JobId, Principal, Timestamp};
