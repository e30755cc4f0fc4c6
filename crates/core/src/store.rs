//! Persistence contract for job records.
//!
//! The store is the single shared mutable resource of the engine. All status
//! writes go through [`JobStore::compare_and_set_status`] so that concurrent
//! completion signals cannot both observe "not yet terminal" and both write:
//! the at-most-one-terminal-transition invariant is enforced here, not by
//! caller discipline.

use async_trait::async_trait;

use crate::job::Job;
use crate::status::JobStatus;
use crate::types::{ExternalId, Principal, Timestamp};

/// Errors surfaced by a [`JobStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the given job id.
    #[error("job {0} not found")]
    NotFound(String),

    /// The backing store failed (connection, query, serialization).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Fields applied together with a status transition.
///
/// `None` fields are left untouched; the transition timestamp is always
/// refreshed by the store.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub new_status: JobStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub external_ids: Option<Vec<ExternalId>>,
}

impl StatusUpdate {
    /// A bare status transition with no accompanying fields.
    pub fn to(new_status: JobStatus) -> Self {
        Self {
            new_status,
            ..Default::default()
        }
    }
}

/// Result of a compare-and-set attempt on a job's status.
#[derive(Debug, Clone)]
pub enum CasResult {
    /// The expected status matched; the returned snapshot is post-update.
    Applied(Job),
    /// The stored status differed from the expected one; nothing was
    /// written. Carries the current snapshot so callers can re-decide.
    Conflict(Job),
}

/// Durable record of job lifecycles.
///
/// Implementations must make `compare_and_set_status` atomic with respect
/// to concurrent callers for the same job id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly created job record.
    async fn create(&self, job: &Job) -> Result<(), StoreError>;

    /// Fetch a job snapshot by id.
    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    /// Transition `job_id` from `expected` to `update.new_status`, applying
    /// the update's fields, if and only if the stored status equals
    /// `expected`.
    async fn compare_and_set_status(
        &self,
        job_id: &str,
        expected: JobStatus,
        update: StatusUpdate,
    ) -> Result<CasResult, StoreError>;

    /// List a principal's non-terminal jobs created at or after `since`,
    /// oldest first.
    async fn list_non_terminal(
        &self,
        principal: &Principal,
        since: Timestamp,
    ) -> Result<Vec<Job>, StoreError>;

    /// Append a notification id to the job's processed set (no-op if
    /// already present), so deduplication survives a restart.
    async fn record_processed_notification(
        &self,
        job_id: &str,
        notification_id: &str,
    ) -> Result<(), StoreError>;
}
