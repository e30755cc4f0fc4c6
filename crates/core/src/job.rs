//! The [`Job`] record and its request/outcome companions.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::status::JobStatus;
use crate::types::{ExternalId, JobId, Principal, Timestamp};

/// One tracked unit of asynchronous external work.
///
/// Created by the submitter in [`JobStatus::Queued`], moved to
/// [`JobStatus::InProgress`] once the provider acknowledges, and moved to a
/// terminal status exactly once by the reconciler. Records are retained for
/// audit and restoration; the engine never deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Stable identity used by the UI layer and the store.
    pub job_id: JobId,
    /// Owner of the job; restoration is scoped to a principal.
    pub principal: Principal,
    /// Caller-defined kind, e.g. `"image.generate"`.
    pub job_type: String,
    /// Provider-assigned identifiers, one per output variant. All must
    /// reach a terminal state before the job is terminal.
    pub external_ids: Vec<ExternalId>,
    pub status: JobStatus,
    /// Opaque payload, present only when `status == Succeeded`.
    pub output: Option<serde_json::Value>,
    /// Human-readable cause, present only for `Failed` / `TimedOut`.
    pub error: Option<String>,
    /// Immutable; timeout deadlines are absolute from this instant.
    pub created_at: Timestamp,
    pub last_transition_at: Timestamp,
    /// Notification identifiers already applied, for deduplication across
    /// restarts.
    pub processed_notification_ids: Vec<String>,
}

impl Job {
    /// Create a fresh `Queued` record with a generated UUIDv7 id.
    pub fn new(principal: impl Into<Principal>, job_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::now_v7().to_string(),
            principal: principal.into(),
            job_type: job_type.into(),
            external_ids: Vec::new(),
            status: JobStatus::Queued,
            output: None,
            error: None,
            created_at: now,
            last_transition_at: now,
            processed_notification_ids: Vec::new(),
        }
    }
}

/// A submission request handed to the engine by a feature-specific caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_type: String,
    /// Opaque provider parameters; the engine never inspects them.
    pub parameters: serde_json::Value,
}

/// A terminal completion signal, from either channel.
///
/// Applied to a [`Job`] exactly once by the reconciler.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Succeeded { output: serde_json::Value },
    Failed { error: String },
    Cancelled,
    TimedOut { error: String },
}

impl JobOutcome {
    /// The terminal status this outcome maps to.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Succeeded { .. } => JobStatus::Succeeded,
            Self::Failed { .. } => JobStatus::Failed,
            Self::Cancelled => JobStatus::Cancelled,
            Self::TimedOut { .. } => JobStatus::TimedOut,
        }
    }
}
