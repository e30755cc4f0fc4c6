//! Job lifecycle status.
//!
//! Status ids are stable i16 discriminants matching the seed data order
//! (1-based) in the `job_statuses` lookup table used by the Postgres store.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

/// Lifecycle status of a tracked job.
///
/// Transitions are monotonic: once a terminal status (`Succeeded`, `Failed`,
/// `Cancelled`, `TimedOut`) is reached, no further transition is permitted.
#[repr(i16)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Record created; the provider has not yet acknowledged.
    #[default]
    Queued = 1,
    /// The provider accepted the submission and assigned external ids.
    InProgress = 2,
    /// All external ids completed successfully.
    Succeeded = 3,
    /// The provider rejected or failed the job, or it was stale on restart.
    Failed = 4,
    /// Cancelled by explicit user action.
    Cancelled = 5,
    /// Neither channel resolved the job before its absolute deadline.
    TimedOut = 6,
}

impl JobStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Map a database status ID back to the enum.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Queued),
            2 => Some(Self::InProgress),
            3 => Some(Self::Succeeded),
            4 => Some(Self::Failed),
            5 => Some(Self::Cancelled),
            6 => Some(Self::TimedOut),
            _ => None,
        }
    }

    /// Whether no further transition is permitted from this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// The four terminal statuses, in id order.
    pub const TERMINAL: [JobStatus; 4] = [
        Self::Succeeded,
        Self::Failed,
        Self::Cancelled,
        Self::TimedOut,
    ];
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}
