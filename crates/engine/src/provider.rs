//! Generation provider contract.
//!
//! The engine never talks HTTP itself; callers inject an implementation of
//! [`GenerationProvider`] wrapping whatever client their provider needs.

use async_trait::async_trait;

use overture_core::{ExternalId, JobRequest};

/// Errors from the provider boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider refused the submission (validation, quota, auth).
    /// Terminal for the job: no polling or listening ever starts.
    #[error("provider rejected submission: {0}")]
    Rejected(String),

    /// A request could not be completed (network, 5xx). Transient for
    /// polls — the next scheduled tick retries.
    #[error("provider request failed: {0}")]
    Request(String),
}

/// Status of one external id as reported by a poll.
#[derive(Debug, Clone)]
pub enum PollStatus {
    Pending,
    Processing,
    Succeeded { output: serde_json::Value },
    Failed { error: String },
    Cancelled,
}

impl PollStatus {
    /// Whether this external id has reached a state it cannot leave.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// A third-party generation service (image, voice, video synthesis).
///
/// One job may fan out to multiple external ids (one per output variant);
/// `submit` returns them all.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Submit work; synchronous acceptance returns the assigned ids.
    async fn submit(&self, request: &JobRequest) -> Result<Vec<ExternalId>, ProviderError>;

    /// Query the status of one external id.
    async fn poll(&self, external_id: &ExternalId) -> Result<PollStatus, ProviderError>;
}
