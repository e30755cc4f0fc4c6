//! Observer events surfaced to the UI layer.

use serde::Serialize;

use overture_core::{ExternalId, Job, JobId};

/// A job lifecycle event published on the engine's broadcast channel.
///
/// `Started` and `Resumed` are provisional views — observers may render a
/// placeholder — but only `Terminal` carries an authoritative outcome, and
/// exactly one `Terminal` is published per job.
#[derive(Debug, Clone, Serialize)]
pub enum JobEvent {
    /// The provider acknowledged the submission; tracking has begun.
    Started {
        job_id: JobId,
        external_ids: Vec<ExternalId>,
    },

    /// Tracking of an in-flight job resumed after a client restart.
    Resumed { job_id: JobId },

    /// The job reached a terminal state. Carries the final snapshot.
    Terminal { job: Job },
}
