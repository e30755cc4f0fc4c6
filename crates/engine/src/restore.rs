//! Crash-recovery restoration.
//!
//! Runs once per client process start (or session re-authentication): scans
//! the store for a principal's jobs left in flight, fails the ones whose
//! absolute deadline already passed, and resumes tracking for the rest.

use chrono::Utc;
use serde::Serialize;

use overture_core::{JobId, JobOutcome, Principal};

use crate::engine::JobEngine;
use crate::error::EngineError;
use crate::events::JobEvent;

/// Cause recorded on jobs too old to resume. Distinguished from ordinary
/// failures so the UI can explain what happened.
pub const STALE_ON_RESTART: &str = "stale on restart";

/// What a restoration pass did, for callers that render continuity UI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreSummary {
    /// Jobs whose tracking was re-armed.
    pub resumed: Vec<JobId>,
    /// Jobs failed as stale instead of resumed.
    pub expired: Vec<JobId>,
}

impl JobEngine {
    /// Rehydrate tracking for a principal's in-flight jobs.
    ///
    /// Jobs past `created_at + max_job_lifetime` are presumed abandoned —
    /// the provider has likely garbage-collected them — and are failed with
    /// [`STALE_ON_RESTART`] rather than resumed. Resumable jobs get a fresh
    /// poll budget but keep their ORIGINAL absolute deadline, so a job can
    /// restart polling and still time out almost immediately. A
    /// [`JobEvent::Resumed`] is published before any poll or notification
    /// resolves the job, so observers can show continuity instead of a
    /// blank state.
    pub async fn restore(&self, principal: &Principal) -> Result<RestoreSummary, EngineError> {
        let since = Utc::now() - self.config.restore_horizon;
        let in_flight = self.store.list_non_terminal(principal, since).await?;

        tracing::info!(
            principal = %principal,
            count = in_flight.len(),
            "Restoring in-flight jobs",
        );

        let mut summary = RestoreSummary::default();
        let now = Utc::now();

        for job in in_flight {
            let deadline = job.created_at + self.config.max_job_lifetime;
            if deadline <= now {
                match self
                    .reconciler
                    .reconcile(
                        &job.job_id,
                        JobOutcome::Failed {
                            error: STALE_ON_RESTART.to_string(),
                        },
                    )
                    .await
                {
                    Ok(_) => {
                        tracing::info!(job_id = %job.job_id, "Failed stale job on restart");
                        summary.expired.push(job.job_id);
                    }
                    Err(e) => {
                        tracing::error!(
                            job_id = %job.job_id,
                            error = %e,
                            "Failed to mark stale job",
                        );
                    }
                }
                continue;
            }

            // A `Queued` job with no external ids never got provider
            // acknowledgement before the crash; there is nothing to poll
            // or route, but the guard still bounds it.
            self.start_tracking(&job).await;
            let _ = self.event_tx.send(JobEvent::Resumed {
                job_id: job.job_id.clone(),
            });
            tracing::info!(job_id = %job.job_id, "Resumed tracking after restart");
            summary.resumed.push(job.job_id);
        }

        Ok(summary)
    }
}
