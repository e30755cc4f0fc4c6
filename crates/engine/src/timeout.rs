//! Per-job timeout guard.
//!
//! State machine per job: armed -> disarmed (any terminal transition
//! cancels the job token) or fired (the absolute deadline elapsed first).
//! The deadline is always `created_at + max_job_lifetime`, so a restored
//! job can legitimately time out moments after resuming.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use overture_core::{JobId, JobOutcome, Timestamp};

use crate::reconciler::Reconciler;
use crate::registry::JobRegistry;

pub struct TimeoutGuard {
    reconciler: Arc<Reconciler>,
    registry: Arc<JobRegistry>,
}

impl TimeoutGuard {
    pub fn new(reconciler: Arc<Reconciler>, registry: Arc<JobRegistry>) -> Self {
        Self {
            reconciler,
            registry,
        }
    }

    /// Hold the deadline for one job.
    ///
    /// Disarmed by `cancel` (the reconciler cancels the job token the
    /// moment any terminal transition lands). If the deadline fires, the
    /// guard reconciles a `timed_out` outcome; in a photo-finish with a
    /// real result the reconciler's idempotence decides the winner.
    pub async fn guard(&self, job_id: JobId, deadline: Timestamp, cancel: CancellationToken) {
        let wait = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(job_id = %job_id, "Timeout guard disarmed");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        // A "poll exhausted" note from the poller does not fire the guard;
        // it only sharpens the eventual cause message.
        let cause = if self.registry.poll_exhausted(&job_id).await {
            "job exceeded its maximum lifetime after the poll budget was exhausted"
        } else {
            "job exceeded its maximum lifetime"
        };

        match self
            .reconciler
            .reconcile(&job_id, JobOutcome::TimedOut { error: cause.into() })
            .await
        {
            Ok(true) => {
                tracing::warn!(job_id = %job_id, "Job timed out");
            }
            Ok(false) => {
                tracing::debug!(job_id = %job_id, "Deadline raced a real result and lost");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to reconcile timeout");
            }
        }
    }
}
