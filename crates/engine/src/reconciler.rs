//! The reconciler: single writer of terminal transitions.
//!
//! Completion signals from the poller, the notification listener, the
//! timeout guard, user cancellation, and the restorer all converge here.
//! [`Reconciler::reconcile`] applies at most one terminal transition per
//! job; every further signal is an idempotent no-op, which is what makes it
//! safe for both channels to report the same job.

use std::sync::Arc;

use tokio::sync::broadcast;

use overture_core::{CasResult, JobOutcome, JobStore, StatusUpdate, StoreError};

use crate::error::EngineError;
use crate::events::JobEvent;
use crate::registry::JobRegistry;

pub struct Reconciler {
    store: Arc<dyn JobStore>,
    registry: Arc<JobRegistry>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<JobRegistry>,
        event_tx: broadcast::Sender<JobEvent>,
    ) -> Self {
        Self {
            store,
            registry,
            event_tx,
        }
    }

    /// Apply a terminal outcome to a job.
    ///
    /// Returns `Ok(true)` if this call performed the terminal transition,
    /// `Ok(false)` if the job was already terminal (the signal is dropped
    /// regardless of source or apparent content). On apply, tracking for
    /// the job is torn down — the poll timer stops, the timeout guard
    /// disarms, and the listener's routing entries are removed — and a
    /// [`JobEvent::Terminal`] is published with the final snapshot.
    ///
    /// The status write is a compare-and-set against the status read in the
    /// same iteration; a concurrent transition surfaces as a conflict and
    /// the loop re-reads rather than overwriting.
    pub async fn reconcile(&self, job_id: &str, outcome: JobOutcome) -> Result<bool, EngineError> {
        loop {
            let job = match self.store.get(job_id).await? {
                Some(job) => job,
                None => {
                    // Tracking a record that can never resolve is a silent
                    // resource leak; tear down and report.
                    self.registry.deregister(job_id).await;
                    return Err(EngineError::JobNotFound(job_id.to_string()));
                }
            };

            if job.status.is_terminal() {
                tracing::debug!(
                    job_id,
                    status = ?job.status,
                    "Ignoring terminal signal for already-terminal job",
                );
                return Ok(false);
            }

            let update = match &outcome {
                JobOutcome::Succeeded { output } => StatusUpdate {
                    new_status: outcome.status(),
                    output: Some(output.clone()),
                    ..Default::default()
                },
                JobOutcome::Failed { error } | JobOutcome::TimedOut { error } => StatusUpdate {
                    new_status: outcome.status(),
                    error: Some(error.clone()),
                    ..Default::default()
                },
                JobOutcome::Cancelled => StatusUpdate::to(outcome.status()),
            };

            match self
                .store
                .compare_and_set_status(job_id, job.status, update)
                .await
            {
                Ok(CasResult::Applied(final_job)) => {
                    self.registry.deregister(job_id).await;
                    tracing::info!(
                        job_id,
                        status = ?final_job.status,
                        "Job reached terminal state",
                    );
                    // No receivers is fine; the send only fans out.
                    let _ = self.event_tx.send(JobEvent::Terminal { job: final_job });
                    return Ok(true);
                }
                Ok(CasResult::Conflict(current)) => {
                    // Another caller transitioned between our read and
                    // write. Loop; the terminal check above settles it.
                    tracing::debug!(
                        job_id,
                        observed = ?job.status,
                        current = ?current.status,
                        "Status moved underneath reconcile, re-reading",
                    );
                }
                Err(StoreError::NotFound(_)) => {
                    self.registry.deregister(job_id).await;
                    return Err(EngineError::JobNotFound(job_id.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
