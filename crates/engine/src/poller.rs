//! Active provider poll loop, one per tracked job.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use overture_core::{ExternalId, JobId, JobOutcome, JobStore};

use crate::error::EngineError;
use crate::provider::{GenerationProvider, PollStatus};
use crate::reconciler::Reconciler;
use crate::registry::JobRegistry;

/// Polls the provider for a job's external ids until all settle, the
/// attempt budget runs out, or the job's cancellation token fires.
///
/// One instance is shared engine-wide; [`ProviderPoller::run`] is spawned
/// per job. The loop's own interval serializes polls for a given job, so a
/// tick never overlaps the previous one.
pub struct ProviderPoller {
    provider: Arc<dyn GenerationProvider>,
    store: Arc<dyn JobStore>,
    reconciler: Arc<Reconciler>,
    registry: Arc<JobRegistry>,
    interval: Duration,
    max_attempts: u32,
}

impl ProviderPoller {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        store: Arc<dyn JobStore>,
        reconciler: Arc<Reconciler>,
        registry: Arc<JobRegistry>,
        interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            provider,
            store,
            reconciler,
            registry,
            interval,
            max_attempts,
        }
    }

    /// Poll `external_ids` every interval until resolution or exhaustion.
    ///
    /// The first tick fires one full interval after start, so a push
    /// notification arriving immediately after submission cancels the
    /// timer before it ever polls.
    pub async fn run(&self, job_id: JobId, external_ids: Vec<ExternalId>, cancel: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        let mut attempts = 0u32;

        tracing::debug!(
            job_id = %job_id,
            ids = external_ids.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Poll loop started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(job_id = %job_id, "Poll loop cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            attempts += 1;

            // A vanished record can never resolve; polling it forever is a
            // silent resource leak.
            match self.store.get(&job_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::error!(job_id = %job_id, "Job record missing, stopping poll loop");
                    self.signal(&job_id, JobOutcome::Failed {
                        error: "job record missing from store".into(),
                    })
                    .await;
                    return;
                }
                Err(e) => {
                    // Transient store trouble; retry on the next tick.
                    tracing::warn!(job_id = %job_id, error = %e, "Store read failed during poll tick");
                    continue;
                }
            }

            match self.poll_once(&job_id, &external_ids).await {
                TickResult::Resolved(outcome) => {
                    self.signal(&job_id, outcome).await;
                    return;
                }
                TickResult::StillPending => {}
            }

            if attempts >= self.max_attempts {
                // Exhaustion is not a timeout: the push channel (or a very
                // late poll answer routed through it) can still win. The
                // timeout guard owns the final decision.
                self.registry.note_poll_exhausted(&job_id).await;
                tracing::info!(
                    job_id = %job_id,
                    attempts,
                    "Poll budget exhausted, leaving resolution to push channel and timeout guard",
                );
                return;
            }
        }
    }

    /// Query every outstanding external id once and fold the answers.
    async fn poll_once(&self, job_id: &str, external_ids: &[ExternalId]) -> TickResult {
        let results = join_all(external_ids.iter().map(|id| self.provider.poll(id))).await;

        let mut outputs = Vec::with_capacity(external_ids.len());
        let mut unsettled = false;
        for (external_id, result) in external_ids.iter().zip(results) {
            match result {
                Ok(PollStatus::Succeeded { output }) => outputs.push(output),
                Ok(PollStatus::Failed { error }) => {
                    // Fail fast: the job does not wait for sibling ids once
                    // one has failed.
                    return TickResult::Resolved(JobOutcome::Failed {
                        error: format!("{external_id}: {error}"),
                    });
                }
                Ok(PollStatus::Cancelled) => {
                    return TickResult::Resolved(JobOutcome::Failed {
                        error: format!("{external_id}: cancelled on the provider side"),
                    });
                }
                Ok(PollStatus::Pending | PollStatus::Processing) => {
                    unsettled = true;
                }
                Err(e) => {
                    // Transient. Logged and retried; a run of these never
                    // terminates the job by itself.
                    tracing::warn!(
                        job_id = %job_id,
                        external_id = %external_id,
                        error = %e,
                        "Poll attempt failed, will retry",
                    );
                    unsettled = true;
                }
            }
        }

        if unsettled {
            return TickResult::StillPending;
        }

        TickResult::Resolved(JobOutcome::Succeeded {
            output: gather_outputs(outputs),
        })
    }

    /// Hand an outcome to the reconciler, logging rather than propagating —
    /// the poll task has nowhere to return an error to.
    async fn signal(&self, job_id: &str, outcome: JobOutcome) {
        match self.reconciler.reconcile(job_id, outcome).await {
            Ok(true) => {
                tracing::info!(job_id = %job_id, "Job resolved via poll channel");
            }
            Ok(false) => {
                tracing::debug!(job_id = %job_id, "Poll result lost the race, already terminal");
            }
            Err(EngineError::JobNotFound(_)) => {
                tracing::error!(job_id = %job_id, "Job record missing during reconcile");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to reconcile poll result");
            }
        }
    }
}

enum TickResult {
    Resolved(JobOutcome),
    StillPending,
}

/// A single-variant job reports its output verbatim; fan-out jobs report a
/// JSON array in external-id order.
fn gather_outputs(mut outputs: Vec<serde_json::Value>) -> serde_json::Value {
    if outputs.len() == 1 {
        outputs.remove(0)
    } else {
        serde_json::Value::Array(outputs)
    }
}
