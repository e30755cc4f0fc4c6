//! The [`JobEngine`] facade.
//!
//! Created once per client session via [`JobEngine::start`]. The returned
//! `Arc` can be cheaply cloned into whatever layer drives submissions.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use overture_core::{
    CasResult, Job, JobId, JobOutcome, JobRequest, JobStatus, JobStore, Principal, StatusUpdate,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::JobEvent;
use crate::listener::NotificationListener;
use crate::poller::ProviderPoller;
use crate::provider::GenerationProvider;
use crate::reconciler::Reconciler;
use crate::registry::JobRegistry;
use crate::timeout::TimeoutGuard;
use crate::transport::PushMessage;

/// Timeout for joining the listener task during shutdown.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(5);

/// Orchestrates job submission, dual-channel tracking, and restoration.
pub struct JobEngine {
    pub(crate) store: Arc<dyn JobStore>,
    provider: Arc<dyn GenerationProvider>,
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) reconciler: Arc<Reconciler>,
    pub(crate) config: EngineConfig,
    poller: Arc<ProviderPoller>,
    guard: Arc<TimeoutGuard>,
    pub(crate) event_tx: broadcast::Sender<JobEvent>,
    push_tx: mpsc::Sender<PushMessage>,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
    listener_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl JobEngine {
    /// Wire up one engine instance and spawn its notification listener.
    pub fn start(
        store: Arc<dyn JobStore>,
        provider: Arc<dyn GenerationProvider>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let registry = Arc::new(JobRegistry::new(cancel.clone()));
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        let (push_tx, push_rx) = mpsc::channel(config.push_capacity);

        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            event_tx.clone(),
        ));
        let poller = Arc::new(ProviderPoller::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            Arc::clone(&reconciler),
            Arc::clone(&registry),
            config.poll_interval,
            config.max_poll_attempts,
        ));
        let guard = Arc::new(TimeoutGuard::new(
            Arc::clone(&reconciler),
            Arc::clone(&registry),
        ));

        let listener = NotificationListener::new(
            Arc::clone(&store),
            Arc::clone(&reconciler),
            Arc::clone(&registry),
        );
        let listener_handle = tokio::spawn(listener.run(push_rx, cancel.child_token()));

        Arc::new(Self {
            store,
            provider,
            registry,
            reconciler,
            config,
            poller,
            guard,
            event_tx,
            push_tx,
            cancel,
            listener_handle: Mutex::new(Some(listener_handle)),
        })
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Handle for push-transport integrations to feed inbound messages.
    pub fn push_sender(&self) -> mpsc::Sender<PushMessage> {
        self.push_tx.clone()
    }

    /// Submit a job: persist a `Queued` record, invoke the provider, and on
    /// acceptance begin dual-channel tracking.
    ///
    /// Provider rejection is terminal: the job goes straight to `Failed`
    /// and no polling or listening ever starts. The returned id is valid
    /// either way; callers read the outcome from the store or the event
    /// stream.
    pub async fn submit_job(
        &self,
        principal: impl Into<Principal>,
        request: JobRequest,
    ) -> Result<JobId, EngineError> {
        let job = Job::new(principal, &request.job_type);
        let job_id = job.job_id.clone();
        self.store.create(&job).await?;

        let external_ids = match self.provider.submit(&request).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Provider rejected submission");
                self.reconciler
                    .reconcile(
                        &job_id,
                        JobOutcome::Failed {
                            error: format!("submission failed: {e}"),
                        },
                    )
                    .await?;
                return Ok(job_id);
            }
        };

        let accepted = self
            .store
            .compare_and_set_status(
                &job_id,
                JobStatus::Queued,
                StatusUpdate {
                    new_status: JobStatus::InProgress,
                    external_ids: Some(external_ids.clone()),
                    ..Default::default()
                },
            )
            .await?;

        match accepted {
            CasResult::Applied(job) => {
                tracing::info!(
                    job_id = %job_id,
                    ids = external_ids.len(),
                    job_type = %job.job_type,
                    "Job accepted by provider, tracking started",
                );
                self.start_tracking(&job).await;
                let _ = self.event_tx.send(JobEvent::Started {
                    job_id: job_id.clone(),
                    external_ids,
                });
            }
            CasResult::Conflict(current) => {
                // The job left `Queued` while the provider call was in
                // flight (e.g. user cancellation). Start no tracking.
                tracing::info!(
                    job_id = %job_id,
                    status = ?current.status,
                    "Job transitioned before acceptance, not tracking",
                );
            }
        }

        Ok(job_id)
    }

    /// Read-only snapshot of a job.
    pub async fn get_job_state(&self, job_id: &str) -> Result<Job, EngineError> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))
    }

    /// Cancel a job. Returns `true` if this call performed the terminal
    /// transition, `false` if the job was already terminal — cancelling
    /// twice, or cancelling a finished job, is a no-op, not an error.
    pub async fn cancel_job(&self, job_id: &str) -> Result<bool, EngineError> {
        self.reconciler.reconcile(job_id, JobOutcome::Cancelled).await
    }

    /// Register a job with the listener's routing table, start its poll
    /// loop (when it has external ids), and arm its timeout guard against
    /// the original `created_at`.
    pub(crate) async fn start_tracking(&self, job: &Job) {
        let seen: HashSet<String> = job.processed_notification_ids.iter().cloned().collect();
        let token = self
            .registry
            .register(&job.job_id, &job.external_ids, seen)
            .await;

        if !job.external_ids.is_empty() {
            let poller = Arc::clone(&self.poller);
            let poll_job_id = job.job_id.clone();
            let poll_ids = job.external_ids.clone();
            let poll_cancel = token.clone();
            tokio::spawn(async move {
                poller.run(poll_job_id, poll_ids, poll_cancel).await;
            });
        }

        let guard = Arc::clone(&self.guard);
        let guard_job_id = job.job_id.clone();
        // Absolute deadline from the immutable creation time, never from
        // the tracking (re)start.
        let deadline = job.created_at + self.config.max_job_lifetime;
        tokio::spawn(async move {
            guard.guard(guard_job_id, deadline, token).await;
        });
    }

    /// Gracefully stop the listener and every per-job task.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job engine");
        self.cancel.cancel();

        if let Some(handle) = self.listener_handle.lock().await.take() {
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }

        tracing::info!("Job engine shut down complete");
    }
}
