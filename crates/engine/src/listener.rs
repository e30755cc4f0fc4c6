//! Notification listener: routes push-transport messages to the reconciler.
//!
//! One listener task runs per engine instance (not per job). It is a pure
//! router — it never polls or times anything — and it is the only consumer
//! of the inbound push channel, so reconciliation never runs reentrantly
//! inside a transport callback.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use overture_core::{JobOutcome, JobStore};

use crate::error::EngineError;
use crate::reconciler::Reconciler;
use crate::registry::JobRegistry;
use crate::transport::{PushMessage, PushStatus};

pub struct NotificationListener {
    store: Arc<dyn JobStore>,
    reconciler: Arc<Reconciler>,
    registry: Arc<JobRegistry>,
}

impl NotificationListener {
    pub fn new(
        store: Arc<dyn JobStore>,
        reconciler: Arc<Reconciler>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            store,
            reconciler,
            registry,
        }
    }

    /// Drain the push channel until it closes or the engine shuts down.
    pub async fn run(self, mut rx: mpsc::Receiver<PushMessage>, cancel: CancellationToken) {
        tracing::debug!("Notification listener started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification listener shutting down");
                    return;
                }
                message = rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            tracing::info!("Push channel closed, notification listener exiting");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_message(&self, message: PushMessage) {
        // The channel is shared and is not authorization: only messages
        // matching a job this engine tracks are acted on.
        let Some(job_id) = self.registry.job_for_key(&message.job_key).await else {
            tracing::trace!(
                job_key = %message.job_key,
                "Discarding message for untracked job key",
            );
            return;
        };

        // Dedup before any reconciler call; the transport can redeliver.
        if !self
            .registry
            .mark_seen(&job_id, &message.notification_id)
            .await
        {
            tracing::debug!(
                job_id = %job_id,
                notification_id = %message.notification_id,
                "Discarding duplicate notification",
            );
            return;
        }

        // Persist the applied id so deduplication survives a restart.
        if let Err(e) = self
            .store
            .record_processed_notification(&job_id, &message.notification_id)
            .await
        {
            tracing::warn!(
                job_id = %job_id,
                error = %e,
                "Failed to persist processed notification id",
            );
        }

        let outcome = match message.status {
            PushStatus::Succeeded => JobOutcome::Succeeded {
                output: message.payload.unwrap_or(serde_json::Value::Null),
            },
            PushStatus::Failed => JobOutcome::Failed {
                error: message
                    .error
                    .unwrap_or_else(|| "provider reported failure".to_string()),
            },
        };

        match self.reconciler.reconcile(&job_id, outcome).await {
            Ok(true) => {
                tracing::info!(job_id = %job_id, "Job resolved via push channel");
            }
            Ok(false) => {
                tracing::debug!(job_id = %job_id, "Push result lost the race, already terminal");
            }
            Err(EngineError::JobNotFound(_)) => {
                tracing::error!(job_id = %job_id, "Job record missing during push reconcile");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to reconcile push result");
            }
        }
    }
}
