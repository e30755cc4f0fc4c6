//! Per-engine tracking registry.
//!
//! [`JobRegistry`] owns all mutable tracking state for one engine instance:
//! which jobs are in flight, which provider keys route to which job, which
//! notification ids were already applied, and the per-job cancellation
//! tokens that stop the poller and timeout guard. Keeping it on the engine
//! instance (rather than process-wide) lets multiple engines — per tenant,
//! or under test — coexist without interfering.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use overture_core::{ExternalId, JobId};

/// Tracking state for one in-flight job.
struct TrackedJob {
    /// Child of the engine master token. Cancelling it stops the job's
    /// poller and disarms its timeout guard.
    cancel: CancellationToken,
    external_ids: Vec<ExternalId>,
    /// Notification ids already applied for this job.
    seen_notifications: HashSet<String>,
    /// Set when the poller exhausts its attempt budget without resolution.
    poll_exhausted: bool,
}

/// Registry of jobs this engine instance is tracking.
pub struct JobRegistry {
    master: CancellationToken,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, TrackedJob>,
    /// Provider key (external id) -> owning job.
    routing: HashMap<ExternalId, JobId>,
}

impl JobRegistry {
    /// Create a registry whose per-job tokens are children of `master`.
    pub fn new(master: CancellationToken) -> Self {
        Self {
            master,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Begin tracking a job, routing its external ids to it.
    ///
    /// `seen_notifications` seeds the dedup set (non-empty when restoring a
    /// job whose record already carries processed ids). Returns the job's
    /// cancellation token; registering an already-tracked job returns the
    /// existing token without touching state.
    pub async fn register(
        &self,
        job_id: &JobId,
        external_ids: &[ExternalId],
        seen_notifications: HashSet<String>,
    ) -> CancellationToken {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.jobs.get(job_id) {
            return existing.cancel.clone();
        }

        let cancel = self.master.child_token();
        for key in external_ids {
            inner.routing.insert(key.clone(), job_id.clone());
        }
        inner.jobs.insert(
            job_id.clone(),
            TrackedJob {
                cancel: cancel.clone(),
                external_ids: external_ids.to_vec(),
                seen_notifications,
                poll_exhausted: false,
            },
        );
        cancel
    }

    /// Stop tracking a job: cancel its token and drop its routing entries.
    ///
    /// Idempotent — deregistering an unknown or already-deregistered job is
    /// a no-op.
    pub async fn deregister(&self, job_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(tracked) = inner.jobs.remove(job_id) {
            tracked.cancel.cancel();
            for key in &tracked.external_ids {
                inner.routing.remove(key);
            }
        }
    }

    /// Resolve a provider key to the job this engine tracks for it.
    pub async fn job_for_key(&self, key: &str) -> Option<JobId> {
        self.inner.read().await.routing.get(key).cloned()
    }

    /// Record a notification id as applied. Returns `true` only the first
    /// time a given id is seen for the job; unknown jobs return `false`.
    pub async fn mark_seen(&self, job_id: &str, notification_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.jobs.get_mut(job_id) {
            Some(tracked) => tracked
                .seen_notifications
                .insert(notification_id.to_string()),
            None => false,
        }
    }

    /// Note that the poller gave up on this job without resolution.
    pub async fn note_poll_exhausted(&self, job_id: &str) {
        let mut inner = self.inner.write().await;
        if let Some(tracked) = inner.jobs.get_mut(job_id) {
            tracked.poll_exhausted = true;
        }
    }

    /// Whether the poller exhausted its budget for this job.
    pub async fn poll_exhausted(&self, job_id: &str) -> bool {
        self.inner
            .read()
            .await
            .jobs
            .get(job_id)
            .map(|t| t.poll_exhausted)
            .unwrap_or(false)
    }

    /// Whether the job is currently tracked.
    pub async fn is_tracked(&self, job_id: &str) -> bool {
        self.inner.read().await.jobs.contains_key(job_id)
    }
}
