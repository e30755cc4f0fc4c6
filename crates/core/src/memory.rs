//! In-memory [`JobStore`] for tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::job::Job;
use crate::status::JobStatus;
use crate::store::{CasResult, JobStore, StatusUpdate, StoreError};
use crate::types::{JobId, Principal, Timestamp};

/// A `HashMap`-backed store. Compare-and-set is check-then-write under a
/// single write-lock acquisition, which serializes status transitions per
/// process.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(StoreError::Backend(format!(
                "duplicate job id {}",
                job.job_id
            )));
        }
        jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        job_id: &str,
        expected: JobStatus,
        update: StatusUpdate,
    ) -> Result<CasResult, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

        if job.status != expected {
            return Ok(CasResult::Conflict(job.clone()));
        }

        job.status = update.new_status;
        job.last_transition_at = Utc::now();
        if let Some(output) = update.output {
            job.output = Some(output);
        }
        if let Some(error) = update.error {
            job.error = Some(error);
        }
        if let Some(external_ids) = update.external_ids {
            job.external_ids = external_ids;
        }
        Ok(CasResult::Applied(job.clone()))
    }

    async fn list_non_terminal(
        &self,
        principal: &Principal,
        since: Timestamp,
    ) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|job| {
                &job.principal == principal
                    && !job.status.is_terminal()
                    && job.created_at >= since
            })
            .cloned()
            .collect();
        matching.sort_by_key(|job| job.created_at);
        Ok(matching)
    }

    async fn record_processed_notification(
        &self,
        job_id: &str,
        notification_id: &str,
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        if !job
            .processed_notification_ids
            .iter()
            .any(|id| id == notification_id)
        {
            job.processed_notification_ids
                .push(notification_id.to_string());
        }
        Ok(())
    }
}
