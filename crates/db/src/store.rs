//! The `jobs` table and its [`JobStore`] implementation.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use overture_core::status::StatusId;
use overture_core::{
    CasResult, Job, JobStatus, JobStore, Principal, StatusUpdate, StoreError, Timestamp,
};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    job_id, principal, job_type, external_ids, status_id, \
    output, error_message, created_at, last_transition_at, \
    processed_notification_ids";

/// Terminal statuses: succeeded, failed, cancelled, timed out.
const TERMINAL_STATUSES: [StatusId; 4] = [
    JobStatus::Succeeded as StatusId,
    JobStatus::Failed as StatusId,
    JobStatus::Cancelled as StatusId,
    JobStatus::TimedOut as StatusId,
];

/// Schema bootstrap for deployments without an external migration runner.
const SCHEMA: &str = "\
    CREATE TABLE IF NOT EXISTS jobs ( \
        job_id TEXT PRIMARY KEY, \
        principal TEXT NOT NULL, \
        job_type TEXT NOT NULL, \
        external_ids TEXT[] NOT NULL DEFAULT '{}', \
        status_id SMALLINT NOT NULL, \
        output JSONB, \
        error_message TEXT, \
        created_at TIMESTAMPTZ NOT NULL, \
        last_transition_at TIMESTAMPTZ NOT NULL, \
        processed_notification_ids TEXT[] NOT NULL DEFAULT '{}' \
    ); \
    CREATE INDEX IF NOT EXISTS idx_jobs_principal_created \
        ON jobs (principal, created_at)";

/// A row from the `jobs` table.
#[derive(Debug, FromRow)]
struct JobRow {
    job_id: String,
    principal: String,
    job_type: String,
    external_ids: Vec<String>,
    status_id: StatusId,
    output: Option<serde_json::Value>,
    error_message: Option<String>,
    created_at: Timestamp,
    last_transition_at: Timestamp,
    processed_notification_ids: Vec<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job, StoreError> {
        let status = JobStatus::from_id(self.status_id).ok_or_else(|| {
            StoreError::Backend(format!(
                "job {} has unknown status id {}",
                self.job_id, self.status_id
            ))
        })?;
        Ok(Job {
            job_id: self.job_id,
            principal: self.principal,
            job_type: self.job_type,
            external_ids: self.external_ids,
            status,
            output: self.output,
            error: self.error_message,
            created_at: self.created_at,
            last_transition_at: self.last_transition_at,
            processed_notification_ids: self.processed_notification_ids,
        })
    }
}

/// PostgreSQL-backed job store.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `jobs` table and its indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split("; ") {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        }
        tracing::debug!("jobs schema ensured");
        Ok(())
    }

    async fn fetch(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE job_id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(JobRow::into_job).transpose()
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO jobs \
                 (job_id, principal, job_type, external_ids, status_id, \
                  output, error_message, created_at, last_transition_at, \
                  processed_notification_ids) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&job.job_id)
        .bind(&job.principal)
        .bind(&job.job_type)
        .bind(&job.external_ids)
        .bind(job.status.id())
        .bind(&job.output)
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.last_transition_at)
        .bind(&job.processed_notification_ids)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        self.fetch(job_id).await
    }

    async fn compare_and_set_status(
        &self,
        job_id: &str,
        expected: JobStatus,
        update: StatusUpdate,
    ) -> Result<CasResult, StoreError> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $3, \
                 last_transition_at = NOW(), \
                 output = COALESCE($4, output), \
                 error_message = COALESCE($5, error_message), \
                 external_ids = COALESCE($6, external_ids) \
             WHERE job_id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .bind(expected.id())
            .bind(update.new_status.id())
            .bind(&update.output)
            .bind(&update.error)
            .bind(&update.external_ids)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => Ok(CasResult::Applied(row.into_job()?)),
            // The guard did not match: re-read to tell a concurrent
            // transition apart from a missing record.
            None => match self.fetch(job_id).await? {
                Some(current) => Ok(CasResult::Conflict(current)),
                None => Err(StoreError::NotFound(job_id.to_string())),
            },
        }
    }

    async fn list_non_terminal(
        &self,
        principal: &Principal,
        since: Timestamp,
    ) -> Result<Vec<Job>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE principal = $1 \
               AND created_at >= $2 \
               AND status_id != ALL($3) \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(principal)
            .bind(since)
            .bind(&TERMINAL_STATUSES[..])
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn record_processed_notification(
        &self,
        job_id: &str,
        notification_id: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET processed_notification_ids = \
                 array_append(processed_notification_ids, $2) \
             WHERE job_id = $1 \
               AND NOT ($2 = ANY(processed_notification_ids))",
        )
        .bind(job_id)
        .bind(notification_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        // Zero rows means either the id was already recorded (fine) or the
        // job is gone; only the latter is an error.
        if result.rows_affected() == 0 && self.fetch(job_id).await?.is_none() {
            return Err(StoreError::NotFound(job_id.to_string()));
        }
        Ok(())
    }
}
