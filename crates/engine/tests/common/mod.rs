//! Shared test harness: a scripted provider and engine wiring helpers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::Mutex;

use overture_core::{
    CasResult, ExternalId, Job, JobRequest, JobStatus, JobStore, MemoryJobStore, Principal,
    StatusUpdate, StoreError, Timestamp,
};
use overture_engine::{
    EngineConfig, GenerationProvider, JobEngine, JobEvent, PollStatus, ProviderError,
};

/// A provider whose poll answers follow a per-id script. The last entry of
/// a script repeats forever; unscripted ids report `Pending`.
pub struct ScriptedProvider {
    accept: Result<Vec<ExternalId>, String>,
    scripts: Mutex<HashMap<ExternalId, Vec<PollStatus>>>,
    poll_count: AtomicU32,
    /// Remaining poll calls that fail with a transport error.
    flaky_polls: AtomicU32,
}

impl ScriptedProvider {
    /// Accept every submission with the given external ids.
    pub fn accepting(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            accept: Ok(ids.iter().map(|s| s.to_string()).collect()),
            scripts: Mutex::new(HashMap::new()),
            poll_count: AtomicU32::new(0),
            flaky_polls: AtomicU32::new(0),
        })
    }

    /// Reject every submission with the given reason.
    pub fn rejecting(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            accept: Err(reason.to_string()),
            scripts: Mutex::new(HashMap::new()),
            poll_count: AtomicU32::new(0),
            flaky_polls: AtomicU32::new(0),
        })
    }

    /// Set the poll script for one external id.
    pub async fn script(&self, external_id: &str, statuses: Vec<PollStatus>) {
        self.scripts
            .lock()
            .await
            .insert(external_id.to_string(), statuses);
    }

    /// Make the next `n` poll calls fail with a transport error.
    pub fn fail_next_polls(&self, n: u32) {
        self.flaky_polls.store(n, Ordering::SeqCst);
    }

    /// Total poll calls across all ids.
    pub fn polls(&self) -> u32 {
        self.poll_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn submit(&self, _request: &JobRequest) -> Result<Vec<ExternalId>, ProviderError> {
        match &self.accept {
            Ok(ids) => Ok(ids.clone()),
            Err(reason) => Err(ProviderError::Rejected(reason.clone())),
        }
    }

    async fn poll(&self, external_id: &ExternalId) -> Result<PollStatus, ProviderError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        if self
            .flaky_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ProviderError::Request("connection reset".into()));
        }
        let mut scripts = self.scripts.lock().await;
        match scripts.get_mut(external_id) {
            Some(script) if script.len() > 1 => Ok(script.remove(0)),
            Some(script) if script.len() == 1 => Ok(script[0].clone()),
            _ => Ok(PollStatus::Pending),
        }
    }
}

/// A store whose records can be made to disappear mid-flight, for the
/// missing-record hard-stop path.
pub struct VanishingStore {
    inner: MemoryJobStore,
    vanished: std::sync::atomic::AtomicBool,
}

impl VanishingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryJobStore::new(),
            vanished: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// From now on, every record is gone.
    pub fn vanish(&self) {
        self.vanished.store(true, Ordering::SeqCst);
    }

    fn gone(&self) -> bool {
        self.vanished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for VanishingStore {
    async fn create(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.create(job).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        if self.gone() {
            return Ok(None);
        }
        self.inner.get(job_id).await
    }

    async fn compare_and_set_status(
        &self,
        job_id: &str,
        expected: JobStatus,
        update: StatusUpdate,
    ) -> Result<CasResult, StoreError> {
        if self.gone() {
            return Err(StoreError::NotFound(job_id.to_string()));
        }
        self.inner
            .compare_and_set_status(job_id, expected, update)
            .await
    }

    async fn list_non_terminal(
        &self,
        principal: &Principal,
        since: Timestamp,
    ) -> Result<Vec<Job>, StoreError> {
        if self.gone() {
            return Ok(Vec::new());
        }
        self.inner.list_non_terminal(principal, since).await
    }

    async fn record_processed_notification(
        &self,
        job_id: &str,
        notification_id: &str,
    ) -> Result<(), StoreError> {
        if self.gone() {
            return Err(StoreError::NotFound(job_id.to_string()));
        }
        self.inner
            .record_processed_notification(job_id, notification_id)
            .await
    }
}

/// Engine config with short, test-friendly horizons.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval: Duration::from_secs(1),
        max_poll_attempts: 10,
        max_job_lifetime: Duration::from_secs(60),
        restore_horizon: Duration::from_secs(3600),
        ..EngineConfig::default()
    }
}

/// Wire an engine over a fresh in-memory store.
pub fn start_engine(
    provider: Arc<ScriptedProvider>,
    config: EngineConfig,
) -> (Arc<JobEngine>, Arc<MemoryJobStore>) {
    init_tracing();
    let store = Arc::new(MemoryJobStore::new());
    let engine = JobEngine::start(store.clone(), provider, config);
    (engine, store)
}

pub fn request(job_type: &str) -> JobRequest {
    JobRequest {
        job_type: job_type.to_string(),
        parameters: serde_json::json!({"prompt": "a lighthouse at dusk"}),
    }
}

/// Wait for the next `Terminal` event, skipping provisional ones.
pub async fn recv_terminal(rx: &mut broadcast::Receiver<JobEvent>) -> Job {
    let deadline = Duration::from_secs(300);
    tokio::time::timeout(deadline, async {
        loop {
            match rx.recv().await.expect("event stream closed") {
                JobEvent::Terminal { job } => return job,
                JobEvent::Started { .. } | JobEvent::Resumed { .. } => {}
            }
        }
    })
    .await
    .expect("no terminal event before timeout")
}

/// Assert that no further `Terminal` event is pending on the channel.
pub fn assert_no_terminal(rx: &mut broadcast::Receiver<JobEvent>) {
    loop {
        match rx.try_recv() {
            Ok(JobEvent::Terminal { job }) => {
                panic!("unexpected extra terminal event for job {}", job.job_id)
            }
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Empty) => return,
            Err(e) => panic!("event stream broken: {e}"),
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
