//! Engine tunables.

use std::time::Duration;

/// Tunable parameters for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed delay between provider poll attempts for one job. Long enough
    /// to stay under provider rate limits, short enough for a responsive UI.
    pub poll_interval: Duration,

    /// Maximum poll attempts per tracked job. Exhausting the budget does
    /// NOT time the job out — the push channel may still resolve it; only
    /// `max_job_lifetime` does.
    pub max_poll_attempts: u32,

    /// Absolute per-job deadline, measured from `created_at`. The timeout
    /// guard forces a `timed_out` transition when it elapses.
    pub max_job_lifetime: Duration,

    /// How far back the restorer queries for non-terminal jobs. Jobs past
    /// their lifetime within this horizon are failed as stale; jobs older
    /// than the horizon are not touched at all.
    pub restore_horizon: Duration,

    /// Buffer capacity of the observer broadcast channel.
    pub event_capacity: usize,

    /// Buffer capacity of the inbound push-message channel.
    pub push_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_poll_attempts: 60,
            max_job_lifetime: Duration::from_secs(600),
            restore_horizon: Duration::from_secs(24 * 60 * 60),
            event_capacity: 256,
            push_capacity: 256,
        }
    }
}
