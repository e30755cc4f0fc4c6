//! Asynchronous job reconciliation engine.
//!
//! Tracks long-running generation jobs to completion and guarantees the UI
//! observes exactly one terminal outcome per job, despite completion signals
//! arriving through two independent, unordered channels (an active poll
//! loop and an out-of-band push notification), duplicate deliveries, and
//! client restarts mid-job.
//!
//! The entry point is [`JobEngine::start`]. Callers inject a
//! [`JobStore`](overture_core::JobStore) and a [`GenerationProvider`], then
//! drive jobs through [`JobEngine::submit_job`] and observe outcomes via
//! [`JobEngine::subscribe`]. Push-transport integrations feed inbound
//! messages through the sender returned by [`JobEngine::push_sender`].
//!
//! Internally, [`Reconciler`] is the single component permitted to write a
//! terminal status, and every write is a compare-and-set against the
//! previously observed status. Everything else — the per-job poller, the
//! notification listener, the timeout guard, the restorer — funnels into it.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod listener;
pub mod poller;
pub mod provider;
pub mod reconciler;
pub mod registry;
pub mod restore;
pub mod timeout;
pub mod transport;

pub use config::EngineConfig;
pub use engine::JobEngine;
pub use error::EngineError;
pub use events::JobEvent;
pub use provider::{GenerationProvider, PollStatus, ProviderError};
pub use reconciler::Reconciler;
pub use registry::JobRegistry;
pub use restore::RestoreSummary;
pub use transport::{PushMessage, PushStatus};
