//! Push-transport message boundary.
//!
//! A push integration (webhook receiver, realtime channel client) converts
//! raw deliveries into [`PushMessage`] values and sends them on the channel
//! returned by [`JobEngine::push_sender`](crate::JobEngine::push_sender).
//! The notification listener drains that channel on its own task, so
//! reconciliation never runs inside a transport callback.
//!
//! The transport is assumed at-least-once and unordered; `notification_id`
//! must be derivable from the delivery itself (e.g. the provider's external
//! id plus an attempt marker) so redeliveries carry the same id.

use serde::{Deserialize, Serialize};

/// Terminal disposition carried by a push message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Succeeded,
    Failed,
}

/// One inbound completion notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    /// Deduplication identity; redeliveries repeat it verbatim.
    pub notification_id: String,

    /// The provider-side key the message concerns — matched against the
    /// external ids of jobs this engine instance is tracking. On a shared
    /// channel a session may receive messages for other users' jobs; an
    /// unmatched key is discarded, never acted on.
    pub job_key: String,

    pub status: PushStatus,

    /// Output payload for `Succeeded` messages.
    pub payload: Option<serde_json::Value>,

    /// Human-readable cause for `Failed` messages.
    pub error: Option<String>,
}
