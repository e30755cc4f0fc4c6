//! Engine-level error taxonomy.

use overture_core::StoreError;

/// Errors surfaced by the engine's public operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No job record exists for the given id. A tracker hitting this stops
    /// immediately — continuing would leak resources on a job that can
    /// never resolve.
    #[error("job {0} not found")]
    JobNotFound(String),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
