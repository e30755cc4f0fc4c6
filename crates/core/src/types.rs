/// Opaque job identifier, assigned at submission (UUIDv7 text).
pub type JobId = String;

/// Identifier assigned by the generation provider for one sub-unit of a job.
pub type ExternalId = String;

/// Owner of a job — whatever identity scheme the caller uses (user id,
/// tenant id). The engine only ever compares principals for equality.
pub type Principal = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
