//! Caller-visible error taxonomy.
//!
//! Only two failure modes are allowed to fail a request: the target room
//! being absent and a storage-level retrieval failure. Everything else
//! (degraded scoring branches, cache tier outages, telemetry failures)
//! is recovered locally and never surfaces here.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecoError {
    #[error("room {0} not found")]
    RoomNotFound(Uuid),

    /// Candidate or target retrieval failed. Distinct from an empty
    /// candidate set, which is a valid outcome.
    #[error("failed to retrieve rooms: {0}")]
    Storage(#[from] sqlx::Error),
}

impl RecoError {
    pub fn status_code(&self) -> u16 {
        match self {
            RecoError::RoomNotFound(_) => 404,
            RecoError::Storage(_) => 500,
        }
    }
}
