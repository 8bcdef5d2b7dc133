use async_trait::async_trait;
use thiserror::Error;

use crate::core::PairingCommit;
use crate::models::{
    CandidateProfile, PairingHistoryEntry, PairingRecord, ParticipantDisplay, RequesterContext,
};

/// Errors that can occur when talking to the persistent store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Transaction failed after {0} attempts")]
    RetriesExhausted(u32),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a pairing transaction
#[derive(Debug, Clone)]
pub enum CommitOutcome {
    /// The session was created and both histories appended
    Created(PairingRecord),
    /// The session already existed; missing history entries were appended
    AlreadyExists(PairingRecord),
    /// The candidate was paired with someone else inside the reservation window
    CandidateUnavailable,
    /// The requester was paired with someone else after its context was read
    RequesterPairedElsewhere(PairingHistoryEntry),
    /// The derived session id already belongs to a different pair
    SessionIdConflict,
    /// The requester has no profile row
    RequesterMissing,
}

/// Read-only, time-windowed view of users eligible for matching
#[async_trait]
pub trait CandidatePool: Send + Sync {
    /// Profiles active within the last `window_hours`, at most `limit` of them
    ///
    /// An empty pool is `Ok(vec![])`, never an error.
    async fn fetch_active(&self, window_hours: u32, limit: usize) -> Result<Vec<CandidateProfile>, StoreError>;
}

/// Profile reads and the atomic pairing commit
#[async_trait]
pub trait PairingStore: Send + Sync {
    /// Requester profile plus block-list, connections and pairing history
    async fn load_requester(&self, user_id: &str) -> Result<Option<RequesterContext>, StoreError>;

    /// Current display fields for a user
    async fn load_display(&self, user_id: &str) -> Result<Option<ParticipantDisplay>, StoreError>;

    async fn load_session(&self, session_id: &str) -> Result<Option<PairingRecord>, StoreError>;

    /// Create the session if absent and append both history entries, all or nothing
    async fn commit_pairing(&self, commit: &PairingCommit) -> Result<CommitOutcome, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}
