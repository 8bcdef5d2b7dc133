// Service exports
pub mod cache;
pub mod coordinator;
pub mod matchmaking;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::CachedPool;
pub use coordinator::{PairAttempt, Pairing, PairingCoordinator};
pub use matchmaking::{MatchError, MatchService, MatchingPolicy};
pub use memory::InMemoryStore;
pub use postgres::PostgresClient;
pub use store::{CandidatePool, CommitOutcome, PairingStore, StoreError};
