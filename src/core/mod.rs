// Core algorithm exports
pub mod criteria;
pub mod distance;
pub mod filters;
pub mod matcher;
pub mod pairing;
pub mod scoring;
pub mod tags;

pub use criteria::MatchCriteria;
pub use distance::{distance_between, haversine_distance};
pub use filters::{check_candidate, is_eligible, Rejection};
pub use matcher::{MatchResult, Matcher};
pub use pairing::{derive_session_id, find_recent_pairing, PairingCommit};
pub use scoring::calculate_match_score;
