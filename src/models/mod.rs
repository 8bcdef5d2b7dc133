// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CandidateProfile, Coordinates, GenderPreference, MatchRequest, PairingHistoryEntry,
    PairingRecord, ParticipantDisplay, RequesterContext, RoomType, ScoreBreakdown,
    ScoredCandidate, ScoringWeights, SessionParticipant, SessionStatus,
};
pub use requests::FindMatchRequest;
pub use responses::{ErrorResponse, HealthResponse, MatchOutcome};
