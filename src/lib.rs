//! Pairmatch - stranger matchmaking engine
//!
//! Picks the most compatible recently active user for a requester and pairs
//! the two exactly once in a durable chat session.

pub mod auth;
pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{Matcher, distance::haversine_distance, pairing::derive_session_id};
pub use crate::models::{CandidateProfile, FindMatchRequest, MatchOutcome, MatchRequest, RequesterContext, ScoredCandidate, ScoringWeights};
pub use crate::services::{InMemoryStore, MatchService, MatchingPolicy};
