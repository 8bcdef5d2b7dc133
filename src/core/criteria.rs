use crate::core::tags::normalize_tags;
use crate::models::{Coordinates, GenderPreference, MatchRequest, RequesterContext};

/// Requester-side inputs for filtering and scoring, normalised once per request
#[derive(Debug, Clone)]
pub struct MatchCriteria<'a> {
    pub context: &'a RequesterContext,
    pub preferred_gender: &'a GenderPreference,
    pub verified_only: bool,
    pub interests: Vec<String>,
    pub dealbreakers: Vec<String>,
    pub coordinates: Option<Coordinates>,
}

impl<'a> MatchCriteria<'a> {
    pub fn new(context: &'a RequesterContext, request: &'a MatchRequest) -> Self {
        Self {
            context,
            preferred_gender: &request.preferred_gender,
            verified_only: request.verified_only,
            interests: normalize_tags(&request.interests),
            dealbreakers: normalize_tags(&request.dealbreakers),
            coordinates: request.coordinates,
        }
    }

    pub fn requester_id(&self) -> &str {
        &self.context.user_id
    }
}
