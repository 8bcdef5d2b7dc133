use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::domain::{Coordinates, GenderPreference, MatchRequest};

/// Request body for a global match
///
/// The requester id never comes from the body; it is taken from the bearer token.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_find_match"))]
#[serde(rename_all = "camelCase")]
pub struct FindMatchRequest {
    #[serde(default)]
    pub preferred_gender: Option<String>,
    #[serde(default)]
    pub preferred_min_age: Option<u32>,
    #[serde(default)]
    pub preferred_max_age: Option<u32>,
    #[serde(default)]
    pub prefer_verified_only: Option<bool>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub deal_breakers: Vec<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    #[serde(default)]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    #[serde(default)]
    pub longitude: Option<f64>,
}

fn validate_find_match(req: &FindMatchRequest) -> Result<(), ValidationError> {
    if req.latitude.is_some() != req.longitude.is_some() {
        let mut err = ValidationError::new("coordinates");
        err.message = Some("latitude and longitude must be supplied together".into());
        return Err(err);
    }

    if let (Some(min), Some(max)) = (req.preferred_min_age, req.preferred_max_age) {
        if min > max {
            let mut err = ValidationError::new("age_range");
            err.message = Some("preferredMinAge must not exceed preferredMaxAge".into());
            return Err(err);
        }
    }

    Ok(())
}

impl FindMatchRequest {
    /// Bind the body to the authenticated requester
    pub fn into_match_request(self, requester_id: String) -> MatchRequest {
        MatchRequest {
            requester_id,
            preferred_gender: GenderPreference::parse(self.preferred_gender.as_deref()),
            min_age: self.preferred_min_age,
            max_age: self.preferred_max_age,
            verified_only: self.prefer_verified_only.unwrap_or(false),
            interests: self.interests,
            dealbreakers: self.deal_breakers,
            coordinates: Coordinates::from_parts(self.latitude, self.longitude),
        }
    }
}
