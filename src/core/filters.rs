use std::fmt;

use crate::core::criteria::MatchCriteria;
use crate::core::tags::{any_overlap, normalize_tags};
use crate::models::{CandidateProfile, GenderPreference, MatchRequest, RequesterContext};

/// Why a candidate was excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    SelfMatch,
    Blocked,
    Friend,
    PreviouslyPaired,
    /// Candidate has an interest the requester won't tolerate
    RequesterDealbreaker,
    /// Requester has an interest the candidate won't tolerate
    CandidateDealbreaker,
    Gender,
    Unverified,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::SelfMatch => "self",
            Rejection::Blocked => "blocked",
            Rejection::Friend => "existing connection",
            Rejection::PreviouslyPaired => "previously paired",
            Rejection::RequesterDealbreaker => "candidate has an interest the requester dislikes",
            Rejection::CandidateDealbreaker => "requester has an interest the candidate dislikes",
            Rejection::Gender => "gender preference",
            Rejection::Unverified => "verification preference",
        };
        f.write_str(reason)
    }
}

/// Check a candidate against every hard exclusion rule
///
/// Returns the first rule that rejects the candidate, or `None` if eligible.
pub fn check_candidate(criteria: &MatchCriteria<'_>, candidate: &CandidateProfile) -> Option<Rejection> {
    let ctx = criteria.context;
    let candidate_id = candidate.user_id.as_str();

    if candidate_id == ctx.user_id {
        return Some(Rejection::SelfMatch);
    }
    if ctx.blocked_users.iter().any(|id| id == candidate_id) {
        return Some(Rejection::Blocked);
    }
    if ctx.friends.iter().any(|id| id == candidate_id) {
        return Some(Rejection::Friend);
    }
    if ctx.pairing_history.iter().any(|entry| entry.partner_id == candidate_id) {
        return Some(Rejection::PreviouslyPaired);
    }

    // Dealbreakers, both directions
    if !criteria.dealbreakers.is_empty() {
        let candidate_interests = normalize_tags(&candidate.interests);
        if any_overlap(&criteria.dealbreakers, &candidate_interests) {
            return Some(Rejection::RequesterDealbreaker);
        }
    }
    if !criteria.interests.is_empty() {
        let candidate_dealbreakers = normalize_tags(&candidate.dealbreakers);
        if any_overlap(&candidate_dealbreakers, &criteria.interests) {
            return Some(Rejection::CandidateDealbreaker);
        }
    }

    if !matches_gender(criteria.preferred_gender, &ctx.gender, &candidate.gender) {
        return Some(Rejection::Gender);
    }

    if criteria.verified_only && !candidate.is_verified() {
        return Some(Rejection::Unverified);
    }

    None
}

/// Gender preference check
#[inline]
pub fn matches_gender(preference: &GenderPreference, requester_gender: &str, candidate_gender: &str) -> bool {
    match preference {
        GenderPreference::Any => true,
        GenderPreference::Opposite => candidate_gender != requester_gender,
        GenderPreference::Specific(label) => candidate_gender == label,
    }
}

/// Whether a candidate survives all hard exclusion rules
pub fn is_eligible(context: &RequesterContext, request: &MatchRequest, candidate: &CandidateProfile) -> bool {
    check_candidate(&MatchCriteria::new(context, request), candidate).is_none()
}
