use crate::core::{criteria::MatchCriteria, distance::distance_between, tags::{count_matching, normalize_tags}};
use crate::models::{CandidateProfile, MatchRequest, RequesterContext, ScoreBreakdown, ScoringWeights};

/// Points lost per year of age difference
const AGE_PENALTY_PER_YEAR: f64 = 1.0;

/// Kilometers per point of proximity lost
const KM_PER_PROXIMITY_POINT: f64 = 10.0;

/// Minimum verification level that earns the verification bonus
const VERIFICATION_BONUS_LEVEL: u32 = 2;

/// Calculate a compatibility score (0-100) for a candidate
///
/// Scoring formula (default weights):
/// score = (
///     interest_ratio * 40 +                 # requester interests the candidate shares
///     shared_dislike_ratio * 10 +           # dealbreakers both declare
///     max(0, 20 - |age difference|) +       # both ages known
///     15 if verification level >= 2 +
///     max(0, 15 - distance_km / 10)         # both coordinates known
/// )
///
/// Missing inputs contribute nothing; there is no error path.
pub fn calculate_match_score(
    criteria: &MatchCriteria<'_>,
    candidate: &CandidateProfile,
    weights: &ScoringWeights,
) -> ScoreBreakdown {
    let candidate_interests = normalize_tags(&candidate.interests);
    let candidate_dealbreakers = normalize_tags(&candidate.dealbreakers);

    let interest = overlap_score(&criteria.interests, &candidate_interests, weights.interests);
    let shared_dislike = overlap_score(&criteria.dealbreakers, &candidate_dealbreakers, weights.shared_dislikes);
    let age = calculate_age_score(criteria.context.age, candidate.age, weights.age);
    let verification = if candidate.verification_level >= VERIFICATION_BONUS_LEVEL {
        weights.verification
    } else {
        0.0
    };
    let proximity = match (criteria.coordinates, candidate.coordinates()) {
        (Some(mine), Some(theirs)) => calculate_proximity_score(distance_between(&mine, &theirs), weights.proximity),
        _ => 0.0,
    };

    let total = (interest + shared_dislike + age + verification + proximity).clamp(0.0, 100.0);

    ScoreBreakdown {
        interest,
        shared_dislike,
        age,
        verification,
        proximity,
        total,
    }
}

/// Score a candidate straight from the request, without precomputed criteria
pub fn score(context: &RequesterContext, request: &MatchRequest, candidate: &CandidateProfile, weights: &ScoringWeights) -> ScoreBreakdown {
    calculate_match_score(&MatchCriteria::new(context, request), candidate, weights)
}

/// Fraction of `mine` matched by `theirs`, scaled to `weight`
#[inline]
fn overlap_score(mine: &[String], theirs: &[String], weight: f64) -> f64 {
    if mine.is_empty() || theirs.is_empty() {
        return 0.0;
    }
    let common = count_matching(mine, theirs) as f64;
    common / mine.len().max(1) as f64 * weight
}

/// Age score: one point lost per year apart
#[inline]
fn calculate_age_score(requester_age: Option<u32>, candidate_age: Option<u32>, weight: f64) -> f64 {
    match (requester_age, candidate_age) {
        (Some(a), Some(b)) if a > 0 && b > 0 => {
            let diff = (a as f64 - b as f64).abs();
            (weight - diff * AGE_PENALTY_PER_YEAR).max(0.0)
        }
        _ => 0.0,
    }
}

/// Proximity score: one point lost per 10 km
#[inline]
fn calculate_proximity_score(distance_km: f64, weight: f64) -> f64 {
    if !distance_km.is_finite() {
        return 0.0;
    }
    (weight - distance_km / KM_PER_PROXIMITY_POINT).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, PairingHistoryEntry};
    use chrono::Utc;

    fn create_test_profile(interests: &[&str], dealbreakers: &[&str], age: Option<u32>, level: u32) -> CandidateProfile {
        CandidateProfile {
            user_id: "candidate".to_string(),
            display_name: "Candidate".to_string(),
            profile_pic_url: String::new(),
            gender: "Female".to_string(),
            age,
            interests: interests.iter().map(|s| s.to_string()).collect(),
            dealbreakers: dealbreakers.iter().map(|s| s.to_string()).collect(),
            latitude: Some(31.55),
            longitude: Some(75.90),
            verification_level: level,
            last_active: Utc::now(),
        }
    }

    fn create_test_context(age: Option<u32>) -> RequesterContext {
        RequesterContext {
            user_id: "me".to_string(),
            display_name: "Me".to_string(),
            profile_pic_url: String::new(),
            gender: "Male".to_string(),
            age,
            blocked_users: vec![],
            friends: vec![],
            pairing_history: Vec::<PairingHistoryEntry>::new(),
        }
    }

    fn create_test_request(interests: &[&str], dealbreakers: &[&str], coords: Option<Coordinates>) -> MatchRequest {
        MatchRequest {
            requester_id: "me".to_string(),
            interests: interests.iter().map(|s| s.to_string()).collect(),
            dealbreakers: dealbreakers.iter().map(|s| s.to_string()).collect(),
            coordinates: coords,
            ..Default::default()
        }
    }

    #[test]
    fn test_interest_ratio() {
        let ctx = create_test_context(None);
        let req = create_test_request(&["gaming", "music"], &[], None);
        let profile = create_test_profile(&["🎮 Gaming", "Art"], &[], None, 0);

        let s = score(&ctx, &req, &profile, &ScoringWeights::default());
        assert!((s.interest - 20.0).abs() < 1e-9);
        assert_eq!(s.total, s.interest);
    }

    #[test]
    fn test_shared_dislikes() {
        let ctx = create_test_context(None);
        let req = create_test_request(&[], &["smoking", "drinking"], None);
        let profile = create_test_profile(&[], &["🚬 Smoking"], None, 0);

        let s = score(&ctx, &req, &profile, &ScoringWeights::default());
        assert!((s.shared_dislike - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_age_score() {
        assert_eq!(calculate_age_score(Some(24), Some(25), 20.0), 19.0);
        assert_eq!(calculate_age_score(Some(20), Some(60), 20.0), 0.0);
        assert_eq!(calculate_age_score(None, Some(25), 20.0), 0.0);
        assert_eq!(calculate_age_score(Some(0), Some(25), 20.0), 0.0);
    }

    #[test]
    fn test_proximity_score() {
        assert!((calculate_proximity_score(1.0, 15.0) - 14.9).abs() < 1e-9);
        assert_eq!(calculate_proximity_score(500.0, 15.0), 0.0);
        assert_eq!(calculate_proximity_score(f64::NAN, 15.0), 0.0);
    }

    #[test]
    fn test_proximity_needs_both_coordinates() {
        let ctx = create_test_context(None);
        let req = create_test_request(&[], &[], None);
        let profile = create_test_profile(&[], &[], None, 0);

        assert_eq!(score(&ctx, &req, &profile, &ScoringWeights::default()).proximity, 0.0);
    }

    #[test]
    fn test_verified_bonus() {
        let ctx = create_test_context(None);
        let req = create_test_request(&[], &[], None);
        let weights = ScoringWeights::default();

        let verified = score(&ctx, &req, &create_test_profile(&[], &[], None, 2), &weights);
        let unverified = score(&ctx, &req, &create_test_profile(&[], &[], None, 1), &weights);

        assert_eq!(verified.verification, 15.0);
        assert_eq!(unverified.verification, 0.0);
    }

    #[test]
    fn test_perfect_candidate_is_bounded() {
        let ctx = create_test_context(Some(25));
        let req = create_test_request(&["gaming"], &["smoking"], Some(Coordinates::new(31.55, 75.90)));
        let profile = create_test_profile(&["gaming"], &["smoking"], Some(25), 3);

        let s = score(&ctx, &req, &profile, &ScoringWeights::default());
        assert!((s.total - 100.0).abs() < 1e-9);
    }
}
