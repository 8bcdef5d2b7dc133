use std::cmp::Ordering;

use tracing::debug;

use crate::core::{criteria::MatchCriteria, filters::check_candidate, scoring::calculate_match_score};
use crate::models::{CandidateProfile, MatchRequest, RequesterContext, ScoredCandidate, ScoringWeights};

/// Result of ranking a pool snapshot
#[derive(Debug)]
pub struct MatchResult {
    /// Eligible candidates, best first
    pub ranked: Vec<ScoredCandidate>,
    pub total_candidates: usize,
}

impl MatchResult {
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.ranked.first()
    }
}

/// Match selector - filters, scores and ranks a pool snapshot
///
/// # Pipeline Stages
/// 1. Hard compatibility filter
/// 2. Weighted scoring
/// 3. Ranking by total score, ties broken by candidate id ascending
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
}

impl Matcher {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Filter and score every candidate, returning them in selection order
    pub fn rank_candidates(
        &self,
        context: &RequesterContext,
        request: &MatchRequest,
        candidates: Vec<CandidateProfile>,
    ) -> MatchResult {
        let total_candidates = candidates.len();
        let criteria = MatchCriteria::new(context, request);

        let mut ranked: Vec<ScoredCandidate> = candidates
            .into_iter()
            .filter(|profile| match check_candidate(&criteria, profile) {
                Some(reason) => {
                    debug!("Skipping candidate {}: {}", profile.user_id, reason);
                    false
                }
                None => true,
            })
            .map(|profile| {
                let score = calculate_match_score(&criteria, &profile, &self.weights);
                debug!(
                    "Candidate {} ({}) | total {:.2} [interest {:.2}, shared dislike {:.2}, age {:.2}, verification {:.2}, proximity {:.2}]",
                    profile.display_name,
                    profile.user_id,
                    score.total,
                    score.interest,
                    score.shared_dislike,
                    score.age,
                    score.verification,
                    score.proximity
                );
                ScoredCandidate { profile, score }
            })
            .collect();

        ranked.sort_by(compare_ranked);

        MatchResult {
            ranked,
            total_candidates,
        }
    }

    /// Pick the single best candidate, if any survives the filter
    pub fn select_best(
        &self,
        context: &RequesterContext,
        request: &MatchRequest,
        candidates: Vec<CandidateProfile>,
    ) -> Option<ScoredCandidate> {
        self.rank_candidates(context, request, candidates)
            .ranked
            .into_iter()
            .next()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Score descending, then candidate id ascending
fn compare_ranked(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total
        .total_cmp(&a.score.total)
        .then_with(|| a.profile.user_id.cmp(&b.profile.user_id))
}
