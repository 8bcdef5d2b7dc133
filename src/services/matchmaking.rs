use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{error, info, Instrument};

use crate::core::Matcher;
use crate::models::{MatchOutcome, MatchRequest, RequesterContext, ScoredCandidate};
use crate::services::coordinator::{PairAttempt, PairingCoordinator};
use crate::services::store::{CandidatePool, PairingStore, StoreError};

/// Message shown when the requester has no profile yet
pub const PROFILE_MISSING_MESSAGE: &str = "User profile not found. Please complete your profile.";

/// Message shown for any unexpected failure
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred during matching.";

/// Message shown when the request ran past its deadline
pub const TIMEOUT_MESSAGE: &str = "Matching took too long. Please try again.";

/// Errors that can end a match request
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Profile not found for user {0}")]
    ProfileNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Request timed out after {0:?}")]
    Timeout(StdDuration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MatchError {
    /// Message safe to show to the caller
    pub fn user_message(&self) -> &'static str {
        match self {
            MatchError::Unauthenticated(_) => "User must be logged in.",
            MatchError::ProfileNotFound(_) => PROFILE_MISSING_MESSAGE,
            MatchError::Timeout(_) => TIMEOUT_MESSAGE,
            MatchError::Store(_) | MatchError::Internal(_) => INTERNAL_ERROR_MESSAGE,
        }
    }
}

/// Tunables for one match request
#[derive(Debug, Clone)]
pub struct MatchingPolicy {
    pub active_window_hours: u32,
    pub pool_batch_size: usize,
    pub idempotency_window: Duration,
    pub session_ttl: Duration,
    /// How many ranked candidates to try when earlier ones were taken
    pub max_pair_attempts: usize,
    pub request_timeout: StdDuration,
    pub opening_message: String,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            active_window_hours: 48,
            pool_batch_size: 100,
            idempotency_window: Duration::seconds(10),
            session_ttl: Duration::hours(48),
            max_pair_attempts: 3,
            request_timeout: StdDuration::from_secs(10),
            opening_message: "🎉 You've been matched! Say hello!".to_string(),
        }
    }
}

/// Match request pipeline: requester → pool → filter/score → pair
pub struct MatchService {
    pool: Arc<dyn CandidatePool>,
    store: Arc<dyn PairingStore>,
    matcher: Matcher,
    coordinator: PairingCoordinator,
    policy: MatchingPolicy,
}

impl MatchService {
    pub fn new(
        pool: Arc<dyn CandidatePool>,
        store: Arc<dyn PairingStore>,
        matcher: Matcher,
        policy: MatchingPolicy,
    ) -> Self {
        let coordinator = PairingCoordinator::new(
            store.clone(),
            policy.idempotency_window,
            policy.session_ttl,
            policy.opening_message.clone(),
        );

        Self {
            pool,
            store,
            matcher,
            coordinator,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn PairingStore> {
        &self.store
    }

    /// Run a match request and fold every failure into the response shape
    pub async fn handle(&self, request: &MatchRequest) -> MatchOutcome {
        match self.find_match(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                match &e {
                    MatchError::ProfileNotFound(user_id) => {
                        error!("User profile for {} not found", user_id)
                    }
                    other => error!("Error matching {}: {}", request.requester_id, other),
                }
                MatchOutcome::error(e.user_message())
            }
        }
    }

    /// Run a match request under the configured deadline
    pub async fn find_match(&self, request: &MatchRequest) -> Result<MatchOutcome, MatchError> {
        let span = tracing::info_span!(
            "find_match",
            requester = %request.requester_id,
            request_id = %uuid::Uuid::new_v4()
        );

        tokio::time::timeout(self.policy.request_timeout, self.run(request))
            .instrument(span)
            .await
            .map_err(|_| MatchError::Timeout(self.policy.request_timeout))?
    }

    async fn run(&self, request: &MatchRequest) -> Result<MatchOutcome, MatchError> {
        info!("Starting global match for {}", request.requester_id);

        let context = self
            .store
            .load_requester(&request.requester_id)
            .await?
            .ok_or_else(|| MatchError::ProfileNotFound(request.requester_id.clone()))?;

        // A retry moments after a successful pairing gets that pairing back
        if let Some(pairing) = self.coordinator.find_reusable(&context, Utc::now()).await? {
            return Ok(pairing.into_outcome());
        }

        let ranked = self.rank(&context, request).await?;
        if ranked.is_empty() {
            info!("No compatible candidates for {}", request.requester_id);
            return Ok(MatchOutcome::NoMatchFound);
        }

        for candidate in ranked.iter().take(self.policy.max_pair_attempts.max(1)) {
            match self.coordinator.pair_or_reuse(&context, candidate).await? {
                PairAttempt::Paired(pairing) => return Ok(pairing.into_outcome()),
                PairAttempt::CandidateUnavailable => continue,
            }
        }

        info!(
            "All top candidates for {} were paired elsewhere, giving up",
            request.requester_id
        );
        Ok(MatchOutcome::NoMatchFound)
    }

    /// Pull the pool snapshot and rank it for this requester
    pub async fn rank(
        &self,
        context: &RequesterContext,
        request: &MatchRequest,
    ) -> Result<Vec<ScoredCandidate>, MatchError> {
        let snapshot = self
            .pool
            .fetch_active(self.policy.active_window_hours, self.policy.pool_batch_size)
            .await?;

        if snapshot.is_empty() {
            info!("Matching pool is empty or has no recently active users");
            return Ok(Vec::new());
        }

        let result = self.matcher.rank_candidates(context, request, snapshot);
        info!(
            "{} of {} candidates eligible for {}",
            result.ranked.len(),
            result.total_candidates,
            context.user_id
        );
        Ok(result.ranked)
    }

    /// Best candidate for this requester, without pairing
    pub async fn select_best(
        &self,
        context: &RequesterContext,
        request: &MatchRequest,
    ) -> Result<Option<ScoredCandidate>, MatchError> {
        Ok(self.rank(context, request).await?.into_iter().next())
    }
}
