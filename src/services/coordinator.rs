use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::core::pairing::{build_pairing_record, find_recent_pairing, PairingCommit};
use crate::models::{
    MatchOutcome, PairingHistoryEntry, PairingRecord, ParticipantDisplay, RequesterContext,
    ScoredCandidate,
};
use crate::services::matchmaking::MatchError;
use crate::services::store::{CommitOutcome, PairingStore};

/// Score reported when an existing pairing is handed back instead of a new one
pub const REUSED_PAIRING_SCORE: f64 = 100.0;

/// A committed (or reused) pairing, ready to report to the requester
#[derive(Debug, Clone)]
pub struct Pairing {
    pub session: PairingRecord,
    pub partner: ParticipantDisplay,
    pub compatibility_score: f64,
    pub reused: bool,
}

impl Pairing {
    pub fn into_outcome(self) -> MatchOutcome {
        MatchOutcome::Matched {
            session_id: self.session.id,
            matched_user_id: self.partner.user_id,
            matched_user_name: self.partner.display_name,
            matched_user_profile_pic: self.partner.profile_pic_url,
            compatibility_score: self.compatibility_score,
        }
    }
}

/// Result of trying to pair with one selected candidate
#[derive(Debug, Clone)]
pub enum PairAttempt {
    Paired(Pairing),
    /// Someone else paired with the candidate first; try the next one
    CandidateUnavailable,
}

/// Turns a selected candidate into exactly one durable session
pub struct PairingCoordinator {
    store: Arc<dyn PairingStore>,
    idempotency_window: Duration,
    session_ttl: Duration,
    opening_message: String,
}

impl PairingCoordinator {
    pub fn new(
        store: Arc<dyn PairingStore>,
        idempotency_window: Duration,
        session_ttl: Duration,
        opening_message: String,
    ) -> Self {
        Self {
            store,
            idempotency_window,
            session_ttl,
            opening_message,
        }
    }

    /// Return the requester's pairing from the last few seconds, if any
    ///
    /// The partner's display fields are read fresh. A history entry whose
    /// session no longer exists is ignored.
    pub async fn find_reusable(
        &self,
        context: &RequesterContext,
        now: DateTime<Utc>,
    ) -> Result<Option<Pairing>, MatchError> {
        let entry = match find_recent_pairing(&context.pairing_history, now, self.idempotency_window) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let pairing = self.reuse_entry(&context.user_id, entry).await?;
        if let Some(pairing) = &pairing {
            info!(
                "Found a very recent pairing ({}) for {}, returning it instead of creating a new one",
                pairing.partner.user_id, context.user_id
            );
        }
        Ok(pairing)
    }

    /// Rebuild a pairing from a history entry; `None` when its session is gone
    async fn reuse_entry(
        &self,
        user_id: &str,
        entry: &PairingHistoryEntry,
    ) -> Result<Option<Pairing>, MatchError> {
        let session = match self.store.load_session(&entry.session_id).await? {
            Some(session) => session,
            None => {
                warn!(
                    "Recent pairing {} for {} points at a missing session, ignoring it",
                    entry.session_id, user_id
                );
                return Ok(None);
            }
        };

        let partner = match self.store.load_display(&entry.partner_id).await? {
            Some(display) => display,
            None => display_from_session(&session, &entry.partner_id),
        };

        Ok(Some(Pairing {
            session,
            partner,
            compatibility_score: REUSED_PAIRING_SCORE,
            reused: true,
        }))
    }

    /// Pair the requester with `selected`, or hand back a pairing made moments ago
    pub async fn pair_or_reuse(
        &self,
        context: &RequesterContext,
        selected: &ScoredCandidate,
    ) -> Result<PairAttempt, MatchError> {
        let now = Utc::now();

        if let Some(pairing) = self.find_reusable(context, now).await? {
            return Ok(PairAttempt::Paired(pairing));
        }

        let partner = selected.profile.display();
        let record = build_pairing_record(
            &context.display(),
            &partner,
            now,
            self.session_ttl,
            &self.opening_message,
        );
        let commit = PairingCommit::new(record, &context.user_id, &partner.user_id, self.idempotency_window);

        let session = match self.store.commit_pairing(&commit).await? {
            CommitOutcome::Created(session) => {
                info!(
                    "Matched {} with {} in session {} (score {:.2})",
                    context.user_id, partner.user_id, session.id, selected.score.total
                );
                session
            }
            CommitOutcome::AlreadyExists(session) => {
                info!(
                    "Session {} already existed for {} and {}, reusing it",
                    session.id, context.user_id, partner.user_id
                );
                session
            }
            CommitOutcome::CandidateUnavailable => {
                info!(
                    "Candidate {} was paired elsewhere moments ago, skipping",
                    partner.user_id
                );
                return Ok(PairAttempt::CandidateUnavailable);
            }
            CommitOutcome::RequesterPairedElsewhere(entry) => {
                info!(
                    "{} was paired with {} by another request moments ago, returning that pairing",
                    context.user_id, entry.partner_id
                );
                return match self.reuse_entry(&context.user_id, &entry).await? {
                    Some(pairing) => Ok(PairAttempt::Paired(pairing)),
                    None => Ok(PairAttempt::CandidateUnavailable),
                };
            }
            CommitOutcome::SessionIdConflict => {
                warn!(
                    "Session {} already belongs to another pair, skipping candidate {}",
                    commit.record.id, partner.user_id
                );
                return Ok(PairAttempt::CandidateUnavailable);
            }
            CommitOutcome::RequesterMissing => {
                return Err(MatchError::ProfileNotFound(context.user_id.clone()));
            }
        };

        Ok(PairAttempt::Paired(Pairing {
            session,
            partner,
            compatibility_score: selected.score.total,
            reused: false,
        }))
    }
}

fn display_from_session(session: &PairingRecord, user_id: &str) -> ParticipantDisplay {
    let participant = if session.user1.user_id == user_id {
        &session.user1
    } else {
        &session.user2
    };
    ParticipantDisplay {
        user_id: user_id.to_string(),
        display_name: participant.display_name.clone(),
        profile_pic_url: participant.profile_pic_url.clone(),
    }
}
