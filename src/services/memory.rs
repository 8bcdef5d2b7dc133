use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use crate::core::pairing::append_history_entry;
use crate::core::PairingCommit;
use crate::models::{
    CandidateProfile, PairingHistoryEntry, PairingRecord, ParticipantDisplay, RequesterContext,
};
use crate::services::store::{CandidatePool, CommitOutcome, PairingStore, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    profiles: HashMap<String, RequesterContext>,
    histories: HashMap<String, Vec<PairingHistoryEntry>>,
    pool: HashMap<String, CandidateProfile>,
    sessions: HashMap<String, PairingRecord>,
}

/// In-process store backend
///
/// Every commit runs under a single lock and validates before mutating, so a
/// failed commit leaves no partial state behind.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    fail_commits: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user profile; any history on `context` is merged in
    pub async fn upsert_user(&self, mut context: RequesterContext) {
        let mut state = self.state.lock().await;
        let history = std::mem::take(&mut context.pairing_history);
        let entries = state.histories.entry(context.user_id.clone()).or_default();
        for entry in &history {
            append_history_entry(entries, entry);
        }
        state.profiles.insert(context.user_id.clone(), context);
    }

    /// Insert or replace a pool projection
    pub async fn upsert_candidate(&self, profile: CandidateProfile) {
        let mut state = self.state.lock().await;
        state.pool.insert(profile.user_id.clone(), profile);
    }

    pub async fn history(&self, user_id: &str) -> Vec<PairingHistoryEntry> {
        let state = self.state.lock().await;
        state.histories.get(user_id).cloned().unwrap_or_default()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Make every subsequent commit fail with `StoreError::Unavailable`
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CandidatePool for InMemoryStore {
    async fn fetch_active(&self, window_hours: u32, limit: usize) -> Result<Vec<CandidateProfile>, StoreError> {
        let cutoff = Utc::now() - Duration::hours(i64::from(window_hours));
        let state = self.state.lock().await;

        let mut active: Vec<CandidateProfile> = state
            .pool
            .values()
            .filter(|p| p.last_active >= cutoff)
            .cloned()
            .collect();

        active.sort_by(|a, b| {
            b.last_active
                .cmp(&a.last_active)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        active.truncate(limit);

        Ok(active)
    }
}

#[async_trait]
impl PairingStore for InMemoryStore {
    async fn load_requester(&self, user_id: &str) -> Result<Option<RequesterContext>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.profiles.get(user_id).map(|profile| {
            let mut context = profile.clone();
            context.pairing_history = state.histories.get(user_id).cloned().unwrap_or_default();
            context
        }))
    }

    async fn load_display(&self, user_id: &str) -> Result<Option<ParticipantDisplay>, StoreError> {
        let state = self.state.lock().await;
        let display = match state.profiles.get(user_id) {
            Some(profile) => Some(ParticipantDisplay {
                user_id: profile.user_id.clone(),
                display_name: profile.display_name.clone(),
                profile_pic_url: profile.profile_pic_url.clone(),
            }),
            None => state.pool.get(user_id).map(CandidateProfile::display),
        };
        Ok(display)
    }

    async fn load_session(&self, session_id: &str) -> Result<Option<PairingRecord>, StoreError> {
        Ok(self.state.lock().await.sessions.get(session_id).cloned())
    }

    async fn commit_pairing(&self, commit: &PairingCommit) -> Result<CommitOutcome, StoreError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit rejected by store".to_string()));
        }

        if !state.profiles.contains_key(&commit.requester_id) {
            return Ok(CommitOutcome::RequesterMissing);
        }

        let requester_history = state
            .histories
            .get(&commit.requester_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if let Some(entry) = commit.requester_paired_elsewhere(requester_history) {
            return Ok(CommitOutcome::RequesterPairedElsewhere(entry.clone()));
        }

        let candidate_history = state
            .histories
            .get(&commit.candidate_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if commit.candidate_taken(candidate_history) {
            return Ok(CommitOutcome::CandidateUnavailable);
        }

        let existing = state.sessions.get(&commit.record.id).cloned();
        let outcome = match existing {
            Some(existing) if !commit.owns_session(&existing) => {
                return Ok(CommitOutcome::SessionIdConflict);
            }
            Some(existing) => CommitOutcome::AlreadyExists(existing),
            None => {
                state.sessions.insert(commit.record.id.clone(), commit.record.clone());
                CommitOutcome::Created(commit.record.clone())
            }
        };

        append_history_entry(
            state.histories.entry(commit.requester_id.clone()).or_default(),
            &commit.requester_entry,
        );
        append_history_entry(
            state.histories.entry(commit.candidate_id.clone()).or_default(),
            &commit.candidate_entry,
        );

        Ok(outcome)
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pairing::build_pairing_record;

    fn user(id: &str) -> RequesterContext {
        RequesterContext {
            user_id: id.to_string(),
            display_name: id.to_uppercase(),
            profile_pic_url: String::new(),
            gender: "Any".to_string(),
            age: Some(25),
            blocked_users: vec![],
            friends: vec![],
            pairing_history: vec![],
        }
    }

    fn candidate(id: &str, hours_ago: i64) -> CandidateProfile {
        CandidateProfile {
            user_id: id.to_string(),
            display_name: id.to_string(),
            profile_pic_url: String::new(),
            gender: "Any".to_string(),
            age: Some(25),
            interests: vec![],
            dealbreakers: vec![],
            latitude: None,
            longitude: None,
            verification_level: 0,
            last_active: Utc::now() - Duration::hours(hours_ago),
        }
    }

    fn commit_for(requester: &RequesterContext, candidate: &str) -> PairingCommit {
        let cand = ParticipantDisplay {
            user_id: candidate.to_string(),
            display_name: candidate.to_string(),
            profile_pic_url: String::new(),
        };
        let record = build_pairing_record(&requester.display(), &cand, Utc::now(), Duration::hours(48), "hi");
        PairingCommit::new(record, &requester.user_id, candidate, Duration::seconds(10))
    }

    #[tokio::test]
    async fn test_fetch_active_window_and_limit() {
        let store = InMemoryStore::new();
        store.upsert_candidate(candidate("fresh", 1)).await;
        store.upsert_candidate(candidate("older", 30)).await;
        store.upsert_candidate(candidate("stale", 72)).await;

        let active = store.fetch_active(48, 100).await.unwrap();
        let ids: Vec<_> = active.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["fresh", "older"]);

        assert_eq!(store.fetch_active(48, 1).await.unwrap().len(), 1);
        assert!(InMemoryStore::new().fetch_active(48, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_is_idempotent_per_pair() {
        let store = InMemoryStore::new();
        let me = user("alice");
        store.upsert_user(me.clone()).await;

        let first = store.commit_pairing(&commit_for(&me, "bob")).await.unwrap();
        let second = store.commit_pairing(&commit_for(&me, "bob")).await.unwrap();

        assert!(matches!(first, CommitOutcome::Created(_)));
        assert!(matches!(second, CommitOutcome::AlreadyExists(_)));
        assert_eq!(store.session_count().await, 1);
        assert_eq!(store.history("alice").await.len(), 1);
        assert_eq!(store.history("bob").await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_nothing() {
        let store = InMemoryStore::new();
        let me = user("alice");
        store.upsert_user(me.clone()).await;
        store.set_fail_commits(true);

        assert!(store.commit_pairing(&commit_for(&me, "bob")).await.is_err());
        assert_eq!(store.session_count().await, 0);
        assert!(store.history("alice").await.is_empty());
        assert!(store.history("bob").await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_requester() {
        let store = InMemoryStore::new();
        let outcome = store.commit_pairing(&commit_for(&user("ghost"), "bob")).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::RequesterMissing));
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_candidate_reserved_by_other_requester() {
        let store = InMemoryStore::new();
        let alice = user("alice");
        let carol = user("carol");
        store.upsert_user(alice.clone()).await;
        store.upsert_user(carol.clone()).await;

        let first = store.commit_pairing(&commit_for(&alice, "bob")).await.unwrap();
        let second = store.commit_pairing(&commit_for(&carol, "bob")).await.unwrap();

        assert!(matches!(first, CommitOutcome::Created(_)));
        assert!(matches!(second, CommitOutcome::CandidateUnavailable));
        assert!(store.history("carol").await.is_empty());
    }

    #[tokio::test]
    async fn test_requester_paired_by_another_request() {
        let store = InMemoryStore::new();
        let alice = user("alice");
        let bob = user("bob");
        store.upsert_user(alice.clone()).await;
        store.upsert_user(bob.clone()).await;

        store.commit_pairing(&commit_for(&alice, "bob")).await.unwrap();
        // Bob's own request still holds the context read before alice paired with him
        let outcome = store.commit_pairing(&commit_for(&bob, "carol")).await.unwrap();

        match outcome {
            CommitOutcome::RequesterPairedElsewhere(entry) => {
                assert_eq!(entry.partner_id, "alice");
                assert_eq!(entry.session_id, "alice_bob");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.session_count().await, 1);
        assert_eq!(store.history("bob").await.len(), 1);
        assert!(store.history("carol").await.is_empty());
    }

    #[tokio::test]
    async fn test_colliding_session_id_is_not_shared() {
        let store = InMemoryStore::new();
        let first = user("stranger_1");
        let second = user("stranger_2");
        store.upsert_user(first.clone()).await;
        store.upsert_user(second.clone()).await;

        let created = store.commit_pairing(&commit_for(&first, "visitor_1")).await.unwrap();
        let collided = store.commit_pairing(&commit_for(&second, "visitor_2")).await.unwrap();

        assert!(matches!(created, CommitOutcome::Created(_)));
        assert!(matches!(collided, CommitOutcome::SessionIdConflict));
        assert_eq!(store.session_count().await, 1);
        assert!(store.history("stranger_2").await.is_empty());
        assert!(store.history("visitor_2").await.is_empty());

        let session = store.load_session("strang_visito").await.unwrap().unwrap();
        assert!(session.involves("stranger_1") && session.involves("visitor_1"));
    }
}
