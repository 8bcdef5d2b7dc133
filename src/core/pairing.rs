use chrono::{DateTime, Duration, Utc};

use crate::models::{
    PairingHistoryEntry, PairingRecord, ParticipantDisplay, RoomType, SessionParticipant,
    SessionStatus,
};

/// Characters taken from each participant id
const SESSION_ID_PREFIX_LEN: usize = 6;

/// Joins the two id prefixes
const SESSION_ID_SEPARATOR: char = '_';

/// Sender id used for messages authored by the service
pub const SYSTEM_SENDER_ID: &str = "system";

/// Derive the session id for an unordered pair of users
///
/// The ids are sorted and the first six characters of each are joined, so the
/// result does not depend on which side requested the match.
pub fn derive_session_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };

    let mut id = String::with_capacity(SESSION_ID_PREFIX_LEN * 2 + 1);
    id.extend(first.chars().take(SESSION_ID_PREFIX_LEN));
    id.push(SESSION_ID_SEPARATOR);
    id.extend(second.chars().take(SESSION_ID_PREFIX_LEN));
    id
}

/// Find a history entry created within `window` of `now`
///
/// When several qualify the newest one wins.
pub fn find_recent_pairing<'a>(
    history: &'a [PairingHistoryEntry],
    now: DateTime<Utc>,
    window: Duration,
) -> Option<&'a PairingHistoryEntry> {
    history
        .iter()
        .filter(|entry| is_within_window(entry.paired_at, now, window))
        .max_by_key(|entry| entry.paired_at)
}

#[inline]
fn is_within_window(at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(at) < window
}

/// Build a new session between the requester and the chosen candidate
///
/// The candidate did not initiate, so it starts with one unread message.
pub fn build_pairing_record(
    requester: &ParticipantDisplay,
    candidate: &ParticipantDisplay,
    now: DateTime<Utc>,
    ttl: Duration,
    opening_message: &str,
) -> PairingRecord {
    let participant = |display: &ParticipantDisplay, unread_count: u32| SessionParticipant {
        user_id: display.user_id.clone(),
        display_name: display.display_name.clone(),
        profile_pic_url: display.profile_pic_url.clone(),
        unread_count,
        has_liked: false,
    };

    let requester_side = participant(requester, 0);
    let candidate_side = participant(candidate, 1);
    let (user1, user2) = if requester.user_id <= candidate.user_id {
        (requester_side, candidate_side)
    } else {
        (candidate_side, requester_side)
    };

    PairingRecord {
        id: derive_session_id(&requester.user_id, &candidate.user_id),
        user1,
        user2,
        room_type: RoomType::Stranger,
        status: SessionStatus::Active,
        created_at: now,
        expires_at: now + ttl,
        last_message: opening_message.to_string(),
        last_message_at: now,
        last_message_sender_id: SYSTEM_SENDER_ID.to_string(),
    }
}

/// Everything written by one pairing transaction
#[derive(Debug, Clone)]
pub struct PairingCommit {
    pub record: PairingRecord,
    pub requester_id: String,
    pub candidate_id: String,
    /// Appended to the requester's history
    pub requester_entry: PairingHistoryEntry,
    /// Appended to the candidate's history
    pub candidate_entry: PairingHistoryEntry,
    /// A candidate paired with someone else after this instant is taken
    pub reservation_cutoff: DateTime<Utc>,
}

impl PairingCommit {
    pub fn new(record: PairingRecord, requester_id: &str, candidate_id: &str, reservation_window: Duration) -> Self {
        let now = record.created_at;
        Self {
            requester_entry: PairingHistoryEntry {
                partner_id: candidate_id.to_string(),
                session_id: record.id.clone(),
                paired_at: now,
            },
            candidate_entry: PairingHistoryEntry {
                partner_id: requester_id.to_string(),
                session_id: record.id.clone(),
                paired_at: now,
            },
            requester_id: requester_id.to_string(),
            candidate_id: candidate_id.to_string(),
            reservation_cutoff: now - reservation_window,
            record,
        }
    }

    /// Whether a candidate's history shows a fresh pairing with someone else
    pub fn candidate_taken(&self, candidate_history: &[PairingHistoryEntry]) -> bool {
        candidate_history
            .iter()
            .any(|entry| entry.partner_id != self.requester_id && entry.paired_at > self.reservation_cutoff)
    }

    /// The requester's newest fresh pairing with someone other than the candidate
    ///
    /// Set when another request paired the requester after its context was read.
    pub fn requester_paired_elsewhere<'a>(
        &self,
        requester_history: &'a [PairingHistoryEntry],
    ) -> Option<&'a PairingHistoryEntry> {
        requester_history
            .iter()
            .filter(|entry| entry.partner_id != self.candidate_id && entry.paired_at > self.reservation_cutoff)
            .max_by_key(|entry| entry.paired_at)
    }

    /// Whether an existing session under this id belongs to this same pair
    ///
    /// Session ids are built from id prefixes, so unrelated pairs can collide.
    pub fn owns_session(&self, existing: &PairingRecord) -> bool {
        existing.involves(&self.requester_id) && existing.involves(&self.candidate_id)
    }
}

/// Append `entry` unless an equivalent one is already present
///
/// Returns whether the history changed.
pub fn append_history_entry(history: &mut Vec<PairingHistoryEntry>, entry: &PairingHistoryEntry) -> bool {
    if history.iter().any(|existing| existing.is_equivalent(entry)) {
        return false;
    }
    history.push(entry.clone());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(id: &str, name: &str) -> ParticipantDisplay {
        ParticipantDisplay {
            user_id: id.to_string(),
            display_name: name.to_string(),
            profile_pic_url: format!("https://img/{}", id),
        }
    }

    fn entry(partner: &str, at: DateTime<Utc>) -> PairingHistoryEntry {
        PairingHistoryEntry {
            partner_id: partner.to_string(),
            session_id: derive_session_id("me", partner),
            paired_at: at,
        }
    }

    #[test]
    fn test_session_id_is_order_independent() {
        let a = "zoe_a_artistic_soul";
        let b = "aria_p_perfect_match";
        assert_eq!(derive_session_id(a, b), derive_session_id(b, a));
        assert_eq!(derive_session_id(a, b), "aria_p_zoe_a_");
    }

    #[test]
    fn test_session_id_short_ids() {
        assert_eq!(derive_session_id("bob", "al"), "al_bob");
    }

    #[test]
    fn test_session_id_counts_chars_not_bytes() {
        assert_eq!(derive_session_id("ééééééé", "a"), "a_éééééé");
    }

    #[test]
    fn test_recent_pairing_window() {
        let now = Utc::now();
        let window = Duration::seconds(10);
        let history = vec![
            entry("old", now - Duration::hours(3)),
            entry("recent", now - Duration::seconds(4)),
            entry("newest", now - Duration::seconds(1)),
        ];

        let found = find_recent_pairing(&history, now, window).unwrap();
        assert_eq!(found.partner_id, "newest");

        let stale = vec![entry("old", now - Duration::seconds(10))];
        assert!(find_recent_pairing(&stale, now, window).is_none());
    }

    #[test]
    fn test_build_record_orders_participants() {
        let now = Utc::now();
        let record = build_pairing_record(
            &display("zed", "Zed"),
            &display("amy", "Amy"),
            now,
            Duration::hours(48),
            "hello",
        );

        assert_eq!(record.id, "amy_zed");
        assert_eq!(record.user1.user_id, "amy");
        assert_eq!(record.user1.unread_count, 1);
        assert_eq!(record.user2.user_id, "zed");
        assert_eq!(record.user2.unread_count, 0);
        assert_eq!(record.expires_at - record.created_at, Duration::hours(48));
        assert_eq!(record.last_message_sender_id, SYSTEM_SENDER_ID);
        assert_eq!(record.status, SessionStatus::Active);
    }

    #[test]
    fn test_append_is_conditional() {
        let now = Utc::now();
        let mut history = vec![];
        assert!(append_history_entry(&mut history, &entry("x", now)));
        assert!(!append_history_entry(&mut history, &entry("x", now + Duration::seconds(1))));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_candidate_taken() {
        let now = Utc::now();
        let record = build_pairing_record(&display("me", "Me"), &display("cand", "C"), now, Duration::hours(48), "hi");
        let commit = PairingCommit::new(record, "me", "cand", Duration::seconds(10));

        assert!(!commit.candidate_taken(&[]));
        // Pairing with the requester itself is the same pair, not a conflict
        assert!(!commit.candidate_taken(&[entry("me", now)]));
        assert!(commit.candidate_taken(&[entry("other", now - Duration::seconds(2))]));
        assert!(!commit.candidate_taken(&[entry("other", now - Duration::minutes(5))]));
    }

    #[test]
    fn test_requester_paired_elsewhere() {
        let now = Utc::now();
        let record = build_pairing_record(&display("bob", "B"), &display("carol", "C"), now, Duration::hours(48), "hi");
        let commit = PairingCommit::new(record, "bob", "carol", Duration::seconds(10));

        assert!(commit.requester_paired_elsewhere(&[]).is_none());
        assert!(commit.requester_paired_elsewhere(&[entry("carol", now)]).is_none());
        assert!(commit.requester_paired_elsewhere(&[entry("alice", now - Duration::minutes(5))]).is_none());

        let history = [entry("dave", now - Duration::seconds(6)), entry("alice", now - Duration::seconds(2))];
        let found = commit.requester_paired_elsewhere(&history).unwrap();
        assert_eq!(found.partner_id, "alice");
    }

    #[test]
    fn test_owns_session_rejects_prefix_collisions() {
        let now = Utc::now();
        let first = build_pairing_record(&display("stranger_1", "S1"), &display("visitor_1", "V1"), now, Duration::hours(48), "hi");
        let second = build_pairing_record(&display("stranger_2", "S2"), &display("visitor_2", "V2"), now, Duration::hours(48), "hi");
        assert_eq!(first.id, second.id);

        let same_pair = PairingCommit::new(first.clone(), "visitor_1", "stranger_1", Duration::seconds(10));
        let other_pair = PairingCommit::new(second, "stranger_2", "visitor_2", Duration::seconds(10));

        assert!(same_pair.owns_session(&first));
        assert!(!other_pair.owns_session(&first));
    }
}
