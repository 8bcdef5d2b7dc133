use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Default display name for a candidate or partner without one
pub const DEFAULT_PARTNER_NAME: &str = "Stranger";

/// Default display name for the requester without one
pub const DEFAULT_REQUESTER_NAME: &str = "Someone";

/// Gender label used when a profile does not declare one
pub const DEFAULT_GENDER: &str = "Any";

/// Minimum verification level that counts as "verified"
pub const VERIFIED_LEVEL: u32 = 2;

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Build coordinates only when both halves are present and finite
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some(Self::new(lat, lon)),
            _ => None,
        }
    }
}

/// Poolable projection of a user profile, as written by the profile-sync job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(rename = "uid")]
    pub user_id: String,
    #[serde(rename = "fullName", default = "default_partner_name")]
    pub display_name: String,
    #[serde(rename = "profilePicUrl", default)]
    pub profile_pic_url: String,
    #[serde(default = "default_gender")]
    pub gender: String,
    #[serde(default, deserialize_with = "deserialize_lenient_age")]
    pub age: Option<u32>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(rename = "dealBreakers", default)]
    pub dealbreakers: Vec<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(rename = "verificationLevel", default)]
    pub verification_level: u32,
    #[serde(rename = "lastSeen")]
    pub last_active: DateTime<Utc>,
}

impl CandidateProfile {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }

    pub fn is_verified(&self) -> bool {
        self.verification_level >= VERIFIED_LEVEL
    }

    pub fn display(&self) -> ParticipantDisplay {
        ParticipantDisplay {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            profile_pic_url: self.profile_pic_url.clone(),
        }
    }
}

fn default_partner_name() -> String { DEFAULT_PARTNER_NAME.to_string() }
fn default_requester_name() -> String { DEFAULT_REQUESTER_NAME.to_string() }
fn default_gender() -> String { DEFAULT_GENDER.to_string() }

/// Accept ages stored either as numbers or numeric strings.
///
/// Anything non-positive or unparseable is treated as "no age".
pub fn deserialize_lenient_age<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| parse_age(&v)))
}

fn parse_age(value: &serde_json::Value) -> Option<u32> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64().map(|f| f.trunc() as i64),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    u32::try_from(parsed).ok().filter(|age| *age > 0)
}

/// One prior pairing in a user's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingHistoryEntry {
    #[serde(rename = "userId")]
    pub partner_id: String,
    #[serde(rename = "chatRoomId")]
    pub session_id: String,
    #[serde(rename = "matchedAt")]
    pub paired_at: DateTime<Utc>,
}

impl PairingHistoryEntry {
    /// Two entries are equivalent when they point at the same partner and session
    pub fn is_equivalent(&self, other: &PairingHistoryEntry) -> bool {
        self.partner_id == other.partner_id && self.session_id == other.session_id
    }
}

/// Requester's own profile plus exclusion sets, read once per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequesterContext {
    #[serde(rename = "uid")]
    pub user_id: String,
    #[serde(rename = "fullName", default = "default_requester_name")]
    pub display_name: String,
    #[serde(rename = "profilePicUrl", default)]
    pub profile_pic_url: String,
    #[serde(default = "default_gender")]
    pub gender: String,
    #[serde(default, deserialize_with = "deserialize_lenient_age")]
    pub age: Option<u32>,
    #[serde(rename = "blockedUsers", default)]
    pub blocked_users: Vec<String>,
    #[serde(default)]
    pub friends: Vec<String>,
    #[serde(rename = "strangersList", default)]
    pub pairing_history: Vec<PairingHistoryEntry>,
}

impl RequesterContext {
    pub fn display(&self) -> ParticipantDisplay {
        ParticipantDisplay {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            profile_pic_url: self.profile_pic_url.clone(),
        }
    }
}

/// Gender constraint requested by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenderPreference {
    Any,
    Opposite,
    Specific(String),
}

impl GenderPreference {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => GenderPreference::Any,
            Some(v) if v.eq_ignore_ascii_case("any") => GenderPreference::Any,
            Some(v) if v.eq_ignore_ascii_case("opposite") => GenderPreference::Opposite,
            Some(v) => GenderPreference::Specific(v.to_string()),
        }
    }
}

impl Default for GenderPreference {
    fn default() -> Self {
        GenderPreference::Any
    }
}

/// A single, transient match request
#[derive(Debug, Clone, Default)]
pub struct MatchRequest {
    pub requester_id: String,
    pub preferred_gender: GenderPreference,
    /// Accepted for compatibility; not used for filtering or scoring.
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub verified_only: bool,
    pub interests: Vec<String>,
    pub dealbreakers: Vec<String>,
    pub coordinates: Option<Coordinates>,
}

/// Per-component compatibility score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub interest: f64,
    pub shared_dislike: f64,
    pub age: f64,
    pub verification: f64,
    pub proximity: f64,
    pub total: f64,
}

/// A candidate that passed the filter, with its score
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub profile: CandidateProfile,
    pub score: ScoreBreakdown,
}

/// Scoring weights; each is the maximum points its component can contribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub interests: f64,
    pub shared_dislikes: f64,
    pub age: f64,
    pub verification: f64,
    pub proximity: f64,
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.interests + self.shared_dislikes + self.age + self.verification + self.proximity
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            interests: 40.0,
            shared_dislikes: 10.0,
            age: 20.0,
            verification: 15.0,
            proximity: 15.0,
        }
    }
}

/// Display fields for one side of a pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDisplay {
    pub user_id: String,
    pub display_name: String,
    pub profile_pic_url: String,
}

/// One participant as stored on a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParticipant {
    pub user_id: String,
    pub display_name: String,
    pub profile_pic_url: String,
    pub unread_count: u32,
    pub has_liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Stranger,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Stranger => "stranger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Expired => "expired",
            SessionStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SessionStatus::Active),
            "expired" => Some(SessionStatus::Expired),
            "closed" => Some(SessionStatus::Closed),
            _ => None,
        }
    }
}

/// Durable record of two users being paired ("session")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingRecord {
    pub id: String,
    /// Participant with the lexicographically smaller id
    pub user1: SessionParticipant,
    pub user2: SessionParticipant,
    pub room_type: RoomType,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub last_message_sender_id: String,
}

impl PairingRecord {
    pub fn involves(&self, user_id: &str) -> bool {
        self.user1.user_id == user_id || self.user2.user_id == user_id
    }
}
