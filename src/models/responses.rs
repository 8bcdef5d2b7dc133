use serde::{Deserialize, Serialize};

/// Result of a match request, as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    #[serde(rename_all = "camelCase")]
    Matched {
        session_id: String,
        matched_user_id: String,
        matched_user_name: String,
        matched_user_profile_pic: String,
        compatibility_score: f64,
    },
    NoMatchFound,
    Error {
        message: String,
    },
}

impl MatchOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        MatchOutcome::Error {
            message: message.into(),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            MatchOutcome::Matched { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
