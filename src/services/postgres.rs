use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;

use crate::core::PairingCommit;
use crate::models::{
    CandidateProfile, PairingHistoryEntry, PairingRecord, ParticipantDisplay, RequesterContext,
    RoomType, SessionParticipant, SessionStatus,
};
use crate::models::domain::{DEFAULT_GENDER, DEFAULT_PARTNER_NAME, DEFAULT_REQUESTER_NAME};
use crate::services::store::{CandidatePool, CommitOutcome, PairingStore, StoreError};

/// SQLSTATE codes worth retrying the whole transaction for
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

const SESSION_COLUMNS: &str = r#"
    id, user1_id, user1_name, user1_profile_pic, user1_unread_count, user1_has_liked,
    user2_id, user2_name, user2_profile_pic, user2_unread_count, user2_has_liked,
    room_type, status, created_at, expires_at,
    last_message, last_message_at, last_message_sender_id
"#;

/// PostgreSQL-backed store
///
/// Reads the pool projection and user profiles written by the profile-sync
/// job, and owns the `chat_sessions` and `pairing_history` tables.
pub struct PostgresClient {
    pool: PgPool,
    commit_retries: u32,
}

impl PostgresClient {
    /// Create a new PostgreSQL client from a connection string
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
        commit_retries: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            commit_retries: commit_retries.max(1),
        })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
        commit_retries: u32,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
            commit_retries,
        )
        .await
    }

    async fn load_history(&self, user_id: &str) -> Result<Vec<PairingHistoryEntry>, StoreError> {
        let query = r#"
            SELECT partner_id, session_id, paired_at
            FROM pairing_history
            WHERE user_id = $1
            ORDER BY paired_at
        "#;

        let rows = sqlx::query(query).bind(user_id).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_history_entry).collect()
    }

    /// One attempt at the pairing transaction
    ///
    /// Dropping the transaction without committing rolls it back, so an early
    /// return or a cancelled future leaves nothing behind.
    async fn try_commit(&self, commit: &PairingCommit) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialize commits touching either participant; sorted to avoid deadlocks
        let mut ids = [commit.requester_id.as_str(), commit.candidate_id.as_str()];
        ids.sort();
        for id in ids {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let requester_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(&commit.requester_id)
            .fetch_one(&mut *tx)
            .await?;
        if !requester_exists {
            return Ok(CommitOutcome::RequesterMissing);
        }

        let requester_recent = sqlx::query(
            r#"
            SELECT partner_id, session_id, paired_at
            FROM pairing_history
            WHERE user_id = $1 AND paired_at > $2
            "#,
        )
        .bind(&commit.requester_id)
        .bind(commit.reservation_cutoff)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(row_to_history_entry)
        .collect::<Result<Vec<_>, _>>()?;
        if let Some(entry) = commit.requester_paired_elsewhere(&requester_recent) {
            return Ok(CommitOutcome::RequesterPairedElsewhere(entry.clone()));
        }

        let candidate_taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM pairing_history
                WHERE user_id = $1 AND partner_id <> $2 AND paired_at > $3
            )
            "#,
        )
        .bind(&commit.candidate_id)
        .bind(&commit.requester_id)
        .bind(commit.reservation_cutoff)
        .fetch_one(&mut *tx)
        .await?;
        if candidate_taken {
            return Ok(CommitOutcome::CandidateUnavailable);
        }

        let outcome = match insert_session(&mut tx, &commit.record).await? {
            true => CommitOutcome::Created(commit.record.clone()),
            false => {
                let query = format!("SELECT {} FROM chat_sessions WHERE id = $1", SESSION_COLUMNS);
                let row = sqlx::query(&query)
                    .bind(&commit.record.id)
                    .fetch_one(&mut *tx)
                    .await?;
                let existing = row_to_session(&row)?;
                if !commit.owns_session(&existing) {
                    return Ok(CommitOutcome::SessionIdConflict);
                }
                CommitOutcome::AlreadyExists(existing)
            }
        };

        append_history(&mut tx, &commit.requester_id, &commit.requester_entry).await?;
        append_history(&mut tx, &commit.candidate_id, &commit.candidate_entry).await?;

        tx.commit().await?;
        Ok(outcome)
    }
}

#[async_trait]
impl CandidatePool for PostgresClient {
    async fn fetch_active(&self, window_hours: u32, limit: usize) -> Result<Vec<CandidateProfile>, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::hours(i64::from(window_hours));
        let query = r#"
            SELECT uid, full_name, profile_pic_url, gender, age, interests, deal_breakers,
                   latitude, longitude, last_seen, verification_level
            FROM matching_pool
            WHERE last_seen >= $1
            ORDER BY last_seen DESC, uid
            LIMIT $2
        "#;

        let rows = sqlx::query(query)
            .bind(cutoff)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let profiles = rows
            .iter()
            .map(row_to_candidate)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Fetched {} active candidates (window {}h)", profiles.len(), window_hours);

        Ok(profiles)
    }
}

#[async_trait]
impl PairingStore for PostgresClient {
    async fn load_requester(&self, user_id: &str) -> Result<Option<RequesterContext>, StoreError> {
        let query = r#"
            SELECT id, full_name, profile_pic_url, gender, age, blocked_users, friends
            FROM users
            WHERE id = $1
        "#;

        let row = match sqlx::query(query).bind(user_id).fetch_optional(&self.pool).await? {
            Some(row) => row,
            None => return Ok(None),
        };

        let pairing_history = self.load_history(user_id).await?;

        Ok(Some(RequesterContext {
            user_id: row.try_get("id")?,
            display_name: text_or(&row, "full_name", DEFAULT_REQUESTER_NAME)?,
            profile_pic_url: text_or(&row, "profile_pic_url", "")?,
            gender: text_or(&row, "gender", DEFAULT_GENDER)?,
            age: positive_age(row.try_get("age")?),
            blocked_users: row.try_get::<Option<Vec<String>>, _>("blocked_users")?.unwrap_or_default(),
            friends: row.try_get::<Option<Vec<String>>, _>("friends")?.unwrap_or_default(),
            pairing_history,
        }))
    }

    async fn load_display(&self, user_id: &str) -> Result<Option<ParticipantDisplay>, StoreError> {
        let query = r#"
            SELECT id, full_name, profile_pic_url FROM users WHERE id = $1
            UNION ALL
            SELECT uid, full_name, profile_pic_url FROM matching_pool WHERE uid = $1
            LIMIT 1
        "#;

        let row = sqlx::query(query).bind(user_id).fetch_optional(&self.pool).await?;

        row.map(|row| -> Result<ParticipantDisplay, StoreError> {
            Ok(ParticipantDisplay {
                user_id: row.try_get("id")?,
                display_name: text_or(&row, "full_name", DEFAULT_PARTNER_NAME)?,
                profile_pic_url: text_or(&row, "profile_pic_url", "")?,
            })
        })
        .transpose()
    }

    async fn load_session(&self, session_id: &str) -> Result<Option<PairingRecord>, StoreError> {
        let query = format!("SELECT {} FROM chat_sessions WHERE id = $1", SESSION_COLUMNS);
        let row = sqlx::query(&query).bind(session_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_session).transpose()
    }

    async fn commit_pairing(&self, commit: &PairingCommit) -> Result<CommitOutcome, StoreError> {
        for attempt in 1..=self.commit_retries {
            match self.try_commit(commit).await {
                Ok(outcome) => return Ok(outcome),
                Err(StoreError::SqlxError(e)) if is_retryable(&e) && attempt < self.commit_retries => {
                    tracing::warn!(
                        "Pairing transaction for session {} conflicted (attempt {}/{}): {}",
                        commit.record.id,
                        attempt,
                        self.commit_retries,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::RetriesExhausted(self.commit_retries))
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}

/// Insert the session unless it already exists; returns whether it was inserted
async fn insert_session(tx: &mut Transaction<'_, Postgres>, record: &PairingRecord) -> Result<bool, StoreError> {
    let query = r#"
        INSERT INTO chat_sessions (
            id, user1_id, user1_name, user1_profile_pic, user1_unread_count, user1_has_liked,
            user2_id, user2_name, user2_profile_pic, user2_unread_count, user2_has_liked,
            room_type, status, created_at, expires_at,
            last_message, last_message_at, last_message_sender_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        ON CONFLICT (id) DO NOTHING
    "#;

    let result = sqlx::query(query)
        .bind(&record.id)
        .bind(&record.user1.user_id)
        .bind(&record.user1.display_name)
        .bind(&record.user1.profile_pic_url)
        .bind(record.user1.unread_count as i32)
        .bind(record.user1.has_liked)
        .bind(&record.user2.user_id)
        .bind(&record.user2.display_name)
        .bind(&record.user2.profile_pic_url)
        .bind(record.user2.unread_count as i32)
        .bind(record.user2.has_liked)
        .bind(record.room_type.as_str())
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(&record.last_message)
        .bind(record.last_message_at)
        .bind(&record.last_message_sender_id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Append a history entry unless one with the same partner and session exists
async fn append_history(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    entry: &PairingHistoryEntry,
) -> Result<(), StoreError> {
    let query = r#"
        INSERT INTO pairing_history (user_id, partner_id, session_id, paired_at)
        SELECT $1, $2, $3, $4
        WHERE NOT EXISTS (
            SELECT 1 FROM pairing_history
            WHERE user_id = $1 AND partner_id = $2 AND session_id = $3
        )
    "#;

    sqlx::query(query)
        .bind(user_id)
        .bind(&entry.partner_id)
        .bind(&entry.session_id)
        .bind(entry.paired_at)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

fn is_retryable(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == SERIALIZATION_FAILURE || code == DEADLOCK_DETECTED)
        .unwrap_or(false)
}

fn text_or(row: &PgRow, column: &str, default: &str) -> Result<String, sqlx::Error> {
    let value: Option<String> = row.try_get(column)?;
    Ok(value.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string()))
}

fn positive_age(age: Option<i32>) -> Option<u32> {
    age.and_then(|a| u32::try_from(a).ok()).filter(|a| *a > 0)
}

fn row_to_history_entry(row: &PgRow) -> Result<PairingHistoryEntry, StoreError> {
    Ok(PairingHistoryEntry {
        partner_id: row.try_get("partner_id")?,
        session_id: row.try_get("session_id")?,
        paired_at: row.try_get("paired_at")?,
    })
}

fn row_to_candidate(row: &PgRow) -> Result<CandidateProfile, StoreError> {
    let verification_level: Option<i32> = row.try_get("verification_level")?;
    let last_active: DateTime<Utc> = row.try_get("last_seen")?;

    Ok(CandidateProfile {
        user_id: row.try_get("uid")?,
        display_name: text_or(row, "full_name", DEFAULT_PARTNER_NAME)?,
        profile_pic_url: text_or(row, "profile_pic_url", "")?,
        gender: text_or(row, "gender", DEFAULT_GENDER)?,
        age: positive_age(row.try_get("age")?),
        interests: row.try_get::<Option<Vec<String>>, _>("interests")?.unwrap_or_default(),
        dealbreakers: row.try_get::<Option<Vec<String>>, _>("deal_breakers")?.unwrap_or_default(),
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        verification_level: verification_level.unwrap_or(0).max(0) as u32,
        last_active,
    })
}

fn row_to_participant(row: &PgRow, prefix: &str) -> Result<SessionParticipant, StoreError> {
    let unread: i32 = row.try_get(format!("{}_unread_count", prefix).as_str())?;
    Ok(SessionParticipant {
        user_id: row.try_get(format!("{}_id", prefix).as_str())?,
        display_name: row.try_get(format!("{}_name", prefix).as_str())?,
        profile_pic_url: row.try_get(format!("{}_profile_pic", prefix).as_str())?,
        unread_count: unread.max(0) as u32,
        has_liked: row.try_get(format!("{}_has_liked", prefix).as_str())?,
    })
}

fn row_to_session(row: &PgRow) -> Result<PairingRecord, StoreError> {
    let room_type: String = row.try_get("room_type")?;
    let room_type = match room_type.as_str() {
        "stranger" => RoomType::Stranger,
        other => return Err(StoreError::Malformed(format!("unknown room type '{}'", other))),
    };
    let status: String = row.try_get("status")?;
    let status = SessionStatus::parse(&status)
        .ok_or_else(|| StoreError::Malformed(format!("unknown session status '{}'", status)))?;

    Ok(PairingRecord {
        id: row.try_get("id")?,
        user1: row_to_participant(row, "user1")?,
        user2: row_to_participant(row, "user2")?,
        room_type,
        status,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        last_message: row.try_get("last_message")?,
        last_message_at: row.try_get("last_message_at")?,
        last_message_sender_id: row.try_get("last_message_sender_id")?,
    })
}
