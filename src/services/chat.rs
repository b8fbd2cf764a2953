//! Chat store — message log, lazy user stubs, and the admin owner summary.
//!
//! DESIGN
//! ======
//! The store is append-only: messages are inserted with a server-assigned
//! timestamp and never mutated. Owner identity is canonical in the
//! `user_auth_id` column; a read-compatibility shim at this boundary retries
//! the legacy `user_id` column so rows written by pre-migration writers stay
//! reachable. Nothing above this module sees two field names.
//!
//! ERROR HANDLING
//! ==============
//! Validation failures are typed variants mapped to client errors by the
//! routes. A failure to create the lazy user stub is logged and does not
//! block the message insert.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

// Timestamps travel as UTC strings formatted in SQL so the wire shape is
// identical for stored rows and aggregates.
const TS_FMT: &str = r#"YYYY-MM-DD"T"HH24:MI:SS.MS"Z""#;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("user_id is required")]
    MissingOwner,
    #[error("message must not be empty")]
    EmptyMessage,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    User,
    Admin,
}

impl SenderRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// A persisted chat message. Mirrors the `chats` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_auth_id: String,
    pub sender_role: SenderRole,
    pub message: String,
    pub created_at: String,
}

/// One roster row per distinct owner seen across all messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub user_auth_id: String,
    pub email: String,
    pub message_count: i64,
    pub last_message_at: String,
}

// =============================================================================
// MESSAGES
// =============================================================================

/// List all messages for an owner, oldest first.
///
/// Tries the canonical column first; if no rows match, retries the legacy
/// `user_id` column (migration read shim).
///
/// # Errors
///
/// `MissingOwner` if the owner id is empty; database errors otherwise.
pub async fn list_messages(pool: &PgPool, owner_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
    if owner_id.trim().is_empty() {
        return Err(ChatError::MissingOwner);
    }

    let messages = fetch_by_column(pool, "user_auth_id", owner_id).await?;
    if !messages.is_empty() {
        return Ok(messages);
    }

    fetch_by_column(pool, "user_id", owner_id).await
}

async fn fetch_by_column(pool: &PgPool, column: &str, owner_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
    let sql = format!(
        "SELECT id, COALESCE(user_auth_id, user_id) AS owner, sender_role, message,
                to_char(created_at AT TIME ZONE 'UTC', '{TS_FMT}') AS created_at
         FROM chats
         WHERE {column} = $1
         ORDER BY chats.created_at ASC"
    );

    let rows = sqlx::query_as::<_, (Uuid, String, String, String, String)>(&sql)
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(id, owner, role, message, created_at)| ChatMessage {
            id,
            user_auth_id: owner,
            sender_role: SenderRole::from_str(&role).unwrap_or(SenderRole::User),
            message,
            created_at,
        })
        .collect())
}

/// Append a message. Lazily creates a user stub for first-time senders;
/// stub creation failure is logged and never blocks the insert.
///
/// # Errors
///
/// `MissingOwner` / `EmptyMessage` on validation failure; database errors
/// if the insert itself fails.
pub async fn create_message(
    pool: &PgPool,
    owner_id: &str,
    role: SenderRole,
    text: &str,
) -> Result<ChatMessage, ChatError> {
    if owner_id.trim().is_empty() {
        return Err(ChatError::MissingOwner);
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::EmptyMessage);
    }

    if let Err(e) = ensure_user_stub(pool, owner_id).await {
        warn!(error = %e, owner_id, "user stub creation failed; inserting message anyway");
    }

    let id = Uuid::new_v4();
    let created_at: String = sqlx::query_scalar(&format!(
        "INSERT INTO chats (id, user_auth_id, sender_role, message)
         VALUES ($1, $2, $3, $4)
         RETURNING to_char(created_at AT TIME ZONE 'UTC', '{TS_FMT}')"
    ))
    .bind(id)
    .bind(owner_id)
    .bind(role.as_str())
    .bind(text)
    .fetch_one(pool)
    .await?;

    info!(%id, owner_id, role = role.as_str(), "chat message inserted");
    Ok(ChatMessage {
        id,
        user_auth_id: owner_id.to_owned(),
        sender_role: role,
        message: text.to_owned(),
        created_at,
    })
}

async fn ensure_user_stub(pool: &PgPool, owner_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (auth_id, email, role)
         VALUES ($1, 'user@example.com', 'user')
         ON CONFLICT (auth_id) DO NOTHING",
    )
    .bind(owner_id)
    .execute(pool)
    .await?;
    Ok(())
}

// =============================================================================
// OWNER SUMMARIES
// =============================================================================

/// Scan all messages and return one summary row per distinct owner, most
/// active first. Ties break by recency so the ordering is deterministic.
///
/// # Errors
///
/// Returns a database error if the aggregate query fails.
pub async fn list_owner_summaries(pool: &PgPool) -> Result<Vec<OwnerSummary>, ChatError> {
    let rows = sqlx::query_as::<_, (String, i64, String)>(&format!(
        "SELECT COALESCE(user_auth_id, user_id) AS owner,
                COUNT(*) AS message_count,
                to_char(MAX(created_at) AT TIME ZONE 'UTC', '{TS_FMT}') AS last_message_at
         FROM chats
         GROUP BY owner
         ORDER BY message_count DESC, MAX(created_at) DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(owner, message_count, last_message_at)| OwnerSummary {
            email: owner_label(&owner),
            user_auth_id: owner,
            message_count,
            last_message_at,
        })
        .collect())
}

/// Placeholder display label until user stubs carry real emails.
pub(crate) fn owner_label(owner_id: &str) -> String {
    format!("user-{}", owner_id.chars().take(8).collect::<String>())
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
