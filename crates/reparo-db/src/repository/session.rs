//! # Messaging Session Repository
//!
//! Persists what the messaging session must survive a restart with.
//!
//! ## Rows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  messaging_session (id = 1)         messaging_credentials (id = 1)      │
//! │  ──────────────────────────         ──────────────────────────────      │
//! │  connected     0 / 1                payload     opaque BLOB             │
//! │  pairing_code  TEXT NULL            updated_at                          │
//! │  updated_at                                                             │
//! │                                                                         │
//! │  Written with upserts; a missing row reads as "never connected"         │
//! │  or "no credentials".                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// The persisted session row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionRecord {
    /// Whether the session was open at the last write.
    pub connected: bool,

    /// Pairing code awaiting entry on the operator's phone.
    pub pairing_code: Option<String>,

    /// Time of the last write. `None` if the row was never written.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Repository for the messaging session tables.
#[derive(Debug, Clone)]
pub struct MessagingSessionRepository {
    pool: SqlitePool,
}

impl MessagingSessionRepository {
    /// Creates a new MessagingSessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MessagingSessionRepository { pool }
    }

    /// Reads the session row, or the default if none was written yet.
    pub async fn get_session(&self) -> DbResult<SessionRecord> {
        let row = sqlx::query(
            r#"
            SELECT connected, pairing_code, updated_at
            FROM messaging_session
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(SessionRecord {
                connected: row.try_get("connected")?,
                pairing_code: row.try_get("pairing_code")?,
                updated_at: Some(row.try_get("updated_at")?),
            }),
            None => Ok(SessionRecord::default()),
        }
    }

    /// Overwrites the session row.
    pub async fn save_session(&self, connected: bool, pairing_code: Option<&str>) -> DbResult<()> {
        debug!(connected, has_pairing_code = pairing_code.is_some(), "Saving messaging session");

        sqlx::query(
            r#"
            INSERT INTO messaging_session (id, connected, pairing_code, updated_at)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                connected = excluded.connected,
                pairing_code = excluded.pairing_code,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(connected)
        .bind(pairing_code)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Reads the stored credential blob.
    pub async fn get_credentials(&self) -> DbResult<Option<Vec<u8>>> {
        let payload: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT payload FROM messaging_credentials WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(payload)
    }

    /// Replaces the stored credential blob.
    pub async fn save_credentials(&self, payload: &[u8]) -> DbResult<()> {
        debug!(bytes = payload.len(), "Saving messaging credentials");

        sqlx::query(
            r#"
            INSERT INTO messaging_credentials (id, payload, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes the stored credential blob. A no-op when none is stored.
    pub async fn clear_credentials(&self) -> DbResult<()> {
        debug!("Clearing messaging credentials");

        sqlx::query("DELETE FROM messaging_credentials WHERE id = 1")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_session_defaults_when_never_written() {
        let db = test_db().await;
        let record = db.messaging_session().get_session().await.unwrap();

        assert!(!record.connected);
        assert!(record.pairing_code.is_none());
        assert!(record.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_save_session_overwrites_single_row() {
        let db = test_db().await;
        let repo = db.messaging_session();

        repo.save_session(false, Some("ABCD-1234")).await.unwrap();
        let record = repo.get_session().await.unwrap();
        assert!(!record.connected);
        assert_eq!(record.pairing_code.as_deref(), Some("ABCD-1234"));
        assert!(record.updated_at.is_some());

        repo.save_session(true, None).await.unwrap();
        let record = repo.get_session().await.unwrap();
        assert!(record.connected);
        assert!(record.pairing_code.is_none());

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messaging_session")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_credentials_lifecycle() {
        let db = test_db().await;
        let repo = db.messaging_session();

        assert!(repo.get_credentials().await.unwrap().is_none());

        repo.save_credentials(b"first").await.unwrap();
        repo.save_credentials(b"second").await.unwrap();
        assert_eq!(repo.get_credentials().await.unwrap(), Some(b"second".to_vec()));

        repo.clear_credentials().await.unwrap();
        assert!(repo.get_credentials().await.unwrap().is_none());

        // Clearing twice is fine
        repo.clear_credentials().await.unwrap();
    }
}
