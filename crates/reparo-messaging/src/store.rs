//! # Credential Store
//!
//! Durable home for the session's pairing credentials and its small
//! persisted config record.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CredentialStore (trait)                                                │
//! │    ├── reparo_db::Database     SQLite, survives restarts                │
//! │    └── MemoryCredentialStore   tests and throwaway runs                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write replaces the previous value. The session treats all store
//! errors as non-fatal.

use async_trait::async_trait;
use tokio::sync::RwLock;

use reparo_db::Database;

use crate::error::MessagingResult;
use crate::transport::CredentialBlob;

/// The persisted session record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedConfig {
    /// Whether the session was open at the last write.
    pub connected: bool,

    /// Pairing code still waiting to be entered, if any.
    pub pairing_code: Option<String>,
}

/// Storage the session persists through.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Reads the persisted config. `None` if it was never written.
    async fn read_config(&self) -> MessagingResult<Option<PersistedConfig>>;

    /// Replaces the persisted config.
    async fn write_config(&self, config: &PersistedConfig) -> MessagingResult<()>;

    /// Reads the stored credentials.
    async fn read_credentials(&self) -> MessagingResult<Option<CredentialBlob>>;

    /// Replaces the stored credentials.
    async fn write_credentials(&self, credentials: &CredentialBlob) -> MessagingResult<()>;

    /// Forgets the stored credentials.
    async fn clear_credentials(&self) -> MessagingResult<()>;
}

// =============================================================================
// SQLite
// =============================================================================

#[async_trait]
impl CredentialStore for Database {
    async fn read_config(&self) -> MessagingResult<Option<PersistedConfig>> {
        let record = self.messaging_session().get_session().await?;

        // A row that was never written has no timestamp
        Ok(record.updated_at.map(|_| PersistedConfig {
            connected: record.connected,
            pairing_code: record.pairing_code,
        }))
    }

    async fn write_config(&self, config: &PersistedConfig) -> MessagingResult<()> {
        self.messaging_session()
            .save_session(config.connected, config.pairing_code.as_deref())
            .await?;
        Ok(())
    }

    async fn read_credentials(&self) -> MessagingResult<Option<CredentialBlob>> {
        let payload = self.messaging_session().get_credentials().await?;
        Ok(payload.map(CredentialBlob::new))
    }

    async fn write_credentials(&self, credentials: &CredentialBlob) -> MessagingResult<()> {
        self.messaging_session()
            .save_credentials(credentials.as_bytes())
            .await?;
        Ok(())
    }

    async fn clear_credentials(&self) -> MessagingResult<()> {
        self.messaging_session().clear_credentials().await?;
        Ok(())
    }
}

// =============================================================================
// In-Memory
// =============================================================================

/// A store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    config: RwLock<Option<PersistedConfig>>,
    credentials: RwLock<Option<CredentialBlob>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds credentials.
    pub fn with_credentials(credentials: CredentialBlob) -> Self {
        MemoryCredentialStore {
            config: RwLock::new(None),
            credentials: RwLock::new(Some(credentials)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn read_config(&self) -> MessagingResult<Option<PersistedConfig>> {
        Ok(self.config.read().await.clone())
    }

    async fn write_config(&self, config: &PersistedConfig) -> MessagingResult<()> {
        *self.config.write().await = Some(config.clone());
        Ok(())
    }

    async fn read_credentials(&self) -> MessagingResult<Option<CredentialBlob>> {
        Ok(self.credentials.read().await.clone())
    }

    async fn write_credentials(&self, credentials: &CredentialBlob) -> MessagingResult<()> {
        *self.credentials.write().await = Some(credentials.clone());
        Ok(())
    }

    async fn clear_credentials(&self) -> MessagingResult<()> {
        *self.credentials.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reparo_db::DbConfig;

    async fn exercise(store: &dyn CredentialStore) {
        assert!(store.read_config().await.unwrap().is_none());
        assert!(store.read_credentials().await.unwrap().is_none());

        let pairing = PersistedConfig {
            connected: false,
            pairing_code: Some("KLMN-5678".into()),
        };
        store.write_config(&pairing).await.unwrap();
        assert_eq!(store.read_config().await.unwrap(), Some(pairing));

        let open = PersistedConfig {
            connected: true,
            pairing_code: None,
        };
        store.write_config(&open).await.unwrap();
        assert_eq!(store.read_config().await.unwrap(), Some(open));

        let blob = CredentialBlob::new(br#"{"me":"628123"}"#.to_vec());
        store.write_credentials(&blob).await.unwrap();
        assert_eq!(store.read_credentials().await.unwrap(), Some(blob));

        store.clear_credentials().await.unwrap();
        assert!(store.read_credentials().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryCredentialStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        exercise(&db).await;
    }

    #[tokio::test]
    async fn test_with_credentials() {
        let store = MemoryCredentialStore::with_credentials(CredentialBlob::new(vec![1, 2, 3]));
        assert_eq!(
            store.read_credentials().await.unwrap(),
            Some(CredentialBlob::new(vec![1, 2, 3]))
        );
    }
}
