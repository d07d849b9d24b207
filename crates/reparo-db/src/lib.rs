//! # reparo-db: Database Layer for Reparo
//!
//! SQLite storage for the notifier's single messaging session.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         reparo-db                                       │
//! │                                                                         │
//! │  ┌──────────────┐   ┌───────────────────────────────────────────────┐  │
//! │  │   Database   │──►│  MessagingSessionRepository                    │  │
//! │  │  (SqlitePool)│   │  ├── messaging_session     (connected, code)  │  │
//! │  └──────┬───────┘   │  └── messaging_credentials (opaque blob)      │  │
//! │         │           └───────────────────────────────────────────────┘  │
//! │         ▼                                                               │
//! │  migrations/sqlite/*.sql (embedded at compile time)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("./reparo.db")).await?;
//! db.messaging_session().save_session(true, None).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::session::{MessagingSessionRepository, SessionRecord};
