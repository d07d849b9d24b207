//! # reparo-messaging: Messaging Session for Reparo
//!
//! Keeps one authenticated session to the messaging network alive and sends
//! customer notifications through it.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Messaging Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │              ConnectionManager (handle to SessionActor)          │  │
//! │  │                                                                  │  │
//! │  │  initialize() / shutdown() / disconnect() / current_state()      │  │
//! │  └───────────────┬────────────────────────────┬─────────────────────┘  │
//! │                  │                            │                         │
//! │                  ▼                            ▼                         │
//! │  ┌────────────────────────┐     ┌────────────────────────────────┐     │
//! │  │   TransportFactory     │     │   CredentialStore              │     │
//! │  │                        │     │                                │     │
//! │  │ BridgeTransportFactory │     │ SQLite (reparo-db) or memory   │     │
//! │  │ WebSocket to the       │     │ Pairing code, connected flag,  │     │
//! │  │ session bridge         │     │ credentials                    │     │
//! │  └────────────────────────┘     └────────────────────────────────┘     │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Dispatcher                                                      │  │
//! │  │  send(raw_phone, text) -> bool      notify(&event) -> bool       │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`session`] - Connection manager actor and state machine
//! - [`dispatcher`] - Best-effort message sending
//! - [`transport`] - Transport contracts the session depends on
//! - [`bridge`] - WebSocket transport to the session bridge
//! - [`protocol`] - Bridge wire messages
//! - [`store`] - Credential and session-record persistence
//! - [`config`] - TOML configuration with env overrides
//! - [`error`] - Messaging error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reparo_messaging::{
//!     BridgeTransportFactory, Dispatcher, MessagingConfig, SessionConfig, SessionService,
//! };
//!
//! let config = MessagingConfig::load_or_default(None);
//! let manager = SessionService::new(
//!     Arc::new(BridgeTransportFactory::new((&config.bridge).into())),
//!     Arc::new(database),
//!     SessionConfig::from(&config),
//! )
//! .start();
//!
//! manager.initialize().await;
//!
//! let dispatcher = Dispatcher::new(manager.clone(), config.composer());
//! let sent = dispatcher.send("0812-3456-7890", "Halo!").await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use bridge::{BridgeConfig, BridgeTransportFactory};
pub use config::MessagingConfig;
pub use dispatcher::Dispatcher;
pub use error::{MessagingError, MessagingResult};
pub use protocol::BridgeMessage;
pub use session::{
    ConnectionManager, NoOpObserver, SessionConfig, SessionObserver, SessionService,
    SessionState, SessionStatus,
};
pub use store::{CredentialStore, MemoryCredentialStore, PersistedConfig};
pub use transport::{
    CloseReason, ConnectionUpdate, CredentialBlob, Transport, TransportEvent, TransportFactory,
};
