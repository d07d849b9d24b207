//! # Transport Contracts
//!
//! What the session needs from the messaging network, and nothing more.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  TransportFactory::connect(credentials?)                                │
//! │        │                                                                │
//! │        ├──► Arc<dyn Transport>        send_text(), logout()             │
//! │        │                                                                │
//! │        └──► mpsc::Receiver<TransportEvent>                              │
//! │                  │                                                      │
//! │                  ├── Connection(ConnectionUpdate)                       │
//! │                  │      pairing_code?  opened  closed?                  │
//! │                  │                                                      │
//! │                  └── Credentials(CredentialBlob)                        │
//! │                                                                         │
//! │  The receiver ending without a close counts as ConnectionLost.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use reparo_core::Address;

use crate::error::MessagingResult;

// =============================================================================
// Credentials
// =============================================================================

/// Opaque authentication state produced by the network after pairing.
///
/// The session never looks inside; it only stores and replays it.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBlob(Vec<u8>);

impl CredentialBlob {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        CredentialBlob(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Never print key material.
impl fmt::Debug for CredentialBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialBlob({} bytes)", self.0.len())
    }
}

// =============================================================================
// Connection Updates
// =============================================================================

/// Why the network closed the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The device was unlinked. Terminal until an operator re-pairs.
    LoggedOut,

    /// Socket dropped or the event stream ended.
    ConnectionLost,

    /// Another client took over the session.
    Replaced,

    /// Any other close the network reported.
    Other {
        code: Option<u16>,
        message: Option<String>,
    },
}

impl CloseReason {
    /// Returns true if the session should not reconnect on its own.
    pub fn is_logged_out(&self) -> bool {
        matches!(self, CloseReason::LoggedOut)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::LoggedOut => write!(f, "logged out"),
            CloseReason::ConnectionLost => write!(f, "connection lost"),
            CloseReason::Replaced => write!(f, "replaced"),
            CloseReason::Other { code, message } => match (code, message) {
                (Some(code), Some(message)) => write!(f, "closed ({}): {}", code, message),
                (Some(code), None) => write!(f, "closed ({})", code),
                (None, Some(message)) => write!(f, "closed: {}", message),
                (None, None) => write!(f, "closed"),
            },
        }
    }
}

/// A connection-state notification from the transport.
///
/// A single update may carry several signals; the session handles the
/// pairing code first, then open, then close.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionUpdate {
    /// Code the operator must enter on the phone to link this device.
    pub pairing_code: Option<String>,

    /// The session is authenticated and ready to send.
    pub opened: bool,

    /// The connection is gone.
    pub closed: Option<CloseReason>,
}

impl ConnectionUpdate {
    pub fn pairing(code: impl Into<String>) -> Self {
        ConnectionUpdate {
            pairing_code: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn opened() -> Self {
        ConnectionUpdate {
            opened: true,
            ..Default::default()
        }
    }

    pub fn closed(reason: CloseReason) -> Self {
        ConnectionUpdate {
            closed: Some(reason),
            ..Default::default()
        }
    }
}

/// Everything a transport reports back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connection(ConnectionUpdate),
    Credentials(CredentialBlob),
}

// =============================================================================
// Contracts
// =============================================================================

/// A live connection to the messaging network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one text message and waits for the network to accept it.
    async fn send_text(&self, to: &Address, text: &str) -> MessagingResult<()>;

    /// Unlinks this device from the account.
    async fn logout(&self) -> MessagingResult<()>;
}

/// A freshly opened transport plus its event stream.
pub struct TransportConnection {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens transports. The session calls this once per connect attempt.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Opens a connection, resuming `credentials` when present.
    ///
    /// An error means no transport was created; the session stays closed
    /// until the next `initialize()`.
    async fn connect(
        &self,
        credentials: Option<CredentialBlob>,
    ) -> MessagingResult<TransportConnection>;
}
