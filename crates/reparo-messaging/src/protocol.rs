//! # Bridge Protocol
//!
//! JSON frames exchanged with the messaging bridge sidecar over WebSocket.
//!
//! ## Frame Format
//! ```text
//! { "type": "SendText", "payload": { "requestId": "…", "to": "62…@s.whatsapp.net", "text": "…" } }
//! ```
//!
//! ## Conversation
//! ```text
//! ┌──────────────┐                                 ┌──────────────┐
//! │   Notifier   │                                 │    Bridge    │
//! └──────┬───────┘                                 └──────┬───────┘
//!        │  Resume { credentials? }                       │
//!        │───────────────────────────────────────────────►│
//!        │                                                │
//!        │  ConnectionUpdate { pairingCode }   (unpaired) │
//!        │◄───────────────────────────────────────────────│
//!        │  CredentialsUpdate { credentials }  (0..n)     │
//!        │◄───────────────────────────────────────────────│
//!        │  ConnectionUpdate { opened: true }             │
//!        │◄───────────────────────────────────────────────│
//!        │                                                │
//!        │  SendText { requestId, to, text }              │
//!        │───────────────────────────────────────────────►│
//!        │  Ack { requestId, ok, error? }                 │
//!        │◄───────────────────────────────────────────────│
//!        │                                                │
//!        │  ConnectionUpdate { close: { statusCode } }    │
//!        │◄───────────────────────────────────────────────│
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MessagingError, MessagingResult};
use crate::transport::{CloseReason, ConnectionUpdate, CredentialBlob};

/// Close status the network uses when the device was unlinked.
pub const STATUS_LOGGED_OUT: u16 = 401;

/// Close status the network uses when another client took the session.
pub const STATUS_REPLACED: u16 = 440;

// =============================================================================
// Main Message Enum (Tagged Union)
// =============================================================================

/// All bridge protocol frames, in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BridgeMessage {
    // =========================================================================
    // Outbound
    // =========================================================================
    /// First frame after the socket opens.
    Resume(ResumePayload),

    /// Send one text message.
    SendText(SendTextPayload),

    /// Unlink this device.
    Logout(LogoutPayload),

    // =========================================================================
    // Inbound
    // =========================================================================
    /// Pairing code, open or close.
    ConnectionUpdate(ConnectionUpdatePayload),

    /// New authentication state to persist.
    CredentialsUpdate(CredentialsPayload),

    /// Outcome of a SendText or Logout.
    Ack(AckPayload),
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePayload {
    /// Authentication state from the last session. Absent forces pairing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextPayload {
    pub request_id: Uuid,

    /// Normalized network address.
    pub to: String,

    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutPayload {
    pub request_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdatePayload {
    #[serde(default)]
    pub pairing_code: Option<String>,

    #[serde(default)]
    pub opened: bool,

    #[serde(default)]
    pub close: Option<ClosePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePayload {
    #[serde(default)]
    pub status_code: Option<u16>,

    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsPayload {
    /// Opaque authentication state, stored verbatim.
    pub credentials: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    pub request_id: Uuid,

    pub ok: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Conversions
// =============================================================================

impl From<ClosePayload> for CloseReason {
    fn from(close: ClosePayload) -> Self {
        match close.status_code {
            Some(STATUS_LOGGED_OUT) => CloseReason::LoggedOut,
            Some(STATUS_REPLACED) => CloseReason::Replaced,
            code => CloseReason::Other {
                code,
                message: close.message,
            },
        }
    }
}

impl From<ConnectionUpdatePayload> for ConnectionUpdate {
    fn from(payload: ConnectionUpdatePayload) -> Self {
        ConnectionUpdate {
            pairing_code: payload.pairing_code.filter(|code| !code.trim().is_empty()),
            opened: payload.opened,
            closed: payload.close.map(CloseReason::from),
        }
    }
}

/// Serializes the bridge's authentication state for storage.
pub fn credentials_to_blob(credentials: &serde_json::Value) -> MessagingResult<CredentialBlob> {
    Ok(CredentialBlob::new(serde_json::to_vec(credentials)?))
}

/// Restores stored authentication state for a Resume frame.
pub fn blob_to_credentials(blob: &CredentialBlob) -> MessagingResult<serde_json::Value> {
    serde_json::from_slice(blob.as_bytes())
        .map_err(|e| MessagingError::DeserializationFailed(e.to_string()))
}

// =============================================================================
// Helper Functions
// =============================================================================

impl BridgeMessage {
    /// Returns the frame type name (for logging).
    pub fn type_name(&self) -> &'static str {
        match self {
            BridgeMessage::Resume(_) => "Resume",
            BridgeMessage::SendText(_) => "SendText",
            BridgeMessage::Logout(_) => "Logout",
            BridgeMessage::ConnectionUpdate(_) => "ConnectionUpdate",
            BridgeMessage::CredentialsUpdate(_) => "CredentialsUpdate",
            BridgeMessage::Ack(_) => "Ack",
        }
    }

    pub fn resume(credentials: Option<serde_json::Value>) -> Self {
        BridgeMessage::Resume(ResumePayload { credentials })
    }

    pub fn send_text(request_id: Uuid, to: &str, text: &str) -> Self {
        BridgeMessage::SendText(SendTextPayload {
            request_id,
            to: to.to_string(),
            text: text.to_string(),
        })
    }

    pub fn logout(request_id: Uuid) -> Self {
        BridgeMessage::Logout(LogoutPayload { request_id })
    }

    /// Serializes to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
