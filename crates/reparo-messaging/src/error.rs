//! # Messaging Error Types
//!
//! Error types for the messaging session and its transport.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Messaging Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  SerializationFailed    │ │
//! │  │  InvalidUrl     │  │  Disconnected   │  │  DeserializationFailed  │ │
//! │  │  ConfigLoad/Save│  │  Timeout        │  │  SendRejected           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │   Persistence   │                                                   │
//! │  │                 │                                                   │
//! │  │  Persistence    │                                                   │
//! │  │                 │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these escape the session lifecycle: the connection manager logs
//! them and moves to the appropriate state, and the dispatcher turns them
//! into `false`.

use thiserror::Error;

/// Result type alias for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Messaging error type.
#[derive(Debug, Error)]
pub enum MessagingError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid messaging configuration.
    #[error("Invalid messaging configuration: {0}")]
    InvalidConfig(String),

    /// Invalid bridge URL.
    #[error("Invalid bridge URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Failed to establish the bridge connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Bridge connection dropped.
    #[error("Disconnected from messaging bridge")]
    Disconnected,

    /// Operation timed out.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Failed to serialize a frame.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Failed to deserialize a frame.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// The network refused a send or logout request.
    #[error("Request rejected: {0}")]
    SendRejected(String),

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Credential store read or write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reparo_db::DbError> for MessagingError {
    fn from(err: reparo_db::DbError) -> Self {
        MessagingError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        MessagingError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for MessagingError {
    fn from(err: url::ParseError) -> Self {
        MessagingError::InvalidUrl(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for MessagingError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => MessagingError::Disconnected,
            WsError::Protocol(p) => MessagingError::WebSocketError(p.to_string()),
            WsError::Io(io) => MessagingError::ConnectionFailed(io.to_string()),
            WsError::Tls(tls) => MessagingError::TlsError(tls.to_string()),
            WsError::Url(url) => MessagingError::InvalidUrl(url.to_string()),
            other => MessagingError::WebSocketError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for MessagingError {
    fn from(err: std::io::Error) -> Self {
        MessagingError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for MessagingError {
    fn from(err: toml::de::Error) -> Self {
        MessagingError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for MessagingError {
    fn from(err: toml::ser::Error) -> Self {
        MessagingError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl MessagingError {
    /// Returns true for failures a later reconnect may clear.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MessagingError::ConnectionFailed(_)
                | MessagingError::Disconnected
                | MessagingError::Timeout(_)
                | MessagingError::WebSocketError(_)
        )
    }

    /// Returns true if retrying cannot help until the configuration changes.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            MessagingError::InvalidConfig(_)
                | MessagingError::InvalidUrl(_)
                | MessagingError::ConfigLoadFailed(_)
                | MessagingError::ConfigSaveFailed(_)
        )
    }
}
