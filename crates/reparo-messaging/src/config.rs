//! # Messaging Configuration
//!
//! Configuration for the bridge connection, session lifecycle and
//! notification rendering.
//!
//! ## Configuration Sources (Priority Order)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Loading Order                          │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     REPARO_BRIDGE_URL=ws://127.0.0.1:8787/session                       │
//! │     REPARO_RECONNECT_DELAY_MS=3000                                      │
//! │     REPARO_STATUS_BASE_URL=https://toko.example/cek                     │
//! │     REPARO_DATABASE_PATH=/var/lib/reparo/reparo.db                      │
//! │     REPARO_UTC_OFFSET_HOURS=7                                           │
//! │     REPARO_LOGOUT_ON_EXIT=false                                         │
//! │                                                                         │
//! │  2. Config File (messaging.toml)                                        │
//! │     ~/.config/reparo/messaging.toml (Linux)                             │
//! │     ~/Library/Application Support/com.reparo.notifier/ (macOS)          │
//! │     %APPDATA%\reparo\notifier\config\ (Windows)                         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MessagingError, MessagingResult};

/// Largest UTC offset in use anywhere (Line Islands, +14:00).
const MAX_UTC_OFFSET_HOURS: u32 = 14;

// =============================================================================
// Bridge Settings
// =============================================================================

/// Connection to the messaging bridge sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// WebSocket URL of the bridge.
    #[serde(default = "default_bridge_url")]
    pub url: String,

    /// Handshake timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long a send or logout waits for its acknowledgement (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Keepalive ping interval (seconds).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:8787/session".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    20
}

fn default_ping_interval() -> u64 {
    30
}

impl Default for BridgeSettings {
    fn default() -> Self {
        BridgeSettings {
            url: default_bridge_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Session lifecycle behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Delay before reconnecting after a non-logout close (milliseconds).
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Unlink the device on process exit instead of just disconnecting.
    #[serde(default)]
    pub logout_on_exit: bool,
}

fn default_reconnect_delay() -> u64 {
    3000
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            reconnect_delay_ms: default_reconnect_delay(),
            logout_on_exit: false,
        }
    }
}

// =============================================================================
// Notification Settings
// =============================================================================

/// Message rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Public page customers use to look up a ticket.
    #[serde(default = "default_status_base_url")]
    pub status_base_url: String,

    /// Offset used when printing timestamps.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,
}

fn default_status_base_url() -> String {
    reparo_core::notification::DEFAULT_STATUS_BASE_URL.to_string()
}

fn default_utc_offset() -> i32 {
    reparo_core::notification::DEFAULT_UTC_OFFSET_HOURS
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            status_base_url: default_status_base_url(),
            utc_offset_hours: default_utc_offset(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// Where the session database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "reparo", "notifier")
        .map(|dirs| dirs.data_dir().join("reparo.db"))
        .unwrap_or_else(|| PathBuf::from("reparo.db"))
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

// =============================================================================
// Main Messaging Configuration
// =============================================================================

/// Complete messaging configuration.
///
/// ## Example Config File
/// ```toml
/// [bridge]
/// url = "ws://127.0.0.1:8787/session"
/// connect_timeout_secs = 10
/// request_timeout_secs = 20
/// ping_interval_secs = 30
///
/// [session]
/// reconnect_delay_ms = 3000
/// logout_on_exit = false
///
/// [notification]
/// status_base_url = "https://reparo.id/cek-servis"
/// utc_offset_hours = 7
///
/// [database]
/// path = "/var/lib/reparo/reparo.db"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default)]
    pub bridge: BridgeSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub notification: NotificationSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl MessagingConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (messaging.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> MessagingResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading messaging config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load messaging config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> MessagingResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| MessagingError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Messaging config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> MessagingResult<()> {
        let url = Url::parse(&self.bridge.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(MessagingError::InvalidUrl(format!(
                "Bridge URL must start with ws:// or wss://, got: {}",
                self.bridge.url
            )));
        }

        if self.bridge.connect_timeout_secs == 0 || self.bridge.request_timeout_secs == 0 {
            return Err(MessagingError::InvalidConfig(
                "bridge timeouts must be greater than 0".into(),
            ));
        }

        if self.bridge.ping_interval_secs == 0 {
            return Err(MessagingError::InvalidConfig(
                "ping_interval_secs must be greater than 0".into(),
            ));
        }

        if self.notification.status_base_url.trim().is_empty() {
            return Err(MessagingError::InvalidConfig(
                "status_base_url must not be empty".into(),
            ));
        }

        if self.notification.utc_offset_hours.unsigned_abs() > MAX_UTC_OFFSET_HOURS {
            return Err(MessagingError::InvalidConfig(format!(
                "utc_offset_hours must be within ±{}, got {}",
                MAX_UTC_OFFSET_HOURS, self.notification.utc_offset_hours
            )));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("REPARO_BRIDGE_URL") {
            debug!(url = %url, "Overriding bridge URL from environment");
            self.bridge.url = url;
        }

        if let Ok(delay) = std::env::var("REPARO_RECONNECT_DELAY_MS") {
            match delay.parse::<u64>() {
                Ok(ms) => self.session.reconnect_delay_ms = ms,
                Err(_) => warn!(value = %delay, "Ignoring invalid REPARO_RECONNECT_DELAY_MS"),
            }
        }

        if let Ok(base) = std::env::var("REPARO_STATUS_BASE_URL") {
            self.notification.status_base_url = base;
        }

        if let Ok(path) = std::env::var("REPARO_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(offset) = std::env::var("REPARO_UTC_OFFSET_HOURS") {
            match offset.parse::<i32>() {
                Ok(hours) => self.notification.utc_offset_hours = hours,
                Err(_) => warn!(value = %offset, "Ignoring invalid REPARO_UTC_OFFSET_HOURS"),
            }
        }

        if let Ok(flag) = std::env::var("REPARO_LOGOUT_ON_EXIT") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.session.logout_on_exit = true,
                "0" | "false" | "no" => self.session.logout_on_exit = false,
                _ => warn!(value = %flag, "Ignoring invalid REPARO_LOGOUT_ON_EXIT"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "reparo", "notifier")
            .map(|dirs| dirs.config_dir().join("messaging.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the reconnect delay.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.session.reconnect_delay_ms)
    }

    /// Builds a composer from the notification settings.
    pub fn composer(&self) -> reparo_core::NotificationComposer {
        reparo_core::NotificationComposer::new(self.notification.status_base_url.clone())
            .with_utc_offset_hours(self.notification.utc_offset_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MessagingConfig::default();
        assert_eq!(config.session.reconnect_delay_ms, 3000);
        assert!(!config.session.logout_on_exit);
        assert_eq!(config.notification.utc_offset_hours, 7);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = MessagingConfig::default();

        config.bridge.url = "http://127.0.0.1:8787".to_string();
        assert!(matches!(config.validate(), Err(MessagingError::InvalidUrl(_))));

        config.bridge.url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(MessagingError::InvalidUrl(_))));

        config.bridge.url = "wss://bridge.example/session".to_string();
        assert!(config.validate().is_ok());

        config.bridge.request_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.bridge.request_timeout_secs = 20;

        config.notification.utc_offset_hours = 15;
        assert!(config.validate().is_err());
        config.notification.utc_offset_hours = i32::MIN;
        assert!(matches!(config.validate(), Err(MessagingError::InvalidConfig(_))));
        config.notification.utc_offset_hours = -10;
        assert!(config.validate().is_ok());

        config.notification.status_base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: MessagingConfig = toml::from_str(
            r#"
            [session]
            logout_on_exit = true
            "#,
        )
        .unwrap();

        assert!(config.session.logout_on_exit);
        assert_eq!(config.session.reconnect_delay_ms, 3000);
        assert_eq!(config.bridge.url, "ws://127.0.0.1:8787/session");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("reparo-config-test-{}", std::process::id()))
            .join("messaging.toml");

        let mut config = MessagingConfig::default();
        config.notification.status_base_url = "https://toko.example/cek".into();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[bridge]"));
        assert!(contents.contains("[session]"));

        let parsed: MessagingConfig = toml::from_str(&contents).unwrap();
        assert_eq!(parsed.notification.status_base_url, "https://toko.example/cek");

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("reparo-config-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("messaging.toml");
        std::fs::write(&path, "[bridge\nurl = ").unwrap();

        let err = MessagingConfig::load(Some(path.clone())).unwrap_err();
        assert!(err.is_config_error());

        let config = MessagingConfig::load_or_default(Some(path));
        assert_eq!(config.bridge.url, MessagingConfig::default().bridge.url);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_composer_uses_configured_base_url() {
        let mut config = MessagingConfig::default();
        config.notification.status_base_url = "https://toko.example/cek/".into();
        assert_eq!(
            config.composer().status_url("SRV-1"),
            "https://toko.example/cek/SRV-1"
        );
    }
}
