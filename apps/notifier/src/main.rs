//! # Reparo Notifier
//!
//! Daemon that owns the messaging session for one shop.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Notifier Process                                 │
//! │                                                                         │
//! │  logging ─► config ─► SQLite ─► SessionService::start ─► initialize()   │
//! │                                                                         │
//! │  stdin ─► NotificationEvent (JSON line) ─► Dispatcher::notify           │
//! │                                                                         │
//! │  Ctrl+C / SIGTERM ─► disconnect() (or shutdown() if logout_on_exit)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `notifier [path/to/messaging.toml]`
//!
//! Without an argument the per-user config file is tried, and defaults are
//! used if it is missing or unreadable.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use reparo_core::NotificationEvent;
use reparo_db::{Database, DbConfig};
use reparo_messaging::{
    BridgeTransportFactory, Dispatcher, MessagingConfig, SessionConfig, SessionObserver,
    SessionService, SessionState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Reparo notifier...");

    // An explicit path must load; the per-user default location may fall back
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => MessagingConfig::load(Some(path)).context("Failed to load messaging config")?,
        None => MessagingConfig::load_or_default(None),
    };
    info!(
        bridge = %config.bridge.url,
        database = ?config.database.path,
        "Configuration loaded"
    );

    let db = Database::new(DbConfig::new(&config.database.path))
        .await
        .context("Failed to open database")?;
    if !db.health_check().await {
        anyhow::bail!("Database at {:?} is not answering queries", config.database.path);
    }
    info!("Database ready");

    let manager = SessionService::new(
        Arc::new(BridgeTransportFactory::new((&config.bridge).into())),
        Arc::new(db.clone()),
        SessionConfig::from(&config),
    )
    .with_observer(Arc::new(LogObserver))
    .start();

    manager.initialize().await;

    let dispatcher = Dispatcher::new(manager.clone(), config.composer());
    tokio::spawn(dispatch_events(dispatcher));

    shutdown_signal().await;

    if config.session.logout_on_exit {
        manager.shutdown().await;
    } else {
        manager.disconnect().await;
    }
    db.close().await;

    info!("Notifier shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` overrides the default `info,reparo=debug,sqlx=warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reparo=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Surfaces pairing codes to whoever watches the logs.
struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_pairing_code(&self, code: &str) {
        info!(
            pairing_code = %code,
            "Enter this code on the shop phone under Linked devices"
        );
    }

    fn on_state_change(&self, state: SessionState) {
        if state == SessionState::LoggedOut {
            warn!("Messaging device was unlinked, restart the notifier to pair again");
        }
    }
}

/// Reads one [`NotificationEvent`] per stdin line and sends it.
async fn dispatch_events(dispatcher: Dispatcher) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Event input closed");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read event input");
                return;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<NotificationEvent>(&line) {
            Ok(event) => {
                if !dispatcher.notify(&event).await {
                    warn!(
                        kind = event.kind(),
                        service_number = %event.notice().ticket.service_number,
                        "Notification not delivered"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Ignoring malformed event"),
        }
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
