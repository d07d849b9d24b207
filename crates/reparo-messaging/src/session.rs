//! # Session Connection Manager
//!
//! Owns the single messaging session and drives its lifecycle.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │           initialize()                 opened                           │
//! │   ┌──────┐ ──────────► ┌────────────┐ ─────────► ┌──────┐               │
//! │   │ Idle │             │ Connecting │            │ Open │               │
//! │   └──────┘             └────────────┘            └──────┘               │
//! │                          ▲   │  │ pairing code      │                   │
//! │           reconnect      │   │  └──► (stays put)    │ closed            │
//! │           after delay    │   │ closed / failed      │                   │
//! │                          │   ▼                      ▼                   │
//! │                        ┌────────┐ ◄─────────────────┘                   │
//! │                        │ Closed │                                       │
//! │                        └────────┘                                       │
//! │                              │ closed: logged out                       │
//! │                              ▼                                          │
//! │                        ┌───────────┐   initialize() starts a fresh      │
//! │                        │ LoggedOut │   pairing                          │
//! │                        └───────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tasks
//! ```text
//! ConnectionManager (cloneable handle)
//!     │ SessionCommand::{Connect, Stop}
//!     ▼
//! SessionActor ◄── SessionCommand::Event{generation} ── forwarder (one per transport)
//!     │
//!     ├── watch::Sender<SessionStatus>   → current_state(), subscribe()
//!     ├── CredentialStore                → persisted config + credentials
//!     └── reconnect timer (fire-and-forget, cancelled by lifecycle epoch)
//! ```
//!
//! Every transport gets a generation number. Events tagged with an older
//! generation are dropped, so a superseded transport can never move the
//! session. Persistence failures are logged and otherwise ignored.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::MessagingConfig;
use crate::store::{CredentialStore, PersistedConfig};
use crate::transport::{
    CloseReason, ConnectionUpdate, Transport, TransportEvent, TransportFactory,
};

/// Default pause before reconnecting after a non-logout close.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

const COMMAND_CAPACITY: usize = 32;

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of the messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing has been attempted yet.
    #[default]
    Idle,
    /// A transport is being opened or is waiting for pairing.
    Connecting,
    /// Authenticated and able to send.
    Open,
    /// Connection gone; a reconnect may be scheduled.
    Closed,
    /// Device unlinked. Stays here until an operator calls `initialize()`.
    LoggedOut,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
            SessionState::LoggedOut => write!(f, "logged_out"),
        }
    }
}

/// Snapshot published on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,

    /// Last code the bridge issued for entry on the phone. Cleared when the
    /// session opens or logs out. A non-logout close keeps it while `Closed`,
    /// even though the transport that issued it is gone, until the reconnect
    /// brings a fresh code or opens.
    pub pairing_code: Option<String>,
}

// =============================================================================
// Observer
// =============================================================================

/// Receives session changes for display. Calls happen on the actor task and
/// must not block.
pub trait SessionObserver: Send + Sync {
    fn on_pairing_code(&self, _code: &str) {}

    fn on_state_change(&self, _state: SessionState) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl SessionObserver for NoOpObserver {}

// =============================================================================
// Configuration
// =============================================================================

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause before reconnecting after a non-logout close.
    pub reconnect_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl From<&MessagingConfig> for SessionConfig {
    fn from(config: &MessagingConfig) -> Self {
        SessionConfig {
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

// =============================================================================
// Shared State
// =============================================================================

/// State read outside the actor.
struct Shared {
    /// Set by `initialize()` before any I/O, cleared by the actor.
    connecting: AtomicBool,

    /// Bumped by `shutdown()`/`disconnect()` to cancel queued connects and
    /// pending reconnect timers.
    epoch: AtomicU64,

    /// The live transport, if any.
    transport: RwLock<Option<Arc<dyn Transport>>>,
}

/// Commands processed by the session actor.
enum SessionCommand {
    /// Open a transport. Ignored if `epoch` is stale.
    Connect { epoch: u64 },

    /// A transport event, tagged with the generation that produced it.
    Event { generation: u64, event: TransportEvent },

    /// Tear down the transport, optionally unlinking the device.
    Stop {
        logout: bool,
        done: oneshot::Sender<()>,
    },
}

/// Sets the guard and queues a connect. No-op if a connect is underway.
async fn request_connect(shared: &Shared, cmd_tx: &mpsc::Sender<SessionCommand>) {
    if shared
        .connecting
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("Connect already in progress, ignoring initialize");
        return;
    }

    let epoch = shared.epoch.load(Ordering::Acquire);
    if cmd_tx.send(SessionCommand::Connect { epoch }).await.is_err() {
        shared.connecting.store(false, Ordering::Release);
        warn!("Session actor has stopped, cannot connect");
    }
}

// =============================================================================
// Connection Manager (Handle)
// =============================================================================

/// Handle to the messaging session. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
    cmd_tx: mpsc::Sender<SessionCommand>,
    status_rx: watch::Receiver<SessionStatus>,
}

impl ConnectionManager {
    /// Starts connecting. Returns once the attempt is queued.
    ///
    /// Does nothing while another attempt is in flight. Failures surface as
    /// state changes, never as errors.
    pub async fn initialize(&self) {
        request_connect(&self.shared, &self.cmd_tx).await;
    }

    /// Unlinks the device and drops the transport.
    ///
    /// Stored credentials are cleared, so the next `initialize()` pairs anew.
    /// Any pending reconnect is cancelled.
    pub async fn shutdown(&self) {
        self.stop(true).await;
    }

    /// Drops the transport without unlinking.
    ///
    /// Credentials stay valid for the next process start.
    pub async fn disconnect(&self) {
        self.stop(false).await;
    }

    async fn stop(&self, logout: bool) {
        self.shared.epoch.fetch_add(1, Ordering::AcqRel);

        let (done_tx, done_rx) = oneshot::channel();
        let cmd = SessionCommand::Stop {
            logout,
            done: done_tx,
        };
        if self.cmd_tx.send(cmd).await.is_err() {
            warn!("Session actor has stopped");
            return;
        }
        let _ = done_rx.await;
    }

    /// Returns the current state.
    pub fn current_state(&self) -> SessionState {
        self.status_rx.borrow().state
    }

    /// Returns the pairing code waiting to be entered, if any.
    pub fn current_pairing_code(&self) -> Option<String> {
        self.status_rx.borrow().pairing_code.clone()
    }

    /// Returns true while a connect attempt holds the guard.
    pub fn is_connecting(&self) -> bool {
        self.shared.connecting.load(Ordering::Acquire)
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// Returns the live transport, if any.
    pub(crate) async fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.shared.transport.read().await.clone()
    }
}

// =============================================================================
// Session Service
// =============================================================================

/// Builds and starts the session actor.
pub struct SessionService {
    factory: Arc<dyn TransportFactory>,
    store: Arc<dyn CredentialStore>,
    observer: Arc<dyn SessionObserver>,
    config: SessionConfig,
}

impl SessionService {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        store: Arc<dyn CredentialStore>,
        config: SessionConfig,
    ) -> Self {
        SessionService {
            factory,
            store,
            observer: Arc::new(NoOpObserver),
            config,
        }
    }

    /// Sets the observer notified of pairing codes and state changes.
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Spawns the actor and returns a handle. The session starts `Idle`.
    pub fn start(self) -> ConnectionManager {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());

        let shared = Arc::new(Shared {
            connecting: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            transport: RwLock::new(None),
        });

        let actor = SessionActor {
            factory: self.factory,
            store: self.store,
            observer: self.observer,
            config: self.config,
            shared: shared.clone(),
            status_tx,
            cmd_tx: cmd_tx.downgrade(),
            generation: 0,
        };

        tokio::spawn(actor.run(cmd_rx));

        ConnectionManager {
            shared,
            cmd_tx,
            status_rx,
        }
    }
}

// =============================================================================
// Session Actor
// =============================================================================

struct SessionActor {
    factory: Arc<dyn TransportFactory>,
    store: Arc<dyn CredentialStore>,
    observer: Arc<dyn SessionObserver>,
    config: SessionConfig,
    shared: Arc<Shared>,
    status_tx: watch::Sender<SessionStatus>,
    /// Weak so the actor stops once every handle is dropped.
    cmd_tx: mpsc::WeakSender<SessionCommand>,
    /// Generation of the most recent transport.
    generation: u64,
}

impl SessionActor {
    async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
        info!(
            reconnect_delay_ms = self.config.reconnect_delay.as_millis() as u64,
            "Session service started"
        );

        self.reconcile_persisted().await;

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                SessionCommand::Connect { epoch } => self.handle_connect(epoch).await,
                SessionCommand::Event { generation, event } => {
                    self.handle_event(generation, event).await
                }
                SessionCommand::Stop { logout, done } => {
                    self.handle_stop(logout).await;
                    let _ = done.send(());
                }
            }
        }

        info!("Session service stopped");
    }

    /// A record left by a previous process cannot describe a live session.
    async fn reconcile_persisted(&self) {
        match self.store.read_config().await {
            Ok(Some(previous)) => {
                debug!(
                    connected = previous.connected,
                    has_pairing_code = previous.pairing_code.is_some(),
                    "Found persisted session record"
                );
                if previous.connected || previous.pairing_code.is_some() {
                    self.persist(false, None).await;
                }
            }
            Ok(None) => debug!("No persisted session record"),
            Err(e) => warn!(error = %e, "Failed to read persisted session record"),
        }
    }

    // =========================================================================
    // Connect
    // =========================================================================

    async fn handle_connect(&mut self, epoch: u64) {
        let has_transport = self.shared.transport.read().await.is_some();

        if epoch != self.shared.epoch.load(Ordering::Acquire) {
            debug!("Dropping connect queued before shutdown");
            if !has_transport {
                self.shared.connecting.store(false, Ordering::Release);
            }
            return;
        }

        if has_transport {
            debug!("Transport already live, ignoring connect");
            if self.state() == SessionState::Open {
                self.shared.connecting.store(false, Ordering::Release);
            }
            return;
        }

        self.set_state(SessionState::Connecting);

        let credentials = match self.store.read_credentials().await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "Failed to read credentials, pairing from scratch");
                None
            }
        };

        info!(resuming = credentials.is_some(), "Opening transport");

        match self.factory.connect(credentials).await {
            Ok(connection) => {
                self.generation += 1;
                let generation = self.generation;

                *self.shared.transport.write().await = Some(connection.transport);
                tokio::spawn(forward_events(
                    generation,
                    connection.events,
                    self.cmd_tx.clone(),
                ));

                debug!(generation, "Transport opened, waiting for connection update");
            }
            Err(e) => {
                if e.is_config_error() {
                    error!(error = %e, "Bridge settings are unusable, fix the configuration");
                } else {
                    warn!(error = %e, retryable = e.is_retryable(), "Failed to open transport");
                }
                self.shared.connecting.store(false, Ordering::Release);
                self.set_state(SessionState::Closed);
                self.persist(false, self.pairing_code()).await;
            }
        }
    }

    // =========================================================================
    // Transport Events
    // =========================================================================

    async fn handle_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation {
            debug!(generation, current = self.generation, "Ignoring event from superseded transport");
            return;
        }

        match event {
            TransportEvent::Credentials(blob) => {
                debug!(generation, bytes = blob.len(), "Persisting credentials");
                if let Err(e) = self.store.write_credentials(&blob).await {
                    warn!(error = %e, "Failed to persist credentials");
                }
            }
            TransportEvent::Connection(update) => self.handle_connection_update(update).await,
        }
    }

    async fn handle_connection_update(&mut self, update: ConnectionUpdate) {
        if let Some(code) = update.pairing_code {
            info!("Pairing code received");
            self.status_tx.send_modify(|status| {
                status.pairing_code = Some(code.clone());
            });
            self.persist(false, Some(code.clone())).await;
            self.observer.on_pairing_code(&code);
        }

        if update.opened {
            self.shared.connecting.store(false, Ordering::Release);
            self.status_tx.send_modify(|status| status.pairing_code = None);
            self.set_state(SessionState::Open);
            self.persist(true, None).await;
        }

        if let Some(reason) = update.closed {
            self.handle_close(reason).await;
        }
    }

    async fn handle_close(&mut self, reason: CloseReason) {
        self.shared.transport.write().await.take();
        self.shared.connecting.store(false, Ordering::Release);

        if reason.is_logged_out() {
            info!("Session logged out");
            self.status_tx.send_modify(|status| status.pairing_code = None);
            self.set_state(SessionState::LoggedOut);
            self.persist(false, None).await;

            if let Err(e) = self.store.clear_credentials().await {
                warn!(error = %e, "Failed to clear credentials");
            }
            return;
        }

        info!(%reason, "Session closed, scheduling reconnect");
        self.set_state(SessionState::Closed);
        self.persist(false, self.pairing_code()).await;
        self.schedule_reconnect();
    }

    /// Spawns a timer that re-initializes unless a shutdown intervenes.
    fn schedule_reconnect(&self) {
        // TODO: switch to bounded exponential backoff once the bridge reports
        // rate limiting; a fixed delay retries forever.
        let delay = self.config.reconnect_delay;
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        let shared = self.shared.clone();
        let cmd_tx = self.cmd_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if shared.epoch.load(Ordering::Acquire) != epoch {
                debug!("Reconnect cancelled by shutdown");
                return;
            }
            let Some(cmd_tx) = cmd_tx.upgrade() else {
                return;
            };

            debug!("Reconnecting");
            request_connect(&shared, &cmd_tx).await;
        });
    }

    // =========================================================================
    // Stop
    // =========================================================================

    async fn handle_stop(&mut self, logout: bool) {
        // Anything the old transport still emits is now stale
        self.generation += 1;

        let transport = self.shared.transport.write().await.take();
        self.shared.connecting.store(false, Ordering::Release);
        self.status_tx.send_modify(|status| status.pairing_code = None);

        if let Some(transport) = transport {
            if logout {
                info!("Logging out of messaging session");
                if let Err(e) = transport.logout().await {
                    warn!(error = %e, "Logout request failed");
                }
                if let Err(e) = self.store.clear_credentials().await {
                    warn!(error = %e, "Failed to clear credentials");
                }
                self.set_state(SessionState::LoggedOut);
            } else {
                info!("Disconnecting messaging session");
                self.set_state(SessionState::Closed);
            }
        }

        self.persist(false, None).await;
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn state(&self) -> SessionState {
        self.status_tx.borrow().state
    }

    fn pairing_code(&self) -> Option<String> {
        self.status_tx.borrow().pairing_code.clone()
    }

    fn set_state(&self, state: SessionState) {
        let changed = self.status_tx.send_if_modified(|status| {
            if status.state == state {
                return false;
            }
            status.state = state;
            true
        });

        if changed {
            info!(state = %state, "Session state changed");
            self.observer.on_state_change(state);
        }
    }

    async fn persist(&self, connected: bool, pairing_code: Option<String>) {
        let record = PersistedConfig {
            connected,
            pairing_code,
        };
        if let Err(e) = self.store.write_config(&record).await {
            warn!(error = %e, connected, "Failed to persist session record");
        }
    }
}

/// Relays one transport's events into the actor.
async fn forward_events(
    generation: u64,
    mut events: mpsc::Receiver<TransportEvent>,
    cmd_tx: mpsc::WeakSender<SessionCommand>,
) {
    let mut saw_close = false;

    while let Some(event) = events.recv().await {
        if let TransportEvent::Connection(update) = &event {
            saw_close |= update.closed.is_some();
        }

        let Some(tx) = cmd_tx.upgrade() else {
            return;
        };
        if tx.send(SessionCommand::Event { generation, event }).await.is_err() {
            return;
        }
    }

    if !saw_close {
        debug!(generation, "Transport event stream ended without a close");
        let event = TransportEvent::Connection(ConnectionUpdate::closed(CloseReason::ConnectionLost));
        if let Some(tx) = cmd_tx.upgrade() {
            let _ = tx.send(SessionCommand::Event { generation, event }).await;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use crate::testing::{FakeFactory, RecordingObserver};
    use crate::transport::CredentialBlob;

    struct Harness {
        manager: ConnectionManager,
        factory: FakeFactory,
        store: Arc<MemoryCredentialStore>,
        observer: Arc<RecordingObserver>,
    }

    fn harness_with_store(store: MemoryCredentialStore) -> Harness {
        let factory = FakeFactory::new();
        let store = Arc::new(store);
        let observer = Arc::new(RecordingObserver::default());

        let manager = SessionService::new(
            Arc::new(factory.clone()),
            store.clone(),
            SessionConfig::default(),
        )
        .with_observer(observer.clone())
        .start();

        Harness {
            manager,
            factory,
            store,
            observer,
        }
    }

    fn harness() -> Harness {
        harness_with_store(MemoryCredentialStore::new())
    }

    /// Lets every spawned task run until it blocks. Time is paused, so this
    /// does not advance past pending timers shorter than 1ms.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn open(h: &Harness) {
        h.manager.initialize().await;
        settle().await;
        h.factory
            .emit(0, TransportEvent::Connection(ConnectionUpdate::opened()))
            .await;
        settle().await;
        assert_eq!(h.manager.current_state(), SessionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_idle() {
        let h = harness();
        assert_eq!(h.manager.current_state(), SessionState::Idle);
        assert!(h.manager.current_pairing_code().is_none());
        assert!(!h.manager.is_connecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_initialize_constructs_one_transport() {
        let h = harness();

        h.manager.initialize().await;
        h.manager.initialize().await;
        let clone = h.manager.clone();
        clone.initialize().await;
        settle().await;

        assert_eq!(h.factory.connect_count(), 1);
        assert_eq!(h.manager.current_state(), SessionState::Connecting);
        assert!(h.manager.is_connecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_resumes_stored_credentials() {
        let blob = CredentialBlob::new(b"saved".to_vec());
        let h = harness_with_store(MemoryCredentialStore::with_credentials(blob.clone()));

        h.manager.initialize().await;
        settle().await;

        assert_eq!(h.factory.credentials_seen(), vec![Some(blob)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_code_is_stored_persisted_and_surfaced() {
        let h = harness();
        h.manager.initialize().await;
        settle().await;

        h.factory
            .emit(0, TransportEvent::Connection(ConnectionUpdate::pairing("ABCD-EFGH")))
            .await;
        settle().await;

        assert_eq!(h.manager.current_state(), SessionState::Connecting);
        assert_eq!(h.manager.current_pairing_code().as_deref(), Some("ABCD-EFGH"));
        assert_eq!(h.observer.pairing_codes(), vec!["ABCD-EFGH".to_string()]);

        let persisted = h.store.read_config().await.unwrap().unwrap();
        assert_eq!(persisted.pairing_code.as_deref(), Some("ABCD-EFGH"));
        assert!(!persisted.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_clears_pairing_code_and_persists_connected() {
        let h = harness();
        h.manager.initialize().await;
        settle().await;
        h.factory
            .emit(0, TransportEvent::Connection(ConnectionUpdate::pairing("ABCD-EFGH")))
            .await;
        h.factory
            .emit(0, TransportEvent::Connection(ConnectionUpdate::opened()))
            .await;
        settle().await;

        assert_eq!(h.manager.current_state(), SessionState::Open);
        assert!(h.manager.current_pairing_code().is_none());
        assert!(!h.manager.is_connecting());
        assert_eq!(
            h.store.read_config().await.unwrap(),
            Some(PersistedConfig {
                connected: true,
                pairing_code: None
            })
        );
        assert_eq!(
            h.observer.states(),
            vec![SessionState::Connecting, SessionState::Open]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_credentials_updates_are_persisted() {
        let h = harness();
        h.manager.initialize().await;
        settle().await;

        for bytes in [b"one".to_vec(), b"two".to_vec()] {
            h.factory
                .emit(0, TransportEvent::Credentials(CredentialBlob::new(bytes)))
                .await;
        }
        settle().await;

        assert_eq!(
            h.store.read_credentials().await.unwrap(),
            Some(CredentialBlob::new(b"two".to_vec()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_without_logout_reconnects_after_delay() {
        let h = harness();
        open(&h).await;

        h.factory
            .emit(
                0,
                TransportEvent::Connection(ConnectionUpdate::closed(CloseReason::ConnectionLost)),
            )
            .await;
        settle().await;

        assert_eq!(h.manager.current_state(), SessionState::Closed);
        assert!(!h.manager.is_connecting());
        assert!(!h.store.read_config().await.unwrap().unwrap().connected);

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert_eq!(h.factory.connect_count(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.factory.connect_count(), 2);
        assert_eq!(h.manager.current_state(), SessionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_code_outlives_dropped_transport_until_replaced() {
        let h = harness();
        h.manager.initialize().await;
        settle().await;
        h.factory
            .emit(0, TransportEvent::Connection(ConnectionUpdate::pairing("ABCD-EFGH")))
            .await;
        settle().await;

        h.factory
            .emit(
                0,
                TransportEvent::Connection(ConnectionUpdate::closed(CloseReason::ConnectionLost)),
            )
            .await;
        settle().await;

        assert_eq!(h.manager.current_state(), SessionState::Closed);
        assert_eq!(h.manager.current_pairing_code().as_deref(), Some("ABCD-EFGH"));
        let persisted = h.store.read_config().await.unwrap().unwrap();
        assert_eq!(persisted.pairing_code.as_deref(), Some("ABCD-EFGH"));

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(h.factory.connect_count(), 2);
        h.factory
            .emit(1, TransportEvent::Connection(ConnectionUpdate::pairing("WXYZ-1234")))
            .await;
        settle().await;

        assert_eq!(h.manager.current_pairing_code().as_deref(), Some("WXYZ-1234"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_logged_out_close_is_terminal() {
        let h = harness_with_store(MemoryCredentialStore::with_credentials(CredentialBlob::new(
            b"stale".to_vec(),
        )));
        h.manager.initialize().await;
        settle().await;
        h.factory
            .emit(0, TransportEvent::Connection(ConnectionUpdate::pairing("ABCD-EFGH")))
            .await;
        h.factory
            .emit(
                0,
                TransportEvent::Connection(ConnectionUpdate::closed(CloseReason::LoggedOut)),
            )
            .await;
        settle().await;

        assert_eq!(h.manager.current_state(), SessionState::LoggedOut);
        assert!(h.manager.current_pairing_code().is_none());
        assert!(h.store.read_credentials().await.unwrap().is_none());
        assert_eq!(
            h.store.read_config().await.unwrap(),
            Some(PersistedConfig {
                connected: false,
                pairing_code: None
            })
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.factory.connect_count(), 1);

        // An operator can start over
        h.manager.initialize().await;
        settle().await;
        assert_eq!(h.factory.connect_count(), 2);
        assert_eq!(h.factory.credentials_seen()[1], None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_resets_guard_without_retry() {
        let h = harness();
        h.factory.fail_next_connect();

        h.manager.initialize().await;
        settle().await;

        assert_eq!(h.manager.current_state(), SessionState::Closed);
        assert!(!h.manager.is_connecting());
        assert!(!h.store.read_config().await.unwrap().unwrap().connected);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.factory.connect_count(), 1);

        h.manager.initialize().await;
        settle().await;
        assert_eq!(h.factory.connect_count(), 2);
        assert_eq!(h.manager.current_state(), SessionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_stream_end_counts_as_connection_lost() {
        let h = harness();
        open(&h).await;

        h.factory.end_stream(0);
        settle().await;

        assert_eq!(h.manager.current_state(), SessionState::Closed);

        tokio::time::sleep(DEFAULT_RECONNECT_DELAY + Duration::from_millis(10)).await;
        assert_eq!(h.factory.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_logs_out_and_cancels_reconnect() {
        let h = harness_with_store(MemoryCredentialStore::with_credentials(CredentialBlob::new(
            b"saved".to_vec(),
        )));
        open(&h).await;

        h.manager.shutdown().await;

        assert_eq!(h.factory.transport(0).logout_count(), 1);
        assert_eq!(h.manager.current_state(), SessionState::LoggedOut);
        assert!(h.manager.transport().await.is_none());
        assert!(h.store.read_credentials().await.unwrap().is_none());
        assert_eq!(
            h.store.read_config().await.unwrap(),
            Some(PersistedConfig {
                connected: false,
                pairing_code: None
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_reconnect() {
        let h = harness();
        open(&h).await;

        h.factory
            .emit(
                0,
                TransportEvent::Connection(ConnectionUpdate::closed(CloseReason::Replaced)),
            )
            .await;
        settle().await;
        assert_eq!(h.manager.current_state(), SessionState::Closed);

        h.manager.shutdown().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(h.factory.connect_count(), 1);
        // The closed transport was already gone, nothing to log out
        assert_eq!(h.factory.transport(0).logout_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_keeps_credentials() {
        let h = harness_with_store(MemoryCredentialStore::with_credentials(CredentialBlob::new(
            b"saved".to_vec(),
        )));
        open(&h).await;

        h.manager.disconnect().await;

        assert_eq!(h.factory.transport(0).logout_count(), 0);
        assert_eq!(h.manager.current_state(), SessionState::Closed);
        assert!(h.store.read_credentials().await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.factory.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_from_superseded_transport_are_ignored() {
        let h = harness();
        open(&h).await;
        h.manager.disconnect().await;

        h.factory
            .emit(0, TransportEvent::Connection(ConnectionUpdate::opened()))
            .await;
        h.factory
            .emit(0, TransportEvent::Credentials(CredentialBlob::new(b"late".to_vec())))
            .await;
        settle().await;

        assert_eq!(h.manager.current_state(), SessionState::Closed);
        assert!(h.store.read_credentials().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_credentials_after_close_are_still_persisted() {
        let h = harness();
        open(&h).await;

        h.factory
            .emit(
                0,
                TransportEvent::Connection(ConnectionUpdate::closed(CloseReason::ConnectionLost)),
            )
            .await;
        h.factory
            .emit(0, TransportEvent::Credentials(CredentialBlob::new(b"final".to_vec())))
            .await;
        settle().await;

        assert_eq!(
            h.store.read_credentials().await.unwrap(),
            Some(CredentialBlob::new(b"final".to_vec()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_while_open_is_harmless() {
        let h = harness();
        open(&h).await;

        h.manager.initialize().await;
        settle().await;

        assert_eq!(h.factory.connect_count(), 1);
        assert_eq!(h.manager.current_state(), SessionState::Open);
        assert!(!h.manager.is_connecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_persisted_record_is_reset_on_start() {
        let store = MemoryCredentialStore::new();
        store
            .write_config(&PersistedConfig {
                connected: true,
                pairing_code: Some("OLD-CODE".into()),
            })
            .await
            .unwrap();

        let h = harness_with_store(store);
        settle().await;

        assert_eq!(
            h.store.read_config().await.unwrap(),
            Some(PersistedConfig {
                connected: false,
                pairing_code: None
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_sees_transitions() {
        let h = harness();
        let mut rx = h.manager.subscribe();

        h.manager.initialize().await;
        let status = tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|s| s.state == SessionState::Connecting),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();

        assert_eq!(status.state, SessionState::Connecting);
    }
}
