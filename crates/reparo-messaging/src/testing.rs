//! In-process fakes shared by the session and dispatcher tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use reparo_core::Address;

use crate::error::{MessagingError, MessagingResult};
use crate::session::{SessionObserver, SessionState};
use crate::transport::{
    CredentialBlob, Transport, TransportConnection, TransportEvent, TransportFactory,
};

// =============================================================================
// Fake Transport
// =============================================================================

#[derive(Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<(String, String)>>,
    logouts: AtomicUsize,
    reject_sends: AtomicBool,
}

impl FakeTransport {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }

    pub fn reject_sends(&self) {
        self.reject_sends.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_text(&self, to: &Address, text: &str) -> MessagingResult<()> {
        if self.reject_sends.load(Ordering::SeqCst) {
            return Err(MessagingError::SendRejected("recipient not on network".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.as_str().to_string(), text.to_string()));
        Ok(())
    }

    async fn logout(&self) -> MessagingResult<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Fake Factory
// =============================================================================

#[derive(Default)]
struct FactoryState {
    credentials_seen: Vec<Option<CredentialBlob>>,
    transports: Vec<Arc<FakeTransport>>,
    event_txs: Vec<Option<mpsc::Sender<TransportEvent>>>,
    fail_next: bool,
}

/// Records every connect and hands the test the event sender.
#[derive(Clone, Default)]
pub struct FakeFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connect attempts, failed ones included.
    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().credentials_seen.len()
    }

    pub fn credentials_seen(&self) -> Vec<Option<CredentialBlob>> {
        self.state.lock().unwrap().credentials_seen.clone()
    }

    pub fn fail_next_connect(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    /// Transport built by the `index`-th successful connect.
    pub fn transport(&self, index: usize) -> Arc<FakeTransport> {
        self.state.lock().unwrap().transports[index].clone()
    }

    /// Pushes an event out of the `index`-th transport.
    pub async fn emit(&self, index: usize, event: TransportEvent) {
        let tx = self.state.lock().unwrap().event_txs[index]
            .clone()
            .expect("event stream already ended");
        tx.send(event).await.expect("forwarder gone");
    }

    /// Ends the `index`-th transport's event stream.
    pub fn end_stream(&self, index: usize) {
        self.state.lock().unwrap().event_txs[index].take();
    }
}

#[async_trait]
impl TransportFactory for FakeFactory {
    async fn connect(
        &self,
        credentials: Option<CredentialBlob>,
    ) -> MessagingResult<TransportConnection> {
        let mut state = self.state.lock().unwrap();
        state.credentials_seen.push(credentials);

        if std::mem::take(&mut state.fail_next) {
            return Err(MessagingError::ConnectionFailed("bridge unreachable".into()));
        }

        let (tx, rx) = mpsc::channel(64);
        let transport = Arc::new(FakeTransport::default());
        state.transports.push(transport.clone());
        state.event_txs.push(Some(tx));

        Ok(TransportConnection {
            transport,
            events: rx,
        })
    }
}

// =============================================================================
// Recording Observer
// =============================================================================

#[derive(Default)]
pub struct RecordingObserver {
    pairing_codes: Mutex<Vec<String>>,
    states: Mutex<Vec<SessionState>>,
}

impl RecordingObserver {
    pub fn pairing_codes(&self) -> Vec<String> {
        self.pairing_codes.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_pairing_code(&self, code: &str) {
        self.pairing_codes.lock().unwrap().push(code.to_string());
    }

    fn on_state_change(&self, state: SessionState) {
        self.states.lock().unwrap().push(state);
    }
}
