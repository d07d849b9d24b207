//! # Notification Dispatcher
//!
//! Best-effort delivery of customer messages over the session.
//!
//! ```text
//! notify(event) ──► NotificationComposer::render ──┐
//!                                                  ▼
//! send(raw_phone, text) ── state != Open ──► false (no I/O)
//!        │
//!        ├── phone::normalize(raw_phone)
//!        └── Transport::send_text ── Ok ──► true
//!                                  └─ Err ──► warn!, false
//! ```
//!
//! Callers get a bool and nothing else. A failed send never raises, and it
//! is never queued or retried.

use tracing::{debug, info, warn};

use reparo_core::phone;
use reparo_core::{NotificationComposer, NotificationEvent};

use crate::session::{ConnectionManager, SessionState};

/// Sends text messages through the shared session.
#[derive(Clone)]
pub struct Dispatcher {
    manager: ConnectionManager,
    composer: NotificationComposer,
}

impl Dispatcher {
    pub fn new(manager: ConnectionManager, composer: NotificationComposer) -> Self {
        Dispatcher { manager, composer }
    }

    /// Sends `text` to `raw_phone`. Returns true if the network accepted it.
    pub async fn send(&self, raw_phone: &str, text: &str) -> bool {
        let state = self.manager.current_state();
        if state != SessionState::Open {
            debug!(%state, "Session not open, skipping send");
            return false;
        }

        let Some(transport) = self.manager.transport().await else {
            debug!("No live transport, skipping send");
            return false;
        };

        let to = phone::normalize(raw_phone);
        match transport.send_text(&to, text).await {
            Ok(()) => {
                info!(to = %to, chars = text.chars().count(), "Message sent");
                true
            }
            Err(e) => {
                warn!(to = %to, error = %e, "Failed to send message");
                false
            }
        }
    }

    /// Renders `event` and sends it to the customer on the ticket.
    pub async fn notify(&self, event: &NotificationEvent) -> bool {
        let text = self.composer.render(event);
        let sent = self.send(event.recipient_phone(), &text).await;

        debug!(
            kind = event.kind(),
            service_number = %event.notice().ticket.service_number,
            sent,
            "Notification dispatched"
        );
        sent
    }

    /// Returns the composer used by [`Dispatcher::notify`].
    pub fn composer(&self) -> &NotificationComposer {
        &self.composer
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
