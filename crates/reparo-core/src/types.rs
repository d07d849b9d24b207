//! # Domain Types
//!
//! Service-desk records that flow into customer notifications.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  NotificationEvent                                                      │
//! │  ├── ServiceCreated(ServiceNotice)                                      │
//! │  └── ServiceStatusChanged(ServiceNotice)                                │
//! │                                                                         │
//! │  ServiceNotice                                                          │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ServiceTicket  │   │    Customer     │   │      Store      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  service_number │   │  name           │   │  name           │       │
//! │  │  status         │   │  phone          │   │  phone          │       │
//! │  │  parts[]        │   └─────────────────┘   │  address?       │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records are loaded by the surrounding application; this crate only reads
//! them. Optional fields are `Option` so the composer can drop whole
//! sections when they are absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Rupiah;

// =============================================================================
// Service Status
// =============================================================================

/// Lifecycle status of a service ticket.
///
/// Statuses arrive as free-form strings from the data store, so parsing is
/// total: anything unrecognized is kept verbatim in [`ServiceStatus::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceStatus {
    /// Received, not yet looked at.
    #[default]
    Pending,
    /// A technician is diagnosing the device.
    Checking,
    /// Repair work is underway.
    InProgress,
    /// Blocked on a part order.
    WaitingParts,
    /// Repair done, waiting for the customer to pay.
    WaitingPayment,
    /// Waiting for the customer to approve the quote.
    WaitingConfirmation,
    /// Final testing after repair.
    Testing,
    /// Repair finished, device ready for pickup.
    Completed,
    /// Device handed back to the customer.
    Delivered,
    /// Service cancelled.
    Cancelled,
    /// Any status string this version does not know about.
    Unknown(String),
}

impl ServiceStatus {
    /// Parses a status string. Never fails.
    ///
    /// Matching is case-insensitive and treats `-`, `_` and spaces alike,
    /// so `in-progress`, `IN_PROGRESS` and `in progress` are the same status.
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();

        match key.as_str() {
            "pending" => ServiceStatus::Pending,
            "checking" => ServiceStatus::Checking,
            "in_progress" => ServiceStatus::InProgress,
            "waiting_parts" => ServiceStatus::WaitingParts,
            "waiting_payment" => ServiceStatus::WaitingPayment,
            "waiting_confirmation" => ServiceStatus::WaitingConfirmation,
            "testing" => ServiceStatus::Testing,
            "completed" => ServiceStatus::Completed,
            "delivered" => ServiceStatus::Delivered,
            "cancelled" | "canceled" => ServiceStatus::Cancelled,
            _ => ServiceStatus::Unknown(raw.to_string()),
        }
    }

    /// Returns the canonical snake_case spelling.
    pub fn as_str(&self) -> &str {
        match self {
            ServiceStatus::Pending => "pending",
            ServiceStatus::Checking => "checking",
            ServiceStatus::InProgress => "in_progress",
            ServiceStatus::WaitingParts => "waiting_parts",
            ServiceStatus::WaitingPayment => "waiting_payment",
            ServiceStatus::WaitingConfirmation => "waiting_confirmation",
            ServiceStatus::Testing => "testing",
            ServiceStatus::Completed => "completed",
            ServiceStatus::Delivered => "delivered",
            ServiceStatus::Cancelled => "cancelled",
            ServiceStatus::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ServiceStatus {
    fn from(raw: String) -> Self {
        ServiceStatus::parse(&raw)
    }
}

impl From<&str> for ServiceStatus {
    fn from(raw: &str) -> Self {
        ServiceStatus::parse(raw)
    }
}

impl From<ServiceStatus> for String {
    fn from(status: ServiceStatus) -> Self {
        status.as_str().to_string()
    }
}

// =============================================================================
// Service Ticket
// =============================================================================

/// A part used (or quoted) for a repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePart {
    /// Part name as printed on the quote.
    pub name: String,

    /// Number of units.
    pub quantity: u32,

    /// Price of a single unit.
    pub unit_price: Rupiah,
}

impl ServicePart {
    /// Returns `quantity × unit_price`.
    pub fn line_total(&self) -> Rupiah {
        self.unit_price * self.quantity
    }
}

/// A device repair job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTicket {
    /// Human-facing service number (e.g. `SRV-20240501-0007`).
    pub service_number: String,

    /// Current status.
    #[serde(default)]
    pub status: ServiceStatus,

    /// When the device was received at the counter.
    pub received_at: DateTime<Utc>,

    /// When the repair was completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Device category (e.g. "Laptop", "Smartphone").
    pub device_type: String,

    #[serde(default)]
    pub brand: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub serial_number: Option<String>,

    /// Problem as described by the customer.
    pub problem_description: String,

    #[serde(default)]
    pub symptoms: Option<String>,

    #[serde(default)]
    pub technician_notes: Option<String>,

    /// Quote given at intake.
    #[serde(default)]
    pub estimated_cost: Option<Rupiah>,

    #[serde(default)]
    pub diagnosis: Option<String>,

    #[serde(default)]
    pub solution: Option<String>,

    /// Final billed cost.
    #[serde(default)]
    pub actual_cost: Option<Rupiah>,

    #[serde(default)]
    pub parts: Vec<ServicePart>,
}

impl ServiceTicket {
    /// Sum of all part line totals.
    pub fn parts_subtotal(&self) -> Rupiah {
        self.parts.iter().map(ServicePart::line_total).sum()
    }

    /// Device type, brand and model joined with spaces, skipping blanks.
    pub fn device_summary(&self) -> String {
        [
            Some(self.device_type.as_str()),
            self.brand.as_deref(),
            self.model.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

// =============================================================================
// Customer & Store
// =============================================================================

/// The customer who owns the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,

    /// Free-form phone number as typed at the counter.
    pub phone: String,
}

/// The shop branch handling the ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub name: String,

    pub phone: String,

    #[serde(default)]
    pub address: Option<String>,
}

// =============================================================================
// Notification Event
// =============================================================================

/// Everything a notification needs about one ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceNotice {
    pub ticket: ServiceTicket,
    pub customer: Customer,
    pub store: Store,
}

/// A business event that results in a customer message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    /// A new service ticket was opened.
    ServiceCreated(ServiceNotice),

    /// An existing ticket moved to a new status.
    ServiceStatusChanged(ServiceNotice),
}

impl NotificationEvent {
    /// Returns the notice carried by either variant.
    pub fn notice(&self) -> &ServiceNotice {
        match self {
            NotificationEvent::ServiceCreated(notice)
            | NotificationEvent::ServiceStatusChanged(notice) => notice,
        }
    }

    /// Phone number the message should go to.
    pub fn recipient_phone(&self) -> &str {
        &self.notice().customer.phone
    }

    /// Returns the event name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::ServiceCreated(_) => "service_created",
            NotificationEvent::ServiceStatusChanged(_) => "service_status_changed",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
