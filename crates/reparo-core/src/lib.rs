//! # reparo-core: Pure Notification Logic for Reparo
//!
//! Domain records, phone-address normalization and message rendering for the
//! Reparo service-desk notifier. Nothing in this crate touches the network,
//! the database or the clock.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Reparo Notifier                                  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/notifier (binary)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        reparo-messaging (session, bridge, dispatcher)           │   │
//! │  └──────────────┬───────────────────────────────┬──────────────────┘   │
//! │                 │                               │                       │
//! │  ┌──────────────▼──────────────────┐  ┌─────────▼──────────────────┐   │
//! │  │    ★ reparo-core (THIS CRATE) ★  │  │  reparo-db (SQLite store)  │   │
//! │  │                                  │  └────────────────────────────┘   │
//! │  │  types   phone   notification    │                                   │
//! │  │  money   error                   │                                   │
//! │  └──────────────────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Service tickets, customers, stores and notification events
//! - [`money`] - Whole-Rupiah amounts
//! - [`phone`] - Phone number to network address normalization
//! - [`notification`] - Message text for service events
//! - [`error`] - Validation errors
//!
//! ## Example Usage
//!
//! ```rust
//! use reparo_core::phone::normalize;
//!
//! let to = normalize("0812-3456-7890");
//! assert_eq!(to.as_str(), "6281234567890@s.whatsapp.net");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod notification;
pub mod phone;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::ValidationError;
pub use money::Rupiah;
pub use notification::NotificationComposer;
pub use phone::Address;
pub use types::*;
