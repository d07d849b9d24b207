//! # Repository Module
//!
//! Database repositories for Reparo. SQL lives here and nowhere else.
//!
//! ## Available Repositories
//!
//! - [`session::MessagingSessionRepository`] - Messaging session flag, pairing
//!   code and credential blob

pub mod session;
