//! # beacon-core
//!
//! Shared vocabulary for the beacon notification channel:
//!
//! - **Events**: [`NotificationEvent`] decoded from one frame payload, routed by its
//!   `type` discriminant, with a typed [`KnownEvent`] view for recognised kinds
//! - **Errors**: [`EventDecodeError`] for payloads that cannot become events
//! - **Logging**: `tracing` subscriber setup shared by binaries and tests
//! - **Text**: char-boundary-safe previews for diagnostics

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod logging;
pub mod text;

pub use errors::EventDecodeError;
pub use events::{KnownEvent, NotificationEvent, kinds};
