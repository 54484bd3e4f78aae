//! # beacon-stream
//!
//! Real-time notification channel over a long-lived HTTP response.
//!
//! - **Transport**: [`Transport`] opens one authenticated streaming response;
//!   [`HttpTransport`] is the `reqwest` implementation
//! - **Framing**: [`Utf8Decoder`] and [`FrameParser`] turn body bytes into
//!   frame payloads, tolerant of arbitrary chunk boundaries
//! - **Dispatch**: [`EventBus`] routes decoded events to subscribers by kind,
//!   isolating failing handlers
//! - **Lifecycle**: [`NotificationChannel`] reconnects after a fixed delay until
//!   stopped, reading the credential fresh on every attempt

#![deny(unsafe_code)]

pub mod bus;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod decoder;
pub mod errors;
pub mod frame;
pub mod retry;
pub mod transport;

pub use bus::{EventBus, EventHandler, PublishReport, Subscription};
pub use channel::{ChannelState, ChannelStats, ConnectionState, NotificationChannel};
pub use config::ChannelConfig;
pub use credentials::{CredentialProvider, CredentialSlot};
pub use decoder::Utf8Decoder;
pub use errors::{ChannelError, HandlerError, TransportError};
pub use frame::FrameParser;
pub use retry::RetrySchedule;
pub use transport::{ByteStream, HttpTransport, Transport};
