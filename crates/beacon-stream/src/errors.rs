//! Error types for the notification channel.
//!
//! None of these ever escape the channel's background tasks: transport
//! errors end the current connection and schedule a retry, handler errors
//! are logged at the dispatch site. They surface only through [`Transport`]
//! implementations, [`EventBus`] reports, and [`NotificationChannel::start`].
//!
//! [`Transport`]: crate::transport::Transport
//! [`EventBus`]: crate::bus::EventBus
//! [`NotificationChannel::start`]: crate::channel::NotificationChannel::start

use std::time::Duration;

/// Error returned by a subscriber's handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of one connection attempt or of an open stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP request or body read failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("stream request rejected ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Reason phrase or short description.
        message: String,
    },

    /// No response headers arrived within the connect timeout.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// The body stream failed mid-read.
    #[error("stream read failed: {message}")]
    Read {
        /// Error description.
        message: String,
    },

    /// Undelimited text grew past the configured limit.
    #[error("frame buffer overflow: {size} bytes exceeds limit of {limit}")]
    BufferOverflow {
        /// Bytes currently buffered.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },
}

impl TransportError {
    /// Error category string for structured log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Status { .. } => "status",
            Self::Timeout(_) => "timeout",
            Self::Read { .. } => "read",
            Self::BufferOverflow { .. } => "overflow",
        }
    }
}

/// Lifecycle misuse of a [`NotificationChannel`](crate::channel::NotificationChannel).
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// `start` was called on a channel that is already running.
    #[error("notification channel already started")]
    AlreadyStarted,

    /// `start` was called after `stop`; stopping is permanent.
    #[error("notification channel has been stopped")]
    Stopped,
}
