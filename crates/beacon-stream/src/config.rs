//! Runtime configuration of a [`NotificationChannel`](crate::channel::NotificationChannel).

use std::time::Duration;

use beacon_settings::ChannelSettings;

/// Channel tuning, in the units the runtime works with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Fixed delay before each reconnection attempt.
    pub retry_delay: Duration,
    /// Upper bound of uniform jitter added to `retry_delay`. Zero disables jitter.
    pub retry_jitter: Duration,
    /// Largest amount of undelimited text buffered before the connection is dropped.
    pub max_buffer_bytes: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::from(&ChannelSettings::default())
    }
}

impl From<&ChannelSettings> for ChannelConfig {
    fn from(settings: &ChannelSettings) -> Self {
        Self {
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            retry_jitter: Duration::from_millis(settings.retry_jitter_ms),
            max_buffer_bytes: settings.max_buffer_bytes,
        }
    }
}

impl ChannelConfig {
    /// Set the retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the retry jitter bound.
    #[must_use]
    pub const fn with_retry_jitter(mut self, jitter: Duration) -> Self {
        self.retry_jitter = jitter;
        self
    }

    /// Set the buffer limit.
    #[must_use]
    pub const fn with_max_buffer_bytes(mut self, limit: usize) -> Self {
        self.max_buffer_bytes = limit;
        self
    }
}
