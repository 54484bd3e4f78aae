use serde::{Deserialize, Serialize};

/// Notification channel settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// URL of the streaming notifications endpoint.
    pub endpoint: String,
    /// Fixed delay before every reconnection attempt, in milliseconds.
    pub retry_delay_ms: u64,
    /// Upper bound of random jitter added to the retry delay, in milliseconds.
    /// Zero keeps the delay fixed.
    pub retry_jitter_ms: u64,
    /// Timeout for establishing the connection and receiving headers, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Largest amount of undelimited text buffered before the connection is dropped.
    pub max_buffer_bytes: usize,
    /// `User-Agent` header sent with the stream request.
    pub user_agent: String,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/notifications/stream".to_string(),
            retry_delay_ms: 5000,
            retry_jitter_ms: 0,
            connect_timeout_ms: 10_000,
            max_buffer_bytes: 1024 * 1024,
            user_agent: concat!("beacon/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
