//! # Stream Transport
//!
//! Opens one long-lived streaming request and hands back its raw body.
//!
//! The transport never retries and keeps no state between attempts: each
//! [`Transport::open`] is one connection. Decoding and framing happen in the
//! channel so every connection gets a fresh decoder and parser.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use beacon_settings::ChannelSettings;

use crate::errors::TransportError;

/// Raw response body of an open connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Opens streaming connections to the notification endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request with `credential` as bearer token.
    ///
    /// Returns once response headers are accepted. A non-success response is
    /// an error, never an empty stream.
    async fn open(&self, credential: &SecretString) -> Result<ByteStream, TransportError>;
}

/// [`Transport`] over HTTP using `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    connect_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport for `endpoint` using an existing client.
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_millis(ChannelSettings::default().connect_timeout_ms),
        }
    }

    /// Build a client and transport from channel settings.
    pub fn from_settings(settings: &ChannelSettings) -> Result<Self, TransportError> {
        let connect_timeout = Duration::from_millis(settings.connect_timeout_ms);
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self::new(client, settings.endpoint.clone()).with_connect_timeout(connect_timeout))
    }

    /// Bound on the time to receive response headers.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Target endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, credential: &SecretString) -> Result<ByteStream, TransportError> {
        debug!(endpoint = %self.endpoint, "opening notification stream");

        let request = self
            .client
            .get(&self.endpoint)
            .bearer_auth(credential.expose_secret())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        let response = tokio::time::timeout(self.connect_timeout, request.send())
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))??;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from));
        Ok(Box::pin(body))
    }
}
