//! Settings type definitions.
//!
//! All types use camelCase JSON field names and `#[serde(default)]`, so a
//! partial settings file only needs the keys it changes.

mod channel;
mod logging;

pub use channel::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "channel": { "endpoint": "https://learn.example.com/api/notifications/stream" },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeaconSettings {
    /// Settings schema version.
    pub version: String,
    /// Notification channel settings.
    pub channel: ChannelSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for BeaconSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            channel: ChannelSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl BeaconSettings {
    /// Reject values the channel cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.channel.endpoint.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "channel.endpoint is empty".to_string(),
            ));
        }
        if self.channel.retry_delay_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "channel.retryDelayMs must be greater than zero".to_string(),
            ));
        }
        if self.channel.max_buffer_bytes == 0 {
            return Err(SettingsError::InvalidValue(
                "channel.maxBufferBytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(BeaconSettings::default()).unwrap();
        assert!(json["channel"]["retryDelayMs"].is_u64());
        assert!(json["channel"]["maxBufferBytes"].is_u64());
        assert_eq!(json["logging"]["json"], false);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: BeaconSettings =
            serde_json::from_str(r#"{"channel": {"retryDelayMs": 250}}"#).unwrap();
        assert_eq!(settings.channel.retry_delay_ms, 250);
        assert_eq!(
            settings.channel.endpoint,
            ChannelSettings::default().endpoint
        );
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn validate_rejects_empty_endpoint() {
        let mut settings = BeaconSettings::default();
        settings.channel.endpoint = "  ".to_string();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_delay() {
        let mut settings = BeaconSettings::default();
        settings.channel.retry_delay_ms = 0;
        assert!(settings.validate().is_err());
    }
}
