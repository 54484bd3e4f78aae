//! # beacon-settings
//!
//! Configuration for the beacon notification channel, loaded from three
//! layers (in priority order):
//! 1. **Compiled defaults**: [`BeaconSettings::default()`]
//! 2. **User file**: `~/.beacon/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `BEACON_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use beacon_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("events endpoint: {}", settings.channel.endpoint);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton, filled on first [`get_settings`] call.
static SETTINGS: OnceLock<BeaconSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// The first call loads `~/.beacon/settings.json` with env overrides and
/// falls back to compiled defaults if loading or validation fails.
pub fn get_settings() -> &'static BeaconSettings {
    SETTINGS.get_or_init(|| {
        load_settings()
            .and_then(|s| s.validate().map(|()| s))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default settings");
                BeaconSettings::default()
            })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: BeaconSettings) -> std::result::Result<(), BeaconSettings> {
    SETTINGS.set(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = BeaconSettings::default();
        let _path = settings_path();
        let _channel = ChannelSettings::default();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = BeaconSettings::default();
        assert_eq!(settings.version, "0.1.0");
        assert_eq!(settings.channel.retry_delay_ms, 5000);
        assert_eq!(settings.channel.retry_jitter_ms, 0);
        assert_eq!(settings.logging.level, "warn");
        assert!(settings.validate().is_ok());
    }
}
