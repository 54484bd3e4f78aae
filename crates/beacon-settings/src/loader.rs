//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BeaconSettings::default()`]
//! 2. If `~/.beacon/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `BEACON_*` environment variable overrides

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::BeaconSettings;

/// Resolve the path to the settings file (`~/.beacon/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".beacon").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BeaconSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<BeaconSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<BeaconSettings> {
    let defaults = serde_json::to_value(BeaconSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Overlay a user `settings.json` value onto the serialized defaults.
///
/// Nested sections such as `channel` merge key by key, so a file that only sets
/// `channel.retryDelayMs` keeps the default endpoint. A `null` in the file
/// leaves the default untouched. Any other value, arrays included, replaces
/// the default outright.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay.into_iter().filter(|(_, v)| !v.is_null()) {
                let value = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (target, Value::Null) => target,
        (_, source) => source,
    }
}

/// Apply `BEACON_*` environment variable overrides to loaded settings.
///
/// Out-of-range or unparsable values are ignored with a warning.
pub fn apply_env_overrides(settings: &mut BeaconSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
pub fn apply_overrides_from<F>(settings: &mut BeaconSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Channel ─────────────────────────────────────────────────────
    if let Some(v) = env.string("BEACON_EVENTS_URL") {
        settings.channel.endpoint = v;
    }
    if let Some(v) = env.in_range("BEACON_RETRY_DELAY_MS", 100..=600_000) {
        settings.channel.retry_delay_ms = v;
    }
    if let Some(v) = env.in_range("BEACON_RETRY_JITTER_MS", 0..=60_000) {
        settings.channel.retry_jitter_ms = v;
    }
    if let Some(v) = env.in_range("BEACON_CONNECT_TIMEOUT_MS", 100..=600_000) {
        settings.channel.connect_timeout_ms = v;
    }
    if let Some(v) = env.in_range("BEACON_MAX_BUFFER_BYTES", 1024..=64 * 1024 * 1024) {
        settings.channel.max_buffer_bytes = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("BEACON_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("BEACON_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Value parsing ───────────────────────────────────────────────────────────

/// Parse a `BEACON_*` flag such as `BEACON_LOG_JSON`.
///
/// Accepts `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`, ignoring case and
/// surrounding whitespace.
pub fn parse_bool(val: &str) -> Option<bool> {
    const TRUE: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSE: [&str; 4] = ["false", "0", "no", "off"];
    let val = val.trim();
    if TRUE.iter().any(|t| val.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSE.iter().any(|f| val.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

/// Parse a numeric `BEACON_*` value (milliseconds, byte counts) and keep it
/// only if it falls inside `range`.
pub fn parse_in_range<T>(val: &str, range: &RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    val.trim().parse().ok().filter(|n| range.contains(n))
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn in_range<T>(&self, name: &str, range: RangeInclusive<T>) -> Option<T>
    where
        T: FromStr + PartialOrd + std::fmt::Debug,
    {
        let val = (self.lookup)(name)?;
        let result = parse_in_range(&val, &range);
        if result.is_none() {
            warn!(key = name, value = %val, ?range, "env var not a number in range, ignoring");
        }
        result
    }
}
