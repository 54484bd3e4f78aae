//! Event decoding errors.

use thiserror::Error;

/// Why a frame payload could not be turned into a [`NotificationEvent`].
///
/// [`NotificationEvent`]: crate::events::NotificationEvent
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// The payload is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload parsed, but its root is not a JSON object.
    #[error("payload root is not an object")]
    NotAnObject,

    /// The object has no string `type` field.
    #[error("payload has no string `type` discriminant")]
    MissingType,
}

impl EventDecodeError {
    /// Short category string for structured log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Json(_) => "json",
            Self::NotAnObject => "shape",
            Self::MissingType => "discriminant",
        }
    }
}
