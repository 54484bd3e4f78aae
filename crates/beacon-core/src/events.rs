//! Notification events carried by the event channel.
//!
//! Every frame payload is a JSON object with a `type` discriminant. The
//! transport and parser layers treat the rest of the object as opaque; it is
//! kept verbatim in [`NotificationEvent::payload`] so subscribers of unknown
//! kinds still see everything the server sent.
//!
//! [`KnownEvent`] is the typed view for kinds the application understands.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EventDecodeError;

/// Discriminant values of recognised event kinds.
pub mod kinds {
    /// A chat's status changed; receipt alone should trigger a refresh.
    pub const CHAT_STATUS_UPDATE: &str = "chat_status_update";
}

/// One decoded notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Value of the payload's `type` field.
    pub kind: String,
    /// The full payload object, discriminant included.
    pub payload: Value,
}

impl NotificationEvent {
    /// Build an event from a kind and payload without going through JSON text.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Decode one frame payload.
    ///
    /// The payload must be a JSON object whose `type` field is a string.
    pub fn from_payload(data: &str) -> Result<Self, EventDecodeError> {
        let payload: Value = serde_json::from_str(data)?;
        let kind = match &payload {
            Value::Object(map) => match map.get("type") {
                Some(Value::String(kind)) => kind.clone(),
                _ => return Err(EventDecodeError::MissingType),
            },
            _ => return Err(EventDecodeError::NotAnObject),
        };
        Ok(Self { kind, payload })
    }

    /// Typed view of this event, or `None` for kinds this build does not know.
    pub fn known(&self) -> Option<KnownEvent> {
        serde_json::from_value(self.payload.clone()).ok()
    }

    /// Whether this event carries the given discriminant.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Event kinds the application understands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KnownEvent {
    /// A chat changed status. Consumers refresh their chat list on receipt.
    #[serde(rename = "chat_status_update")]
    ChatStatusUpdate {
        /// Chat the update refers to, when the server includes it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chat_id: Option<String>,
        /// New status label, when the server includes it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
}

impl KnownEvent {
    /// Wire discriminant of this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatStatusUpdate { .. } => kinds::CHAT_STATUS_UPDATE,
        }
    }
}
