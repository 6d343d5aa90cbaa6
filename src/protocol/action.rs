//! Client-originated protocol actions.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::protocol::event::AckKind;

/// Room category understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    /// Server channel room.
    #[default]
    Channel,
    /// Direct-message room.
    Dm,
}

impl RoomType {
    /// Wire name of this room type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RoomType::Channel => "channel",
            RoomType::Dm => "dm",
        }
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound intent sent over an open connection.
///
/// Each action serializes to exactly one text frame; transmission order per
/// connection follows issuance order. Server acknowledgement order carries
/// no such guarantee.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Action {
    /// Subscribe to a room.
    JoinRoom {
        /// Target room identifier.
        room_id: String,
        /// Room category.
        room_type: RoomType,
    },
    /// Unsubscribe from a room.
    LeaveRoom {
        /// Target room identifier.
        room_id: String,
        /// Room category.
        room_type: RoomType,
    },
    /// Publish a chat message into a room.
    SendMessage {
        /// Target room identifier.
        room_id: String,
        /// Room category.
        room_type: RoomType,
        /// Message body.
        content: String,
    },
    /// Application-level keepalive.
    Ping,
}

impl Action {
    /// Create a join action.
    #[must_use]
    pub fn join_room(room_id: impl Into<String>, room_type: RoomType) -> Self {
        Action::JoinRoom {
            room_id: room_id.into(),
            room_type,
        }
    }

    /// Create a leave action.
    #[must_use]
    pub fn leave_room(room_id: impl Into<String>, room_type: RoomType) -> Self {
        Action::LeaveRoom {
            room_id: room_id.into(),
            room_type,
        }
    }

    /// Create a send-message action.
    #[must_use]
    pub fn send_message(
        room_id: impl Into<String>,
        room_type: RoomType,
        content: impl Into<String>,
    ) -> Self {
        Action::SendMessage {
            room_id: room_id.into(),
            room_type,
            content: content.into(),
        }
    }

    /// Create a ping action.
    #[must_use]
    pub const fn ping() -> Self {
        Action::Ping
    }

    /// Wire tag carried in the envelope's `action` field.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Action::JoinRoom { .. } => "join_room",
            Action::LeaveRoom { .. } => "leave_room",
            Action::SendMessage { .. } => "send_message",
            Action::Ping => "ping",
        }
    }

    /// The acknowledgement kind this action is expected to produce.
    #[must_use]
    pub const fn expected_ack(&self) -> AckKind {
        match self {
            Action::JoinRoom { .. } => AckKind::Join,
            Action::LeaveRoom { .. } => AckKind::Leave,
            Action::SendMessage { .. } => AckKind::MessageSent,
            Action::Ping => AckKind::Pong,
        }
    }

    /// Room the action targets, if any.
    #[must_use]
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Action::JoinRoom { room_id, .. }
            | Action::LeaveRoom { room_id, .. }
            | Action::SendMessage { room_id, .. } => Some(room_id),
            Action::Ping => None,
        }
    }

    /// Serialize into the `{action, data}` envelope as a single text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialize`](crate::Error::Serialize) if the payload
    /// cannot be encoded.
    pub fn to_frame(&self) -> Result<String> {
        let data = match self {
            Action::JoinRoom { room_id, room_type } | Action::LeaveRoom { room_id, room_type } => {
                json!({ "room_id": room_id, "room_type": room_type })
            }
            Action::SendMessage {
                room_id,
                room_type,
                content,
            } => json!({ "room_id": room_id, "room_type": room_type, "content": content }),
            Action::Ping => json!({}),
        };
        let envelope = json!({ "action": self.tag(), "data": data });
        Ok(serde_json::to_string(&envelope)?)
    }
}
