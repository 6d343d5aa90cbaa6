//! Server-originated events and acknowledgement classification.

use std::time::Instant;

use serde::Deserialize;
use serde_json::Value;

use crate::config::AckPolicy;

/// Free-text fragments legacy gateway builds use for join acks.
const LEGACY_JOIN_MARKERS: [&str; 2] = ["加入房間成功", "成功加入"];

/// Free-text fragments legacy gateway builds use for leave acks.
const LEGACY_LEAVE_MARKERS: [&str; 2] = ["離開房間成功", "成功離開"];

/// Classification of an inbound frame, keyed on its `action` tag only.
///
/// The free-text message is never consulted here; substring matching is
/// confined to the legacy-status shim in [`Event::matches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    /// Join acknowledged (`room_joined`).
    RoomJoined,
    /// Leave acknowledged (`room_left`).
    RoomLeft,
    /// Own message accepted and echoed back (`message_sent`).
    MessageSent,
    /// Broadcast from another participant (`new_message`).
    NewMessage,
    /// Keepalive reply (`pong`).
    Pong,
    /// Generic status push; legacy builds ack join/leave this way.
    Status,
    /// Explicit protocol error frame.
    Error,
    /// Any tag this harness does not classify.
    Other,
}

impl EventKind {
    /// Classify a wire tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "room_joined" => EventKind::RoomJoined,
            "room_left" => EventKind::RoomLeft,
            "message_sent" => EventKind::MessageSent,
            "new_message" => EventKind::NewMessage,
            "pong" => EventKind::Pong,
            "status" => EventKind::Status,
            "error" => EventKind::Error,
            _ => EventKind::Other,
        }
    }
}

/// Acknowledgement categories a scripted action can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckKind {
    /// Room entry confirmed.
    Join,
    /// Room exit confirmed.
    Leave,
    /// Own message accepted.
    MessageSent,
    /// Ping answered.
    Pong,
}

#[derive(Deserialize)]
struct Envelope {
    action: String,
    #[serde(default)]
    data: Value,
}

/// A frame received from the gateway.
#[derive(Debug, Clone)]
pub struct Event {
    /// Raw `action` tag as received.
    pub tag: String,
    /// Classification of the tag.
    pub kind: EventKind,
    /// Opaque payload under `data`.
    pub data: Value,
    /// Arrival timestamp.
    pub received_at: Instant,
}

impl Event {
    /// Parse a raw text frame into an event.
    ///
    /// # Errors
    ///
    /// Returns the decode error for malformed frames; callers log and skip,
    /// a single bad frame never aborts the interaction.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        let envelope: Envelope = serde_json::from_str(raw)?;
        let kind = EventKind::from_tag(&envelope.action);
        Ok(Self {
            tag: envelope.action,
            kind,
            data: envelope.data,
            received_at: Instant::now(),
        })
    }

    /// Human-readable message carried in the payload, if any.
    #[must_use]
    pub fn message_text(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// Check whether the payload names the given room.
    ///
    /// Structured `room_id` fields are checked first; legacy status acks
    /// only carry the room id inside their free-text message.
    #[must_use]
    pub fn mentions_room(&self, room_id: &str) -> bool {
        if self
            .data
            .get("room_id")
            .and_then(Value::as_str)
            .is_some_and(|id| id == room_id)
        {
            return true;
        }
        self.message_text().is_some_and(|msg| msg.contains(room_id))
    }

    /// Decide whether this event acknowledges the given kind of action.
    ///
    /// Classification is tag-keyed; the `status`-substring path only runs
    /// when the policy enables the legacy shim. With `require_room_match`
    /// the ack must additionally name the room the action targeted.
    #[must_use]
    pub fn matches(&self, ack: AckKind, policy: &AckPolicy, room_id: Option<&str>) -> bool {
        let tag_match = match (ack, self.kind) {
            (AckKind::Join, EventKind::RoomJoined) => true,
            (AckKind::Leave, EventKind::RoomLeft) => true,
            (AckKind::MessageSent, EventKind::MessageSent) => true,
            (AckKind::Pong, EventKind::Pong) => true,
            (AckKind::Join, EventKind::Status) if policy.legacy_status_matching => {
                self.has_legacy_marker(&LEGACY_JOIN_MARKERS)
            }
            (AckKind::Leave, EventKind::Status) if policy.legacy_status_matching => {
                self.has_legacy_marker(&LEGACY_LEAVE_MARKERS)
            }
            _ => false,
        };
        if !tag_match {
            return false;
        }
        match (policy.require_room_match, room_id) {
            (true, Some(room)) => self.mentions_room(room),
            _ => true,
        }
    }

    fn has_legacy_marker(&self, markers: &[&str]) -> bool {
        self.message_text()
            .is_some_and(|msg| markers.iter().any(|m| msg.contains(m)))
    }
}
