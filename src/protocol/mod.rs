//! Chat gateway wire protocol: outbound actions and inbound events.
//!
//! Both directions share the `{ "action": <string>, "data": <object> }`
//! envelope. This module owns serialization of client intents and
//! classification of server pushes; it implements no transport.

mod action;
mod event;

pub use action::{Action, RoomType};
pub use event::{AckKind, Event, EventKind};
