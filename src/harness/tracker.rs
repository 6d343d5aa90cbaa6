//! Per-attempt accumulator of observed server events.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::AckPolicy;
use crate::protocol::{AckKind, Event};

/// Tracks which acknowledgement tags a connection attempt has observed.
///
/// One tracker belongs to exactly one connection attempt and one actor;
/// counts only grow within an attempt, and a reconnect starts over with a
/// fresh tracker (no carry-over).
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    counts: HashMap<String, u64>,
    last_payload: HashMap<String, Value>,
    log: Vec<Event>,
}

impl StateTracker {
    /// Create an empty tracker for a new attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one inbound event.
    pub fn record(&mut self, event: Event) {
        *self.counts.entry(event.tag.clone()).or_insert(0) += 1;
        self.last_payload
            .insert(event.tag.clone(), event.data.clone());
        self.log.push(event);
    }

    /// Check whether any event with this tag arrived.
    #[must_use]
    pub fn observed(&self, tag: &str) -> bool {
        self.counts.contains_key(tag)
    }

    /// Number of events observed for a tag.
    #[must_use]
    pub fn count(&self, tag: &str) -> u64 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    /// Most recent payload observed for a tag.
    #[must_use]
    pub fn last_payload(&self, tag: &str) -> Option<&Value> {
        self.last_payload.get(tag)
    }

    /// Ordered log of every event this attempt received.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.log
    }

    /// Total number of events recorded.
    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.log.len() as u64
    }

    /// Check whether the tracker recorded nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// First event acknowledging the given action kind, under a policy.
    ///
    /// `room_id` is only consulted when the policy requires room matching.
    #[must_use]
    pub fn first_ack(
        &self,
        ack: AckKind,
        policy: &AckPolicy,
        room_id: Option<&str>,
    ) -> Option<&Event> {
        self.log.iter().find(|ev| ev.matches(ack, policy, room_id))
    }

    /// Check whether the given acknowledgement was observed.
    #[must_use]
    pub fn ack_observed(&self, ack: AckKind, policy: &AckPolicy, room_id: Option<&str>) -> bool {
        self.first_ack(ack, policy, room_id).is_some()
    }

    /// Number of events acknowledging the given action kind.
    #[must_use]
    pub fn ack_count(&self, ack: AckKind, policy: &AckPolicy, room_id: Option<&str>) -> u64 {
        self.log
            .iter()
            .filter(|ev| ev.matches(ack, policy, room_id))
            .count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: &str) -> Event {
        Event::parse(raw).unwrap()
    }

    #[test]
    fn test_fresh_tracker_is_empty() {
        let tracker = StateTracker::new();
        assert!(tracker.is_empty());
        assert_eq!(tracker.count("pong"), 0);
        assert!(!tracker.observed("pong"));
        assert!(tracker.last_payload("pong").is_none());
    }

    #[test]
    fn test_record_accumulates_counts() {
        let mut tracker = StateTracker::new();
        tracker.record(event(r#"{"action":"pong","data":{"timestamp":1}}"#));
        tracker.record(event(r#"{"action":"pong","data":{"timestamp":2}}"#));
        assert_eq!(tracker.count("pong"), 2);
        assert_eq!(tracker.total_events(), 2);
        // Last payload wins.
        assert_eq!(tracker.last_payload("pong").unwrap()["timestamp"], 2);
    }

    #[test]
    fn test_log_preserves_arrival_order() {
        let mut tracker = StateTracker::new();
        tracker.record(event(r#"{"action":"room_joined","data":{}}"#));
        tracker.record(event(r#"{"action":"new_message","data":{}}"#));
        tracker.record(event(r#"{"action":"room_left","data":{}}"#));
        let tags: Vec<&str> = tracker.events().iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, ["room_joined", "new_message", "room_left"]);
    }

    #[test]
    fn test_ack_queries() {
        let policy = AckPolicy::default();
        let mut tracker = StateTracker::new();
        tracker.record(event(
            r#"{"action":"room_joined","data":{"status":"success","message":"成功加入 channel 房間 r1"}}"#,
        ));
        tracker.record(event(r#"{"action":"pong","data":{"message":"pong"}}"#));

        assert!(tracker.ack_observed(AckKind::Join, &policy, None));
        assert!(!tracker.ack_observed(AckKind::Leave, &policy, None));
        assert_eq!(tracker.ack_count(AckKind::Pong, &policy, None), 1);
    }

    #[test]
    fn test_broadcasts_do_not_count_as_send_ack() {
        let policy = AckPolicy::default();
        let mut tracker = StateTracker::new();
        tracker.record(event(
            r#"{"action":"new_message","data":{"room_id":"r1","content":"from someone else"}}"#,
        ));
        assert!(!tracker.ack_observed(AckKind::MessageSent, &policy, None));
        assert!(tracker.observed("new_message"));
    }
}
