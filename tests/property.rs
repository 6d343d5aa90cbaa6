//! Property-based tests for event classification and state tracking.

use proptest::prelude::*;

use chatload::config::AckPolicy;
use chatload::protocol::{AckKind, Event, EventKind};
use chatload::harness::StateTracker;

const KNOWN_TAGS: [(&str, EventKind); 7] = [
    ("room_joined", EventKind::RoomJoined),
    ("room_left", EventKind::RoomLeft),
    ("message_sent", EventKind::MessageSent),
    ("new_message", EventKind::NewMessage),
    ("pong", EventKind::Pong),
    ("status", EventKind::Status),
    ("error", EventKind::Error),
];

fn tag_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(
            KNOWN_TAGS
                .iter()
                .map(|(tag, _)| (*tag).to_string())
                .collect::<Vec<_>>()
        ),
        "[a-z_]{1,20}",
    ]
}

proptest! {
    // =========================================================================
    // Property 1: Classification is total and consistent with the tag table
    // =========================================================================
    #[test]
    fn test_classifier_is_total(tag in "[a-zA-Z0-9_]{0,32}") {
        let kind = EventKind::from_tag(&tag);
        match KNOWN_TAGS.iter().find(|(known, _)| *known == tag) {
            Some((_, expected)) => prop_assert_eq!(kind, *expected),
            None => prop_assert_eq!(kind, EventKind::Other),
        }
    }

    // =========================================================================
    // Property 2: Parsing preserves the raw tag and classifies it
    // =========================================================================
    #[test]
    fn test_parse_preserves_tag(tag in "[a-z_]{1,20}") {
        let raw = format!(r#"{{"action":"{tag}","data":{{}}}}"#);
        let event = Event::parse(&raw).unwrap();
        prop_assert_eq!(event.kind, EventKind::from_tag(&tag));
        prop_assert_eq!(event.tag, tag);
    }

    // =========================================================================
    // Property 3: Tracker counts always equal tag occurrences in the log
    // =========================================================================
    #[test]
    fn test_tracker_counts_match_log(tags in prop::collection::vec(tag_strategy(), 0..64)) {
        let mut tracker = StateTracker::new();
        let mut previous_total = 0u64;

        for tag in &tags {
            let raw = format!(r#"{{"action":"{tag}","data":{{}}}}"#);
            tracker.record(Event::parse(&raw).unwrap());
            // Monotone: recording never loses events.
            prop_assert_eq!(tracker.total_events(), previous_total + 1);
            previous_total = tracker.total_events();
        }

        prop_assert_eq!(tracker.total_events(), tags.len() as u64);
        for tag in &tags {
            let expected = tags.iter().filter(|t| *t == tag).count() as u64;
            prop_assert_eq!(tracker.count(tag), expected);
            prop_assert!(tracker.observed(tag));
        }
    }

    // =========================================================================
    // Property 4: Pong acks never exceed recorded pong events
    // =========================================================================
    #[test]
    fn test_pong_acks_bounded_by_events(tags in prop::collection::vec(tag_strategy(), 0..64)) {
        let policy = AckPolicy::default();
        let mut tracker = StateTracker::new();
        for tag in &tags {
            let raw = format!(r#"{{"action":"{tag}","data":{{}}}}"#);
            tracker.record(Event::parse(&raw).unwrap());
        }
        let pongs_recorded = tags.iter().filter(|t| t.as_str() == "pong").count() as u64;
        prop_assert_eq!(tracker.ack_count(AckKind::Pong, &policy, None), pongs_recorded);
    }
}
