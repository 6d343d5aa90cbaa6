//! Scripted interaction over an established connection.
//!
//! Actions are driven by a single ordered scheduler: send, wait the
//! inter-action delay, send the next. Inbound events are drained into the
//! attempt's tracker the whole time, and a grace window after the final
//! send absorbs acknowledgements that lag behind.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{AckPolicy, HarnessConfig, Timeouts};
use crate::harness::connection::GatewayConnection;
use crate::harness::tracker::StateTracker;
use crate::protocol::{AckKind, Action, Event, RoomType};

/// An ordered sequence of protocol actions plus pacing parameters.
#[derive(Debug, Clone, Default)]
pub struct Script {
    actions: Vec<Action>,
    timeouts: Timeouts,
    ack_policy: AckPolicy,
}

impl Script {
    /// Create an empty script with default pacing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty script paced per the harness configuration.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            actions: Vec::new(),
            timeouts: config.timeouts.clone(),
            ack_policy: config.ack_policy,
        }
    }

    /// Append one action.
    #[must_use]
    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Replace the action list.
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    /// Set the delay between consecutive sends.
    #[must_use]
    pub const fn with_inter_action_delay(mut self, delay: Duration) -> Self {
        self.timeouts.inter_action_delay = delay;
        self
    }

    /// Set the post-script grace window.
    #[must_use]
    pub const fn with_grace_window(mut self, window: Duration) -> Self {
        self.timeouts.grace_window = window;
        self
    }

    /// Set the acknowledgement matching policy.
    #[must_use]
    pub const fn with_ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = policy;
        self
    }

    /// The canonical smoke sequence: join, message, ping, leave.
    #[must_use]
    pub fn chat_exchange(room_id: &str, room_type: RoomType, content: &str) -> Self {
        Self::new()
            .then(Action::join_room(room_id, room_type))
            .then(Action::send_message(room_id, room_type, content))
            .then(Action::ping())
            .then(Action::leave_room(room_id, room_type))
    }

    /// Actions in issuance order.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Acknowledgement policy this script evaluates against.
    #[must_use]
    pub const fn ack_policy(&self) -> AckPolicy {
        self.ack_policy
    }

    /// Check whether the script has no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Result of one scripted interaction.
///
/// `success` reflects only connection establishment and the handshake
/// check. Per-action acknowledgement is exposed for callers to assert on;
/// which acks are mandatory is the calling scenario's decision, not the
/// harness's.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    /// Connection established and handshake check passed.
    pub success: bool,
    /// Events accumulated over the attempt, in arrival order.
    pub tracker: StateTracker,
    /// Actions written to the transport.
    pub actions_sent: u64,
    /// Actions dropped because the connection had failed.
    pub actions_dropped: u64,
    /// Inbound frames skipped due to parse failures.
    pub parse_failures: u64,
    /// A join was acknowledged but its paired leave was not.
    pub incomplete: bool,
    policy: AckPolicy,
}

impl ScriptOutcome {
    /// Outcome for an attempt that never established.
    #[must_use]
    pub fn failed() -> Self {
        Self {
            success: false,
            tracker: StateTracker::new(),
            actions_sent: 0,
            actions_dropped: 0,
            parse_failures: 0,
            incomplete: false,
            policy: AckPolicy::default(),
        }
    }

    /// Check whether an acknowledgement kind was observed at all.
    #[must_use]
    pub fn ack_observed(&self, ack: AckKind) -> bool {
        self.tracker.ack_observed(ack, &self.policy, None)
    }

    /// Check whether a specific action's expected ack was observed.
    #[must_use]
    pub fn action_acknowledged(&self, action: &Action) -> bool {
        self.tracker
            .ack_observed(action.expected_ack(), &self.policy, action.room_id())
    }

    /// Number of pongs recorded for this attempt.
    #[must_use]
    pub fn pong_count(&self) -> u64 {
        self.tracker.ack_count(AckKind::Pong, &self.policy, None)
    }

    /// Ordered log of received events.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        self.tracker.events()
    }
}

/// Drive a script over an established connection.
///
/// Sends run strictly in order with the configured delay between them.
/// After the last send the grace window elapses in full before the final
/// state is evaluated; acknowledgements can lag sends, and evaluating
/// immediately produces false negatives. Protocol `error` frames and parse
/// failures are recorded, never thrown; transport errors downgrade the
/// remaining sends to no-ops.
pub async fn run_script(conn: &mut GatewayConnection, script: &Script) -> ScriptOutcome {
    let mut tracker = StateTracker::new();
    let established = conn.is_established();
    let mut actions_sent = 0u64;
    let mut actions_dropped = 0u64;

    for action in script.actions() {
        match conn.send_action(action).await {
            Ok(true) => {
                actions_sent += 1;
                debug!(action = action.tag(), "action sent");
            }
            Ok(false) => {
                actions_dropped += 1;
                debug!(action = action.tag(), "action dropped");
            }
            Err(err) => {
                actions_dropped += 1;
                warn!(action = action.tag(), error = %err, "action not serializable");
            }
        }
        drain_events(conn, script.timeouts.inter_action_delay, &mut tracker).await;
    }

    drain_events(conn, script.timeouts.grace_window, &mut tracker).await;

    let incomplete = join_without_leave(script, &tracker);

    ScriptOutcome {
        success: established,
        tracker,
        actions_sent,
        actions_dropped,
        parse_failures: conn.parse_failures(),
        incomplete,
        policy: script.ack_policy,
    }
}

/// Drain inbound events into the tracker until the window elapses.
async fn drain_events(conn: &mut GatewayConnection, window: Duration, tracker: &mut StateTracker) {
    let deadline = Instant::now() + window;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        match conn.next_event(deadline - now).await {
            Some(event) => tracker.record(event),
            None => return,
        }
    }
}

/// Property check: every acknowledged join whose script also leaves the
/// room must see a leave ack, otherwise the outcome is incomplete.
fn join_without_leave(script: &Script, tracker: &StateTracker) -> bool {
    let policy = script.ack_policy;
    script.actions().iter().any(|action| {
        let Action::JoinRoom { room_id, .. } = action else {
            return false;
        };
        let leaves_room = script.actions().iter().any(
            |other| matches!(other, Action::LeaveRoom { room_id: leave, .. } if leave == room_id),
        );
        leaves_room
            && tracker.ack_observed(AckKind::Join, &policy, Some(room_id))
            && !tracker.ack_observed(AckKind::Leave, &policy, Some(room_id))
    })
}
