//! Configuration for the load-testing harness.

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Default Auth Provider base URL, matching the local compose setup.
pub const DEFAULT_BASE_URL: &str = "http://localhost:80";

/// Default chat gateway endpoint.
pub const DEFAULT_WS_URL: &str = "ws://localhost:80/ws";

/// Where the bearer token is carried during the WebSocket handshake.
///
/// Different deployment configurations accept either form, so both are
/// supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenPlacement {
    /// Append `?token=<bearer>` to the gateway URL.
    #[default]
    QueryParam,
    /// Send an `Authorization: Bearer <token>` header with the upgrade.
    Header,
}

/// Timeout and pacing configuration for one simulated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    /// Hard bound on connection establishment, handshake included.
    ///
    /// Default: 30 seconds
    pub connect: Duration,

    /// Wait after the last scripted send before evaluating final state.
    ///
    /// Acknowledgements lag behind sends; evaluating immediately after the
    /// last send produces false negatives.
    ///
    /// Default: 5 seconds
    pub grace_window: Duration,

    /// Pause between scripted actions.
    ///
    /// This is a load-shaping parameter, not a protocol requirement.
    ///
    /// Default: 1 second
    pub inter_action_delay: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            grace_window: Duration::from_secs(5),
            inter_action_delay: Duration::from_secs(1),
        }
    }
}

impl Timeouts {
    /// Create new timeouts with custom values.
    #[must_use]
    pub const fn new(connect: Duration, grace_window: Duration, inter_action_delay: Duration) -> Self {
        Self {
            connect,
            grace_window,
            inter_action_delay,
        }
    }
}

/// How inbound events are matched against scripted actions.
///
/// The gateway protocol carries no request/response correlation identifier,
/// so an action counts as acknowledged once an inbound event of the expected
/// tag is observed. These knobs control how strict that matching is instead
/// of hard-coding a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPolicy {
    /// Accept legacy `status`-tagged acks matched on their free-text message.
    ///
    /// Older gateway builds acknowledge join/leave with a generic `status`
    /// action whose human-readable message must be substring-matched. This
    /// shim only ever runs for `status` frames; tag-keyed classification
    /// stays primary.
    ///
    /// Default: true
    pub legacy_status_matching: bool,

    /// Require the ack payload to name the room the action targeted.
    ///
    /// Default: false (first inbound event of the expected tag wins)
    pub require_room_match: bool,
}

impl Default for AckPolicy {
    fn default() -> Self {
        Self {
            legacy_status_matching: true,
            require_room_match: false,
        }
    }
}

impl AckPolicy {
    /// Create a policy with custom values.
    #[must_use]
    pub const fn new(legacy_status_matching: bool, require_room_match: bool) -> Self {
        Self {
            legacy_status_matching,
            require_room_match,
        }
    }

    /// Strict matching: no legacy shim, acks must name their room.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            legacy_status_matching: false,
            require_room_match: true,
        }
    }
}

/// Top-level harness configuration.
///
/// Constructed once at startup and shared read-only between actors; there is
/// no process-wide mutable state.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Base URL of the Auth Provider (register/login endpoints).
    pub base_url: Url,

    /// WebSocket endpoint of the chat gateway.
    pub ws_url: Url,

    /// How the bearer token is attached to the upgrade request.
    pub token_placement: TokenPlacement,

    /// Timeout and pacing settings.
    pub timeouts: Timeouts,

    /// Acknowledgement matching policy.
    pub ack_policy: AckPolicy,

    /// How long an in-progress actor may run past the nominal scenario end
    /// before being torn down.
    ///
    /// Default: 5 seconds
    pub graceful_stop: Duration,
}

impl HarnessConfig {
    /// Create a configuration from endpoint strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if either endpoint fails to parse, or
    /// if the gateway URL does not use a `ws`/`wss` scheme.
    pub fn new(base_url: &str, ws_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let ws_url = Url::parse(ws_url)?;
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(Error::InvalidUrl(format!(
                "gateway URL must use ws:// or wss://, got {}",
                ws_url.scheme()
            )));
        }
        Ok(Self {
            base_url,
            ws_url,
            token_placement: TokenPlacement::default(),
            timeouts: Timeouts::default(),
            ack_policy: AckPolicy::default(),
            graceful_stop: Duration::from_secs(5),
        })
    }

    /// Set the token placement for WebSocket auth.
    #[must_use]
    pub const fn with_token_placement(mut self, placement: TokenPlacement) -> Self {
        self.token_placement = placement;
        self
    }

    /// Set timeout and pacing values.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the acknowledgement matching policy.
    #[must_use]
    pub const fn with_ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = policy;
        self
    }

    /// Set the graceful-stop budget for scenario teardown.
    #[must_use]
    pub const fn with_graceful_stop(mut self, budget: Duration) -> Self {
        self.graceful_stop = budget;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        // Both constants parse; new() only rejects malformed input.
        Self::new(DEFAULT_BASE_URL, DEFAULT_WS_URL)
            .unwrap_or_else(|_| unreachable!("default endpoints are valid"))
    }
}
