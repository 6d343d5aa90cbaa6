//! A virtual user: one independent simulated client.
//!
//! Within an actor everything is sequential; actors share nothing mutable
//! with each other beyond the read-only configuration, the read-only
//! credential pool and the atomic metrics sink.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::auth::{AuthClient, Session};
use crate::config::HarnessConfig;
use crate::credentials::{CredentialPool, Credentials};
use crate::error::Result;
use crate::harness::{Script, ScriptOutcome, connect, run_script};
use crate::metrics::Metrics;
use crate::protocol::{AckKind, Action, RoomType};

/// Bounds of the simulated outage between reconnect attempts, in seconds.
const OUTAGE_RANGE_SECS: (f64, f64) = (3.0, 5.0);

/// Result of one reconnect cycle.
///
/// `recovered` is an observed fact: it only fails when room membership
/// demonstrably degraded across the outage (joined before, not joinable
/// after). A cycle that never joined pre-outage cannot fail recovery.
#[derive(Debug, Clone)]
pub struct RecoveryReport {
    /// Join ack observed before the outage.
    pub joined_before: bool,
    /// Join ack observed on the fresh attempt after the outage.
    pub joined_after: bool,
    /// Simulated outage length.
    pub outage: Duration,
    /// Outage end to re-established handshake, when reconnect succeeded.
    pub reconnect_duration: Option<Duration>,
    /// Post-reconnect state matches pre-outage state.
    pub recovered: bool,
}

impl RecoveryReport {
    /// Room membership existed before the outage but not after.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.joined_before && !self.joined_after
    }
}

/// One simulated independent client.
pub struct Actor {
    index: usize,
    config: Arc<HarnessConfig>,
    auth: AuthClient,
    credentials: Credentials,
    metrics: Arc<Metrics>,
}

impl Actor {
    /// Create an actor with the identity the pool assigns to `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`](crate::Error::Http) if the HTTP client
    /// cannot be built.
    pub fn new(
        index: usize,
        config: Arc<HarnessConfig>,
        pool: &CredentialPool,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let auth = AuthClient::new(config.base_url.clone())?;
        let credentials = pool.resolve(index);
        Ok(Self {
            index,
            config,
            auth,
            credentials,
            metrics,
        })
    }

    /// Actor index within the scenario.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The shared harness configuration this actor runs under.
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The identity this actor drives.
    #[must_use]
    pub const fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Acquire a session for this actor's identity.
    ///
    /// # Errors
    ///
    /// Auth failures are fatal for the calling iteration and counted.
    pub async fn acquire_session(&self) -> Result<Session> {
        match self.auth.acquire_session(&self.credentials).await {
            Ok(session) => Ok(session),
            Err(err) => {
                self.metrics.record_auth_failure();
                Err(err)
            }
        }
    }

    /// Run one full iteration: acquire, connect, drive the script, close.
    ///
    /// # Errors
    ///
    /// Auth failures and pre-handshake transport failures abort the
    /// iteration; all other anomalies degrade into the returned outcome.
    pub async fn run_iteration(&self, script: &Script) -> Result<ScriptOutcome> {
        let session = self.acquire_session().await?;

        self.metrics.record_connection_attempted();
        let mut conn = match connect(&self.config, &session).await {
            Ok(conn) => {
                self.metrics.record_connection_succeeded();
                self.metrics.connect_time.record(conn.connect_duration());
                conn
            }
            Err(err) => {
                self.metrics.record_connection_failed();
                return Err(err);
            }
        };

        let outcome = run_script(&mut conn, script).await;
        conn.close().await;
        self.record_outcome(&outcome);
        self.metrics.record_iteration();
        Ok(outcome)
    }

    /// Run one reconnect cycle against a room.
    ///
    /// Joins the room, tears the connection down, waits out a simulated
    /// 3–5 second outage, then starts a brand-new attempt (same session,
    /// fresh tracker) and rejoins. Degraded room membership is reported as
    /// a recovery failure, never silently ignored.
    ///
    /// # Errors
    ///
    /// Only auth failures and a failed *initial* connect abort the cycle;
    /// a failed reconnect is part of the report.
    pub async fn run_reconnect_cycle(
        &self,
        room_id: &str,
        room_type: RoomType,
    ) -> Result<RecoveryReport> {
        let session = self.acquire_session().await?;
        let join_script = Script::from_config(&self.config)
            .then(Action::join_room(room_id, room_type));

        // Phase 1: initial connection and join.
        self.metrics.record_connection_attempted();
        let mut conn = match connect(&self.config, &session).await {
            Ok(conn) => {
                self.metrics.record_connection_succeeded();
                self.metrics.connect_time.record(conn.connect_duration());
                conn
            }
            Err(err) => {
                self.metrics.record_connection_failed();
                return Err(err);
            }
        };
        let before = run_script(&mut conn, &join_script).await;
        let joined_before = before.ack_observed(AckKind::Join);
        self.record_outcome(&before);
        conn.close().await;

        // Phase 2: simulated outage.
        let outage = Duration::from_secs_f64(
            rand::rng().random_range(OUTAGE_RANGE_SECS.0..=OUTAGE_RANGE_SECS.1),
        );
        info!(actor = self.index, outage_ms = outage.as_millis() as u64, "simulating outage");
        sleep(outage).await;

        // Phase 3: fresh attempt with the same session, reset tracker.
        self.metrics.record_reconnect_attempt();
        self.metrics.record_connection_attempted();
        let reconnect_started = Instant::now();
        let report = match connect(&self.config, &session).await {
            Ok(mut conn) => {
                let reconnect_duration = reconnect_started.elapsed();
                self.metrics.record_connection_succeeded();
                self.metrics.record_reconnect_succeeded();
                self.metrics.connect_time.record(conn.connect_duration());
                self.metrics.reconnect_time.record(reconnect_duration);

                let after = run_script(&mut conn, &join_script).await;
                let joined_after = after.ack_observed(AckKind::Join);
                self.record_outcome(&after);
                conn.close().await;

                RecoveryReport {
                    joined_before,
                    joined_after,
                    outage,
                    reconnect_duration: Some(reconnect_duration),
                    recovered: !(joined_before && !joined_after),
                }
            }
            Err(err) => {
                self.metrics.record_connection_failed();
                warn!(actor = self.index, error = %err, "reconnect attempt failed");
                RecoveryReport {
                    joined_before,
                    joined_after: false,
                    outage,
                    reconnect_duration: None,
                    recovered: !joined_before,
                }
            }
        };

        if !report.recovered {
            self.metrics.record_recovery_failure();
            warn!(actor = self.index, room_id, "room membership degraded across reconnect");
        }
        self.metrics.record_iteration();
        Ok(report)
    }

    fn record_outcome(&self, outcome: &ScriptOutcome) {
        self.metrics.add_actions_sent(outcome.actions_sent);
        self.metrics
            .add_events_received(outcome.tracker.total_events());
        self.metrics.add_parse_failures(outcome.parse_failures);
        for _ in 0..outcome.tracker.count("error") {
            self.metrics.record_protocol_error();
        }
        if outcome.incomplete {
            self.metrics.record_incomplete_script();
        }
    }
}
