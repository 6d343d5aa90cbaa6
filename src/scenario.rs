//! Load profiles and the ramping scenario runner.
//!
//! A profile is a list of stages, each ramping the live actor count toward
//! a target over its duration. Actors run independent iteration loops;
//! scaling down stops individual actors cooperatively, and a graceful-stop
//! budget bounds how long stragglers may run past the nominal end.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::actor::Actor;
use crate::config::HarnessConfig;
use crate::credentials::CredentialPool;
use crate::harness::Script;
use crate::metrics::Metrics;
use crate::protocol::{Action, RoomType};

/// Message bodies drawn at random for scripted sends.
const MESSAGES: [&str; 4] = ["Hello", "Test message", "chatload ws test", "WebSocket test"];

/// Test rooms shared by all scenarios.
const ROOMS: [(&str, RoomType); 3] = [
    ("test_room_001", RoomType::Channel),
    ("test_room_002", RoomType::Channel),
    ("test_room_003", RoomType::Dm),
];

/// One ramp step of a load profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    /// How long the ramp toward `target` takes.
    pub duration: Duration,
    /// Actor count to reach by the end of the stage.
    pub target: usize,
}

impl Stage {
    /// Create a stage.
    #[must_use]
    pub const fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

const fn stage(secs: u64, target: usize) -> Stage {
    Stage::new(Duration::from_secs(secs), target)
}

/// What each actor does per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Workload {
    /// Full chat exchange: join, message, ping, leave.
    #[default]
    Chat,
    /// Reconnect cycle with a simulated outage and recovery check.
    Reconnect,
}

/// A named, staged load profile.
#[derive(Debug, Clone)]
pub struct LoadProfile {
    /// Profile name as selected on the command line.
    pub name: &'static str,
    /// Ramp stages in order.
    pub stages: Vec<Stage>,
    /// Per-iteration workload.
    pub workload: Workload,
}

impl LoadProfile {
    /// Minimal single-actor check, for fast verification.
    #[must_use]
    pub fn smoke() -> Self {
        Self {
            name: "smoke",
            stages: vec![stage(20, 1), stage(5, 0)],
            workload: Workload::Chat,
        }
    }

    /// Small load.
    #[must_use]
    pub fn light() -> Self {
        Self {
            name: "light",
            stages: vec![stage(30, 5), stage(60, 10), stage(30, 0)],
            workload: Workload::Chat,
        }
    }

    /// Moderate load.
    #[must_use]
    pub fn medium() -> Self {
        Self {
            name: "medium",
            stages: vec![stage(60, 20), stage(180, 50), stage(60, 0)],
            workload: Workload::Chat,
        }
    }

    /// Large load.
    #[must_use]
    pub fn heavy() -> Self {
        Self {
            name: "heavy",
            stages: vec![stage(120, 50), stage(300, 100), stage(120, 200), stage(60, 0)],
            workload: Workload::Chat,
        }
    }

    /// Sustained connection pressure.
    #[must_use]
    pub fn stress() -> Self {
        Self {
            name: "stress",
            stages: vec![
                stage(30, 50),
                stage(120, 100),
                stage(180, 150),
                stage(300, 150),
                stage(60, 0),
            ],
            workload: Workload::Chat,
        }
    }

    /// Sudden surge and fall-off.
    #[must_use]
    pub fn spike() -> Self {
        Self {
            name: "spike",
            stages: vec![
                stage(10, 10),
                stage(10, 200),
                stage(60, 200),
                stage(30, 10),
                stage(10, 0),
            ],
            workload: Workload::Chat,
        }
    }

    /// Long-running stability check.
    #[must_use]
    pub fn soak() -> Self {
        Self {
            name: "soak",
            stages: vec![stage(120, 50), stage(3600, 50), stage(120, 0)],
            workload: Workload::Chat,
        }
    }

    /// Outage-and-recovery cycling.
    #[must_use]
    pub fn reconnect() -> Self {
        Self {
            name: "reconnect",
            stages: vec![stage(60, 20), stage(180, 50), stage(120, 50), stage(60, 0)],
            workload: Workload::Reconnect,
        }
    }

    /// Look a profile up by name.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "smoke" => Some(Self::smoke()),
            "light" => Some(Self::light()),
            "medium" => Some(Self::medium()),
            "heavy" => Some(Self::heavy()),
            "stress" => Some(Self::stress()),
            "spike" => Some(Self::spike()),
            "soak" => Some(Self::soak()),
            "reconnect" => Some(Self::reconnect()),
            _ => None,
        }
    }

    /// All selectable profile names.
    #[must_use]
    pub const fn names() -> [&'static str; 8] {
        [
            "smoke", "light", "medium", "heavy", "stress", "spike", "soak", "reconnect",
        ]
    }

    /// Peak actor count across all stages.
    #[must_use]
    pub fn peak_actors(&self) -> usize {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    /// Nominal run length, ramps included.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }
}

/// Drives a load profile against the configured backend.
pub struct ScenarioRunner {
    config: Arc<HarnessConfig>,
    pool: Arc<CredentialPool>,
    metrics: Arc<Metrics>,
}

impl ScenarioRunner {
    /// Create a runner over shared, read-only inputs.
    #[must_use]
    pub fn new(
        config: Arc<HarnessConfig>,
        pool: Arc<CredentialPool>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            pool,
            metrics,
        }
    }

    /// Run the profile to completion.
    ///
    /// Ramps the live actor count once per second toward each stage
    /// target. When the last stage ends, all actors are asked to stop; any
    /// still running after the graceful-stop budget are aborted.
    pub async fn run(&self, profile: &LoadProfile) {
        info!(
            profile = profile.name,
            peak = profile.peak_actors(),
            nominal_secs = profile.total_duration().as_secs(),
            "starting scenario"
        );
        self.metrics.start();

        let mut tasks = JoinSet::new();
        let mut stops: Vec<watch::Sender<bool>> = Vec::new();
        let mut spawned_total = 0usize;
        let mut current = 0usize;

        for stage in &profile.stages {
            let steps = stage.duration.as_secs().max(1);
            let from = current;
            for step in 1..=steps {
                let desired = ramp(from, stage.target, step, steps);
                self.scale_to(desired, profile.workload, &mut tasks, &mut stops, &mut spawned_total);
                sleep(Duration::from_secs(1)).await;
            }
            current = stage.target;
            debug!(target = current, "stage complete");
        }

        for stop in &stops {
            let _ = stop.send(true);
        }
        let drained = timeout(self.config.graceful_stop, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                budget_ms = self.config.graceful_stop.as_millis() as u64,
                "graceful-stop budget exceeded, aborting stragglers"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        info!(profile = profile.name, "scenario finished");
    }

    fn scale_to(
        &self,
        desired: usize,
        workload: Workload,
        tasks: &mut JoinSet<()>,
        stops: &mut Vec<watch::Sender<bool>>,
        spawned_total: &mut usize,
    ) {
        while stops.len() < desired {
            let (stop_tx, stop_rx) = watch::channel(false);
            let index = *spawned_total;
            *spawned_total += 1;
            stops.push(stop_tx);

            match Actor::new(index, self.config.clone(), &self.pool, self.metrics.clone()) {
                Ok(actor) => {
                    tasks.spawn(actor_loop(actor, workload, stop_rx));
                }
                Err(err) => {
                    warn!(actor = index, error = %err, "failed to create actor");
                    stops.pop();
                    return;
                }
            }
        }
        while stops.len() > desired {
            if let Some(stop) = stops.pop() {
                let _ = stop.send(true);
            }
        }
    }
}

/// Linear interpolation toward a stage target, k6 ramping style.
fn ramp(from: usize, to: usize, step: u64, steps: u64) -> usize {
    let from = from as f64;
    let to = to as f64;
    let fraction = step as f64 / steps as f64;
    (from + (to - from) * fraction).round() as usize
}

/// One actor's iteration loop; runs until asked to stop.
async fn actor_loop(actor: Actor, workload: Workload, stop: watch::Receiver<bool>) {
    let (room_id, room_type) = ROOMS[actor.index() % ROOMS.len()];
    loop {
        if *stop.borrow() {
            break;
        }
        let result = match workload {
            Workload::Chat => {
                let content = MESSAGES
                    .choose(&mut rand::rng())
                    .copied()
                    .unwrap_or(MESSAGES[0]);
                let script = Script::from_config(actor.config()).with_actions(vec![
                    Action::join_room(room_id, room_type),
                    Action::send_message(room_id, room_type, content),
                    Action::ping(),
                    Action::leave_room(room_id, room_type),
                ]);
                actor.run_iteration(&script).await.map(|_| ())
            }
            Workload::Reconnect => actor
                .run_reconnect_cycle(room_id, room_type)
                .await
                .map(|_| ()),
        };
        if let Err(err) = result {
            // One actor's failure never halts the others.
            warn!(actor = actor.index(), error = %err, "iteration failed");
        }

        if *stop.borrow() {
            break;
        }
        let think_time = Duration::from_secs_f64(rand::rng().random_range(1.0..3.0));
        let mut stop = stop.clone();
        tokio::select! {
            _ = sleep(think_time) => {}
            _ = stop.changed() => break,
        }
    }
    debug!(actor = actor.index(), "actor stopped");
}
