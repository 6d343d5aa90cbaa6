//! Run-wide counters and latency trends.
//!
//! One [`Metrics`] instance is shared by all actors; counters are atomic so
//! no actor ever blocks another. Failures surface here as aggregate
//! pass/fail counts, never as aborts of unrelated actors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Latency samples with percentile reporting.
#[derive(Debug, Default)]
pub struct Latencies {
    samples_us: Mutex<Vec<u64>>,
}

impl Latencies {
    /// Record one sample.
    pub fn record(&self, latency: Duration) {
        if let Ok(mut samples) = self.samples_us.lock() {
            samples.push(latency.as_micros() as u64);
        }
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples_us.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Check whether no samples were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Percentile over recorded samples (`p` in `0.0..=1.0`).
    #[must_use]
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        let samples = self.samples_us.lock().ok()?;
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.clone();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        Some(Duration::from_micros(sorted[idx.min(sorted.len() - 1)]))
    }

    /// Median sample.
    #[must_use]
    pub fn p50(&self) -> Option<Duration> {
        self.percentile(0.50)
    }

    /// 95th percentile sample.
    #[must_use]
    pub fn p95(&self) -> Option<Duration> {
        self.percentile(0.95)
    }

    /// 99th percentile sample.
    #[must_use]
    pub fn p99(&self) -> Option<Duration> {
        self.percentile(0.99)
    }
}

/// Aggregate counters for one scenario run.
#[derive(Debug, Default)]
pub struct Metrics {
    iterations: AtomicU64,
    auth_failures: AtomicU64,
    connections_attempted: AtomicU64,
    connections_succeeded: AtomicU64,
    connections_failed: AtomicU64,
    actions_sent: AtomicU64,
    events_received: AtomicU64,
    parse_failures: AtomicU64,
    protocol_errors: AtomicU64,
    incomplete_scripts: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnects_succeeded: AtomicU64,
    recovery_failures: AtomicU64,
    /// Connect-call to handshake-completion times.
    pub connect_time: Latencies,
    /// Outage-start to re-established times for reconnect cycles.
    pub reconnect_time: Latencies,
    start: Mutex<Option<Instant>>,
}

impl Metrics {
    /// Create a shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark the start of the measured window.
    pub fn start(&self) {
        if let Ok(mut start) = self.start.lock() {
            *start = Some(Instant::now());
        }
    }

    /// Elapsed time since [`Metrics::start`].
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start
            .lock()
            .ok()
            .and_then(|s| s.map(|t| t.elapsed()))
            .unwrap_or_default()
    }

    /// Count one finished actor iteration.
    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed session acquisition.
    pub fn record_auth_failure(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one started connection attempt.
    pub fn record_connection_attempted(&self) {
        self.connections_attempted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one established connection.
    pub fn record_connection_succeeded(&self) {
        self.connections_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed connection attempt.
    pub fn record_connection_failed(&self) {
        self.connections_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one observed protocol `error` frame.
    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one script whose join/leave pairing was incomplete.
    pub fn record_incomplete_script(&self) {
        self.incomplete_scripts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one reconnect attempt.
    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one re-established connection.
    pub fn record_reconnect_succeeded(&self) {
        self.reconnects_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed state recovery after reconnect.
    pub fn record_recovery_failure(&self) {
        self.recovery_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Add to the sent-actions counter.
    pub fn add_actions_sent(&self, n: u64) {
        self.actions_sent.fetch_add(n, Ordering::Relaxed);
    }

    /// Add to the received-events counter.
    pub fn add_events_received(&self, n: u64) {
        self.events_received.fetch_add(n, Ordering::Relaxed);
    }

    /// Add to the parse-failures counter.
    pub fn add_parse_failures(&self, n: u64) {
        self.parse_failures.fetch_add(n, Ordering::Relaxed);
    }

    /// Finished actor iterations.
    #[must_use]
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Failed session acquisitions.
    #[must_use]
    pub fn auth_failures(&self) -> u64 {
        self.auth_failures.load(Ordering::Relaxed)
    }

    /// Started connection attempts.
    #[must_use]
    pub fn connections_attempted(&self) -> u64 {
        self.connections_attempted.load(Ordering::Relaxed)
    }

    /// Established connections.
    #[must_use]
    pub fn connections_succeeded(&self) -> u64 {
        self.connections_succeeded.load(Ordering::Relaxed)
    }

    /// Failed connection attempts.
    #[must_use]
    pub fn connections_failed(&self) -> u64 {
        self.connections_failed.load(Ordering::Relaxed)
    }

    /// Actions written to transports.
    #[must_use]
    pub fn actions_sent(&self) -> u64 {
        self.actions_sent.load(Ordering::Relaxed)
    }

    /// Events received across all attempts.
    #[must_use]
    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    /// Inbound frames skipped as unparseable.
    #[must_use]
    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    /// Observed protocol `error` frames.
    #[must_use]
    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }

    /// Scripts with incomplete join/leave pairing.
    #[must_use]
    pub fn incomplete_scripts(&self) -> u64 {
        self.incomplete_scripts.load(Ordering::Relaxed)
    }

    /// Reconnect attempts.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Re-established connections.
    #[must_use]
    pub fn reconnects_succeeded(&self) -> u64 {
        self.reconnects_succeeded.load(Ordering::Relaxed)
    }

    /// Failed state recoveries after reconnect.
    #[must_use]
    pub fn recovery_failures(&self) -> u64 {
        self.recovery_failures.load(Ordering::Relaxed)
    }

    /// Print a human-readable summary.
    pub fn report(&self) {
        let elapsed = self.elapsed().as_secs_f64();
        println!("=== chatload summary ===");
        println!("  duration:               {elapsed:>10.1}s");
        println!("  iterations:             {:>10}", self.iterations());
        println!("  auth failures:          {:>10}", self.auth_failures());
        println!(
            "  connections:            {:>10} ok / {} failed / {} attempted",
            self.connections_succeeded(),
            self.connections_failed(),
            self.connections_attempted()
        );
        println!("  actions sent:           {:>10}", self.actions_sent());
        println!("  events received:        {:>10}", self.events_received());
        println!("  parse failures:         {:>10}", self.parse_failures());
        println!("  protocol errors:        {:>10}", self.protocol_errors());
        println!("  incomplete scripts:     {:>10}", self.incomplete_scripts());
        println!(
            "  reconnects:             {:>10} ok / {} attempted",
            self.reconnects_succeeded(),
            self.reconnect_attempts()
        );
        println!("  recovery failures:      {:>10}", self.recovery_failures());
        if let (Some(p50), Some(p95), Some(p99)) = (
            self.connect_time.p50(),
            self.connect_time.p95(),
            self.connect_time.p99(),
        ) {
            println!(
                "  connect time:           p50 {:.1}ms / p95 {:.1}ms / p99 {:.1}ms",
                p50.as_secs_f64() * 1000.0,
                p95.as_secs_f64() * 1000.0,
                p99.as_secs_f64() * 1000.0
            );
        }
        if let (Some(p50), Some(p95)) = (self.reconnect_time.p50(), self.reconnect_time.p95()) {
            println!(
                "  reconnect time:         p50 {:.1}ms / p95 {:.1}ms",
                p50.as_secs_f64() * 1000.0,
                p95.as_secs_f64() * 1000.0
            );
        }
    }

    /// One-line JSON summary for machine consumption.
    #[must_use]
    pub fn summary_json(&self) -> String {
        let p = |l: &Latencies, q: f64| l.percentile(q).map_or(0, |d| d.as_micros() as u64);
        format!(
            concat!(
                r#"{{"duration_secs":{:.3},"iterations":{},"auth_failures":{},"#,
                r#""connections":{{"attempted":{},"succeeded":{},"failed":{}}},"#,
                r#""actions_sent":{},"events_received":{},"parse_failures":{},"#,
                r#""protocol_errors":{},"incomplete_scripts":{},"#,
                r#""reconnects":{{"attempted":{},"succeeded":{},"recovery_failures":{}}},"#,
                r#""connect_time_us":{{"p50":{},"p95":{},"p99":{}}}}}"#
            ),
            self.elapsed().as_secs_f64(),
            self.iterations(),
            self.auth_failures(),
            self.connections_attempted(),
            self.connections_succeeded(),
            self.connections_failed(),
            self.actions_sent(),
            self.events_received(),
            self.parse_failures(),
            self.protocol_errors(),
            self.incomplete_scripts(),
            self.reconnect_attempts(),
            self.reconnects_succeeded(),
            self.recovery_failures(),
            p(&self.connect_time, 0.50),
            p(&self.connect_time, 0.95),
            p(&self.connect_time, 0.99),
        )
    }
}
