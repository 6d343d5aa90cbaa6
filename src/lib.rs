//! # chatload - Load-Testing Harness for the Chat Backend
//!
//! `chatload` drives load against a chat application's REST API and
//! WebSocket gateway: it authenticates simulated users, opens WebSocket
//! sessions, runs scripted action sequences (join room, send message,
//! ping, leave room), correlates asynchronous server pushes against the
//! expected acknowledgements, and reports pass/fail verdicts while
//! tolerating reconnects, timeouts and partial failures.
//!
//! ## Architecture
//!
//! - **Session acquisition** — login with register fallback against the
//!   Auth Provider, backed by a deterministic credential pool
//! - **Session harness** — connection lifecycle, a single inbound reader
//!   per attempt, per-attempt state tracking and scripted interaction
//! - **Actors** — independent virtual users, sequential inside and
//!   concurrent across, sharing only read-only inputs and atomic metrics
//! - **Scenarios** — staged ramping profiles with a graceful-stop budget
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chatload::{Action, HarnessConfig, RoomType, Script, connect, run_script};
//!
//! let config = HarnessConfig::new("http://localhost:80", "ws://localhost:80/ws")?;
//! let auth = chatload::AuthClient::new(config.base_url.clone())?;
//! let session = auth.acquire_session(&credentials).await?;
//!
//! let mut conn = connect(&config, &session).await?;
//! let script = Script::chat_exchange("test_room_001", RoomType::Channel, "hi");
//! let outcome = run_script(&mut conn, &script).await;
//! conn.close().await;
//! assert!(outcome.success);
//! ```

pub mod actor;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod harness;
pub mod metrics;
pub mod protocol;
pub mod scenario;

pub use actor::{Actor, RecoveryReport};
pub use auth::{AuthClient, RegisterOutcome, Session};
pub use config::{AckPolicy, HarnessConfig, Timeouts, TokenPlacement};
pub use credentials::{CredentialPool, Credentials};
pub use error::{Error, Result};
pub use harness::{AttemptState, GatewayConnection, Script, ScriptOutcome, StateTracker, connect, run_script};
pub use metrics::{Latencies, Metrics};
pub use protocol::{AckKind, Action, Event, EventKind, RoomType};
pub use scenario::{LoadProfile, ScenarioRunner, Stage, Workload};
