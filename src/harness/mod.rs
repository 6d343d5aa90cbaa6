//! WebSocket session harness: connection lifecycle, event tracking and
//! scripted interaction.

mod connection;
mod script;
mod state;
mod tracker;

pub use connection::{GatewayConnection, connect};
pub use script::{Script, ScriptOutcome, run_script};
pub use state::AttemptState;
pub use tracker::StateTracker;
