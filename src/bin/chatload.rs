//! Scenario runner CLI for the chatload harness.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatload::{
    AuthClient, CredentialPool, HarnessConfig, LoadProfile, Metrics, ScenarioRunner,
    TokenPlacement,
};

#[derive(Parser)]
#[command(name = "chatload", version, about = "Load-testing harness for the chat backend")]
struct Cli {
    /// Auth Provider base URL.
    #[arg(long, default_value = chatload::config::DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Chat gateway WebSocket URL.
    #[arg(long, default_value = chatload::config::DEFAULT_WS_URL, global = true)]
    ws_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a load scenario.
    Run {
        /// Scenario name (smoke, light, medium, heavy, stress, spike,
        /// soak, reconnect).
        scenario: String,

        /// Size of the fixed test-user pool; 0 uses generated identities.
        #[arg(long, default_value_t = 5)]
        users: usize,

        /// Send the bearer token as an Authorization header instead of a
        /// query parameter.
        #[arg(long)]
        token_header: bool,

        /// Print the summary as a single JSON line.
        #[arg(long)]
        json: bool,
    },
    /// Register and log in the fixed test-user pool ahead of a run.
    PrepareUsers {
        /// Number of pool users to prepare.
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = match HarnessConfig::new(&cli.base_url, &cli.ws_url) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid endpoint configuration");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Run {
            scenario,
            users,
            token_header,
            json,
        } => run_scenario(config, &scenario, users, token_header, json).await,
        Command::PrepareUsers { count } => prepare_users(config, count).await,
    }
}

async fn run_scenario(
    config: HarnessConfig,
    scenario: &str,
    users: usize,
    token_header: bool,
    json: bool,
) -> ExitCode {
    let Some(profile) = LoadProfile::by_name(scenario) else {
        error!(
            scenario,
            available = LoadProfile::names().join(", "),
            "unknown scenario"
        );
        return ExitCode::FAILURE;
    };

    let config = if token_header {
        config.with_token_placement(TokenPlacement::Header)
    } else {
        config
    };

    let pool = if users == 0 {
        CredentialPool::empty()
    } else {
        CredentialPool::fixed(users)
    };

    let metrics = Metrics::new();
    let runner = ScenarioRunner::new(Arc::new(config), Arc::new(pool), metrics.clone());
    runner.run(&profile).await;

    if json {
        println!("{}", metrics.summary_json());
    } else {
        metrics.report();
    }

    if metrics.connections_succeeded() == 0 && metrics.connections_attempted() > 0 {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn prepare_users(config: HarnessConfig, count: usize) -> ExitCode {
    let auth = match AuthClient::new(config.base_url.clone()) {
        Ok(auth) => auth,
        Err(err) => {
            error!(error = %err, "failed to build auth client");
            return ExitCode::FAILURE;
        }
    };

    let pool = CredentialPool::fixed(count);
    let mut prepared = 0usize;
    for credentials in pool.iter() {
        match auth.acquire_session(credentials).await {
            Ok(session) if session.is_usable() => {
                prepared += 1;
                info!(email = %credentials.email, "user ready");
            }
            Ok(_) => error!(email = %credentials.email, "session unusable"),
            Err(err) => error!(email = %credentials.email, error = %err, "user preparation failed"),
        }
    }

    info!(prepared, requested = count, "user preparation finished");
    if prepared == 0 {
        error!("no usable test users; aborting");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
