//! squery-monitor - Server Query activity monitor
//!
//! Connects to a query port, optionally logs in and selects a virtual
//! server, then logs client activity until interrupted.
//!
//! Usage: `squery-monitor [config.toml]`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use squery_core::QueryConfig;
use squery_net::{Client, ConnectionState, Error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod announcer;

use announcer::Announcer;

/// How often to check whether the server dropped us
const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting squery-monitor");

    let config = match load_config(std::env::args_os().nth(1).map(PathBuf::from)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Monitor stopped");
            ExitCode::FAILURE
        }
    }
}

/// Explicit path, else the per-user config file if present, else defaults
fn load_config(path: Option<PathBuf>) -> squery_core::Result<QueryConfig> {
    if let Some(path) = path {
        tracing::info!(path = %path.display(), "Loading configuration");
        return QueryConfig::load(&path);
    }

    match QueryConfig::default_path() {
        Some(path) if path.exists() => {
            tracing::info!(path = %path.display(), "Loading configuration");
            QueryConfig::load(&path)
        }
        _ => {
            tracing::info!("No configuration file, using defaults");
            Ok(QueryConfig::default())
        }
    }
}

async fn run(config: QueryConfig) -> squery_net::Result<()> {
    let client = Client::connect(&config).await?;

    if let Err(e) = prepare(&client, &config).await {
        client.disconnect().await;
        return Err(e);
    }

    tracing::info!("Monitoring, press ctrl-c to stop");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Unable to listen for ctrl-c");
            }
            tracing::info!("Interrupted");
        }
        _ = closed(&client) => {
            tracing::warn!("Server closed the connection");
        }
    }

    client.disconnect().await;
    tracing::info!(dropped_events = client.dropped_events(), "Monitor stopped");
    Ok(())
}

/// Log in, select the virtual server, and hook up the announcer
async fn prepare(client: &Client, config: &QueryConfig) -> squery_net::Result<()> {
    if let Some(login) = &config.login {
        let result = client.login(&login.username, &login.password).await?;
        if result.has_error() {
            return Err(Error::Protocol(format!(
                "login failed: {} ({})",
                result.error_message(),
                result.error_code()
            )));
        }
    }

    if let Some(server_id) = config.virtual_server_id {
        let result = client.use_server(server_id).await?;
        if result.has_error() {
            return Err(Error::Protocol(format!(
                "selecting virtual server {} failed: {} ({})",
                server_id,
                result.error_message(),
                result.error_code()
            )));
        }
        tracing::info!(server_id = server_id, "Virtual server selected");
    }

    client.add_listener(Arc::new(Announcer::new())).await;

    if !client.register_notifications(config.use_polling).await? {
        tracing::warn!("Some notifications could not be registered");
    }
    Ok(())
}

/// Resolves once the connection is gone
async fn closed(client: &Client) {
    while client.connection_state().await == ConnectionState::Connected {
        tokio::time::sleep(LIVENESS_INTERVAL).await;
    }
}
