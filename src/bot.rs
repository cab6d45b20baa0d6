/// Bot startup
///
/// Builds the API clients once, probes the credentials, loads the category
/// table and hands the assembled [`Relay`] to the requested run mode.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::categories::load_table;
use crate::config::Config;
use crate::http_server::{start_server, AppState, RunStatus};
use crate::launches::{LaunchEndpoint, LaunchFeed, SpaceXClient};
use crate::pipeline::Relay;
use crate::scheduler::{run_once, start_scheduler};
use crate::twitter::{AuthenticatedUser, XClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One cycle, then exit
    Once,
    /// Loop forever
    Watch,
}

/// Probe the credentials; failure here is fatal
pub async fn authenticate(client: &XClient) -> Result<AuthenticatedUser> {
    log::info!("Authenticating with X API...");

    match client.get_me().await {
        Ok(user) => {
            log::info!("Authenticated as: {}", user.username);
            Ok(user)
        }
        Err(e) => {
            log::error!("X API v2 authentication failed: {:#}", e);
            Err(e.context("Authentication with X API failed"))
        }
    }
}

/// Assemble the relay from configuration
pub async fn build_relay(config: &Config) -> Result<Arc<Relay>> {
    let x_client = Arc::new(XClient::new(config)?);
    authenticate(&x_client).await?;

    let spacex = Arc::new(SpaceXClient::new(config)?);
    let table = load_table(config.categories_file.as_deref())?;

    for job in &table.categories {
        log::info!("Category {}: {} ({})", job.name, job.query(), job.schedule.describe());
    }

    Ok(Arc::new(Relay::new(
        config,
        table,
        x_client.clone(),
        x_client,
        spacex,
    )))
}

/// Initialize everything and run in the requested mode
pub async fn run_bot(config: Config, mode: RunMode) -> Result<()> {
    log::info!("Initializing bot...");

    let relay = build_relay(&config).await?;

    match mode {
        RunMode::Once => {
            let report = run_once(&relay).await;
            if report.failed() > 0 {
                log::warn!("{} posts failed to publish this run", report.failed());
            }
        }
        RunMode::Watch => {
            let status = Arc::new(RwLock::new(RunStatus::default()));

            if let Some(port) = config.status_port {
                let state = AppState {
                    relay: relay.clone(),
                    status: status.clone(),
                    secret: config.status_secret.clone(),
                };
                tokio::spawn(async move {
                    if let Err(e) = start_server(state, port).await {
                        log::error!("Status server stopped: {:#}", e);
                    }
                });
            }

            tokio::select! {
                _ = start_scheduler(relay, config, status) => {}
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received Ctrl+C, shutting down");
                }
            }
        }
    }

    Ok(())
}

/// Print launches from the feed, soonest (or most recent) first
pub async fn list_launches(config: &Config, endpoint: LaunchEndpoint) -> Result<()> {
    let client = SpaceXClient::new(config)?;
    let mut launches = client.launches(endpoint).await?;

    match endpoint {
        LaunchEndpoint::Upcoming => launches.sort_by_key(|l| l.date_utc),
        LaunchEndpoint::Past => launches.sort_by_key(|l| std::cmp::Reverse(l.date_utc)),
    }

    for launch in launches.iter().take(10) {
        println!(
            "{}  {}  ({})",
            launch.date_utc.format("%Y-%m-%d %H:%M UTC"),
            launch.name,
            launch.id
        );
    }

    Ok(())
}
