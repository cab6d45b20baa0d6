/// Scheduler Module
///
/// Drives cycles either once (for cron-style deployments) or forever with
/// a sleep between cycles. With the launch window enabled, the sleep is
/// picked by the window state machine instead of the fixed tick.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::http_server::RunStatus;
use crate::launch_window::{LaunchWindowState, WindowPhase, COMPLETION_QUERY};
use crate::launches::LaunchEndpoint;
use crate::pipeline::{CycleReport, Relay};
use crate::poller::search_with_policy;

/// Run a single cycle at the current time
pub async fn run_once(relay: &Relay) -> CycleReport {
    let report = relay.run_cycle(Utc::now()).await;
    log::info!("Script execution completed");
    report
}

/// Start the polling loop; never returns
pub async fn start_scheduler(relay: Arc<Relay>, config: Config, status: Arc<RwLock<RunStatus>>) {
    let state_path = PathBuf::from(&config.launch_state_file);
    let mut window = config
        .launch_window_enabled
        .then(|| LaunchWindowState::load(&state_path));

    match &window {
        Some(state) => {
            log::info!(
                "Starting scheduler with launch window ({:?}, interval: {} seconds)",
                state.phase(),
                state.interval().as_secs()
            );

            // honour a pending next_check from a previous run
            let now = Utc::now();
            if !state.is_due(now) {
                let wait = (state.next_check - now.timestamp())
                    .clamp(0, state.interval().as_secs() as i64);
                log::info!("Next check due in {} seconds", wait);
                tokio::time::sleep(Duration::from_secs(wait as u64)).await;
            }
        }
        None => log::info!(
            "Starting scheduler (interval: {} seconds)",
            config.tick_interval_secs
        ),
    }

    loop {
        let now = Utc::now();
        let report = relay.run_cycle(now).await;
        status.write().await.record(report);

        let pause = match window.as_mut() {
            Some(state) => {
                advance_launch_window(&relay, state, now).await;
                if let Err(e) = state.save(&state_path) {
                    log::error!("Failed to save launch state: {:#}", e);
                }
                status.write().await.launch_window = Some(state.clone());
                state.interval()
            }
            None => Duration::from_secs(config.tick_interval_secs),
        };

        log::info!("Next cycle in {} seconds", pause.as_secs());
        tokio::time::sleep(pause).await;
    }
}

/// Feed the window state machine with fresh launch and search data
pub async fn advance_launch_window(
    relay: &Relay,
    state: &mut LaunchWindowState,
    now: chrono::DateTime<Utc>,
) {
    match relay.launch_feed().launches(LaunchEndpoint::Upcoming).await {
        Ok(launches) => {
            state.update_from_launches(&launches, now);
        }
        Err(e) => log::error!("Error fetching upcoming launches: {:#}", e),
    }

    if state.phase() == WindowPhase::Armed {
        let items = search_with_policy(
            relay.feed(),
            COMPLETION_QUERY,
            10,
            relay.rate_limit_policy(),
            "launch completion",
        )
        .await;
        state.observe(&items, now);
    }

    state.schedule_next(now);
}
