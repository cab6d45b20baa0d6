/// Configuration module for credentials, file locations and scheduling knobs
///
/// Values are read from environment variables, with a local `.env` file as
/// fallback for development machines.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::poller::RateLimitPolicy;

/// The five credential variables required at startup
pub const CREDENTIAL_VARS: [&str; 5] = [
    "API_KEY",
    "API_SECRET",
    "ACCESS_TOKEN",
    "ACCESS_TOKEN_SECRET",
    "BEARER_TOKEN",
];

#[derive(Debug, Clone)]
pub struct Config {
    /// Consumer key of the X app
    pub api_key: String,

    /// Consumer secret of the X app
    pub api_secret: String,

    /// User-context access token used for posting
    pub access_token: String,

    /// Secret paired with the access token
    pub access_token_secret: String,

    /// App-only bearer token used for search
    pub bearer_token: String,

    /// Base URL of the X API (overridable for tests)
    pub x_api_base: String,

    /// Base URL of the SpaceX launch API
    pub spacex_api_base: String,

    /// JSON array of already republished post ids
    pub seen_ids_file: String,

    /// JSON array of already announced launch ids
    pub announced_launches_file: String,

    /// JSON object holding the launch window state
    pub launch_state_file: String,

    /// Optional JSON file replacing the built-in category table
    pub categories_file: Option<String>,

    /// What to do when the search endpoint answers 429
    pub rate_limit_policy: RateLimitPolicy,

    /// Seconds between cycles in watch mode when the launch window is off
    pub tick_interval_secs: u64,

    /// Switch the watch loop to launch-window driven intervals
    pub launch_window_enabled: bool,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,

    /// Port for the status server (disabled when unset)
    pub status_port: Option<u16>,

    /// Bearer secret guarding `POST /run` (optional)
    pub status_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if any of the five credentials is missing
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            get(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };

        let rate_limit_wait_secs = get("RATE_LIMIT_WAIT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(900);

        let rate_limit_policy = match get("RATE_LIMIT_POLICY").as_deref() {
            Some("wait") => RateLimitPolicy::Wait(Duration::from_secs(rate_limit_wait_secs)),
            Some("skip") | None => RateLimitPolicy::Skip,
            Some(other) => anyhow::bail!(
                "RATE_LIMIT_POLICY must be \"skip\" or \"wait\", got \"{}\"",
                other
            ),
        };

        Ok(Config {
            api_key: required("API_KEY")?,
            api_secret: required("API_SECRET")?,
            access_token: required("ACCESS_TOKEN")?,
            access_token_secret: required("ACCESS_TOKEN_SECRET")?,
            bearer_token: required("BEARER_TOKEN")?,

            x_api_base: get("X_API_BASE")
                .unwrap_or_else(|| "https://api.twitter.com".to_string()),

            spacex_api_base: get("SPACEX_API_BASE")
                .unwrap_or_else(|| "https://api.spacexdata.com/v5".to_string()),

            seen_ids_file: get("SEEN_IDS_FILE")
                .unwrap_or_else(|| "tweeted_x_posts.json".to_string()),

            announced_launches_file: get("ANNOUNCED_LAUNCHES_FILE")
                .unwrap_or_else(|| "announced_launches.json".to_string()),

            launch_state_file: get("LAUNCH_STATE_FILE")
                .unwrap_or_else(|| "launch_state.json".to_string()),

            categories_file: get("CATEGORIES_FILE").filter(|v| !v.is_empty()),

            rate_limit_policy,

            tick_interval_secs: get("TICK_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),

            launch_window_enabled: get("LAUNCH_WINDOW")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),

            request_timeout_secs: get("REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),

            status_port: get("STATUS_PORT").and_then(|v| v.parse().ok()),
            status_secret: get("STATUS_SECRET").filter(|v| !v.is_empty()),
        })
    }

    /// Cheap sanity checks that don't need the network
    pub fn validate(&self) -> Result<()> {
        log::info!("Validating configuration...");

        for (name, base) in [("X_API_BASE", &self.x_api_base), ("SPACEX_API_BASE", &self.spacex_api_base)] {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                anyhow::bail!("{} must be an http(s) URL, got \"{}\"", name, base);
            }
        }

        if self.tick_interval_secs == 0 {
            anyhow::bail!("TICK_INTERVAL_SECS must be greater than zero");
        }

        log::info!("Configuration validated successfully");
        Ok(())
    }
}
