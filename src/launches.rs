/// SpaceX launch feed (read-only)

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchRecord {
    pub id: String,
    pub name: String,
    pub date_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchEndpoint {
    Upcoming,
    Past,
}

impl LaunchEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            LaunchEndpoint::Upcoming => "upcoming",
            LaunchEndpoint::Past => "past",
        }
    }
}

/// "List upcoming launches"
#[async_trait]
pub trait LaunchFeed: Send + Sync {
    async fn launches(&self, endpoint: LaunchEndpoint) -> Result<Vec<LaunchRecord>>;
}

pub struct SpaceXClient {
    http: reqwest::Client,
    base_url: String,
}

impl SpaceXClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.spacex_api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LaunchFeed for SpaceXClient {
    async fn launches(&self, endpoint: LaunchEndpoint) -> Result<Vec<LaunchRecord>> {
        let url = format!("{}/launches/{}", self.base_url, endpoint.path());

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch launches from SpaceX API")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("SpaceX API error: {} - {}", status, text);
        }

        response
            .json()
            .await
            .context("Failed to parse SpaceX launch list")
    }
}

/// Launches strictly after `now` and no later than `now + horizon`, soonest first
pub fn upcoming_within(
    launches: &[LaunchRecord],
    now: DateTime<Utc>,
    horizon: Duration,
) -> Vec<LaunchRecord> {
    let mut soon: Vec<LaunchRecord> = launches
        .iter()
        .filter(|l| l.date_utc > now && l.date_utc <= now + horizon)
        .cloned()
        .collect();
    soon.sort_by_key(|l| l.date_utc);
    soon
}
