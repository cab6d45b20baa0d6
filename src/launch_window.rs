/// Launch window state machine
///
/// `Normal` polls every 30 minutes. When an upcoming launch is within an
/// hour either side of now the window arms and polling drops to once a
/// minute, until a search result announces payload deployment or mission
/// success.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::launches::LaunchRecord;
use crate::twitter::CandidateItem;

pub const NORMAL_INTERVAL_SECS: u64 = 1800;
pub const ARMED_INTERVAL_SECS: u64 = 60;

/// Half-width of the window around a launch timestamp
pub const ARM_RADIUS_SECS: i64 = 3600;

pub const COMPLETION_PHRASES: [&str; 2] = ["payload deploy", "mission success"];

/// Query used while armed to spot the completion post
pub const COMPLETION_QUERY: &str =
    r#"from:SpaceX ("payload deploy" OR "payload deployment" OR "mission success")"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    Normal,
    Armed,
}

/// Persisted as `{"in_window": bool, "next_check": unix_seconds}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchWindowState {
    pub in_window: bool,
    pub next_check: i64,
    /// Launch that armed the current window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub armed_launch: Option<String>,
    /// Last launch whose completion was observed; it will not re-arm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_launch: Option<String>,
}

impl LaunchWindowState {
    /// Load from disk; missing or corrupt files give the initial `Normal` state
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| serde_json::from_str(&content).map_err(anyhow::Error::from));

        match parsed {
            Ok(state) => state,
            Err(e) => {
                log::error!("Corrupted launch state file: {} ({}). Resetting.", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self).context("Failed to serialize launch state")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn phase(&self) -> WindowPhase {
        if self.in_window {
            WindowPhase::Armed
        } else {
            WindowPhase::Normal
        }
    }

    pub fn interval(&self) -> Duration {
        match self.phase() {
            WindowPhase::Normal => Duration::from_secs(NORMAL_INTERVAL_SECS),
            WindowPhase::Armed => Duration::from_secs(ARMED_INTERVAL_SECS),
        }
    }

    /// `Normal -> Armed` when some launch is within the radius of `now`
    ///
    /// Returns true on a transition.
    pub fn update_from_launches(&mut self, launches: &[LaunchRecord], now: DateTime<Utc>) -> bool {
        if self.in_window {
            return false;
        }

        let candidate = launches.iter().find(|l| {
            (l.date_utc - now).num_seconds().abs() <= ARM_RADIUS_SECS
                && self.completed_launch.as_deref() != Some(l.id.as_str())
        });

        match candidate {
            Some(launch) => {
                log::info!(
                    "Launch window armed for {} at {}",
                    launch.name,
                    launch.date_utc.format("%Y-%m-%d %H:%M UTC")
                );
                self.in_window = true;
                self.armed_launch = Some(launch.id.clone());
                true
            }
            None => false,
        }
    }

    /// `Armed -> Normal` when a recent item carries a completion phrase
    ///
    /// Only items created within two radii of `now` count, so a previous
    /// mission's success post cannot close a fresh window. Returns true on
    /// a transition.
    pub fn observe(&mut self, items: &[CandidateItem], now: DateTime<Utc>) -> bool {
        if !self.in_window {
            return false;
        }

        let oldest = now - chrono::Duration::seconds(2 * ARM_RADIUS_SECS);
        let completion = items.iter().find(|i| {
            i.created_at.is_some_and(|created| created >= oldest)
                && contains_completion_phrase(&i.text)
        });

        match completion {
            Some(item) => {
                log::info!("Completion observed in post {}, leaving launch window", item.id);
                self.in_window = false;
                self.completed_launch = self.armed_launch.take();
                true
            }
            None => false,
        }
    }

    pub fn schedule_next(&mut self, now: DateTime<Utc>) {
        self.next_check = now.timestamp() + self.interval().as_secs() as i64;
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.next_check
    }
}

pub fn contains_completion_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    COMPLETION_PHRASES.iter().any(|p| lower.contains(p))
}
