/// Category table
///
/// Each category is one row of configuration: which account and keywords
/// to search, how to label republished posts, when it runs and where its
/// published ids live. The pipeline iterates over the table instead of
/// having one hand-written function per topic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cadence::Schedule;

/// Substring rule mapping a post to a topic label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRule {
    pub keywords: Vec<String>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryJob {
    pub name: String,
    /// Account handle searched with `from:`
    pub account: String,
    /// OR-ed keywords; multi-word entries are quoted
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_retweets: bool,
    #[serde(default = "default_lang")]
    pub lang: Option<String>,
    /// Prefix of the republished message
    pub label: String,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Cap on publish attempts per run
    #[serde(default)]
    pub max_posts: Option<usize>,
    /// Keep only items created on the current UTC date
    #[serde(default)]
    pub same_day_only: bool,
    /// When non-empty, the first matching rule picks the label and
    /// unmatched posts are skipped
    #[serde(default)]
    pub topics: Vec<TopicRule>,
    /// Id file for this category; the shared file is used when unset
    #[serde(default)]
    pub seen_file: Option<String>,
}

fn default_lang() -> Option<String> {
    Some("en".to_string())
}

fn default_max_results() -> u32 {
    10
}

/// Upcoming-launch announcements driven by the launch feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchAnnouncementJob {
    #[serde(default = "default_announcement_schedule")]
    pub schedule: Schedule,
    /// How far ahead a launch must be to get announced
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: i64,
    /// Announced launch ids; falls back to the configured default file
    #[serde(default)]
    pub seen_file: Option<String>,
}

fn default_announcement_schedule() -> Schedule {
    Schedule::AtHours {
        hours: vec![0, 6, 12, 18],
    }
}

fn default_horizon_hours() -> i64 {
    24
}

impl Default for LaunchAnnouncementJob {
    fn default() -> Self {
        Self {
            schedule: default_announcement_schedule(),
            horizon_hours: default_horizon_hours(),
            seen_file: None,
        }
    }
}

/// Full schedule table, as loaded from `CATEGORIES_FILE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTable {
    pub categories: Vec<CategoryJob>,
    /// Omitted in a file means announcements are off
    #[serde(default)]
    pub launch_announcements: Option<LaunchAnnouncementJob>,
}

impl CategoryJob {
    /// Search expression for the platform's recent-search syntax
    pub fn query(&self) -> String {
        let mut parts = vec![format!("from:{}", self.account)];

        if !self.keywords.is_empty() {
            let terms: Vec<String> = self
                .keywords
                .iter()
                .map(|k| {
                    if k.contains(char::is_whitespace) {
                        format!("\"{}\"", k)
                    } else {
                        k.clone()
                    }
                })
                .collect();
            parts.push(format!("({})", terms.join(" OR ")));
        }

        if self.exclude_retweets {
            parts.push("-filter:retweets".to_string());
        }

        if let Some(lang) = &self.lang {
            parts.push(format!("lang:{}", lang));
        }

        parts.join(" ")
    }

    /// Label to publish `text` under, or `None` to skip it
    pub fn classify(&self, text: &str) -> Option<String> {
        if self.topics.is_empty() {
            return Some(self.label.clone());
        }

        let lower = text.to_lowercase();
        self.topics
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lower.contains(&k.to_lowercase())))
            .map(|rule| rule.label.clone())
    }
}

fn phrases(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Built-in table used when no categories file is configured
pub fn default_table() -> JobTable {
    JobTable {
        categories: vec![
            CategoryJob {
                name: "spacex".to_string(),
                account: "SpaceX".to_string(),
                keywords: phrases(&[
                    "Watch Falcon 9 launch",
                    "Livestream starts",
                    "Watch live",
                    "Live now",
                    "Liftoff of Falcon 9",
                    "Falcon 9 launches",
                ]),
                exclude_retweets: false,
                lang: default_lang(),
                label: "SpaceX Update".to_string(),
                schedule: Schedule::Always,
                max_results: 10,
                max_posts: None,
                same_day_only: true,
                topics: Vec::new(),
                seen_file: None,
            },
            CategoryJob {
                name: "starlink".to_string(),
                account: "Starlink".to_string(),
                keywords: phrases(&["launch", "availability", "deployment"]),
                exclude_retweets: false,
                lang: default_lang(),
                label: "Starlink Update from Starlink".to_string(),
                schedule: Schedule::AtHours { hours: vec![0, 12] },
                max_results: 10,
                max_posts: Some(2),
                same_day_only: false,
                topics: Vec::new(),
                seen_file: None,
            },
            CategoryJob {
                name: "elon".to_string(),
                account: "elonmusk".to_string(),
                keywords: Vec::new(),
                exclude_retweets: true,
                lang: default_lang(),
                label: "Update from Elon".to_string(),
                schedule: Schedule::Always,
                max_results: 10,
                max_posts: None,
                same_day_only: false,
                topics: vec![
                    TopicRule {
                        keywords: phrases(&["starship", "super heavy", "booster"]),
                        label: "Starship Update from Elon".to_string(),
                    },
                    TopicRule {
                        keywords: phrases(&["starlink"]),
                        label: "Starlink Update from Elon".to_string(),
                    },
                    TopicRule {
                        keywords: phrases(&["spacex", "falcon", "dragon", "rocket", "launch"]),
                        label: "SpaceX Update from Elon".to_string(),
                    },
                ],
                seen_file: None,
            },
        ],
        launch_announcements: Some(LaunchAnnouncementJob::default()),
    }
}

/// Load the table from a JSON file, or the built-in one when `path` is `None`
pub fn load_table(path: Option<&str>) -> Result<JobTable> {
    let Some(path) = path else {
        return Ok(default_table());
    };

    let content = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read categories file {}", path))?;
    let table: JobTable = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse categories file {}", path))?;

    log::info!(
        "Loaded {} categories from {}",
        table.categories.len(),
        path
    );
    Ok(table)
}
