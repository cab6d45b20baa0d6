/// Publishing pipeline
///
/// Ties the poller, the dedup tracker, the formatter and the publish call
/// together. [`Relay`] is the explicit handle owning every collaborator;
/// it is built once at startup and passed to the scheduler and the status
/// server.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::categories::{CategoryJob, JobTable, LaunchAnnouncementJob};
use crate::config::Config;
use crate::dedup::DedupTracker;
use crate::formatter::{format_launch_announcement, format_post};
use crate::launches::{upcoming_within, LaunchEndpoint, LaunchFeed};
use crate::poller::{fetch_candidates, RateLimitPolicy};
use crate::twitter::{Publisher, SearchFeed};

/// Name under which launch announcements show up in reports
pub const LAUNCH_JOB_NAME: &str = "launches";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    AlreadyPublished,
    Failed,
}

/// Counters for one category in one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub name: String,
    pub candidates: usize,
    pub published: usize,
    /// Already published or not matching any topic
    pub skipped: usize,
    pub failed: usize,
}

impl JobReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: PublishOutcome) {
        match outcome {
            PublishOutcome::Published => self.published += 1,
            PublishOutcome::AlreadyPublished => self.skipped += 1,
            PublishOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub jobs: Vec<JobReport>,
}

impl CycleReport {
    pub fn published(&self) -> usize {
        self.jobs.iter().map(|j| j.published).sum()
    }

    pub fn skipped(&self) -> usize {
        self.jobs.iter().map(|j| j.skipped).sum()
    }

    pub fn failed(&self) -> usize {
        self.jobs.iter().map(|j| j.failed).sum()
    }
}

pub struct Relay {
    feed: Arc<dyn SearchFeed>,
    publisher: Arc<dyn Publisher>,
    launches: Arc<dyn LaunchFeed>,
    table: JobTable,
    seen_ids_file: PathBuf,
    announced_launches_file: PathBuf,
    rate_limit_policy: RateLimitPolicy,
    /// Serializes cycles; the id files are not safe under overlap
    cycle_lock: Mutex<()>,
}

impl Relay {
    pub fn new(
        config: &Config,
        table: JobTable,
        feed: Arc<dyn SearchFeed>,
        publisher: Arc<dyn Publisher>,
        launches: Arc<dyn LaunchFeed>,
    ) -> Self {
        Self {
            feed,
            publisher,
            launches,
            table,
            seen_ids_file: PathBuf::from(&config.seen_ids_file),
            announced_launches_file: PathBuf::from(&config.announced_launches_file),
            rate_limit_policy: config.rate_limit_policy,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn table(&self) -> &JobTable {
        &self.table
    }

    pub fn feed(&self) -> &dyn SearchFeed {
        self.feed.as_ref()
    }

    pub fn launch_feed(&self) -> &dyn LaunchFeed {
        self.launches.as_ref()
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        self.rate_limit_policy
    }

    /// Run every category due at `now`, one after another
    ///
    /// A failing category only shows up in its own report entry.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleReport {
        let _guard = self.cycle_lock.lock().await;
        log::info!("Starting cycle at {}", now.format("%Y-%m-%d %H:%M:%S UTC"));

        let mut jobs = Vec::new();

        for job in &self.table.categories {
            if !job.schedule.should_run(now) {
                log::debug!("Category {} not due ({})", job.name, job.schedule.describe());
                continue;
            }
            jobs.push(self.run_job(job, now).await);
        }

        if let Some(announcements) = &self.table.launch_announcements {
            if announcements.schedule.should_run(now) {
                jobs.push(self.announce_launches(announcements, now).await);
            } else {
                log::debug!(
                    "Launch announcements not due ({})",
                    announcements.schedule.describe()
                );
            }
        }

        let report = CycleReport {
            started_at: now,
            jobs,
        };

        log::info!(
            "Cycle complete: {} published, {} skipped, {} failed",
            report.published(),
            report.skipped(),
            report.failed()
        );

        report
    }

    /// Search, classify, format and publish for a single category
    pub async fn run_job(&self, job: &CategoryJob, now: DateTime<Utc>) -> JobReport {
        let mut report = JobReport::new(&job.name);
        let tracker = tracker_for(job.seen_file.as_deref(), &self.seen_ids_file);

        let mut candidates =
            fetch_candidates(self.feed.as_ref(), job, now, self.rate_limit_policy).await;
        if let Some(limit) = job.max_posts {
            candidates.truncate(limit);
        }
        report.candidates = candidates.len();

        for item in candidates {
            let Some(label) = job.classify(&item.text) else {
                log::debug!("Post {} matches no {} topic, skipping", item.id, job.name);
                report.skipped += 1;
                continue;
            };

            let message = format_post(&item, &label, &job.account);
            let outcome = self.publish_once(&tracker, &item.id, &message).await;
            report.record(outcome);
        }

        report
    }

    /// Announce launches coming up within the job's horizon
    pub async fn announce_launches(
        &self,
        job: &LaunchAnnouncementJob,
        now: DateTime<Utc>,
    ) -> JobReport {
        let mut report = JobReport::new(LAUNCH_JOB_NAME);
        let tracker = tracker_for(job.seen_file.as_deref(), &self.announced_launches_file);

        let launches = match self.launches.launches(LaunchEndpoint::Upcoming).await {
            Ok(launches) => launches,
            Err(e) => {
                log::error!("Error fetching upcoming launches: {:#}", e);
                return report;
            }
        };

        let soon = upcoming_within(&launches, now, Duration::hours(job.horizon_hours));
        log::info!("Found {} launches in the next {} hours", soon.len(), job.horizon_hours);
        report.candidates = soon.len();

        for launch in soon {
            let message = format_launch_announcement(&launch);
            let outcome = self.publish_once(&tracker, &launch.id, &message).await;
            report.record(outcome);
        }

        report
    }

    /// Dedup gate plus publish; the id is recorded only after success
    pub async fn publish_once(
        &self,
        tracker: &DedupTracker,
        id: &str,
        message: &str,
    ) -> PublishOutcome {
        if tracker.has_been_published(id) {
            log::info!("Post {} already published, skipping.", id);
            return PublishOutcome::AlreadyPublished;
        }

        match self.publisher.publish(message).await {
            Ok(new_id) => {
                tracker.mark_published(id);
                log::info!("Published {} as {}: {}", id, new_id, message);
                PublishOutcome::Published
            }
            Err(e) => {
                log::error!("Error publishing {}: {:#}", id, e);
                PublishOutcome::Failed
            }
        }
    }
}

fn tracker_for(override_path: Option<&str>, default_path: &Path) -> DedupTracker {
    match override_path {
        Some(path) => DedupTracker::new(path),
        None => DedupTracker::new(default_path),
    }
}
