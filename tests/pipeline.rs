//! End-to-end cycle behaviour with in-memory feeds

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use launch_relay_bot::categories::{default_table, CategoryJob, JobTable, LaunchAnnouncementJob};
use launch_relay_bot::config::{Config, CREDENTIAL_VARS};
use launch_relay_bot::dedup::load_ids;
use launch_relay_bot::launch_window::{LaunchWindowState, WindowPhase, COMPLETION_QUERY};
use launch_relay_bot::launches::{LaunchEndpoint, LaunchFeed, LaunchRecord};
use launch_relay_bot::pipeline::Relay;
use launch_relay_bot::scheduler::advance_launch_window;
use launch_relay_bot::twitter::{CandidateItem, Publisher, RateLimited, SearchFeed};

#[derive(Default)]
struct FakeFeed {
    /// Replies keyed by the `from:` account in the query
    by_account: HashMap<String, Vec<CandidateItem>>,
    rate_limited: Vec<String>,
    completion: Vec<CandidateItem>,
    queries: Mutex<Vec<String>>,
}

impl FakeFeed {
    fn with(mut self, account: &str, items: Vec<CandidateItem>) -> Self {
        self.by_account.insert(account.to_string(), items);
        self
    }

    fn queried_accounts(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|q| q.split_whitespace().next())
            .map(|from| from.trim_start_matches("from:").to_string())
            .collect()
    }
}

#[async_trait]
impl SearchFeed for FakeFeed {
    async fn search_recent(&self, query: &str, _max_results: u32) -> Result<Vec<CandidateItem>> {
        self.queries.lock().unwrap().push(query.to_string());

        if query == COMPLETION_QUERY {
            return Ok(self.completion.clone());
        }

        let account = query
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_start_matches("from:");

        if self.rate_limited.iter().any(|a| a == account) {
            return Err(RateLimited { reset_at: None }.into());
        }
        Ok(self.by_account.get(account).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct FakePublisher {
    posted: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, text: &str) -> Result<String> {
        if self.fail {
            anyhow::bail!("X API error: 403 Forbidden - duplicate content");
        }
        let mut posted = self.posted.lock().unwrap();
        posted.push(text.to_string());
        Ok(format!("9{}", posted.len()))
    }
}

#[derive(Default)]
struct FakeLaunches {
    upcoming: Vec<LaunchRecord>,
}

#[async_trait]
impl LaunchFeed for FakeLaunches {
    async fn launches(&self, endpoint: LaunchEndpoint) -> Result<Vec<LaunchRecord>> {
        match endpoint {
            LaunchEndpoint::Upcoming => Ok(self.upcoming.clone()),
            LaunchEndpoint::Past => Ok(Vec::new()),
        }
    }
}

fn config(dir: &Path) -> Config {
    let seen = dir.join("tweeted_x_posts.json");
    let launches = dir.join("announced_launches.json");
    Config::from_lookup(move |key| match key {
        "SEEN_IDS_FILE" => Some(seen.display().to_string()),
        "ANNOUNCED_LAUNCHES_FILE" => Some(launches.display().to_string()),
        k if CREDENTIAL_VARS.iter().any(|v| *v == k) => Some("test".to_string()),
        _ => None,
    })
    .unwrap()
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 10, hour, 0, 0).unwrap()
}

fn post(id: &str, text: &str, created_at: DateTime<Utc>) -> CandidateItem {
    CandidateItem {
        id: id.to_string(),
        text: text.to_string(),
        author: None,
        created_at: Some(created_at),
    }
}

fn only(name: &str) -> JobTable {
    let mut table = default_table();
    table.categories.retain(|j| j.name == name);
    table.launch_announcements = None;
    table
}

struct Harness {
    _dir: TempDir,
    seen_file: std::path::PathBuf,
    feed: Arc<FakeFeed>,
    publisher: Arc<FakePublisher>,
    relay: Relay,
}

fn harness(table: JobTable, feed: FakeFeed, publisher: FakePublisher, launches: FakeLaunches) -> Harness {
    let dir = TempDir::new().unwrap();
    let cfg = config(dir.path());
    let feed = Arc::new(feed);
    let publisher = Arc::new(publisher);
    let relay = Relay::new(&cfg, table, feed.clone(), publisher.clone(), Arc::new(launches));
    Harness {
        seen_file: dir.path().join("tweeted_x_posts.json"),
        _dir: dir,
        feed,
        publisher,
        relay,
    }
}

fn spacex_job(table: &JobTable) -> &CategoryJob {
    &table.categories[0]
}

#[tokio::test]
async fn already_published_item_is_skipped_and_new_one_is_posted() {
    let text = "Liftoff of Falcon 9 carrying 23 Starlink satellite";
    assert_eq!(text.chars().count(), 50);

    let feed = FakeFeed::default().with(
        "SpaceX",
        vec![post("100", "Watch live", at(9)), post("200", text, at(9))],
    );
    let h = harness(only("spacex"), feed, FakePublisher::default(), FakeLaunches::default());
    std::fs::write(&h.seen_file, r#"["100"]"#).unwrap();

    let report = h.relay.run_job(spacex_job(h.relay.table()), at(10)).await;

    assert_eq!(report.published, 1);
    assert_eq!(report.skipped, 1);

    let posted = h.publisher.posted.lock().unwrap().clone();
    assert_eq!(
        posted,
        vec![format!("SpaceX Update: {} https://x.com/SpaceX/status/200", text)]
    );
    assert!(posted[0].chars().count() <= 280);
    assert_eq!(load_ids(&h.seen_file), vec!["100".to_string(), "200".to_string()]);
}

#[tokio::test]
async fn skipped_item_leaves_file_untouched() {
    let feed = FakeFeed::default().with("SpaceX", vec![post("100", "Live now", at(9))]);
    let h = harness(only("spacex"), feed, FakePublisher::default(), FakeLaunches::default());
    std::fs::write(&h.seen_file, r#"["100"]"#).unwrap();

    h.relay.run_cycle(at(10)).await;

    assert!(h.publisher.posted.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(&h.seen_file).unwrap(), r#"["100"]"#);
}

#[tokio::test]
async fn failed_publish_does_not_record_the_id() {
    let feed = FakeFeed::default().with("SpaceX", vec![post("300", "Watch live", at(9))]);
    let publisher = FakePublisher {
        fail: true,
        ..Default::default()
    };
    let h = harness(only("spacex"), feed, publisher, FakeLaunches::default());

    let report = h.relay.run_cycle(at(10)).await;

    assert_eq!(report.failed(), 1);
    assert!(load_ids(&h.seen_file).is_empty());
}

#[tokio::test]
async fn running_twice_publishes_once() {
    let feed = FakeFeed::default().with("SpaceX", vec![post("400", "Falcon 9 launches", at(9))]);
    let h = harness(only("spacex"), feed, FakePublisher::default(), FakeLaunches::default());

    let first = h.relay.run_cycle(at(10)).await;
    let second = h.relay.run_cycle(at(11)).await;

    assert_eq!(first.published(), 1);
    assert_eq!(second.published(), 0);
    assert_eq!(second.skipped(), 1);
    assert_eq!(h.publisher.posted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn old_launch_posts_are_not_republished() {
    let feed = FakeFeed::default().with(
        "SpaceX",
        vec![post("500", "Watch live", at(9) - Duration::days(1))],
    );
    let h = harness(only("spacex"), feed, FakePublisher::default(), FakeLaunches::default());

    let report = h.relay.run_cycle(at(10)).await;
    assert_eq!(report.jobs[0].candidates, 0);
    assert_eq!(report.published(), 0);
}

#[tokio::test]
async fn starlink_runs_only_at_its_hours_and_caps_posts() {
    let items = (1..=5)
        .map(|i| post(&format!("s{}", i), "New Starlink availability", at(0)))
        .collect();
    let feed = FakeFeed::default().with("Starlink", items);
    let h = harness(only("starlink"), feed, FakePublisher::default(), FakeLaunches::default());

    let report = h.relay.run_cycle(at(5)).await;
    assert!(report.jobs.is_empty());
    assert!(h.feed.queried_accounts().is_empty());

    let report = h.relay.run_cycle(at(12)).await;
    assert_eq!(report.published(), 2);
    assert_eq!(
        h.publisher.posted.lock().unwrap()[0],
        "Starlink Update from Starlink: New Starlink availability https://x.com/Starlink/status/s1"
    );
}

#[tokio::test]
async fn elon_posts_are_labelled_by_topic_and_unmatched_skipped() {
    let mut starship = post("e1", "Starship flight test next week", at(8));
    starship.author = Some("elonmusk".to_string());
    let feed = FakeFeed::default().with(
        "elonmusk",
        vec![starship, post("e2", "Lunch was great", at(8))],
    );
    let h = harness(only("elon"), feed, FakePublisher::default(), FakeLaunches::default());

    let report = h.relay.run_cycle(at(8)).await;

    assert_eq!(report.published(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(
        h.publisher.posted.lock().unwrap()[0],
        "Starship Update from Elon: Starship flight test next week https://x.com/elonmusk/status/e1"
    );
}

#[tokio::test]
async fn rate_limited_category_does_not_block_the_others() {
    let mut feed = FakeFeed::default().with(
        "elonmusk",
        vec![post("e3", "Falcon heavy is go", at(12))],
    );
    feed.rate_limited.push("SpaceX".to_string());

    let mut table = default_table();
    table.launch_announcements = None;
    let h = harness(table, feed, FakePublisher::default(), FakeLaunches::default());

    let report = h.relay.run_cycle(at(12)).await;

    let names: Vec<&str> = report.jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["spacex", "starlink", "elon"]);
    assert_eq!(report.jobs[0].candidates, 0);
    assert_eq!(report.published(), 1);
    assert_eq!(h.feed.queried_accounts(), vec!["SpaceX", "Starlink", "elonmusk"]);
}

#[tokio::test]
async fn upcoming_launches_are_announced_once() {
    let launches = FakeLaunches {
        upcoming: vec![
            LaunchRecord {
                id: "l1".to_string(),
                name: "Crew-11".to_string(),
                date_utc: at(6) + Duration::hours(5),
            },
            LaunchRecord {
                id: "l2".to_string(),
                name: "Far Future".to_string(),
                date_utc: at(6) + Duration::days(10),
            },
        ],
    };
    let table = JobTable {
        categories: Vec::new(),
        launch_announcements: Some(LaunchAnnouncementJob::default()),
    };
    let h = harness(table, FakeFeed::default(), FakePublisher::default(), launches);

    let not_due = h.relay.run_cycle(at(7)).await;
    assert!(not_due.jobs.is_empty());

    let first = h.relay.run_cycle(at(6)).await;
    let second = h.relay.run_cycle(at(12)).await;

    assert_eq!(first.published(), 1);
    assert_eq!(second.published(), 0);
    assert_eq!(
        h.publisher.posted.lock().unwrap().clone(),
        vec!["Upcoming SpaceX launch: Crew-11 on April 10, 2025 at 11:00 UTC".to_string()]
    );
}

#[tokio::test]
async fn launch_window_arms_and_disarms() {
    let now = at(14);
    let launches = FakeLaunches {
        upcoming: vec![LaunchRecord {
            id: "l9".to_string(),
            name: "Starlink 12-1".to_string(),
            date_utc: now + Duration::minutes(20),
        }],
    };
    let h = harness(only("spacex"), FakeFeed::default(), FakePublisher::default(), launches);

    let mut state = LaunchWindowState::default();
    advance_launch_window(&h.relay, &mut state, now).await;
    assert_eq!(state.phase(), WindowPhase::Armed);
    assert_eq!(state.next_check, now.timestamp() + 60);

    let mut feed = FakeFeed::default();
    feed.completion = vec![post("c1", "Falcon 9 payload deploy confirmed", now)];
    let h2 = harness(
        only("spacex"),
        feed,
        FakePublisher::default(),
        FakeLaunches::default(),
    );
    advance_launch_window(&h2.relay, &mut state, now + Duration::minutes(40)).await;
    assert_eq!(state.phase(), WindowPhase::Normal);
    assert_eq!(
        state.next_check,
        (now + Duration::minutes(40)).timestamp() + 1800
    );
}
