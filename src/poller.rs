/// Poller
///
/// Runs a category's search and applies the per-category filters. Failures
/// never propagate: a rate limit or API error yields an empty result so the
/// remaining categories in the cycle still run.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::categories::CategoryJob;
use crate::twitter::{is_rate_limited, CandidateItem, SearchFeed};

/// Reaction to a 429 from the search endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitPolicy {
    /// Give up on this search for the current cycle
    Skip,
    /// Block for a fixed time, then give up on this search
    Wait(Duration),
}

/// Search for one category and filter the first page
pub async fn fetch_candidates(
    feed: &dyn SearchFeed,
    job: &CategoryJob,
    now: DateTime<Utc>,
    policy: RateLimitPolicy,
) -> Vec<CandidateItem> {
    let items = search_with_policy(feed, &job.query(), job.max_results, policy, &job.name).await;
    log::info!("Found {} {} posts", items.len(), job.name);

    if job.same_day_only {
        let today = filter_same_day(items, now);
        log::info!("Found {} {} posts for today", today.len(), job.name);
        today
    } else {
        items
    }
}

/// One search call with the error policy applied
pub async fn search_with_policy(
    feed: &dyn SearchFeed,
    query: &str,
    max_results: u32,
    policy: RateLimitPolicy,
    context: &str,
) -> Vec<CandidateItem> {
    match feed.search_recent(query, max_results).await {
        Ok(items) => items,
        Err(e) if is_rate_limited(&e) => {
            match policy {
                RateLimitPolicy::Skip => {
                    log::warn!("Rate limit exceeded for {} search: {}. Skipping this run.", context, e);
                }
                RateLimitPolicy::Wait(wait) => {
                    log::warn!(
                        "Rate limit exceeded for {} search: {}. Waiting {} seconds.",
                        context,
                        e,
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
            Vec::new()
        }
        Err(e) => {
            log::error!("Error searching {}: {:#}", context, e);
            Vec::new()
        }
    }
}

/// Keep items created on the same UTC date as `now`
///
/// Items without a timestamp cannot be dated and are dropped.
pub fn filter_same_day(items: Vec<CandidateItem>, now: DateTime<Utc>) -> Vec<CandidateItem> {
    let today = now.date_naive();
    items
        .into_iter()
        .filter(|item| match item.created_at {
            Some(created) if created.date_naive() == today => true,
            Some(created) => {
                log::info!("Skipping post {} from {} (not today)", item.id, created.date_naive());
                false
            }
            None => {
                log::warn!("Skipping post {} with missing created_at", item.id);
                false
            }
        })
        .collect()
}
