/// X (Twitter) API v2 client
///
/// Exposes the two capabilities the bot needs from the platform, recent
/// search and post creation, behind the [`SearchFeed`] and [`Publisher`]
/// traits, plus the identity probe used at startup.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::config::Config;
use crate::oauth::OAuthCredentials;

/// A post returned by the search endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: String,
    pub text: String,
    /// Author handle, when the `author_id` expansion resolved
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// The account the credentials belong to
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    pub username: String,
    pub name: Option<String>,
}

/// Returned (inside `anyhow::Error`) when the API answers 429
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimited {
    pub reset_at: Option<DateTime<Utc>>,
}

impl fmt::Display for RateLimited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reset_at {
            Some(reset) => write!(
                f,
                "Rate Limited (429): too many requests, limit resets at {}",
                reset.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => write!(f, "Rate Limited (429): too many requests"),
        }
    }
}

impl std::error::Error for RateLimited {}

/// True when the error chain carries a [`RateLimited`] signal
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RateLimited>().is_some()
}

/// "Search recent items matching a query"
#[async_trait]
pub trait SearchFeed: Send + Sync {
    async fn search_recent(&self, query: &str, max_results: u32) -> Result<Vec<CandidateItem>>;
}

/// "Publish item"; returns the id of the new post
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Includes {
    users: Option<Vec<ApiUser>>,
}

#[derive(Debug, Deserialize)]
struct SearchMeta {
    result_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Option<Vec<ApiTweet>>,
    includes: Option<Includes>,
    meta: Option<SearchMeta>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: AuthenticatedUser,
}

#[derive(Debug, Serialize)]
struct CreatePostRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

/// Explicit client handle; built once at startup and shared
pub struct XClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
    oauth: OAuthCredentials,
}

impl XClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.x_api_base.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.trim().to_string(),
            oauth: OAuthCredentials {
                consumer_key: config.api_key.clone(),
                consumer_secret: config.api_secret.clone(),
                token: config.access_token.clone(),
                token_secret: config.access_token_secret.clone(),
            },
        }
    }

    /// Identity probe; any failure here means the credentials are unusable
    pub async fn get_me(&self) -> Result<AuthenticatedUser> {
        let url = format!("{}/2/users/me", self.base_url);
        let auth = self.oauth.authorization_header("GET", &url, &[])?;

        let response = self
            .http
            .get(&url)
            .header("Authorization", auth)
            .send()
            .await
            .context("Failed to reach the X API")?;

        let response = check_status(response).await?;
        let user: UserResponse = response
            .json()
            .await
            .context("Failed to parse users/me response")?;

        Ok(user.data)
    }
}

#[async_trait]
impl SearchFeed for XClient {
    /// First page of `GET /2/tweets/search/recent`, bearer-token auth
    async fn search_recent(&self, query: &str, max_results: u32) -> Result<Vec<CandidateItem>> {
        let url = format!("{}/2/tweets/search/recent", self.base_url);
        // the endpoint rejects page sizes outside 10..=100
        let page_size = max_results.clamp(10, 100).to_string();

        log::debug!("Searching with query: {} (max: {})", query, max_results);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.bearer_token))
            .query(&[
                ("query", query),
                ("max_results", page_size.as_str()),
                ("tweet.fields", "created_at,author_id"),
                ("expansions", "author_id"),
                ("user.fields", "username"),
            ])
            .send()
            .await
            .context("Failed to fetch posts from X API")?;

        let rate_limit_remaining = response
            .headers()
            .get("x-rate-limit-remaining")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok());

        let response = check_status(response).await?;

        if let Some(remaining) = rate_limit_remaining {
            log::debug!("X API rate limit: {} requests remaining", remaining);
            if remaining < 5 {
                log::warn!("Low rate limit remaining on search endpoint: {}", remaining);
            }
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to parse X API search response")?;

        if let Some(count) = body.meta.as_ref().and_then(|m| m.result_count) {
            log::debug!("Search returned {} results", count);
        }

        Ok(into_candidates(body, max_results as usize))
    }
}

#[async_trait]
impl Publisher for XClient {
    async fn publish(&self, text: &str) -> Result<String> {
        let url = format!("{}/2/tweets", self.base_url);
        let auth = self.oauth.authorization_header("POST", &url, &[])?;

        let response = self
            .http
            .post(&url)
            .header("Authorization", auth)
            .json(&CreatePostRequest { text })
            .send()
            .await
            .context("Failed to send post to X API")?;

        let response = check_status(response).await?;
        let created: CreatePostResponse = response
            .json()
            .await
            .context("Failed to parse create-post response")?;

        Ok(created.data.id)
    }
}

/// Resolve author handles from `includes.users` and cap the page
fn into_candidates(body: SearchResponse, limit: usize) -> Vec<CandidateItem> {
    let handles: HashMap<String, String> = body
        .includes
        .and_then(|i| i.users)
        .unwrap_or_default()
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    body.data
        .unwrap_or_default()
        .into_iter()
        .take(limit)
        .map(|t| CandidateItem {
            author: t.author_id.as_ref().and_then(|id| handles.get(id).cloned()),
            id: t.id,
            text: t.text,
            created_at: t.created_at,
        })
        .collect()
}

/// Turn non-2xx responses into errors; 429 becomes [`RateLimited`]
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        let reset_at = response
            .headers()
            .get("x-rate-limit-reset")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
        return Err(RateLimited { reset_at }.into());
    }

    let text = response.text().await.unwrap_or_default();
    let error_msg = match status.as_u16() {
        401 => format!(
            "Unauthorized (401): credentials were rejected. API Response: {}",
            text
        ),
        403 => format!(
            "Forbidden (403): the app lacks access to this endpoint. API Response: {}",
            text
        ),
        _ => format!("X API error: {} - {}", status, text),
    };

    anyhow::bail!("{}", error_msg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn authors_are_resolved_from_includes() {
        let body: SearchResponse = serde_json::from_str(
            r#"{
                "data": [
                    {"id": "1", "text": "Liftoff!", "author_id": "u1", "created_at": "2025-01-15T10:00:00.000Z"},
                    {"id": "2", "text": "no author"}
                ],
                "includes": {"users": [{"id": "u1", "username": "SpaceX", "name": "SpaceX"}]},
                "meta": {"result_count": 2}
            }"#,
        )
        .unwrap();

        let items = into_candidates(body, 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].author.as_deref(), Some("SpaceX"));
        assert_eq!(
            items[0].created_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap())
        );
        assert_eq!(items[1].author, None);
        assert_eq!(items[1].created_at, None);
    }

    #[test]
    fn empty_page_has_no_candidates() {
        let body: SearchResponse =
            serde_json::from_str(r#"{"meta": {"result_count": 0}}"#).unwrap();
        assert!(into_candidates(body, 10).is_empty());
    }

    #[test]
    fn page_is_capped_to_requested_size() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"data": [{"id": "1", "text": "a"}, {"id": "2", "text": "b"}, {"id": "3", "text": "c"}]}"#,
        )
        .unwrap();
        let ids: Vec<String> = into_candidates(body, 2).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn rate_limit_survives_anyhow_context() {
        let err: anyhow::Error = RateLimited { reset_at: None }.into();
        let err = err.context("Starlink search");
        assert!(is_rate_limited(&err));
        assert!(!is_rate_limited(&anyhow::anyhow!("boom")));
    }
}
