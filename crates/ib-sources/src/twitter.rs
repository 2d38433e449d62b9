//! Recent posts through the Twitter/X v2 API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use ib_core::{Error, Result};

use crate::fixtures::fixture_posts;
use crate::record::{Post, PostCollection};
use crate::{
    build_client, read_body, settle, transport_error, FallbackPolicy, Fetched, PostSource,
};

const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

/// Page size bounds accepted by the timeline endpoint.
const MIN_PAGE: usize = 5;
const MAX_PAGE: usize = 100;

#[derive(Clone, Debug)]
pub struct TwitterConfig {
    pub bearer_token: String,
    pub base_url: String,
    /// Number of posts returned per handle.
    pub max_posts: usize,
    pub mock: bool,
    pub fallback: FallbackPolicy,
    pub timeout: Duration,
}

impl TwitterConfig {
    pub fn new(bearer_token: impl Into<String>) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_posts: 5,
            mock: false,
            fallback: FallbackPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_posts(mut self, max_posts: usize) -> Self {
        self.max_posts = max_posts;
        self
    }

    pub fn with_mock(mut self, mock: bool) -> Self {
        self.mock = mock;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct UserResponse {
    data: Option<User>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

#[derive(Deserialize)]
struct User {
    id: String,
}

#[derive(Deserialize)]
struct ApiProblem {
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<Tweet>,
}

#[derive(Deserialize)]
pub(crate) struct Tweet {
    id: String,
    text: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Turn raw tweets into at most `limit` posts linked under `handle`.
pub(crate) fn collect_posts(handle: &str, tweets: Vec<Tweet>, limit: usize) -> PostCollection {
    let posts = tweets
        .into_iter()
        .take(limit)
        .map(|t| Post::new(handle, &t.id, t.text).with_created_at(t.created_at))
        .collect();
    PostCollection::new(handle, posts)
}

pub struct TwitterClient {
    client: Client,
    config: TwitterConfig,
}

impl TwitterClient {
    pub fn new(config: TwitterConfig) -> Self {
        Self {
            client: build_client(config.timeout),
            config,
        }
    }

    async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.bearer_token)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        read_body(response).await
    }

    async fn user_id(&self, handle: &str) -> Result<String> {
        let url = format!("{}/2/users/by/username/{}", self.config.base_url, handle);
        let body = self.get(&url, &[]).await?;
        let response: UserResponse = serde_json::from_str(&body)?;

        match response.data {
            Some(user) => Ok(user.id),
            None => {
                let detail = response
                    .errors
                    .into_iter()
                    .find_map(|p| p.detail)
                    .unwrap_or_else(|| format!("user '{}' not found", handle));
                Err(Error::api(404, detail))
            }
        }
    }

    async fn fetch_live(&self, handle: &str) -> Result<PostCollection> {
        let user_id = self.user_id(handle).await?;
        debug!(handle, user_id = %user_id, "Resolved Twitter user id");

        let page = self.config.max_posts.clamp(MIN_PAGE, MAX_PAGE);
        let url = format!("{}/2/users/{}/tweets", self.config.base_url, user_id);
        let body = self
            .get(
                &url,
                &[
                    ("max_results", page.to_string()),
                    ("exclude", "retweets,replies".to_string()),
                    ("tweet.fields", "created_at,public_metrics".to_string()),
                ],
            )
            .await?;
        let timeline: TimelineResponse = serde_json::from_str(&body)?;
        Ok(collect_posts(handle, timeline.data, self.config.max_posts))
    }
}

#[async_trait]
impl PostSource for TwitterClient {
    async fn fetch_posts(&self, handle: &str) -> Result<Fetched<PostCollection>> {
        let handle = handle.trim().trim_start_matches('@');
        if handle.is_empty() {
            return Err(Error::invalid_request("Twitter handle is empty"));
        }

        let max_posts = self.config.max_posts;
        if self.config.mock {
            debug!(handle, "Twitter mock mode, serving fixture");
            return Ok(Fetched::fixture(fixture_posts(handle, max_posts)?));
        }

        let live = self.fetch_live(handle).await;
        let fetched = settle("twitter", self.config.fallback, live, || {
            fixture_posts(handle, max_posts)
        })?;
        info!(
            handle,
            origin = %fetched.origin,
            posts = fetched.data.len(),
            "Twitter posts fetched"
        );
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataOrigin;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, fallback: FallbackPolicy) -> TwitterClient {
        TwitterClient::new(
            TwitterConfig::new("bearer-test")
                .with_base_url(server.uri())
                .with_fallback(fallback),
        )
    }

    async fn mount_user(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/2/users/by/username/janedoe"))
            .and(header("authorization", "Bearer bearer-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": "42", "name": "Jane Doe", "username": "janedoe"}
            })))
            .mount(server)
            .await;
    }

    fn tweets(count: usize) -> serde_json::Value {
        let data: Vec<_> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "id": format!("{}", 1000 + i),
                    "text": format!("post number {}", i),
                    "created_at": "2024-05-13T09:12:44.000Z",
                    "public_metrics": {"like_count": i}
                })
            })
            .collect();
        serde_json::json!({"data": data, "meta": {"result_count": count}})
    }

    #[tokio::test]
    async fn test_fetch_live_posts() {
        let server = MockServer::start().await;
        mount_user(&server).await;
        Mock::given(method("GET"))
            .and(path("/2/users/42/tweets"))
            .and(query_param("max_results", "5"))
            .and(query_param("exclude", "retweets,replies"))
            .and(query_param("tweet.fields", "created_at,public_metrics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tweets(5)))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = client(&server, FallbackPolicy::Propagate)
            .fetch_posts("@janedoe")
            .await
            .unwrap();

        assert_eq!(fetched.origin, DataOrigin::Live);
        assert_eq!(fetched.data.handle(), "janedoe");
        assert_eq!(fetched.data.len(), 5);
        let first = fetched.data.iter().next().unwrap();
        assert_eq!(first.text, "post number 0");
        assert_eq!(first.url, "https://twitter.com/janedoe/status/1000");
        assert!(first.created_at.is_some());
    }

    #[tokio::test]
    async fn test_page_size_clamped_and_truncated() {
        let server = MockServer::start().await;
        mount_user(&server).await;
        Mock::given(method("GET"))
            .and(path("/2/users/42/tweets"))
            .and(query_param("max_results", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tweets(5)))
            .expect(1)
            .mount(&server)
            .await;

        let client = TwitterClient::new(
            TwitterConfig::new("bearer-test")
                .with_base_url(server.uri())
                .with_max_posts(2)
                .with_fallback(FallbackPolicy::Propagate),
        );
        let fetched = client.fetch_posts("janedoe").await.unwrap();
        assert_eq!(fetched.data.len(), 2);
    }

    #[tokio::test]
    async fn test_no_posts_is_empty_collection() {
        let server = MockServer::start().await;
        mount_user(&server).await;
        Mock::given(method("GET"))
            .and(path("/2/users/42/tweets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"meta": {"result_count": 0}}),
            ))
            .mount(&server)
            .await;

        let fetched = client(&server, FallbackPolicy::Propagate)
            .fetch_posts("janedoe")
            .await
            .unwrap();
        assert_eq!(fetched.origin, DataOrigin::Live);
        assert!(fetched.data.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/by/username/ghost"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "errors": [{"detail": "Could not find user with username: [ghost].", "title": "Not Found Error"}]
            })))
            .mount(&server)
            .await;

        let err = client(&server, FallbackPolicy::Propagate)
            .fetch_posts("ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch { ref source_name, .. } if source_name == "twitter"));
        assert!(err.to_string().contains("Could not find user"));
    }

    #[tokio::test]
    async fn test_rate_limit_falls_back_to_fixture() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        let fetched = client(&server, FallbackPolicy::Fixture)
            .fetch_posts("janedoe")
            .await
            .unwrap();
        assert_eq!(fetched.origin, DataOrigin::Fixture);
        assert_eq!(fetched.data.handle(), "janedoe");
        assert!(!fetched.data.is_empty());
    }

    #[tokio::test]
    async fn test_mock_mode_and_blank_handle() {
        let client = TwitterClient::new(TwitterConfig::new("").with_mock(true));
        let fetched = client.fetch_posts("janedoe").await.unwrap();
        assert_eq!(fetched.origin, DataOrigin::Fixture);

        let err = client.fetch_posts("  @ ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
