//! Profile fetchers for icebreaker.
//!
//! Two sources feed the summary prompt: a LinkedIn profile from the Scrapin
//! enrichment API and recent posts (no retweets or replies) from the
//! Twitter/X v2 API. Both can run against embedded fixtures, either always
//! (`mock`) or as a replacement when the live call fails
//! ([`FallbackPolicy::Fixture`]).
//! Every result is tagged with the [`DataOrigin`] it came from.

mod fixtures;
mod linkedin;
mod record;
mod twitter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use ib_core::{Error, Result};

pub use fixtures::{fixture_posts, fixture_profile};
pub use linkedin::{ScrapinClient, ScrapinConfig};
pub use record::{Post, PostCollection, ProfileRecord};
pub use twitter::{TwitterClient, TwitterConfig};

/// Where a fetched record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Live,
    Fixture,
}

impl std::fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataOrigin::Live => write!(f, "live"),
            DataOrigin::Fixture => write!(f, "fixture"),
        }
    }
}

/// A fetched value together with its origin.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub data: T,
    pub origin: DataOrigin,
}

impl<T> Fetched<T> {
    pub fn live(data: T) -> Self {
        Self {
            data,
            origin: DataOrigin::Live,
        }
    }

    pub fn fixture(data: T) -> Self {
        Self {
            data,
            origin: DataOrigin::Fixture,
        }
    }
}

/// What a source does when the live call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Log a warning and return the embedded fixture.
    #[default]
    Fixture,
    /// Return `Error::Fetch`.
    Propagate,
}

/// Fetches a LinkedIn profile by URL.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, linkedin_url: &str) -> Result<Fetched<ProfileRecord>>;
}

/// Fetches recent posts, without retweets or replies, for a Twitter/X handle.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_posts(&self, handle: &str) -> Result<Fetched<PostCollection>>;
}

/// Apply `policy` to the outcome of a live fetch.
fn settle<T>(
    source_name: &str,
    policy: FallbackPolicy,
    live: Result<T>,
    fixture: impl FnOnce() -> Result<T>,
) -> Result<Fetched<T>> {
    match live {
        Ok(data) => Ok(Fetched::live(data)),
        Err(e) => match policy {
            FallbackPolicy::Fixture => {
                warn!(source = source_name, error = %e, "Live fetch failed, using fixture data");
                Ok(Fetched::fixture(fixture()?))
            }
            FallbackPolicy::Propagate => Err(Error::fetch(source_name, e.to_string())),
        },
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(e.to_string())
    } else {
        Error::network(e.to_string())
    }
}

fn build_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("icebreaker/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Read a response body, turning non-success statuses into errors.
async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(Error::from_status(status.as_u16(), body))
    }
}
