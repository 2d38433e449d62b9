//! LinkedIn profiles through the Scrapin enrichment API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use ib_core::{Error, Result};

use crate::fixtures::fixture_profile;
use crate::record::ProfileRecord;
use crate::{
    build_client, read_body, settle, transport_error, FallbackPolicy, Fetched, ProfileSource,
};

const DEFAULT_BASE_URL: &str = "https://api.scrapin.io";

#[derive(Clone, Debug)]
pub struct ScrapinConfig {
    pub api_key: String,
    pub base_url: String,
    /// Skip the network and serve the fixture profile.
    pub mock: bool,
    pub fallback: FallbackPolicy,
    pub timeout: Duration,
}

impl ScrapinConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            mock: false,
            fallback: FallbackPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
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
pub(crate) struct ScrapinResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    person: Option<Value>,
    #[serde(default)]
    msg: Option<String>,
}

impl ScrapinResponse {
    pub(crate) fn into_record(self) -> Result<ProfileRecord> {
        match self.person {
            Some(person) if self.success != Some(false) => ProfileRecord::from_person(person),
            _ => Err(Error::api(
                404,
                self.msg
                    .unwrap_or_else(|| "response contained no person".to_string()),
            )),
        }
    }
}

pub struct ScrapinClient {
    client: Client,
    config: ScrapinConfig,
}

impl ScrapinClient {
    pub fn new(config: ScrapinConfig) -> Self {
        Self {
            client: build_client(config.timeout),
            config,
        }
    }

    async fn fetch_live(&self, linkedin_url: &str) -> Result<ProfileRecord> {
        let url = format!("{}/enrichment/profile", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("apikey", self.config.api_key.as_str()),
                ("linkedInUrl", linkedin_url),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let body = read_body(response).await?;
        let parsed: ScrapinResponse = serde_json::from_str(&body)?;
        parsed.into_record()
    }
}

#[async_trait]
impl ProfileSource for ScrapinClient {
    async fn fetch_profile(&self, linkedin_url: &str) -> Result<Fetched<ProfileRecord>> {
        if self.config.mock {
            debug!(url = linkedin_url, "LinkedIn mock mode, serving fixture");
            return Ok(Fetched::fixture(fixture_profile()?));
        }

        let live = self.fetch_live(linkedin_url).await;
        let fetched = settle("linkedin", self.config.fallback, live, fixture_profile)?;
        info!(
            url = linkedin_url,
            origin = %fetched.origin,
            fields = fetched.data.len(),
            "LinkedIn profile fetched"
        );
        Ok(fetched)
    }
}
