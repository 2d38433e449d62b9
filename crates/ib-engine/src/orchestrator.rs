//! End-to-end ice-breaker generation for one person.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ib_agents::IdentityResolver;
use ib_core::{CompletionRequest, Error, Message, Provider, Result};
use ib_sources::{DataOrigin, Fetched, PostCollection, PostSource, ProfileRecord, ProfileSource};

use crate::prompt;
use crate::summary::{IceBreakerResult, OutputParser};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Settings for the summary call.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    /// Extra attempts after an answer fails validation.
    pub max_generation_retries: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_generation_retries: 2,
        }
    }
}

/// Identifiers used when a lookup fails.
#[derive(Debug, Clone, Default)]
pub struct LookupFallbacks {
    pub linkedin_url: Option<String>,
    pub twitter_handle: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOrigins {
    pub linkedin: DataOrigin,
    pub twitter: DataOrigin,
}

/// The response payload for one person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceBreakerReport {
    #[serde(flatten)]
    pub result: IceBreakerResult,
    /// Empty when the profile has no photo.
    pub photo_url: String,
    pub linkedin_url: String,
    pub twitter_handle: String,
    pub sources: SourceOrigins,
}

pub struct IceBreaker {
    linkedin_lookup: Arc<dyn IdentityResolver>,
    twitter_lookup: Arc<dyn IdentityResolver>,
    profiles: Arc<dyn ProfileSource>,
    posts: Arc<dyn PostSource>,
    provider: Arc<dyn Provider>,
    settings: GenerationSettings,
    fallbacks: LookupFallbacks,
}

impl IceBreaker {
    pub fn new(
        linkedin_lookup: Arc<dyn IdentityResolver>,
        twitter_lookup: Arc<dyn IdentityResolver>,
        profiles: Arc<dyn ProfileSource>,
        posts: Arc<dyn PostSource>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            linkedin_lookup,
            twitter_lookup,
            profiles,
            posts,
            provider,
            settings: GenerationSettings::default(),
            fallbacks: LookupFallbacks::default(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: LookupFallbacks) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub async fn ice_break_with(&self, name: &str) -> Result<IceBreakerReport> {
        self.ice_break_with_context(name, None).await
    }

    /// Like [`Self::ice_break_with`], with text that helps the lookups pick
    /// the right person (a company, a city).
    pub async fn ice_break_with_context(
        &self,
        name: &str,
        context: Option<&str>,
    ) -> Result<IceBreakerReport> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_request("Name parameter is required"));
        }
        let context = context.map(str::trim).filter(|c| !c.is_empty());

        info!(person = name, has_context = context.is_some(), "Generating ice breaker");
        let (linkedin, twitter) = tokio::join!(
            self.linkedin_branch(name, context),
            self.twitter_branch(name, context)
        );
        let (linkedin_url, profile) = linkedin?;
        let (twitter_handle, posts) = twitter?;

        let prompt = prompt::compose(&profile.data, &posts.data)?;
        debug!(chars = prompt.len(), "Prompt composed");
        let result = self.generate(prompt).await?;

        let report = IceBreakerReport {
            result,
            photo_url: profile.data.photo_url().unwrap_or_default().to_string(),
            linkedin_url,
            twitter_handle,
            sources: SourceOrigins {
                linkedin: profile.origin,
                twitter: posts.origin,
            },
        };
        info!(
            person = name,
            linkedin = %report.sources.linkedin,
            twitter = %report.sources.twitter,
            "Ice breaker ready"
        );
        Ok(report)
    }

    async fn linkedin_branch(
        &self,
        name: &str,
        context: Option<&str>,
    ) -> Result<(String, Fetched<ProfileRecord>)> {
        let url = resolve_or_fallback(
            self.linkedin_lookup.as_ref(),
            name,
            context,
            self.fallbacks.linkedin_url.as_deref(),
        )
        .await?;
        let profile = self.profiles.fetch_profile(&url).await?;
        Ok((url, profile))
    }

    async fn twitter_branch(
        &self,
        name: &str,
        context: Option<&str>,
    ) -> Result<(String, Fetched<PostCollection>)> {
        let handle = resolve_or_fallback(
            self.twitter_lookup.as_ref(),
            name,
            context,
            self.fallbacks.twitter_handle.as_deref(),
        )
        .await?;
        let posts = self.posts.fetch_posts(&handle).await?;
        Ok((handle, posts))
    }

    /// Ask the model for the result, re-asking while the answer fails validation.
    async fn generate(&self, prompt: String) -> Result<IceBreakerResult> {
        let attempts = self.settings.max_generation_retries + 1;
        let mut messages = vec![Message::user(prompt)];

        for attempt in 1..=attempts {
            debug!(
                provider = self.provider.name(),
                model = %self.settings.model,
                attempt,
                "Requesting ice breaker"
            );
            let request = CompletionRequest::new(messages.clone())
                .with_model(self.settings.model.as_str())
                .with_temperature(self.settings.temperature);
            let response = self.provider.complete(request).await?;
            let raw = response.message.content.to_string();

            match OutputParser::parse(&raw) {
                Ok(result) => return Ok(result),
                Err(e) if attempt < attempts => {
                    warn!(
                        attempt,
                        attempts,
                        error = %e,
                        "Model answer failed validation, retrying"
                    );
                    messages.push(Message::assistant(raw));
                    messages.push(Message::user(format!(
                        "That answer was rejected: {}. Reply again with only the JSON object.",
                        e
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::validation("no generation attempts were made"))
    }
}

async fn resolve_or_fallback(
    resolver: &dyn IdentityResolver,
    name: &str,
    context: Option<&str>,
    fallback: Option<&str>,
) -> Result<String> {
    match resolver.resolve(name, context).await {
        Ok(identifier) => Ok(identifier),
        Err(e) => match fallback {
            Some(fallback) => {
                warn!(
                    lookup = resolver.target(),
                    person = name,
                    error = %e,
                    fallback,
                    "Lookup failed, using configured fallback"
                );
                Ok(fallback.to_string())
            }
            None => Err(e),
        },
    }
}
