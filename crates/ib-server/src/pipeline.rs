//! Builds the orchestrator and its collaborators from configuration.

use std::sync::Arc;

use ib_agents::{AgentResolver, LinkedInLookupAgent, LookupSettings, TwitterLookupAgent};
use ib_core::{Provider, ToolRegistry};
use ib_engine::{GenerationSettings, IceBreaker, LookupFallbacks};
use ib_providers::OpenAIProvider;
use ib_sources::{ScrapinClient, ScrapinConfig, TwitterClient, TwitterConfig};
use ib_tools::{create_web_tools, WebSearchConfig};

use crate::config::Config;

fn secret(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

pub fn build_ice_breaker(config: &Config) -> IceBreaker {
    let creds = &config.credentials;
    let timeout = config.http_timeout();

    let mut openai = OpenAIProvider::new(secret(&creds.openai_api_key))
        .with_default_model(config.llm.model.as_str())
        .with_timeout(timeout);
    if let Some(base_url) = &config.llm.base_url {
        openai = openai.with_base_url(base_url.as_str());
    }
    let provider: Arc<dyn Provider> = Arc::new(openai);

    let mut search = WebSearchConfig::new(secret(&creds.tavily_api_key))
        .with_max_results(config.search.max_results)
        .with_timeout(timeout);
    if let Some(base_url) = &config.search.base_url {
        search = search.with_base_url(base_url.as_str());
    }
    let mut tools = ToolRegistry::new();
    for tool in create_web_tools(search) {
        tools.register(tool);
    }

    let lookup_settings = LookupSettings {
        model: Some(config.llm.model.clone()),
        temperature: config.llm.temperature,
        max_iterations: Some(config.lookup.max_iterations),
    };
    let linkedin_lookup = AgentResolver::new(
        Arc::new(LinkedInLookupAgent::new()),
        Arc::clone(&provider),
        &tools,
        lookup_settings.clone(),
    );
    let twitter_lookup = AgentResolver::new(
        Arc::new(TwitterLookupAgent::new()),
        Arc::clone(&provider),
        &tools,
        lookup_settings,
    );

    let mut scrapin = ScrapinConfig::new(secret(&creds.scrapin_api_key))
        .with_mock(config.linkedin.mock)
        .with_fallback(config.linkedin.fallback)
        .with_timeout(timeout);
    if let Some(base_url) = &config.linkedin.base_url {
        scrapin = scrapin.with_base_url(base_url.as_str());
    }

    let mut twitter = TwitterConfig::new(secret(&creds.twitter_bearer_token))
        .with_max_posts(config.twitter.max_posts)
        .with_mock(config.twitter.mock)
        .with_fallback(config.twitter.fallback)
        .with_timeout(timeout);
    if let Some(base_url) = &config.twitter.base_url {
        twitter = twitter.with_base_url(base_url.as_str());
    }

    IceBreaker::new(
        Arc::new(linkedin_lookup),
        Arc::new(twitter_lookup),
        Arc::new(ScrapinClient::new(scrapin)),
        Arc::new(TwitterClient::new(twitter)),
        provider,
    )
    .with_settings(GenerationSettings {
        model: config.llm.model.clone(),
        temperature: config.llm.temperature,
        max_generation_retries: config.llm.max_generation_retries,
    })
    .with_fallbacks(LookupFallbacks {
        linkedin_url: config.lookup.fallback_linkedin_url.clone(),
        twitter_handle: config.lookup.fallback_twitter_handle.clone(),
    })
}
