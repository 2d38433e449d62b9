use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use ib_core::{Agent, AgentConfig, Error, Message, Provider, Result, ToolRegistry};

use crate::LookupAgent;

/// Sentinel a lookup agent answers with when it finds nothing.
pub const NOT_FOUND: &str = "NOT_FOUND";

/// Resolves a person's name to a profile identifier (URL or handle).
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Target name used in logs and errors.
    fn target(&self) -> &str;

    async fn resolve(&self, name: &str, context: Option<&str>) -> Result<String>;
}

/// Model settings shared by every lookup.
#[derive(Debug, Clone)]
pub struct LookupSettings {
    pub model: Option<String>,
    pub temperature: f32,
    /// Overrides the agent's own iteration budget.
    pub max_iterations: Option<usize>,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.0,
            max_iterations: None,
        }
    }
}

/// Runs a [`LookupAgent`] through the bounded agent loop.
pub struct AgentResolver {
    agent: Arc<dyn LookupAgent>,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    settings: LookupSettings,
}

impl AgentResolver {
    /// `tools` is narrowed to the tools the agent asks for.
    pub fn new(
        agent: Arc<dyn LookupAgent>,
        provider: Arc<dyn Provider>,
        tools: &ToolRegistry,
        settings: LookupSettings,
    ) -> Self {
        let tools = tools.subset(agent.tool_names());
        Self {
            agent,
            provider,
            tools,
            settings,
        }
    }

    fn agent_config(&self) -> AgentConfig {
        let max_iterations = self
            .settings
            .max_iterations
            .unwrap_or_else(|| self.agent.max_iterations());

        let mut config = AgentConfig::new(format!("{}-lookup", self.agent.name()))
            .with_system_prompt(self.agent.system_prompt())
            .with_max_iterations(max_iterations)
            .with_temperature(self.settings.temperature);
        if let Some(model) = &self.settings.model {
            config = config.with_model(model.as_str());
        }
        config
    }
}

#[async_trait]
impl IdentityResolver for AgentResolver {
    fn target(&self) -> &str {
        self.agent.name()
    }

    async fn resolve(&self, name: &str, context: Option<&str>) -> Result<String> {
        let target = self.agent.name();
        let config = self.agent_config();
        let task = self.agent.task(name, context);

        debug!(lookup = target, person = name, "Lookup starting");
        let answer = match Agent::run_once(
            Arc::clone(&self.provider),
            &self.tools,
            &config,
            vec![Message::user(task)],
        )
        .await
        {
            Ok(answer) => answer,
            Err(Error::IterationLimit { max, .. }) => {
                return Err(Error::lookup(
                    target,
                    format!("no answer for '{}' within {} steps", name, max),
                ));
            }
            Err(e) => return Err(e),
        };

        let trimmed = answer.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOT_FOUND) {
            return Err(Error::lookup(
                target,
                format!("no confident result for '{}'", name),
            ));
        }

        match self.agent.extract(trimmed) {
            Some(identifier) => {
                info!(lookup = target, person = name, identifier = %identifier, "Lookup resolved");
                Ok(identifier)
            }
            None => Err(Error::lookup(
                target,
                format!(
                    "answer for '{}' contained no usable identifier: {}",
                    name,
                    truncate(trimmed, 200)
                ),
            )),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
