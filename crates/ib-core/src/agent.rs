//! Bounded tool-calling agent loop.
//!
//! An agent sends its task to the model together with the tool definitions,
//! executes any tool calls the model makes, feeds the results back, and stops
//! as soon as the model answers without calling a tool. The loop fails once
//! `max_iterations` model turns have been spent without a final answer.

use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::message::{Message, ToolCall};
use crate::provider::{CompletionRequest, Provider};
use crate::tool::ToolRegistry;

/// Unique identifier for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Configuration for an agent run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Unique agent identifier.
    pub id: AgentId,
    /// System prompt for the agent.
    pub system_prompt: Option<String>,
    /// Maximum model turns before giving up.
    pub max_iterations: usize,
    /// Model override (provider default otherwise).
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl AgentConfig {
    pub fn new(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            system_prompt: None,
            max_iterations: 5,
            model: None,
            temperature: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A stateless LLM agent.
pub struct Agent;

impl Agent {
    /// Run a one-shot task until the model produces a final answer.
    ///
    /// Returns the text of the final (tool-free) assistant message, or
    /// `Error::IterationLimit` when the budget runs out first.
    pub async fn run_once(
        provider: Arc<dyn Provider>,
        tools: &ToolRegistry,
        config: &AgentConfig,
        context: Vec<Message>,
    ) -> Result<String, Error> {
        debug!(
            agent = %config.id,
            context_messages = context.len(),
            tools_available = tools.len(),
            max_iterations = config.max_iterations,
            "Agent run_once starting"
        );

        let mut messages = Vec::with_capacity(context.len() + 1);
        if let Some(system) = &config.system_prompt {
            messages.push(Message::system(system.as_str()));
        }
        messages.extend(context);

        for iteration in 0..config.max_iterations {
            let mut request = CompletionRequest::new(messages.clone())
                .with_tools(tools.definitions())
                .with_model_opt(config.model.as_deref());
            if let Some(temperature) = config.temperature {
                request = request.with_temperature(temperature);
            }

            let response = provider.complete(request).await?;
            let tool_calls = response.message.tool_calls;

            if tool_calls.is_empty() {
                let content = response.message.content.to_string();
                debug!(
                    agent = %config.id,
                    iterations = iteration + 1,
                    response_len = content.len(),
                    "Agent completed"
                );
                return Ok(content);
            }

            debug!(
                agent = %config.id,
                iteration = iteration,
                tool_count = tool_calls.len(),
                "Agent executing tools"
            );

            messages.push(Message::assistant_with_tool_calls("", tool_calls.clone()));
            for tool_call in &tool_calls {
                let result = execute_tool(tools, tool_call).await;
                messages.push(Message::tool_result(&tool_call.id, result));
            }
        }

        Err(Error::IterationLimit {
            agent: config.id.to_string(),
            max: config.max_iterations,
        })
    }
}

/// Execute a single tool call. Failures are reported back to the model as text.
async fn execute_tool(registry: &ToolRegistry, tool_call: &ToolCall) -> String {
    let Some(tool) = registry.get(&tool_call.name) else {
        return format!("Error: Unknown tool '{}'", tool_call.name);
    };

    debug!(tool = %tool_call.name, "Executing tool");
    match tool.execute(tool_call.arguments.clone()).await {
        Ok(output) if output.is_error => format!("Error: {}", output.content),
        Ok(output) => output.content,
        Err(e) => format!("Error executing tool: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use crate::testing::MockProvider;
    use crate::tool::{Tool, ToolDefinition, ToolOutput};
    use async_trait::async_trait;

    struct CannedSearch;

    #[async_trait]
    impl Tool for CannedSearch {
        fn name(&self) -> &str {
            "web_search"
        }

        fn description(&self) -> &str {
            "canned"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.name(), self.description())
        }

        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, Error> {
            Ok(ToolOutput::success("https://www.linkedin.com/in/jane-doe/"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(CannedSearch));
        tools
    }

    #[test]
    fn test_agent_id() {
        let id = AgentId::new("linkedin-lookup");
        assert_eq!(format!("{}", id), "linkedin-lookup");

        let id2: AgentId = "twitter-lookup".into();
        assert_eq!(id2.0, "twitter-lookup");
    }

    #[test]
    fn test_agent_config() {
        let config = AgentConfig::new("lookup")
            .with_system_prompt("Find profiles")
            .with_max_iterations(3)
            .with_model("gpt-4o-mini")
            .with_temperature(0.0);

        assert_eq!(config.system_prompt.as_deref(), Some("Find profiles"));
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_run_once_uses_tool_then_answers() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("web_search", serde_json::json!({"query": "Jane Doe"}));
        provider.queue_response("https://www.linkedin.com/in/jane-doe/");

        let config = AgentConfig::new("lookup").with_system_prompt("sys");
        let answer = Agent::run_once(
            provider.clone(),
            &registry(),
            &config,
            vec![Message::user("Find Jane Doe")],
        )
        .await
        .unwrap();

        assert_eq!(answer, "https://www.linkedin.com/in/jane-doe/");
        assert_eq!(provider.request_count(), 2);

        // Second turn carries the tool result back to the model.
        let last = provider.last_request().unwrap();
        let tool_msg = last.messages.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(
            tool_msg.content.as_str(),
            "https://www.linkedin.com/in/jane-doe/"
        );
        assert_eq!(last.messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_run_once_stops_at_iteration_budget() {
        let provider = Arc::new(MockProvider::new());
        for _ in 0..3 {
            provider.queue_tool_call("web_search", serde_json::json!({"query": "again"}));
        }

        let config = AgentConfig::new("lookup").with_max_iterations(2);
        let err = Agent::run_once(provider.clone(), &registry(), &config, vec![Message::user("x")])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::IterationLimit { max: 2, .. }));
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_tool_call("fetch_webpage", serde_json::json!({}));
        provider.queue_response("NOT_FOUND");

        let config = AgentConfig::new("lookup");
        let context = vec![Message::user("x")];
        let answer = Agent::run_once(provider.clone(), &registry(), &config, context)
            .await
            .unwrap();

        assert_eq!(answer, "NOT_FOUND");
        let last = provider.last_request().unwrap();
        let tool_msg = last.messages.iter().find(|m| m.role == Role::Tool).unwrap();
        assert!(tool_msg.content.as_str().starts_with("Error: Unknown tool"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_error(Error::auth("bad key"));

        let config = AgentConfig::new("lookup");
        let err = Agent::run_once(provider, &registry(), &config, vec![Message::user("x")])
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
    }
}
