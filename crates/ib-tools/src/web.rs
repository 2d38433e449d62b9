//! Web search tool backed by the Tavily search API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ib_core::{Error, PropertySchema, Tool, ToolDefinition, ToolOutput, ToolParameters};

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

// =============================================================================
// Web Search Configuration
// =============================================================================

/// Configuration for the Tavily web search
#[derive(Clone, Debug)]
pub struct WebSearchConfig {
    pub api_key: String,
    /// Base URL of the search API (overridable for tests)
    pub base_url: String,
    /// Number of results per query
    pub max_results: u32,
    /// "basic" or "advanced"
    pub search_depth: String,
    pub timeout: Duration,
}

impl WebSearchConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_results: 5,
            search_depth: "basic".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// Web Search Tool
// =============================================================================

pub struct TavilySearchTool {
    client: Client,
    config: WebSearchConfig,
}

impl TavilySearchTool {
    pub fn new(config: WebSearchConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("icebreaker/", env!("CARGO_PKG_VERSION")))
                .timeout(config.timeout)
                .build()
                .unwrap_or_default(),
            config,
        }
    }

    async fn search(&self, query: &str) -> Result<SearchResponse, Error> {
        let request = SearchRequest {
            query,
            max_results: self.config.max_results,
            search_depth: &self.config.search_depth,
            include_answer: true,
            include_raw_content: false,
            include_images: false,
        };

        let url = format!("{}/search", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::tool("web_search", format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::tool(
                "web_search",
                format!("Search API error {}: {}", status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| {
                Error::tool("web_search", format!("Failed to parse search response: {}", e))
            })
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
    include_answer: bool,
    include_raw_content: bool,
    include_images: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct WebSearchArgs {
    query: String,
}

/// Render a search response as markdown for the model.
fn format_results(response: SearchResponse) -> Option<String> {
    let mut output = String::new();

    if let Some(answer) = response.answer.filter(|a| !a.trim().is_empty()) {
        output.push_str(answer.trim());
    }

    if !response.results.is_empty() {
        if !output.is_empty() {
            output.push_str("\n\n");
        }
        output.push_str("## Sources\n");
        for result in response.results {
            output.push_str(&format!("- [{}]({})", result.title, result.url));
            let snippet = result.content.trim();
            if !snippet.is_empty() {
                output.push_str(&format!(": {}", snippet));
            }
            output.push('\n');
        }
    }

    (!output.is_empty()).then_some(output)
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Returns a short synthesized answer and the matching pages \
         with their URLs. Use it to find a person's profile pages."
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description()).with_parameters(
            ToolParameters::new().add_property(
                "query",
                PropertySchema::string(
                    "The search query, e.g. a person's full name plus the site to look on",
                ),
                true,
            ),
        )
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, Error> {
        let args: WebSearchArgs = serde_json::from_value(arguments)
            .map_err(|e| Error::tool("web_search", format!("Invalid arguments: {}", e)))?;

        debug!(query = %args.query, "web_search");
        let response = self.search(&args.query).await?;
        Ok(match format_results(response) {
            Some(text) => ToolOutput::success(text),
            None => ToolOutput::error(format!("No results found for '{}'", args.query)),
        })
    }
}

// =============================================================================
// Factory functions
// =============================================================================

/// Create the web tools available to lookup agents
pub fn create_web_tools(config: WebSearchConfig) -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(TavilySearchTool::new(config))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_format_results() {
        let response = SearchResponse {
            answer: Some("Jane Doe is a data engineer.".to_string()),
            results: vec![SearchResult {
                title: "Jane Doe - LinkedIn".to_string(),
                url: "https://www.linkedin.com/in/jane-doe/".to_string(),
                content: "Data engineer at Acme".to_string(),
            }],
        };
        let text = format_results(response).unwrap();
        assert!(text.starts_with("Jane Doe is a data engineer."));
        assert!(text.contains(
            "- [Jane Doe - LinkedIn](https://www.linkedin.com/in/jane-doe/): Data engineer at Acme"
        ));
    }

    #[test]
    fn test_format_empty_results() {
        let response = SearchResponse {
            answer: None,
            results: vec![],
        };
        assert_eq!(format_results(response), None);
    }

    #[tokio::test]
    async fn test_execute_without_results_is_error_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "Nobody Anywhere",
                "answer": "",
                "results": []
            })))
            .mount(&server)
            .await;

        let tool =
            TavilySearchTool::new(WebSearchConfig::new("tvly-test").with_base_url(server.uri()));
        let output = tool
            .execute(serde_json::json!({"query": "Nobody Anywhere"}))
            .await
            .unwrap();

        assert!(output.is_error);
        assert_eq!(output.content, "No results found for 'Nobody Anywhere'");
    }

    #[tokio::test]
    async fn test_execute_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-test"))
            .and(body_partial_json(serde_json::json!({
                "query": "Jane Doe LinkedIn",
                "max_results": 5,
                "include_answer": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "Jane Doe LinkedIn",
                "answer": null,
                "results": [
                    {
                        "title": "Jane Doe | LinkedIn",
                        "url": "https://www.linkedin.com/in/jane-doe/",
                        "content": "Engineer",
                        "score": 0.9
                    }
                ]
            })))
            .mount(&server)
            .await;

        let tool =
            TavilySearchTool::new(WebSearchConfig::new("tvly-test").with_base_url(server.uri()));
        let output = tool
            .execute(serde_json::json!({"query": "Jane Doe LinkedIn"}))
            .await
            .unwrap();

        assert!(!output.is_error);
        assert!(output.content.contains("https://www.linkedin.com/in/jane-doe/"));
    }

    #[tokio::test]
    async fn test_execute_reports_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let tool = TavilySearchTool::new(WebSearchConfig::new("bad").with_base_url(server.uri()));
        let err = tool
            .execute(serde_json::json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let tool = TavilySearchTool::new(WebSearchConfig::new("k"));
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Invalid arguments"));
    }
}
