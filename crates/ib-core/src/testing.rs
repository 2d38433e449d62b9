//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::Error;
use crate::message::{Message, ToolCall, Usage};
use crate::provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};

/// A mock provider that returns pre-configured responses.
pub struct MockProvider {
    responses: Mutex<Vec<Result<CompletionResponse, Error>>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<CompletionRequest>>,
    pub name: String,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
            name: "mock".to_string(),
        }
    }

    /// Queue a response to be returned by the next complete() call.
    /// Responses are returned in FIFO order (first queued = first returned).
    pub fn queue_response(&self, content: &str) {
        self.queue_raw_response(Ok(CompletionResponse {
            message: Message::assistant(content),
            usage: Usage::new(0, 0),
            model: "mock-model".to_string(),
            finish_reason: FinishReason::Stop,
        }));
    }

    /// Queue an assistant turn that calls a single tool.
    pub fn queue_tool_call(&self, name: &str, arguments: serde_json::Value) {
        let id = format!("call-{}", self.responses.lock().unwrap().len());
        self.queue_raw_response(Ok(CompletionResponse {
            message: Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new(id, name, arguments)],
            ),
            usage: Usage::new(0, 0),
            model: "mock-model".to_string(),
            finish_reason: FinishReason::ToolCalls,
        }));
    }

    /// Queue an error for the next complete() call.
    pub fn queue_error(&self, error: Error) {
        self.queue_raw_response(Err(error));
    }

    /// Queue a raw result.
    pub fn queue_raw_response(&self, response: Result<CompletionResponse, Error>) {
        self.responses.lock().unwrap().insert(0, response);
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        self.captured_requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop() {
            Some(response) => response,
            None => Err(Error::api(500, "No mock response queued")),
        }
    }
}
