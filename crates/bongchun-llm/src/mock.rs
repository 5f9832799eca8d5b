//! Scripted provider for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::LlmError;
use crate::provider::{Content, GenerateRequest, GenerateResponse, LlmProvider};

/// What the provider saw on one `generate` call.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub contents: Vec<Content>,
    pub tool_names: Vec<String>,
}

/// Replays queued responses in order and records every request.
///
/// Clones share the queue and the recording, so a test can keep a handle
/// after moving the provider into a client.
#[derive(Debug, Clone)]
pub struct MockProvider {
    script: Arc<Mutex<VecDeque<Result<GenerateResponse, String>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    pub default_response: String,
    pub delay: Duration,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            script: Arc::default(),
            requests: Arc::default(),
            default_response: "mock response".into(),
            delay: Duration::ZERO,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<GenerateResponse>) -> Self {
        let mock = Self::default();
        for r in responses {
            mock.push(r);
        }
        mock
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, response: GenerateResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a provider failure.
    pub fn push_error(&self, message: impl Into<String>) {
        self.script.lock().unwrap().push_back(Err(message.into()));
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LlmProvider for MockProvider {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<GenerateResponse, LlmError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            contents: request.contents.to_vec(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(LlmError::Other(message)),
            None => Ok(GenerateResponse::text(self.default_response.clone())),
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
