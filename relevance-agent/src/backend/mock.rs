//! Mock LLM backend for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use super::traits::*;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this content
    Content(String),
    /// Fail the call with a request error
    Fail(String),
}

/// Mock backend for testing.
///
/// Replies are served from a queue in call order; once the queue is empty the
/// default response is returned. Every requested model is recorded.
pub struct MockBackend {
    model_id: String,
    response_content: String,
    script: Mutex<VecDeque<MockReply>>,
    requested_models: Mutex<Vec<String>>,
    call_count: AtomicU32,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            response_content: "Mock response".to_string(),
            script: Mutex::new(VecDeque::new()),
            requested_models: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the default response content.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.response_content = content.into();
        self
    }

    /// Queue scripted replies, served before the default response.
    pub fn with_script(mut self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        self.script.get_mut().extend(replies);
        self
    }

    /// Number of times complete was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Models requested so far, in call order.
    pub async fn requested_models(&self) -> Vec<String> {
        self.requested_models.lock().await.clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        let model = request.model.clone().unwrap_or_else(|| self.model_id.clone());
        self.requested_models.lock().await.push(model.clone());

        let reply = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::Content(self.response_content.clone()));

        let content = match reply {
            MockReply::Content(content) => content,
            MockReply::Fail(reason) => return Err(LlmError::RequestFailed(reason)),
        };

        let prompt_tokens: u32 = request
            .system_prompt
            .iter()
            .chain(request.messages.iter().map(|m| &m.content))
            .map(|text| text.len() as u32 / 4)
            .sum();

        Ok(CompletionResponse {
            usage: Usage {
                prompt_tokens,
                completion_tokens: content.len() as u32 / 4,
            },
            content,
            model,
            finish_reason: FinishReason::Stop,
        })
    }
}
