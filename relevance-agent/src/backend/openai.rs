//! OpenAI-compatible LLM backend.
//!
//! Talks to any `/chat/completions` endpoint: the OpenAI API itself, vLLM,
//! Ollama or an OpenAI-compatible gateway.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::traits::*;

/// Public OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Per-request timeout used by [`OpenAiBackend::new`].
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI-compatible backend.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, LlmError> {
        Self::with_timeout(base_url, model, api_key, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a backend whose requests give up after `timeout`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Create a backend for the OpenAI API.
    pub fn openai(model: &str, api_key: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(OPENAI_BASE_URL, model, Some(api_key.into()))
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| format!("Bearer {}", k))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<UsageResponse>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageResponse,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = request.system_prompt {
            messages.push(ChatMessage {
                role: MessageRole::System.as_str(),
                content: system,
            });
        }
        messages.extend(request.messages.into_iter().map(|msg| ChatMessage {
            role: msg.role.as_str(),
            content: msg.content,
        }));

        let model = request.model.unwrap_or_else(|| self.model.clone());
        let chat_request = ChatRequest {
            model: model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        debug!(model = %model, "Sending chat completion");

        let mut http_request = self.client.post(self.chat_completions_url());
        if let Some(auth) = self.auth_header() {
            http_request = http_request.header(header::AUTHORIZATION, auth);
        }

        let response = http_request
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(e.to_string())
                } else {
                    LlmError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();

            if status.as_u16() == 429 {
                let retry_after_ms = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(|secs| secs * 1000);
                return Err(LlmError::RateLimited { retry_after_ms });
            }

            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed(format!("HTTP {}: {}", status, body)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("No choices in response".to_string()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        let usage = chat_response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: chat_response.model.unwrap_or(model),
            finish_reason,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "model": "gpt-3.5-turbo-16k",
            "choices": [{
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 9 }
        })
    }

    #[test]
    fn test_openai_creation() {
        let backend = OpenAiBackend::openai("gpt-3.5-turbo", "sk-test").unwrap();
        assert_eq!(backend.id(), "gpt-3.5-turbo");
        assert_eq!(backend.chat_completions_url(), "https://api.openai.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_complete_sends_model_override_and_system_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo-16k",
                "temperature": 1.0,
                "messages": [{ "role": "system", "content": "rate these" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("[1, 0.5]")))
            .expect(1)
            .mount(&server)
            .await;

        let backend =
            OpenAiBackend::new(server.uri(), "gpt-3.5-turbo", Some("sk-test".into())).unwrap();
        let response = backend
            .complete(
                CompletionRequest::system("rate these")
                    .with_model("gpt-3.5-turbo-16k")
                    .with_temperature(1.0),
            )
            .await
            .unwrap();

        assert_eq!(response.content, "[1, 0.5]");
        assert_eq!(response.model, "gpt-3.5-turbo-16k");
        assert_eq!(response.usage.total(), 129);
    }

    #[tokio::test]
    async fn test_rate_limit_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(server.uri(), "gpt-3.5-turbo", None).unwrap();
        let err = backend
            .complete(CompletionRequest::user("hi"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LlmError::RateLimited {
                retry_after_ms: Some(2000)
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_choices_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let backend = OpenAiBackend::new(server.uri(), "gpt-3.5-turbo", None).unwrap();
        let err = backend.complete(CompletionRequest::user("hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_stalled_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("[1]"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let backend = OpenAiBackend::with_timeout(
            server.uri(),
            "gpt-3.5-turbo",
            None,
            Duration::from_millis(100),
        )
        .unwrap();
        let err = tokio_test::assert_err!(backend.complete(CompletionRequest::user("hi")).await);
        assert!(matches!(err, LlmError::Timeout(_)));
    }
}
