//! Language model clients
//!
//! The model is an external function `(prompt) -> (completion, token counts)`
//! reached over HTTP. Clients here never retry - transient failures surface
//! as retryable `Generation` errors and retry policy belongs to the caller.

use async_trait::async_trait;
use docqa_common::config::LlmConfig;
use docqa_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A completed model call with the token counts the API reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Trait for text generation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `prompt`
    async fn complete(&self, prompt: &str) -> Result<Completion>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions client
pub struct OpenAiChatModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

impl OpenAiChatModel {
    /// Create a new client from configuration
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "llm.api_key is required".to_string(),
            })?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are a precise document question-answering assistant."
                        .to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::GenerationTimeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    AppError::Generation {
                        message: format!("request failed: {}", e),
                        retryable: e.is_connect(),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation {
                message: format!("API error {}: {}", status, body),
                retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| AppError::Generation {
            message: format!("malformed response: {}", e),
            retryable: false,
        })?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Generation {
                message: "empty response from model".to_string(),
                retryable: false,
            })?;

        let usage = chat.usage.unwrap_or_default();

        Ok(Completion {
            text,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Mock model for testing: canned reply, fixed token counts, call counting
pub struct MockLanguageModel {
    reply: String,
    prompt_tokens: u64,
    completion_tokens: u64,
    fail: bool,
    calls: AtomicU64,
    last_prompt: Mutex<Option<String>>,
}

impl MockLanguageModel {
    pub fn new(reply: impl Into<String>, prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            reply: reply.into(),
            prompt_tokens,
            completion_tokens,
            fail: false,
            calls: AtomicU64::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// A model whose every call fails with a retryable generation error
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("", 0, 0)
        }
    }

    /// Number of completed `complete` invocations
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// The prompt passed to the most recent call
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }

        if self.fail {
            return Err(AppError::Generation {
                message: "mock failure".to_string(),
                retryable: true,
            });
        }

        Ok(Completion {
            text: self.reply.clone(),
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
        })
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_counts_calls_and_records_prompt() {
        let model = MockLanguageModel::new("an answer", 10, 5);
        assert_eq!(model.call_count(), 0);

        let completion = model.complete("a prompt").await.unwrap();
        assert_eq!(completion.text, "an answer");
        assert_eq!(completion.prompt_tokens, 10);
        assert_eq!(model.call_count(), 1);
        assert_eq!(model.last_prompt().as_deref(), Some("a prompt"));
    }

    #[tokio::test]
    async fn test_failing_mock_is_retryable() {
        let model = MockLanguageModel::failing();
        let err = model.complete("prompt").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(OpenAiChatModel::new(&LlmConfig::default()).is_err());
    }
}
