//! Chat completion clients for OpenAI and Anthropic APIs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mender_core::config::ModelConfig;

use crate::error::{LlmError, LlmResult};

/// Role of a turn sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One turn of provider input.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Completion plus usage accounting.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model: String,
}

/// Object-safe chat completion interface.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Complete a conversation and return the assistant's reply.
    async fn complete(&self, turns: &[ChatTurn]) -> LlmResult<LlmResponse>;

    /// Model name used for accounting.
    fn model(&self) -> &str;
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

impl LlmProvider {
    /// Parse a provider name from configuration.
    ///
    /// Unknown providers are a fail-fast configuration error; the run
    /// never starts.
    pub fn parse(name: &str) -> LlmResult<Self> {
        match name {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

const MAX_RETRIES: u32 = 3;

/// HTTP-backed chat client.
pub struct LlmClient {
    provider: LlmProvider,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl LlmClient {
    /// Build a client from a role's model binding.
    pub fn from_config(config: &ModelConfig) -> LlmResult<Self> {
        let provider = LlmProvider::parse(&config.provider)?;
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.provider.clone()))?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        Ok(Self {
            provider,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn complete_openai(&self, turns: &[ChatTurn]) -> LlmResult<LlmResponse> {
        let url = "https://api.openai.com/v1/chat/completions";

        let messages: Vec<OpenAiMessage> = turns
            .iter()
            .map(|t| OpenAiMessage {
                role: match t.role {
                    TurnRole::System => "system".to_string(),
                    TurnRole::User => "user".to_string(),
                    TurnRole::Assistant => "assistant".to_string(),
                },
                content: t.content.clone(),
            })
            .collect();

        let request = OpenAiRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_completion_tokens: Some(self.max_tokens),
        };

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout(self.timeout_secs));
                }
                Err(e) => {
                    last_error = Some(LlmError::Request(e.to_string()));
                    continue;
                }
            };

            let status = response.status();

            // Retry on server errors (5xx) and rate limits (429)
            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                warn!(
                    "OpenAI API error {} (attempt {}/{})",
                    status,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            let result: OpenAiResponse = response
                .json()
                .await
                .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

            let content = result
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| LlmError::MalformedResponse("no choices".to_string()))?;

            let (input_tokens, output_tokens) = result
                .usage
                .map(|u| (u.prompt_tokens, u.completion_tokens))
                .unwrap_or((0, 0));

            return Ok(LlmResponse {
                content,
                input_tokens,
                output_tokens,
                model: self.model.clone(),
            });
        }

        Err(last_error.unwrap_or_else(|| LlmError::Request("max retries exceeded".to_string())))
    }

    async fn complete_anthropic(&self, turns: &[ChatTurn]) -> LlmResult<LlmResponse> {
        let url = "https://api.anthropic.com/v1/messages";

        // Anthropic requires the system prompt to be separate
        let system = turns
            .iter()
            .find(|t| t.role == TurnRole::System)
            .map(|t| t.content.clone());

        let messages: Vec<AnthropicMessage> = turns
            .iter()
            .filter(|t| t.role != TurnRole::System)
            .map(|t| AnthropicMessage {
                role: match t.role {
                    TurnRole::Assistant => "assistant".to_string(),
                    _ => "user".to_string(),
                },
                content: t.content.clone(),
            })
            .collect();

        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages,
        };

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout(self.timeout_secs));
                }
                Err(e) => {
                    last_error = Some(LlmError::Request(e.to_string()));
                    continue;
                }
            };

            let status = response.status();

            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                warn!(
                    "Anthropic API error {} (attempt {}/{})",
                    status,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            let result: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

            let content = result
                .content
                .into_iter()
                .next()
                .map(|c| c.text)
                .ok_or_else(|| LlmError::MalformedResponse("no content blocks".to_string()))?;

            let (input_tokens, output_tokens) = result
                .usage
                .map(|u| (u.input_tokens, u.output_tokens))
                .unwrap_or((0, 0));

            return Ok(LlmResponse {
                content,
                input_tokens,
                output_tokens,
                model: self.model.clone(),
            });
        }

        Err(last_error.unwrap_or_else(|| LlmError::Request("max retries exceeded".to_string())))
    }
}

#[async_trait]
impl ChatClient for LlmClient {
    async fn complete(&self, turns: &[ChatTurn]) -> LlmResult<LlmResponse> {
        debug!(model = %self.model, turns = turns.len(), "Requesting completion");
        match self.provider {
            LlmProvider::OpenAI => self.complete_openai(turns).await,
            LlmProvider::Anthropic => self.complete_anthropic(turns).await,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!(LlmProvider::parse("openai").unwrap(), LlmProvider::OpenAI);
        assert_eq!(
            LlmProvider::parse("anthropic").unwrap(),
            LlmProvider::Anthropic
        );
        assert!(matches!(
            LlmProvider::parse("cohere"),
            Err(LlmError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_missing_api_key_is_fail_fast() {
        let config = ModelConfig::openai("gpt-4o");
        assert!(matches!(
            LlmClient::from_config(&config),
            Err(LlmError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_client_from_config() {
        let mut config = ModelConfig::anthropic("claude-sonnet-4.5");
        config.api_key = Some("test-key".to_string());
        let client = LlmClient::from_config(&config).unwrap();
        assert_eq!(client.provider(), LlmProvider::Anthropic);
        assert_eq!(client.model(), "claude-sonnet-4.5");
    }

    #[test]
    fn test_turn_constructors() {
        assert_eq!(ChatTurn::system("s").role, TurnRole::System);
        assert_eq!(ChatTurn::user("u").role, TurnRole::User);
        assert_eq!(ChatTurn::assistant("a").role, TurnRole::Assistant);
    }
}
