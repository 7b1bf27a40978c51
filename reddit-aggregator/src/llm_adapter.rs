use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Why a provider call produced no usable text.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider}: authentication rejected (HTTP {status})")]
    Auth { provider: String, status: u16 },

    #[error("{provider}: quota or rate limit exceeded")]
    RateLimited { provider: String },

    #[error("{provider}: HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider}: network error: {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: malformed response: {reason}")]
    MalformedResponse { provider: String, reason: String },

    #[error("{provider}: returned an empty completion")]
    EmptyCompletion { provider: String },
}

/// A text-generation endpoint.
///
/// Both calls report failure through [`ProviderError`]; neither returns a
/// sentinel value.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Get the name of this provider, for logs
    fn provider_name(&self) -> String;

    /// Cheap availability check with a minimal token budget.
    async fn probe(&self) -> Result<bool, ProviderError>;

    /// Generate a completion for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Connection settings for one chat-completion endpoint.
#[derive(Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &format_args!("<{} chars>", self.api_key.len()))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Provider speaking the OpenAI-style `/chat/completions` protocol.
pub struct ChatCompletionAdapter {
    client: Client,
    config: ProviderConfig,
    system_message: String,
}

impl ChatCompletionAdapter {
    pub fn new(config: ProviderConfig, system_message: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| ProviderError::Network {
                provider: config.name.clone(),
                source,
            })?;

        Ok(Self {
            client,
            config,
            system_message: system_message.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let provider = &self.config.name;
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|source| ProviderError::Network {
                provider: provider.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
                    provider: provider.clone(),
                    status: status.as_u16(),
                },
                StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => {
                    ProviderError::RateLimited {
                        provider: provider.clone(),
                    }
                }
                _ => ProviderError::Status {
                    provider: provider.clone(),
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                },
            });
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::MalformedResponse {
                provider: provider.clone(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl GenerationProvider for ChatCompletionAdapter {
    fn provider_name(&self) -> String {
        format!("{} ({})", self.config.name, self.config.model)
    }

    async fn probe(&self) -> Result<bool, ProviderError> {
        debug!("Probing {}", self.provider_name());
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: "ping",
            }],
            temperature: None,
            max_tokens: Some(1),
        };
        let response = self.send(&request).await?;
        Ok(!response.choices.is_empty())
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        info!(
            "Requesting completion from {} ({} prompt chars)",
            self.provider_name(),
            prompt.len()
        );
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_message,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: Some(self.config.temperature),
            max_tokens: None,
        };

        let response = self.send(&request).await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: self.config.name.clone(),
                reason: "no choices in response".to_string(),
            })?
            .message
            .content
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyCompletion {
                provider: self.config.name.clone(),
            });
        }
        info!("{} returned {} chars", self.provider_name(), text.len());
        Ok(text)
    }
}
