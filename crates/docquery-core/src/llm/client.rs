//! LLM client trait, the OpenAI-compatible client and client construction

use crate::config::{LLMServiceConfig, ProviderType};
use crate::error::{DocQueryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for LLM service clients
///
/// Every call is a one-shot completion: no streaming, no conversation state.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate chat completion
    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String>;

    /// Provider identity, for logging
    fn provider(&self) -> &str;

    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat_completion(vec![ChatMessage::user(prompt)]).await
    }
}

/// Chat message for completion requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Build the configured client, or `None` when the LLM is disabled
pub fn build_llm_client(config: &LLMServiceConfig) -> Result<Option<Arc<dyn LLMClient>>> {
    if !config.enabled {
        tracing::info!("LLM disabled, running deterministic pipeline only");
        return Ok(None);
    }

    let primary = build_provider(config)?;
    tracing::info!(provider = primary.provider(), model = %config.model, "LLM client ready");

    let Some(fallback_config) = config.fallback.as_deref().filter(|f| f.enabled) else {
        return Ok(Some(primary));
    };
    let fallback = build_provider(fallback_config)?;
    tracing::info!(
        provider = fallback.provider(),
        model = %fallback_config.model,
        "Fallback LLM configured"
    );
    Ok(Some(Arc::new(super::FallbackClient::new(primary, fallback))))
}

fn build_provider(config: &LLMServiceConfig) -> Result<Arc<dyn LLMClient>> {
    let client: Arc<dyn LLMClient> = match config.provider_type {
        ProviderType::OpenaiCompatible => Arc::new(OpenAICompatibleClient::new(config.clone())?),
        ProviderType::Anthropic => Arc::new(super::AnthropicClient::new(config.clone())?),
        ProviderType::Azure => Arc::new(super::AzureClient::new(config.clone())?),
    };
    Ok(client)
}

/// Map a non-success HTTP status to an error, keeping the body verbatim
pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> DocQueryError {
    if status == 429 {
        DocQueryError::RateLimited(format!(
            "{} API returned status 429: {}",
            provider, body
        ))
    } else {
        DocQueryError::Llm(format!(
            "{} API returned status {}: {}",
            provider, status, body
        ))
    }
}

/// Infer a provider name from an OpenAI-compatible base URL
pub fn infer_provider_name(url: &str) -> &'static str {
    let url = url.to_lowercase();
    if url.contains("api.openai.com") {
        "openai"
    } else if url.contains("groq.com") {
        "groq"
    } else if url.contains("together") {
        "together"
    } else if url.contains("localhost:11434") || url.contains("ollama") {
        "ollama"
    } else if url.contains("localhost") || url.contains("127.0.0.1") {
        "local"
    } else {
        "openai-compatible"
    }
}

/// OpenAI-compatible client (OpenAI, Groq, Together.ai, Ollama, vLLM, ...)
pub struct OpenAICompatibleClient {
    http_client: reqwest::Client,
    config: LLMServiceConfig,
    provider_name: &'static str,
}

impl OpenAICompatibleClient {
    /// Create new client from configuration
    pub fn new(config: LLMServiceConfig) -> Result<Self> {
        if config.model.is_empty() {
            return Err(DocQueryError::Config("LLM model is required".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DocQueryError::Http)?;

        let provider_name = infer_provider_name(&config.url);

        Ok(Self {
            http_client,
            config,
            provider_name,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(LLMServiceConfig::default())
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest {
            model: String,
            messages: Vec<ChatMessage>,
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }

        let start = Instant::now();

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.url.trim_end_matches('/')
        );

        let mut req = self.http_client.post(&url).json(&request);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await.map_err(DocQueryError::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(self.provider_name, status, &body));
        }

        let chat_response: ChatResponse = response.json().await.map_err(DocQueryError::Http)?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DocQueryError::Llm(format!("no response from {}", self.provider_name)))?
            .message
            .content;

        tracing::debug!(
            provider = self.provider_name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "chat completion finished"
        );

        Ok(content)
    }

    fn provider(&self) -> &str {
        self.provider_name
    }
}
