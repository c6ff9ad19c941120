//! Anthropic Messages API client

use super::client::status_error;
use super::{ChatMessage, LLMClient};
use crate::config::LLMServiceConfig;
use crate::error::{DocQueryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for `POST {url}/v1/messages`
pub struct AnthropicClient {
    http_client: reqwest::Client,
    config: LLMServiceConfig,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(config: LLMServiceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| DocQueryError::Config("API key is required for Anthropic".to_string()))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DocQueryError::Http)?;

        Ok(Self {
            http_client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String> {
        #[derive(Serialize)]
        struct MessagesRequest<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            #[serde(skip_serializing_if = "Option::is_none")]
            system: Option<String>,
            messages: Vec<ChatMessage>,
        }

        #[derive(Deserialize)]
        struct MessagesResponse {
            content: Vec<ContentBlock>,
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(default)]
            text: String,
        }

        // System prompts travel in a dedicated field, not as a message
        let (system, messages): (Vec<_>, Vec<_>) =
            messages.into_iter().partition(|m| m.role == "system");
        let system = if system.is_empty() {
            None
        } else {
            Some(
                system
                    .into_iter()
                    .map(|m| m.content)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            )
        };

        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system,
            messages,
        };

        let url = format!("{}/v1/messages", self.config.url.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(DocQueryError::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("anthropic", status, &body));
        }

        let parsed: MessagesResponse = response.json().await.map_err(DocQueryError::Http)?;

        let text: String = parsed.content.into_iter().map(|b| b.text).collect();
        if text.is_empty() {
            return Err(DocQueryError::Llm("no response from anthropic".to_string()));
        }
        Ok(text)
    }

    fn provider(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let config = LLMServiceConfig {
            api_key: None,
            ..LLMServiceConfig::default()
        };
        assert!(matches!(
            AnthropicClient::new(config),
            Err(DocQueryError::Config(_))
        ));
    }
}
