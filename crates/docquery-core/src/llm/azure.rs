//! Azure OpenAI client

use super::client::status_error;
use super::{ChatMessage, LLMClient};
use crate::config::LLMServiceConfig;
use crate::error::{DocQueryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for `POST {url}/openai/deployments/{deployment}/chat/completions`
pub struct AzureClient {
    http_client: reqwest::Client,
    config: LLMServiceConfig,
    api_key: String,
    endpoint: String,
}

impl AzureClient {
    pub fn new(config: LLMServiceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| DocQueryError::Config("API key is required for Azure".to_string()))?;
        let deployment = config
            .azure_deployment
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                DocQueryError::Config("azure_deployment is required for Azure".to_string())
            })?;

        let endpoint = completions_url(&config.url, deployment, &config.azure_api_version);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DocQueryError::Http)?;

        Ok(Self {
            http_client,
            config,
            api_key,
            endpoint,
        })
    }
}

/// The deployment name selects the model; the body carries none
fn completions_url(base: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        base.trim_end_matches('/'),
        deployment,
        api_version
    )
}

#[async_trait]
impl LLMClient for AzureClient {
    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String> {
        #[derive(Serialize)]
        struct ChatRequest {
            messages: Vec<ChatMessage>,
            max_tokens: u32,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }

        let request = ChatRequest {
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(DocQueryError::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("azure", status, &body));
        }

        let parsed: ChatResponse = response.json().await.map_err(DocQueryError::Http)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| DocQueryError::Llm("no response from Azure OpenAI".to_string()))
    }

    fn provider(&self) -> &str {
        "azure"
    }
}
