//! Configuration management

use crate::error::{DocQueryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM service configuration
    #[serde(default)]
    pub llm: LLMServiceConfig,

    /// Document backend configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Routing defaults used by the deterministic stages
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Deadline for a whole inbound query, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LLMServiceConfig::default(),
            store: StoreConfig::default(),
            routing: RoutingConfig::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    120
}

/// Supported LLM wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    /// OpenAI, Groq, Together.ai, Ollama, vLLM and anything else speaking
    /// the `/chat/completions` dialect
    #[serde(alias = "openai", alias = "ollama")]
    OpenaiCompatible,
    Anthropic,
    /// Azure OpenAI deployments
    Azure,
}

impl std::str::FromStr for ProviderType {
    type Err = DocQueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "openai-compatible" | "openai" | "ollama" => Ok(Self::OpenaiCompatible),
            "anthropic" => Ok(Self::Anthropic),
            "azure" => Ok(Self::Azure),
            other => Err(DocQueryError::Config(format!(
                "unsupported provider_type: {} (use: openai-compatible, anthropic or azure)",
                other
            ))),
        }
    }
}

/// LLM service configuration for external inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMServiceConfig {
    /// Disable to run the deterministic pipeline only
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Wire format of the provider
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,

    /// Base URL of the LLM service
    #[serde(default = "default_llm_url")]
    pub url: String,

    /// Model name for completions
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// API key (optional for local providers)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Azure deployment name (azure only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_deployment: Option<String>,

    /// Azure API version (azure only)
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,

    /// Secondary model used while the primary is rate limited or failing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Box<LLMServiceConfig>>,
}

impl Default for LLMServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_type: default_provider_type(),
            url: default_llm_url(),
            model: default_chat_model(),
            api_key: std::env::var("DOCQUERY_LLM_API_KEY").ok(),
            timeout_secs: default_llm_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            azure_deployment: std::env::var("DOCQUERY_LLM_AZURE_DEPLOYMENT").ok(),
            azure_api_version: default_azure_api_version(),
            fallback: None,
        }
    }
}

impl LLMServiceConfig {
    /// Provider-specific requirements; `section` prefixes the messages
    fn validate(&self, section: &str) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(DocQueryError::Config(format!(
                "{}.url is required when the LLM is enabled",
                section
            )));
        }
        match self.provider_type {
            ProviderType::Anthropic | ProviderType::Azure if self.api_key.is_none() => {
                Err(DocQueryError::Config(format!(
                    "{}.api_key is required for {:?}",
                    section, self.provider_type
                )))
            }
            ProviderType::Azure
                if self
                    .azure_deployment
                    .as_deref()
                    .map_or(true, |d| d.trim().is_empty()) =>
            {
                Err(DocQueryError::Config(format!(
                    "{}.azure_deployment is required for Azure",
                    section
                )))
            }
            _ => Ok(()),
        }
    }
}

fn default_llm_url() -> String {
    std::env::var("DOCQUERY_LLM_URL").unwrap_or_else(|_| "http://localhost:11434/v1".to_string())
}

fn default_true() -> bool {
    true
}

fn default_provider_type() -> ProviderType {
    std::env::var("DOCQUERY_LLM_PROVIDER")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(ProviderType::OpenaiCompatible)
}

fn default_chat_model() -> String {
    std::env::var("DOCQUERY_LLM_MODEL").unwrap_or_else(|_| "llama3.1:8b".to_string())
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_azure_api_version() -> String {
    "2024-02-01".to_string()
}

/// Document backend (Frappe/ERPNext REST API) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the backend, e.g. `https://erp.example.com`
    #[serde(default = "default_store_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_secret: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            api_key: std::env::var("DOCQUERY_STORE_API_KEY").ok(),
            api_secret: std::env::var("DOCQUERY_STORE_API_SECRET").ok(),
            timeout_secs: default_store_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_store_url() -> String {
    std::env::var("DOCQUERY_STORE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

fn default_store_timeout() -> u64 {
    30
}

/// Retry policy of the document store client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Backoff before the given retry (1-based), doubling up to the cap
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(
            self.initial_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    200
}

fn default_max_delay() -> u64 {
    2000
}

/// Defaults for the deterministic routing stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Doctype listed when a "list ..." query names no known doctype
    #[serde(default = "default_list_doctype")]
    pub list_default_doctype: String,

    /// Doctype listed by the heuristic router when nothing else matched
    #[serde(default = "default_fallback_doctype")]
    pub fallback_doctype: String,

    #[serde(default = "default_fallback_page_size")]
    pub fallback_page_size: usize,

    /// Number of hits fetched when resolving a free-text entity
    #[serde(default = "default_search_page_size")]
    pub search_page_size: usize,

    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            list_default_doctype: default_list_doctype(),
            fallback_doctype: default_fallback_doctype(),
            fallback_page_size: default_fallback_page_size(),
            search_page_size: default_search_page_size(),
            list_page_size: default_list_page_size(),
        }
    }
}

fn default_list_doctype() -> String {
    "User".to_string()
}

fn default_fallback_doctype() -> String {
    "Project".to_string()
}

fn default_fallback_page_size() -> usize {
    20
}

fn default_search_page_size() -> usize {
    5
}

fn default_list_page_size() -> usize {
    20
}

impl Config {
    /// Load config from `DOCQUERY_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var("DOCQUERY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::default_path());
        Self::load_from(&path)
    }

    /// Load config from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&content)?
        } else {
            Config::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::CONFIG_DIR_NAME)
            .join("config.yml")
    }

    /// Environment variables win over the file for endpoints and secrets
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("DOCQUERY_LLM_URL") {
            self.llm.url = url;
        }
        if let Ok(model) = std::env::var("DOCQUERY_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(key) = std::env::var("DOCQUERY_LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(provider) = std::env::var("DOCQUERY_LLM_PROVIDER") {
            self.llm.provider_type = provider.parse()?;
        }
        if let Ok(deployment) = std::env::var("DOCQUERY_LLM_AZURE_DEPLOYMENT") {
            self.llm.azure_deployment = Some(deployment);
        }
        if let Ok(version) = std::env::var("DOCQUERY_LLM_AZURE_API_VERSION") {
            self.llm.azure_api_version = version;
        }
        if let Ok(enabled) = std::env::var("DOCQUERY_LLM_ENABLED") {
            self.llm.enabled = enabled == "true" || enabled == "1";
        }
        if let Ok(url) = std::env::var("DOCQUERY_STORE_URL") {
            self.store.url = url;
        }
        if let Ok(key) = std::env::var("DOCQUERY_STORE_API_KEY") {
            self.store.api_key = Some(key);
        }
        if let Ok(secret) = std::env::var("DOCQUERY_STORE_API_SECRET") {
            self.store.api_secret = Some(secret);
        }
        Ok(())
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.store.url.trim().is_empty() {
            return Err(DocQueryError::Config("store.url is required".to_string()));
        }
        if self.llm.enabled {
            self.llm.validate("llm")?;
            if let Some(fallback) = self.llm.fallback.as_deref().filter(|f| f.enabled) {
                fallback.validate("llm.fallback")?;
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(DocQueryError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        let routing = &self.routing;
        if routing.search_page_size == 0
            || routing.list_page_size == 0
            || routing.fallback_page_size == 0
        {
            return Err(DocQueryError::Config(
                "routing page sizes must be greater than zero".to_string(),
            ));
        }
        if routing.list_default_doctype.is_empty() || routing.fallback_doctype.is_empty() {
            return Err(DocQueryError::Config(
                "routing default doctypes must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("nope.yml")).unwrap();
        assert_eq!(config.routing.search_page_size, 5);
        assert_eq!(config.routing.list_default_doctype, "User");
        assert_eq!(config.routing.fallback_doctype, "Project");
        assert_eq!(config.request_timeout_secs, 120);
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "llm:\n  url: http://llm.local/v1\n  model: qwen2.5\n  enabled: false\nrouting:\n  fallback_doctype: Customer\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.llm.enabled || std::env::var("DOCQUERY_LLM_ENABLED").is_ok());
        assert_eq!(config.routing.fallback_doctype, "Customer");
        assert_eq!(config.routing.search_page_size, 5);
        assert_eq!(config.llm.max_tokens, 500);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut config = Config::default();
        config.routing.search_page_size = 0;
        assert!(matches!(config.validate(), Err(DocQueryError::Config(_))));
    }

    #[test]
    fn test_provider_type_parse() {
        assert_eq!(
            "openai".parse::<ProviderType>().unwrap(),
            ProviderType::OpenaiCompatible
        );
        assert_eq!(
            "Anthropic".parse::<ProviderType>().unwrap(),
            ProviderType::Anthropic
        );
        assert_eq!("azure".parse::<ProviderType>().unwrap(), ProviderType::Azure);
        assert!("bedrock".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_zero_request_timeout_rejected() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(DocQueryError::Config(_))));
    }

    #[test]
    fn test_azure_requires_deployment() {
        let mut config = Config::default();
        config.llm.provider_type = ProviderType::Azure;
        config.llm.api_key = Some("key".to_string());
        config.llm.azure_deployment = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("azure_deployment"));

        config.llm.azure_deployment = Some("gpt-4o".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fallback_model_loaded_and_validated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "llm:\n  url: https://api.groq.com/openai/v1\n  model: llama-3.3-70b\n  fallback:\n    provider_type: anthropic\n    url: https://api.anthropic.com\n    model: claude-haiku\n",
        )
        .unwrap();

        let config: Config = serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let fallback = config.llm.fallback.as_deref().unwrap();
        assert_eq!(fallback.provider_type, ProviderType::Anthropic);
        assert_eq!(fallback.model, "claude-haiku");

        let mut config = config;
        config.llm.enabled = true;
        if let Some(fallback) = config.llm.fallback.as_deref_mut() {
            fallback.enabled = true;
            fallback.api_key = None;
        }
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("llm.fallback.api_key"));
    }

    #[test]
    fn test_retry_backoff_is_capped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for(10), Duration::from_millis(2000));
    }
}
