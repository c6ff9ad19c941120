//! LLM integration
//!
//! Provides the client trait and implementations for:
//! - OpenAI-compatible chat completion services
//! - Anthropic Messages API
//! - Azure OpenAI deployments
//! - Primary/fallback model switching
//! - JSON extraction from completions

mod anthropic;
mod azure;
mod client;
mod fallback;
pub mod json;

pub use anthropic::AnthropicClient;
pub use azure::AzureClient;
pub use fallback::{parse_retry_after, FallbackClient, DEFAULT_RATE_LIMIT_COOLDOWN};
pub use client::{build_llm_client, infer_provider_name, ChatMessage, LLMClient, OpenAICompatibleClient};
