//! Primary/fallback model switching
//!
//! Calls go to the primary model. When it is rate limited, times out or
//! answers with a 5xx, the call is retried once on the fallback model. A
//! rate-limited primary is skipped for the cooldown the provider announced
//! (or [`DEFAULT_RATE_LIMIT_COOLDOWN`]), then tried again.

use super::{ChatMessage, LLMClient};
use crate::error::{DocQueryError, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Cooldown when a rate limit does not say how long to wait
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(600);

lazy_static! {
    static ref RETRY_AFTER_RE: Regex =
        Regex::new(r"(?i)(?:try again in|retry after|available in)\s+((?:\d+(?:\.\d+)?(?:ms|h|m|s))+)").unwrap();
    static ref DURATION_PART_RE: Regex = Regex::new(r"(\d+(?:\.\d+)?)(ms|h|m|s)").unwrap();
    static ref SERVER_ERROR_RE: Regex = Regex::new(r"status 5\d\d\b").unwrap();
}

/// An [`LLMClient`] that falls back to a second model
pub struct FallbackClient {
    primary: Arc<dyn LLMClient>,
    fallback: Arc<dyn LLMClient>,
    rate_limited_until: RwLock<Option<Instant>>,
}

impl FallbackClient {
    pub fn new(primary: Arc<dyn LLMClient>, fallback: Arc<dyn LLMClient>) -> Self {
        Self {
            primary,
            fallback,
            rate_limited_until: RwLock::new(None),
        }
    }

    /// Whether the primary is still cooling down after a rate limit
    pub fn primary_cooling_down(&self) -> bool {
        self.rate_limited_until
            .read()
            .ok()
            .and_then(|until| *until)
            .is_some_and(|until| Instant::now() < until)
    }

    fn start_cooldown(&self, cooldown: Duration) {
        if let Ok(mut until) = self.rate_limited_until.write() {
            *until = Some(Instant::now() + cooldown);
        }
    }

    async fn call_fallback(
        &self,
        messages: Vec<ChatMessage>,
        primary_rate_limited: bool,
    ) -> Result<String> {
        match self.fallback.chat_completion(messages).await {
            Ok(text) => {
                tracing::info!(fallback = self.fallback.provider(), "Fallback LLM answered");
                Ok(text)
            }
            // Keep the rate-limit signal so callers still degrade
            Err(e) if primary_rate_limited && !e.is_rate_limit() => {
                tracing::error!(error = %e, "Fallback LLM also failed");
                Err(DocQueryError::RateLimited(format!(
                    "primary {} rate limited and fallback {} failed: {}",
                    self.primary.provider(),
                    self.fallback.provider(),
                    e
                )))
            }
            Err(e) => {
                tracing::error!(error = %e, "Fallback LLM also failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl LLMClient for FallbackClient {
    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String> {
        if self.primary_cooling_down() {
            tracing::warn!(
                primary = self.primary.provider(),
                "Primary LLM is rate limited, using fallback"
            );
            return self.call_fallback(messages, true).await;
        }

        let err = match self.primary.chat_completion(messages.clone()).await {
            Ok(text) => return Ok(text),
            Err(e) if should_fall_back(&e) => e,
            Err(e) => return Err(e),
        };

        let rate_limited = err.is_rate_limit();
        if rate_limited {
            let cooldown = parse_retry_after(&err.to_string()).unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN);
            tracing::warn!(
                primary = self.primary.provider(),
                cooldown_secs = cooldown.as_secs(),
                "Primary LLM rate limited, setting cooldown"
            );
            self.start_cooldown(cooldown);
        }
        tracing::warn!(error = %err, fallback = self.fallback.provider(), "Primary LLM failed, trying fallback");
        self.call_fallback(messages, rate_limited).await
    }

    fn provider(&self) -> &str {
        self.primary.provider()
    }
}

/// Rate limits, timeouts and server errors are worth a second model;
/// request errors (4xx) are not
fn should_fall_back(err: &DocQueryError) -> bool {
    match err {
        DocQueryError::RateLimited(_) => true,
        DocQueryError::Http(e) => e.is_timeout() || e.is_connect(),
        DocQueryError::Llm(msg) => SERVER_ERROR_RE.is_match(msg) || msg.to_lowercase().contains("timeout"),
        other => other.is_rate_limit(),
    }
}

/// Parse provider hints such as "Please try again in 9m38.016s"
pub fn parse_retry_after(message: &str) -> Option<Duration> {
    let raw = RETRY_AFTER_RE.captures(message)?.get(1)?.as_str();
    let secs: f64 = DURATION_PART_RE
        .captures_iter(raw)
        .filter_map(|part| {
            let value: f64 = part[1].parse().ok()?;
            let scale = match &part[2] {
                "h" => 3600.0,
                "m" => 60.0,
                "s" => 1.0,
                _ => 0.001,
            };
            Some(value * scale)
        })
        .sum();
    (secs > 0.0).then(|| Duration::from_secs_f64(secs))
}
