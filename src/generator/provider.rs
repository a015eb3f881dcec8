//! Provider-backed generator: one system message, one user message, one call.
//!
//! ## Retry Strategy
//!
//! Only transport failures (connection resets, 5xx, timeouts) are retried,
//! with exponential backoff (`retry_backoff_ms * 2^(attempt-1)`). Auth and
//! rate-limit errors are returned on first sight so the session can decide
//! between aborting and switching generators.

use super::TextGenerator;
use crate::config::HandbookConfig;
use crate::error::GeneratorError;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

const AUTH_MARKERS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "forbidden",
    "permission",
    "authenticat",
    "api key",
];

const RATE_LIMIT_MARKERS: &[&str] = &["429", "rate limit", "ratelimit", "too many requests", "quota"];

/// Classify a provider failure message.
pub fn classify_error(generator: &str, message: impl Into<String>) -> GeneratorError {
    let message = message.into();
    let lower = message.to_lowercase();
    let generator = generator.to_string();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        GeneratorError::Auth {
            generator,
            detail: message,
        }
    } else if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        GeneratorError::RateLimited {
            generator,
            detail: message,
        }
    } else {
        GeneratorError::Transport { generator, message }
    }
}

/// A [`TextGenerator`] over any `edgequake_llm` provider.
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    name: String,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    call_timeout: Duration,
}

impl ProviderGenerator {
    /// Wrap `provider`, taking sampling, retry and timeout settings from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &HandbookConfig) -> Self {
        let name = config
            .provider_name
            .clone()
            .unwrap_or_else(|| "provider".to_string());
        Self {
            provider,
            name,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            call_timeout: Duration::from_secs(config.api_timeout_secs.max(1)),
        }
    }

    /// Override the name used in logs and errors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl TextGenerator for ProviderGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(prompt),
        ];

        let mut last_err: Option<GeneratorError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    self.name, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            let err = match timeout(
                self.call_timeout,
                self.provider.chat(&messages, Some(&self.options)),
            )
            .await
            {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        self.name,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => classify_error(&self.name, e.to_string()),
                Err(_) => GeneratorError::Transport {
                    generator: self.name.clone(),
                    message: format!("timed out after {}s", self.call_timeout.as_secs()),
                },
            };

            if !matches!(err, GeneratorError::Transport { .. }) {
                return Err(err);
            }
            warn!("{}: attempt {} failed — {}", self.name, attempt + 1, err);
            last_err = Some(err);
        }

        Err(last_err.unwrap_or_else(|| GeneratorError::Transport {
            generator: self.name.clone(),
            message: "Unknown error".to_string(),
        }))
    }
}

/// Delay before retry `attempt` (1-based): `base · 2^(attempt-1)`, saturating.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn build_options(config: &HandbookConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&HandbookConfig::default());
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4000));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 3), 2_000);
        assert_eq!(backoff_ms(500, 64), u64::MAX);
        assert_eq!(backoff_ms(500, u32::MAX), u64::MAX);
    }

    #[test]
    fn classifies_auth() {
        for msg in [
            "HTTP 401 Unauthorized",
            "403 PermissionDenied: model not available",
            "Invalid API key provided",
        ] {
            assert!(
                matches!(classify_error("openai", msg), GeneratorError::Auth { .. }),
                "{msg}"
            );
        }
    }

    #[test]
    fn classifies_rate_limit() {
        for msg in ["429 Too Many Requests", "Rate limit reached", "quota exceeded"] {
            assert!(classify_error("xai", msg).is_rate_limited(), "{msg}");
        }
    }

    #[test]
    fn everything_else_is_transport() {
        let e = classify_error("openai", "connection reset by peer");
        assert_eq!(
            e,
            GeneratorError::Transport {
                generator: "openai".into(),
                message: "connection reset by peer".into(),
            }
        );
    }
}
