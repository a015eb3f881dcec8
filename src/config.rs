//! Configuration types for handbook generation.
//!
//! All generation behaviour is controlled through [`HandbookConfig`], built via
//! its [`HandbookConfigBuilder`]. Every length budget the pipeline enforces
//! (target words, context ceiling, memory ceiling) lives here so two runs can be
//! diffed by their configs alone.

use crate::error::HandbookError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Upper bound accepted for [`HandbookConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Configuration for one handbook run.
///
/// # Example
/// ```rust
/// use edgequake_handbook::HandbookConfig;
///
/// let config = HandbookConfig::builder()
///     .target_words(5_000)
///     .top_k(4)
///     .document_id("doc-42")
///     .build()
///     .unwrap();
/// assert_eq!(config.top_k, 4);
/// ```
#[derive(Clone)]
pub struct HandbookConfig {
    /// Stop emitting sections once the document reaches this many words. Default: 20 000.
    pub target_words: usize,

    /// Passages requested from the retriever per heading. Default: 8.
    pub top_k: usize,

    /// Hard cap, in characters, on the serialised source-excerpt block. Default: 12 000.
    pub context_char_limit: usize,

    /// Cap, in characters, on the continuity digest injected into the next
    /// section prompt. Default: 2 000.
    pub memory_char_limit: usize,

    /// Cap, in characters, on the section text sent to the summariser. Default: 12 000.
    pub summary_input_char_limit: usize,

    /// Active document. When `None` retrieval is skipped entirely and every
    /// section is generated without citation claims.
    pub document_id: Option<String>,

    /// LLM model identifier. If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens per generator call. Default: 4000.
    ///
    /// A 1 800-word section is roughly 2 500 tokens; 4 000 leaves headroom
    /// for sub-headings and lists without truncating mid-sentence.
    pub max_tokens: usize,

    /// Retries on a transport failure. Auth and rate-limit errors are never
    /// retried here. Default: 3, at most [`MAX_RETRIES`].
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If None, uses built-in default.
    pub system_prompt: Option<String>,

    /// What to do when the primary generator is rate-limited mid-run.
    pub rate_limit_policy: RateLimitPolicy,

    /// Whether out-of-set citations are removed from generated text.
    pub citation_policy: CitationPolicy,

    /// Fetch heading i+1's passages while section i is being summarised.
    /// Default: false.
    pub prefetch_retrieval: bool,

    /// Passages requested for direct question answering. Default: 6.
    pub qa_top_k: usize,

    /// Receives a status line and completion fraction after every step.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for HandbookConfig {
    fn default() -> Self {
        Self {
            target_words: 20_000,
            top_k: 8,
            context_char_limit: 12_000,
            memory_char_limit: 2_000,
            summary_input_char_limit: 12_000,
            document_id: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4000,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            system_prompt: None,
            rate_limit_policy: RateLimitPolicy::default(),
            citation_policy: CitationPolicy::default(),
            prefetch_retrieval: false,
            qa_top_k: 6,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for HandbookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandbookConfig")
            .field("target_words", &self.target_words)
            .field("top_k", &self.top_k)
            .field("context_char_limit", &self.context_char_limit)
            .field("memory_char_limit", &self.memory_char_limit)
            .field("summary_input_char_limit", &self.summary_input_char_limit)
            .field("document_id", &self.document_id)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("rate_limit_policy", &self.rate_limit_policy)
            .field("citation_policy", &self.citation_policy)
            .field("prefetch_retrieval", &self.prefetch_retrieval)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn HandbookProgressCallback>"),
            )
            .finish()
    }
}

impl HandbookConfig {
    /// Create a new builder for `HandbookConfig`.
    pub fn builder() -> HandbookConfigBuilder {
        HandbookConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`HandbookConfig`].
#[derive(Debug)]
pub struct HandbookConfigBuilder {
    config: HandbookConfig,
}

impl HandbookConfigBuilder {
    pub fn target_words(mut self, words: usize) -> Self {
        self.config.target_words = words;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn context_char_limit(mut self, chars: usize) -> Self {
        self.config.context_char_limit = chars;
        self
    }

    pub fn memory_char_limit(mut self, chars: usize) -> Self {
        self.config.memory_char_limit = chars;
        self
    }

    pub fn summary_input_char_limit(mut self, chars: usize) -> Self {
        self.config.summary_input_char_limit = chars;
        self
    }

    pub fn document_id(mut self, id: impl Into<String>) -> Self {
        self.config.document_id = Some(id.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.config.rate_limit_policy = policy;
        self
    }

    pub fn citation_policy(mut self, policy: CitationPolicy) -> Self {
        self.config.citation_policy = policy;
        self
    }

    pub fn prefetch_retrieval(mut self, v: bool) -> Self {
        self.config.prefetch_retrieval = v;
        self
    }

    pub fn qa_top_k(mut self, k: usize) -> Self {
        self.config.qa_top_k = k;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<HandbookConfig, HandbookError> {
        let c = &self.config;
        if c.target_words == 0 {
            return Err(HandbookError::InvalidConfig(
                "target_words must be ≥ 1".into(),
            ));
        }
        if c.top_k == 0 || c.qa_top_k == 0 {
            return Err(HandbookError::InvalidConfig(
                "top_k and qa_top_k must be ≥ 1".into(),
            ));
        }
        if c.context_char_limit == 0 || c.summary_input_char_limit == 0 {
            return Err(HandbookError::InvalidConfig(format!(
                "character limits must be ≥ 1, got context={} summary_input={}",
                c.context_char_limit, c.summary_input_char_limit
            )));
        }
        if c.max_retries > MAX_RETRIES {
            return Err(HandbookError::InvalidConfig(format!(
                "max_retries must be ≤ {MAX_RETRIES}, got {}",
                c.max_retries
            )));
        }
        if matches!(c.document_id.as_deref(), Some(id) if id.trim().is_empty()) {
            return Err(HandbookError::InvalidConfig(
                "document_id must not be blank".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Reaction to a rate-limited primary generator during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateLimitPolicy {
    /// Surface the error; the run fails with a recoverable [`HandbookError`]. (default)
    #[default]
    Abort,
    /// Re-issue the call to the local generator and keep using it for the
    /// rest of the run. The output is marked degraded.
    FallbackToLocal,
}

/// How citations outside a section's allowed pages are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CitationPolicy {
    /// Remove `(PDF p. N)` markers whose page was not retrieved for the section. (default)
    #[default]
    Enforce,
    /// Keep the generator's text untouched; only count violations.
    Advisory,
}
