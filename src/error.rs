//! Error types for the edgequake-handbook library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`GeneratorError`] — a **classified** failure from one text-generation
//!   call. The classification (auth / rate-limit / transport) is what lets the
//!   pipeline decide between aborting the run and substituting the local
//!   generator.
//!
//! * [`HandbookError`] — **Fatal** for the run: returned as
//!   `Err(HandbookError)` from the top-level `generate*` functions. Everything
//!   the pipeline can absorb (short outlines, empty retrieval, heading drift,
//!   out-of-set citations) never reaches this type.

use std::path::PathBuf;
use thiserror::Error;

/// A classified failure from a single [`crate::generator::TextGenerator`] call.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GeneratorError {
    /// Credentials were rejected (HTTP 401/403). Retrying will not help.
    #[error("Authentication error from generator '{generator}': {detail}")]
    Auth { generator: String, detail: String },

    /// HTTP 429 or quota exhaustion. The caller may retry later or switch to
    /// the local generator.
    #[error("Rate limit exceeded for generator '{generator}': {detail}")]
    RateLimited { generator: String, detail: String },

    /// Network, timeout, or any other API failure. The message is passed
    /// through unchanged.
    #[error("Generator '{generator}' call failed: {message}")]
    Transport { generator: String, message: String },

    /// The backend could not be constructed (missing API key etc.).
    #[error("Generator '{generator}' is not configured.\n{hint}")]
    NotConfigured { generator: String, hint: String },
}

impl GeneratorError {
    /// Name of the generator that produced the error.
    pub fn generator(&self) -> &str {
        match self {
            GeneratorError::Auth { generator, .. }
            | GeneratorError::RateLimited { generator, .. }
            | GeneratorError::Transport { generator, .. }
            | GeneratorError::NotConfigured { generator, .. } => generator,
        }
    }

    /// `true` when the failure is transient and a substitute generator may
    /// carry the run to completion.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GeneratorError::RateLimited { .. })
    }

    /// `true` for failures that must abort the run when they happen mid-run.
    pub fn is_fatal(&self) -> bool {
        !self.is_rate_limited()
    }
}

/// All fatal errors returned by the edgequake-handbook library.
#[derive(Debug, Error)]
pub enum HandbookError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The topic was empty or whitespace only.
    #[error("Handbook topic must not be empty")]
    EmptyTopic,

    /// The passage export could not be read or parsed.
    #[error("Failed to load passages from '{path}': {detail}")]
    PassageLoad { path: PathBuf, detail: String },

    // ── Generator errors ──────────────────────────────────────────────────
    /// A generator call failed and the run cannot continue.
    #[error("Generation failed during {stage}: {source}")]
    Generator {
        stage: String,
        #[source]
        source: GeneratorError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandbookError {
    pub(crate) fn generator(stage: impl Into<String>, source: GeneratorError) -> Self {
        HandbookError::Generator {
            stage: stage.into(),
            source,
        }
    }

    /// `true` when the run failed only because the generator was
    /// rate-limited; re-running later or with
    /// [`crate::config::RateLimitPolicy::FallbackToLocal`] can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HandbookError::Generator { source, .. } if source.is_rate_limited()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_display() {
        let e = GeneratorError::Auth {
            generator: "openai".into(),
            detail: "403 PermissionDenied".into(),
        };
        assert!(e.to_string().contains("openai"));
        assert!(e.to_string().contains("403"));
        assert!(e.is_fatal());
    }

    #[test]
    fn rate_limit_is_not_fatal() {
        let e = GeneratorError::RateLimited {
            generator: "xai".into(),
            detail: "429".into(),
        };
        assert!(e.is_rate_limited());
        assert!(!e.is_fatal());
        assert_eq!(e.generator(), "xai");
    }

    #[test]
    fn handbook_error_wraps_stage() {
        let e = HandbookError::generator(
            "section 3",
            GeneratorError::Transport {
                generator: "openai".into(),
                message: "connection reset".into(),
            },
        );
        let msg = e.to_string();
        assert!(msg.contains("section 3"), "got: {msg}");
        assert!(msg.contains("connection reset"), "got: {msg}");
        assert!(!e.is_recoverable());
    }

    #[test]
    fn rate_limited_run_is_recoverable() {
        let e = HandbookError::generator(
            "outline",
            GeneratorError::RateLimited {
                generator: "openai".into(),
                detail: "slow down".into(),
            },
        );
        assert!(e.is_recoverable());
    }
}
