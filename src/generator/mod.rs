//! The Text Generator capability.
//!
//! The pipeline only ever sees `dyn TextGenerator`: a prompt goes in, a
//! string or a classified [`GeneratorError`] comes out. Backends:
//!
//! * [`ProviderGenerator`] — any `edgequake_llm` provider (OpenAI, Anthropic,
//!   Gemini, Ollama, …) with timeout and transport retries.
//! * [`LocalGenerator`] — deterministic, offline; used when no provider can
//!   be constructed and as the rate-limit substitute.
//! * [`SwitchingGenerator`] — wraps a primary and switches to a substitute
//!   for the rest of the run on the first rate-limit error.

mod local;
mod provider;
mod switching;

pub use local::{LocalGenerator, LOCAL_MIN_SECTION_WORDS};
pub use provider::{classify_error, ProviderGenerator};
pub use switching::SwitchingGenerator;

use crate::error::GeneratorError;
use crate::output::GenerationMode;
use async_trait::async_trait;
use std::sync::Arc;

/// Given a prompt, return generated text.
///
/// Calls are request/response; no streaming contract is assumed. A call that
/// has been issued runs to completion or failure.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

/// The generator chosen at startup and whether it is the real backend.
#[derive(Clone)]
pub struct GeneratorSelection {
    pub generator: Arc<dyn TextGenerator>,
    pub mode: GenerationMode,
}

impl GeneratorSelection {
    /// A fully capable generator.
    pub fn full(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            mode: GenerationMode::Full,
        }
    }

    /// The local generator, recording why the primary was not used.
    pub fn local(reason: impl Into<String>) -> Self {
        Self {
            generator: Arc::new(LocalGenerator::default()),
            mode: GenerationMode::Degraded {
                reason: reason.into(),
            },
        }
    }

    /// Use the primary if it could be constructed, otherwise fall back to the
    /// local generator in degraded mode.
    pub fn or_local(primary: Result<Arc<dyn TextGenerator>, GeneratorError>) -> Self {
        match primary {
            Ok(generator) => Self::full(generator),
            Err(e) => {
                tracing::warn!("Primary generator unavailable, using local generator: {}", e);
                Self::local(e.to_string())
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.mode.is_degraded()
    }
}

impl std::fmt::Debug for GeneratorSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorSelection")
            .field("generator", &self.generator.name())
            .field("mode", &self.mode)
            .finish()
    }
}
