use super::TextGenerator;
use crate::error::GeneratorError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Routes calls to a primary generator until it is rate-limited, then to the
/// substitute for every remaining call.
///
/// Without a substitute it is a transparent pass-through that only counts
/// calls.
pub struct SwitchingGenerator {
    primary: Arc<dyn TextGenerator>,
    substitute: Option<Arc<dyn TextGenerator>>,
    switched: OnceLock<String>,
    calls: AtomicUsize,
}

impl SwitchingGenerator {
    pub fn new(
        primary: Arc<dyn TextGenerator>,
        substitute: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        Self {
            primary,
            substitute,
            switched: OnceLock::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Why the substitute took over, if it did.
    pub fn switch_reason(&self) -> Option<&str> {
        self.switched.get().map(String::as_str)
    }

    /// Prompts issued so far (a re-issued prompt counts once per backend).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn active(&self) -> &Arc<dyn TextGenerator> {
        match (&self.substitute, self.switched.get()) {
            (Some(sub), Some(_)) => sub,
            _ => &self.primary,
        }
    }
}

#[async_trait]
impl TextGenerator for SwitchingGenerator {
    fn name(&self) -> &str {
        self.active().name()
    }

    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let active = Arc::clone(self.active());
        self.calls.fetch_add(1, Ordering::Relaxed);
        let err = match active.generate(prompt).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };

        let substitute = match (&self.substitute, self.switched.get()) {
            (Some(sub), None) if err.is_rate_limited() => Arc::clone(sub),
            _ => return Err(err),
        };

        warn!(
            "Generator '{}' rate-limited; switching to '{}' for the rest of the run: {}",
            active.name(),
            substitute.name(),
            err
        );
        let _ = self.switched.set(err.to_string());
        self.calls.fetch_add(1, Ordering::Relaxed);
        debug!("Re-issuing prompt to '{}'", substitute.name());
        substitute.generate(prompt).await
    }
}
