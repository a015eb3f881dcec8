//! Eager (whole-handbook) entry points and startup generator selection.
//!
//! Use [`crate::stream::generate_stream`] instead when sections should be
//! shown as they are produced; both drive the same
//! [`HandbookSession`](crate::session::HandbookSession).

use crate::config::HandbookConfig;
use crate::error::{GeneratorError, HandbookError};
use crate::generator::{GeneratorSelection, ProviderGenerator, TextGenerator};
use crate::output::{HandbookOutput, HandbookStats};
use crate::retriever::ContextRetriever;
use crate::session::HandbookSession;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Generate a complete handbook for `topic`.
///
/// # Errors
/// Returns `Err(HandbookError)` only for fatal conditions:
/// - empty topic
/// - an auth or transport failure from the generator mid-run
/// - a rate limit under [`crate::config::RateLimitPolicy::Abort`]
///
/// Short outlines, empty retrieval and formatting drift are absorbed.
pub async fn generate_handbook(
    topic: impl AsRef<str>,
    selection: GeneratorSelection,
    retriever: Arc<dyn ContextRetriever>,
    config: &HandbookConfig,
) -> Result<HandbookOutput, HandbookError> {
    let topic = topic.as_ref();
    info!("Starting handbook: {}", topic);

    let mut session = HandbookSession::start(topic, selection, retriever, config.clone()).await?;
    while session.next_section().await?.is_some() {}
    session.finish().await
}

/// Generate a handbook and write its Markdown to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_handbook_to_file(
    topic: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    selection: GeneratorSelection,
    retriever: Arc<dyn ContextRetriever>,
    config: &HandbookConfig,
) -> Result<HandbookStats, HandbookError> {
    let output = generate_handbook(topic, selection, retriever, config).await?;
    let path = output_path.as_ref();
    let write_err = |source: std::io::Error| HandbookError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &output.document.markdown)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`generate_handbook`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_handbook_sync(
    topic: impl AsRef<str>,
    selection: GeneratorSelection,
    retriever: Arc<dyn ContextRetriever>,
    config: &HandbookConfig,
) -> Result<HandbookOutput, HandbookError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| HandbookError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_handbook(topic, selection, retriever, config))
}

/// Pick the run's generator.
///
/// Resolves a provider from `config` and the environment. When no provider
/// can be constructed the deterministic local generator is returned in
/// degraded mode, so a run always has something to call.
pub fn select_generator(config: &HandbookConfig) -> GeneratorSelection {
    let primary = resolve_provider(config).map(|(provider, name)| {
        debug!("Using provider '{}'", name);
        Arc::new(ProviderGenerator::new(provider, config).with_name(name)) as Arc<dyn TextGenerator>
    });
    GeneratorSelection::or_local(primary)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<(Arc<dyn LLMProvider>, String), GeneratorError> {
    ProviderFactory::create_llm_provider(provider_name, model)
        .map(|p| (p, provider_name.to_string()))
        .map_err(|e| GeneratorError::NotConfigured {
            generator: provider_name.to_string(),
            hint: format!("{e}"),
        })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`OPENAI_API_KEY`** present: OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Returns the provider with the name used for it in logs and errors.
fn resolve_provider(
    config: &HandbookConfig,
) -> Result<(Arc<dyn LLMProvider>, String), GeneratorError> {
    if let Some(ref provider) = config.provider {
        let name = config
            .provider_name
            .clone()
            .unwrap_or_else(|| "provider".to_string());
        return Ok((Arc::clone(provider), name));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| GeneratorError::NotConfigured {
            generator: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, "auto".to_string()))
}
