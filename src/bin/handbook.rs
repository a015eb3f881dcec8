//! CLI binary for edgequake-handbook.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `HandbookConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_handbook::{
    answer_question, generate_handbook, generate_handbook_to_file, select_generator,
    CitationPolicy, ContextRetriever, GeneratorSelection, HandbookConfig,
    HandbookProgressCallback, InMemoryRetriever, NoopRetriever, ProgressCallback, ProgressEvent,
    RateLimitPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Used when the topic argument is empty.
const DEFAULT_TOPIC: &str = "Handbook Topic";

/// Bar resolution; progress fractions are mapped onto `0..=BAR_STEPS`.
const BAR_STEPS: u64 = 1000;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar driven by the completion fraction,
/// plus a log line per finished section.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(BAR_STEPS);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {percent:>3}%  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Planning");
        bar.set_message("Drafting outline…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl HandbookProgressCallback for CliProgressCallback {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::OutlineReady { sections, fallback } => {
                self.bar.set_prefix("Writing");
                self.bar.println(format!(
                    "{} {}{}",
                    cyan("◆"),
                    bold(&format!("Outline: {sections} sections")),
                    if *fallback {
                        dim("  (fallback outline)")
                    } else {
                        String::new()
                    }
                ));
            }
            ProgressEvent::SectionGenerated {
                index,
                total,
                heading,
            } => {
                self.bar.println(format!(
                    "  {} Section {:>2}/{:<2}  {}",
                    green("✓"),
                    index,
                    total,
                    heading
                ));
            }
            ProgressEvent::WordCount { words, target, .. } => {
                self.bar.println(format!(
                    "  {}",
                    dim(&format!("{words} / {target} words"))
                ));
            }
            ProgressEvent::ConclusionStarted => self.bar.set_prefix("Closing"),
            ProgressEvent::Completed { .. } => {
                self.bar.finish_and_clear();
                return;
            }
            _ => {}
        }
        self.bar
            .set_position((event.fraction() * BAR_STEPS as f64).round() as u64);
        self.bar.set_message(event.message());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Handbook to stdout (provider auto-detected)
  handbook "Distributed Caching"

  # Grounded in an exported passage set, written to a file
  handbook "Distributed Caching" --passages chunks.json -o caching.md

  # Shorter run, specific model
  handbook "Vector Search" --target-words 6000 --provider openai --model gpt-4.1-mini

  # Keep going on the offline generator if the provider rate-limits
  handbook "Vector Search" --on-rate-limit fallback

  # Ask the loaded document a question
  handbook --passages chunks.json --ask "What eviction policy is recommended?"

  # Offline run, structured output
  handbook "Incident Response" --local --json > handbook.json

PASSAGE FILE:
  A JSON array of chunk records:
    [{"document_id": "doc-1", "content": "...", "pages": [3, 4]}, ...]
  Pages may also sit under "metadata": {"pages": [...]}.
  With one document_id in the file it is selected automatically;
  otherwise pass --document.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override the log filter

Without any configured provider the offline generator is used and the run
is reported as degraded.
"#;

/// Generate long-form, citation-grounded handbooks with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "handbook",
    version,
    about = "Generate long-form, citation-grounded handbooks with an LLM",
    long_about = "Plan an outline for a topic and write it section by section, grounding each \
section in passages retrieved from an exported document. Supports OpenAI, Anthropic, Google \
Gemini, Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Handbook topic.
    topic: Option<String>,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "HANDBOOK_OUTPUT")]
    output: Option<PathBuf>,

    /// Answer a question from the loaded passages instead of writing a handbook.
    #[arg(long)]
    ask: Option<String>,

    /// JSON passage export used for retrieval.
    #[arg(long, env = "HANDBOOK_PASSAGES")]
    passages: Option<PathBuf>,

    /// Document id to scope retrieval to.
    #[arg(long, env = "HANDBOOK_DOCUMENT")]
    document: Option<String>,

    /// Use the offline generator; no API key needed.
    #[arg(long, env = "HANDBOOK_LOCAL")]
    local: bool,

    /// Reaction to a rate-limited provider mid-run.
    #[arg(long, env = "HANDBOOK_ON_RATE_LIMIT", value_enum, default_value = "abort")]
    on_rate_limit: RateLimitArg,

    /// Whether citations outside the retrieved pages are removed.
    #[arg(long, env = "HANDBOOK_CITATIONS", value_enum, default_value = "enforce")]
    citations: CitationArg,

    /// Retrieve the next section's passages while the current one is summarised.
    #[arg(long, env = "HANDBOOK_PREFETCH")]
    prefetch: bool,

    /// Stop adding sections once the document reaches this many words.
    #[arg(long, env = "HANDBOOK_TARGET_WORDS", default_value_t = 20_000)]
    target_words: usize,

    /// Passages retrieved per section.
    #[arg(long, env = "HANDBOOK_TOP_K", default_value_t = 8)]
    top_k: usize,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "HANDBOOK_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "HANDBOOK_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "HANDBOOK_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries per call on transport failure.
    #[arg(long, env = "HANDBOOK_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "HANDBOOK_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Output structured JSON instead of Markdown.
    #[arg(long, env = "HANDBOOK_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "HANDBOOK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HANDBOOK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HANDBOOK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum RateLimitArg {
    Abort,
    Fallback,
}

impl From<RateLimitArg> for RateLimitPolicy {
    fn from(v: RateLimitArg) -> Self {
        match v {
            RateLimitArg::Abort => RateLimitPolicy::Abort,
            RateLimitArg::Fallback => RateLimitPolicy::FallbackToLocal,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum CitationArg {
    Enforce,
    Advisory,
}

impl From<CitationArg> for CitationPolicy {
    fn from(v: CitationArg) -> Self {
        match v {
            CitationArg::Enforce => CitationPolicy::Enforce,
            CitationArg::Advisory => CitationPolicy::Advisory,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.ask.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Retriever ────────────────────────────────────────────────────────
    let (retriever, document): (Arc<dyn ContextRetriever>, Option<String>) =
        match cli.passages {
            Some(ref path) => {
                let store = InMemoryRetriever::from_json_file(path)
                    .with_context(|| format!("Failed to load passages from {:?}", path))?;
                let document = cli.document.clone().or_else(|| store.default_document());
                if document.is_none() && !cli.quiet {
                    let ids = store.document_ids();
                    if ids.is_empty() {
                        eprintln!(
                            "{} No passage in the file carries a document_id; retrieval is disabled",
                            yellow("⚠")
                        );
                    } else {
                        eprintln!(
                            "{} Passage file holds {} documents ({}); pass --document to enable retrieval",
                            yellow("⚠"),
                            ids.len(),
                            ids.join(", ")
                        );
                    }
                }
                (Arc::new(store), document)
            }
            None => (Arc::new(NoopRetriever), cli.document.clone()),
        };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn HandbookProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, document, progress_cb).await?;

    // ── Generator ────────────────────────────────────────────────────────
    let selection = if cli.local {
        GeneratorSelection::local("offline generator requested with --local")
    } else {
        select_generator(&config)
    };
    if let edgequake_handbook::GenerationMode::Degraded { ref reason } = selection.mode {
        if !cli.quiet && !cli.local {
            eprintln!("{} Using offline generator: {}", yellow("⚠"), dim(reason));
        }
    }

    // ── Question mode ────────────────────────────────────────────────────
    if let Some(ref question) = cli.ask {
        let answer = answer_question(
            question,
            selection.generator.as_ref(),
            retriever.as_ref(),
            &config,
        )
        .await;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&answer).context("Failed to serialise answer")?
            );
        } else {
            println!("{}", answer.text);
        }
        return Ok(());
    }

    let topic = match cli.topic.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => DEFAULT_TOPIC.to_string(),
    };

    // ── Run generation ───────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = generate_handbook_to_file(&topic, output_path, selection, retriever, &config)
            .await
            .context("Handbook generation failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {}/{} sections  {}ms  →  {}",
                green("✔"),
                stats.sections_generated,
                stats.sections_planned,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} generator calls  /  {} ungrounded sections  /  {} citations removed",
                dim(&stats.generator_calls.to_string()),
                dim(&stats.ungrounded_sections.to_string()),
                dim(&stats.unsupported_citations.to_string()),
            );
        }
    } else {
        let output = generate_handbook(&topic, selection, retriever, &config)
            .await
            .context("Handbook generation failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.document.markdown.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.document.markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "{}  {} words  {}/{} sections  {}ms",
                if output.mode.is_degraded() {
                    yellow("⚠")
                } else {
                    green("✔")
                },
                output.document.words,
                output.stats.sections_generated,
                output.stats.sections_planned,
                output.stats.total_duration_ms,
            );
        }
    }

    Ok(())
}

/// Map CLI args to `HandbookConfig`.
async fn build_config(
    cli: &Cli,
    document: Option<String>,
    progress: Option<ProgressCallback>,
) -> Result<HandbookConfig> {
    let mut builder = HandbookConfig::builder()
        .target_words(cli.target_words)
        .top_k(cli.top_k)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .rate_limit_policy(cli.on_rate_limit.clone().into())
        .citation_policy(cli.citations.clone().into())
        .prefetch_retrieval(cli.prefetch);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(document) = document {
        builder = builder.document_id(document);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
