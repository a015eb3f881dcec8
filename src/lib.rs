//! # edgequake-handbook
//!
//! Generate long-form, citation-grounded handbooks section by section with a
//! bounded-context language model.
//!
//! ## Why this crate?
//!
//! A single model call cannot write a 20 000-word document. This crate plans
//! an outline, then writes one section per call, grounding each in passages
//! retrieved for that heading and carrying a short digest of the previous
//! section forward. A word budget decides when to stop; a conclusion is
//! always written last. Citations are checked against the pages actually
//! retrieved, so the document never claims support it does not have.
//!
//! ## Pipeline Overview
//!
//! ```text
//! topic
//!  │
//!  ├─ 1. Outline     12–18 headings, fallback to a canonical 16
//!  ├─ 2. Retrieve    "{topic} — {heading}", top-k, document scope
//!  ├─ 3. Compose     one call per section, cleanup, citation check, heading repair
//!  ├─ 4. Continuity  6–10 bullet digest of the latest section
//!  ├─ 5. Budget      whole-document word count vs. target
//!  ├─ 6. Conclusion  exactly once, never cites
//!  └─ 7. Assemble    title, table of contents, sections, conclusion
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_handbook::{generate_handbook, select_generator, HandbookConfig, NoopRetriever};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY;
//!     // falls back to the offline generator when none is configured.
//!     let config = HandbookConfig::builder().target_words(8_000).build()?;
//!     let selection = select_generator(&config);
//!     let output = generate_handbook("Distributed Caching", selection, Arc::new(NoopRetriever), &config).await?;
//!     println!("{}", output.document.markdown);
//!     eprintln!("{} words, mode {:?}", output.document.words, output.mode);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `handbook` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-handbook = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod answer;
pub mod config;
pub mod error;
pub mod generate;
pub mod generator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retriever;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use answer::{answer_question, Answer};
pub use config::{CitationPolicy, HandbookConfig, HandbookConfigBuilder, RateLimitPolicy};
pub use error::{GeneratorError, HandbookError};
pub use generate::{generate_handbook, generate_handbook_sync, generate_handbook_to_file, select_generator};
pub use generator::{GeneratorSelection, LocalGenerator, ProviderGenerator, TextGenerator};
pub use output::{
    GenerationMode, HandbookDocument, HandbookOutput, HandbookStats, OutlineSource, SectionDocument,
};
pub use progress::{HandbookProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEvent};
pub use retriever::{ContextRetriever, InMemoryRetriever, NoopRetriever, RetrievedPassage};
pub use session::HandbookSession;
pub use stream::{generate_stream, HandbookEvent, HandbookStream};
