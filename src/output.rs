//! Result types produced by a handbook run.

use serde::{Deserialize, Serialize};

/// Whether a run used the configured generator throughout.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GenerationMode {
    /// Every call went to the primary generator.
    #[default]
    Full,
    /// At least part of the run used the deterministic local generator.
    Degraded { reason: String },
}

impl GenerationMode {
    pub fn is_degraded(&self) -> bool {
        matches!(self, GenerationMode::Degraded { .. })
    }
}

/// Where the outline came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlineSource {
    /// Parsed from the generator's numbered list.
    Parsed,
    /// The generator under-produced; the canonical outline was substituted.
    Fallback,
}

/// One generated section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDocument {
    /// The outline heading this section was written for.
    pub heading: String,
    /// Markdown body; always starts with `## {heading}`.
    pub body: String,
    /// Pages the section was permitted to cite (sorted, unique).
    pub allowed_pages: Vec<u32>,
    /// Passages retrieved for the section.
    pub passages: usize,
    /// `true` when the heading line had to be prepended.
    pub heading_repaired: bool,
    /// Citations found outside `allowed_pages`.
    pub unsupported_citations: usize,
}

/// The assembled handbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandbookDocument {
    pub title: String,
    /// Full planned outline (the table of contents lists all of it).
    pub outline: Vec<String>,
    pub outline_source: OutlineSource,
    pub markdown: String,
    /// Word-boundary token count of `markdown`.
    pub words: usize,
}

/// Run statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandbookStats {
    pub target_words: usize,
    pub sections_planned: usize,
    pub sections_generated: usize,
    /// `true` when the loop stopped because the target was reached.
    pub budget_reached: bool,
    pub generator_calls: usize,
    pub retrieval_calls: usize,
    /// Sections generated without any retrieved passage.
    pub ungrounded_sections: usize,
    pub unsupported_citations: usize,
    pub total_duration_ms: u64,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandbookOutput {
    pub document: HandbookDocument,
    /// Body sections in outline order; fewer than the outline when the budget stopped the loop.
    pub sections: Vec<SectionDocument>,
    pub conclusion: SectionDocument,
    pub mode: GenerationMode,
    pub stats: HandbookStats,
}
