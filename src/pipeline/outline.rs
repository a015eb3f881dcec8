//! Outline planning: one generator call, a lenient parser, and a fixed
//! fallback outline.
//!
//! The parser accepts any numbering style that starts with an integer index
//! followed by `.`, `)`, `-` or `:` (`1. X`, `2) X`, `3 - X`, `4: X`) and
//! silently drops every other line. Fewer than [`MIN_HEADINGS`] survivors
//! means the whole parse is discarded in favour of [`FALLBACK_OUTLINE`];
//! there is no second attempt against the generator.

use crate::error::GeneratorError;
use crate::generator::TextGenerator;
use crate::output::OutlineSource;
use crate::prompts::outline_prompt;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Parsed outlines shorter than this are replaced by the fallback.
pub const MIN_HEADINGS: usize = 8;

/// Parsed outlines are cut to this length.
pub const MAX_HEADINGS: usize = 18;

/// Maximum heading length in characters.
pub const MAX_HEADING_CHARS: usize = 120;

/// Substituted when sanitising leaves nothing.
pub const EMPTY_HEADING: &str = "Section";

/// Canonical outline used when the planner under-produces.
pub const FALLBACK_OUTLINE: [&str; 16] = [
    "Introduction and Goals",
    "Core Concepts and Terminology",
    "System Architecture Overview",
    "Data Ingestion and Parsing",
    "Chunking Strategy",
    "Embeddings and Vector Storage",
    "Retrieval Strategies",
    "Knowledge Graph Augmentation",
    "Prompting and Context Packing",
    "Evaluation and Metrics",
    "Deployment and Operations",
    "Security, Privacy, and Compliance",
    "Troubleshooting and Failure Modes",
    "Case Studies and Examples",
    "Future Directions",
    "Appendix",
];

static RE_NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\s*[).\-:]\s*(.+)$").unwrap());

static RE_HEADING_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-:]").unwrap());

/// The run's outline. Never mutated once planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outline {
    /// Headings parsed from the generator's response.
    Parsed(Vec<String>),
    /// The canonical [`FALLBACK_OUTLINE`].
    Fallback(Vec<String>),
}

impl Outline {
    pub fn fallback() -> Self {
        Outline::Fallback(FALLBACK_OUTLINE.iter().map(|h| h.to_string()).collect())
    }

    pub fn headings(&self) -> &[String] {
        match self {
            Outline::Parsed(h) | Outline::Fallback(h) => h,
        }
    }

    pub fn len(&self) -> usize {
        self.headings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.headings().is_empty()
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Outline::Fallback(_))
    }

    pub fn source(&self) -> OutlineSource {
        match self {
            Outline::Parsed(_) => OutlineSource::Parsed,
            Outline::Fallback(_) => OutlineSource::Fallback,
        }
    }
}

/// Strip everything but word characters, whitespace, `-` and `:`, drop
/// control characters, and cap the length.
pub fn clean_heading(raw: &str) -> String {
    let kept = RE_HEADING_JUNK.replace_all(raw, "");
    let kept: String = kept.chars().filter(|c| !c.is_control()).collect();
    let kept = kept.trim();
    if kept.is_empty() {
        return EMPTY_HEADING.to_string();
    }
    let capped: String = kept.chars().take(MAX_HEADING_CHARS).collect();
    capped.trim_end().to_string()
}

/// Every sanitised heading found in `text`, in order.
pub fn parse_headings(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| RE_NUMBERED.captures(line))
        .map(|caps| clean_heading(&caps[1]))
        .collect()
}

/// Parse a planner response into an [`Outline`], applying the fallback rule.
pub fn parse_outline(text: &str) -> Outline {
    let mut headings = parse_headings(text);
    if headings.len() < MIN_HEADINGS {
        warn!(
            "Outline parse produced {} headings (< {}); using fallback outline",
            headings.len(),
            MIN_HEADINGS
        );
        return Outline::fallback();
    }
    if headings.len() > MAX_HEADINGS {
        debug!("Outline truncated from {} to {} headings", headings.len(), MAX_HEADINGS);
        headings.truncate(MAX_HEADINGS);
    }
    Outline::Parsed(headings)
}

/// Ask the generator for an outline of `topic` and parse it.
pub async fn plan_outline(
    generator: &dyn TextGenerator,
    topic: &str,
) -> Result<Outline, GeneratorError> {
    let response = generator.generate(&outline_prompt(topic)).await?;
    Ok(parse_outline(&response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n)
            .map(|i| format!("{i}. Heading {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn accepts_all_delimiters() {
        let text = "1. Intro\n2) Core Ideas\n3 - Patterns\n4: Pitfalls";
        assert_eq!(
            parse_headings(text),
            vec!["Intro", "Core Ideas", "Patterns", "Pitfalls"]
        );
    }

    #[test]
    fn drops_unnumbered_lines() {
        let text = "Here is your outline:\n\n1. Intro\n- bullet\n* star\n**2. Bold**\n3. Real";
        assert_eq!(parse_headings(text), vec!["Intro", "Real"]);
    }

    #[test]
    fn sixteen_lines_parse_verbatim() {
        let names = [
            "Intro", "Core Ideas", "Patterns", "Eviction", "Consistency", "Sharding",
            "Replication", "Invalidation", "Warmup", "Monitoring", "Capacity", "Security",
            "Failures", "Benchmarks", "Case Studies", "Appendix",
        ];
        let text = names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("{}. {}", i + 1, n))
            .collect::<Vec<_>>()
            .join("\n");
        let outline = parse_outline(&text);
        assert!(!outline.is_fallback());
        assert_eq!(outline.headings(), names.map(String::from).as_slice());
    }

    #[test]
    fn short_parse_falls_back_wholesale() {
        let outline = parse_outline(&numbered(7));
        assert!(outline.is_fallback());
        assert_eq!(outline.len(), 16);
        assert_eq!(outline.headings()[0], "Introduction and Goals");
        assert_eq!(outline.headings()[11], "Security, Privacy, and Compliance");
        assert_eq!(outline.headings()[15], "Appendix");
    }

    #[test]
    fn eight_headings_is_enough() {
        let outline = parse_outline(&numbered(8));
        assert_eq!(outline, Outline::Parsed((1..=8).map(|i| format!("Heading {i}")).collect()));
    }

    #[test]
    fn long_parse_is_capped() {
        let outline = parse_outline(&numbered(25));
        assert_eq!(outline.len(), MAX_HEADINGS);
        assert_eq!(outline.source(), OutlineSource::Parsed);
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = "1. Alpha!\n2) Beta?\nnoise\n3: Gamma".repeat(3);
        assert_eq!(parse_headings(&text), parse_headings(&text));
        assert_eq!(parse_outline(&text), parse_outline(&text));
    }

    #[test]
    fn clean_heading_strips_punctuation() {
        assert_eq!(clean_heading("**Security, Privacy & Compliance**"), "Security Privacy  Compliance");
        assert_eq!(clean_heading("Step 1: Set-up"), "Step 1: Set-up");
        assert_eq!(clean_heading("!!!"), EMPTY_HEADING);
        assert_eq!(clean_heading("Tab\there"), "Tabhere");
    }

    #[test]
    fn clean_heading_caps_length() {
        let long = "word ".repeat(60);
        let cleaned = clean_heading(&long);
        assert!(cleaned.chars().count() <= MAX_HEADING_CHARS);
        assert!(!cleaned.ends_with(' '));
    }
}
