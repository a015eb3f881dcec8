//! Section composer: prompt assembly, one generator call, output repair.
//!
//! The generator is invoked exactly once per section. Formatting drift is
//! repaired locally (cleanup, citation policy, heading line) and never
//! triggers a second call.

use super::citations::check_citations;
use super::context::{allowed_pages, format_context};
use super::continuity::ContinuityMemory;
use super::postprocess::normalize_section;
use crate::config::HandbookConfig;
use crate::error::GeneratorError;
use crate::generator::TextGenerator;
use crate::output::SectionDocument;
use crate::prompts::{conclusion_prompt, section_prompt, CONCLUSION_HEADING};
use crate::retriever::RetrievedPassage;
use tracing::{debug, warn};

/// A fully rendered section prompt and the pages it permits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPrompt {
    pub prompt: String,
    pub allowed_pages: Vec<u32>,
}

/// Composite retrieval query for a heading.
pub fn section_query(topic: &str, heading: &str) -> String {
    format!("{topic} — {heading}")
}

/// Build the prompt for `heading` from its passages and the prior digest.
pub fn build_section_prompt(
    topic: &str,
    heading: &str,
    passages: &[RetrievedPassage],
    memory: &ContinuityMemory,
    config: &HandbookConfig,
) -> SectionPrompt {
    let allowed = allowed_pages(passages);
    let context = format_context(passages, config.context_char_limit);
    let prompt = section_prompt(
        topic,
        heading,
        &allowed,
        memory.for_prompt(config.memory_char_limit),
        &context,
    );
    SectionPrompt {
        prompt,
        allowed_pages: allowed,
    }
}

/// Make sure `body` opens with `## {heading}`.
///
/// Returns the body and whether a heading line had to be prepended.
pub fn ensure_heading(body: &str, heading: &str) -> (String, bool) {
    let expected = format!("## {heading}");
    let first = body.lines().next().unwrap_or("").trim_end();
    if first == expected {
        return (body.to_string(), false);
    }
    if body.is_empty() {
        (expected, true)
    } else {
        (format!("{expected}\n\n{body}"), true)
    }
}

/// Cleanup, citation policy, then heading repair.
fn finish_section(
    raw: &str,
    heading: &str,
    allowed: Vec<u32>,
    passages: usize,
    config: &HandbookConfig,
) -> SectionDocument {
    let cleaned = normalize_section(raw);
    let check = check_citations(&cleaned, &allowed, config.citation_policy);
    if check.unsupported > 0 {
        warn!(
            "Section '{}': {} citation(s) outside allowed pages {:?} ({:?})",
            heading, check.unsupported, allowed, config.citation_policy
        );
    }
    let (body, repaired) = ensure_heading(&check.text, heading);
    if repaired {
        debug!("Section '{}': heading line repaired", heading);
    }
    SectionDocument {
        heading: heading.to_string(),
        body,
        allowed_pages: allowed,
        passages,
        heading_repaired: repaired,
        unsupported_citations: check.unsupported,
    }
}

/// Generate one body section.
pub async fn compose_section(
    generator: &dyn TextGenerator,
    topic: &str,
    heading: &str,
    passages: &[RetrievedPassage],
    memory: &ContinuityMemory,
    config: &HandbookConfig,
) -> Result<SectionDocument, GeneratorError> {
    let SectionPrompt {
        prompt,
        allowed_pages,
    } = build_section_prompt(topic, heading, passages, memory, config);
    let raw = generator.generate(&prompt).await?;
    Ok(finish_section(&raw, heading, allowed_pages, passages.len(), config))
}

/// Generate the closing section. No retrieval, so no page may be cited.
pub async fn compose_conclusion(
    generator: &dyn TextGenerator,
    topic: &str,
    config: &HandbookConfig,
) -> Result<SectionDocument, GeneratorError> {
    let raw = generator.generate(&conclusion_prompt(topic)).await?;
    Ok(finish_section(&raw, CONCLUSION_HEADING, Vec::new(), 0, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CitationPolicy;

    fn passage(pages: &[u32]) -> RetrievedPassage {
        RetrievedPassage {
            content: "Consistent hashing spreads keys.".into(),
            pages: pages.to_vec(),
            similarity: 0.8,
        }
    }

    #[test]
    fn query_joins_topic_and_heading() {
        assert_eq!(
            section_query("Distributed Caching", "Patterns"),
            "Distributed Caching — Patterns"
        );
    }

    #[test]
    fn prompt_carries_union_of_pages() {
        let config = HandbookConfig::default();
        let p = build_section_prompt(
            "Distributed Caching",
            "Patterns",
            &[passage(&[3, 7]), passage(&[7, 9])],
            &ContinuityMemory::new(),
            &config,
        );
        assert_eq!(p.allowed_pages, vec![3, 7, 9]);
        assert!(p.prompt.contains("Cite ONLY from these pages: [3, 7, 9]"));
        assert!(p.prompt.contains("[pages=[3, 7] sim=0.800]"));
    }

    #[test]
    fn prompt_truncates_memory() {
        let config = HandbookConfig::builder().memory_char_limit(10).build().unwrap();
        let mut memory = ContinuityMemory::new();
        memory.replace("0123456789ABCDEFGHIJ");
        let p = build_section_prompt("t", "h", &[], &memory, &config);
        assert!(p.prompt.contains("0123456789"));
        assert!(!p.prompt.contains("ABCDEF"));
    }

    #[test]
    fn heading_kept_when_correct() {
        let (body, repaired) = ensure_heading("## Patterns\n\nText", "Patterns");
        assert!(!repaired);
        assert_eq!(body, "## Patterns\n\nText");
    }

    #[test]
    fn heading_prepended_when_missing_or_wrong() {
        let (body, repaired) = ensure_heading("Just text", "Patterns");
        assert!(repaired);
        assert_eq!(body, "## Patterns\n\nJust text");

        let (body, repaired) = ensure_heading("## Something Else\n\nText", "Patterns");
        assert!(repaired);
        assert!(body.starts_with("## Patterns\n\n## Something Else"));

        let (body, _) = ensure_heading("", "Patterns");
        assert_eq!(body, "## Patterns");
    }

    #[test]
    fn finish_demotes_then_keeps_heading() {
        let config = HandbookConfig::default();
        let doc = finish_section("# Patterns\n\nBody (PDF p. 4)", "Patterns", vec![4], 1, &config);
        assert!(!doc.heading_repaired);
        assert_eq!(doc.body, "## Patterns\n\nBody (PDF p. 4)");
    }

    #[test]
    fn finish_enforces_citations() {
        let config = HandbookConfig::builder()
            .citation_policy(CitationPolicy::Enforce)
            .build()
            .unwrap();
        let doc = finish_section("## H\n\nClaim (PDF p. 8).", "H", vec![], 0, &config);
        assert_eq!(doc.body, "## H\n\nClaim.");
        assert_eq!(doc.unsupported_citations, 1);
    }
}
