//! Document assembly: title, table of contents, rule, sections, conclusion.
//!
//! The assembler doubles as the budget's source of truth: the running word
//! count is always recomputed from the joined document.

use super::budget::word_count;

/// Joins every part of the document.
const PART_SEPARATOR: &str = "\n\n";

/// Title line text for `topic`.
pub fn handbook_title(topic: &str) -> String {
    format!("{topic} — Handbook")
}

/// Link anchor for a heading: lower-cased, everything outside
/// `[a-z0-9\- ]` removed, spaces replaced by hyphens.
pub fn anchor(heading: &str) -> String {
    heading
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == ' ')
        .collect::<String>()
        .replace(' ', "-")
}

/// Numbered Markdown links, one per heading.
pub fn table_of_contents(outline: &[String]) -> String {
    let mut toc = String::from("## Table of Contents\n");
    for (i, heading) in outline.iter().enumerate() {
        toc.push_str(&format!("\n{}. [{}](#{})", i + 1, heading, anchor(heading)));
    }
    toc
}

/// Accumulates the document in order.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    parts: Vec<String>,
}

impl DocumentAssembler {
    /// Start a document with its title, table of contents, and rule.
    pub fn new(title: &str, outline: &[String]) -> Self {
        Self {
            parts: vec![
                format!("# {title}"),
                table_of_contents(outline),
                "---".to_string(),
            ],
        }
    }

    /// Append a section body.
    pub fn push(&mut self, body: &str) {
        self.parts.push(body.to_string());
    }

    /// The joined document.
    pub fn markdown(&self) -> String {
        self.parts.join(PART_SEPARATOR)
    }

    /// Word count of the full joined document.
    pub fn word_count(&self) -> usize {
        word_count(&self.markdown())
    }

    /// Consume the assembler, returning the document and its word count.
    pub fn finish(self) -> (String, usize) {
        let markdown = self.markdown();
        let words = word_count(&markdown);
        (markdown, words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_rules() {
        assert_eq!(anchor("Introduction and Goals"), "introduction-and-goals");
        assert_eq!(
            anchor("Security, Privacy, and Compliance"),
            "security-privacy-and-compliance"
        );
        assert_eq!(anchor("Step 1: Set-up"), "step-1-set-up");
        assert_eq!(anchor("Café Ops"), "caf-ops");
    }

    #[test]
    fn toc_lists_every_heading_numbered() {
        let outline = vec!["Intro".to_string(), "Core Ideas".to_string()];
        assert_eq!(
            table_of_contents(&outline),
            "## Table of Contents\n\n1. [Intro](#intro)\n2. [Core Ideas](#core-ideas)"
        );
    }

    #[test]
    fn document_layout_in_order() {
        let outline = vec!["Intro".to_string()];
        let mut doc = DocumentAssembler::new(&handbook_title("Caching"), &outline);
        doc.push("## Intro\n\nBody.");
        doc.push("## Conclusion\n\nDone.");
        let (md, words) = doc.finish();
        assert!(md.starts_with("# Caching — Handbook\n\n## Table of Contents"));
        let rule = md.find("\n\n---\n\n").unwrap();
        let intro = md.find("## Intro").unwrap();
        let conclusion = md.find("## Conclusion").unwrap();
        assert!(rule < intro && intro < conclusion);
        assert_eq!(words, word_count(&md));
    }

    #[test]
    fn word_count_grows_monotonically() {
        let outline = vec!["A".to_string(), "B".to_string()];
        let mut doc = DocumentAssembler::new("T", &outline);
        let mut last = doc.word_count();
        for body in ["## A\n\none two", "## B", "- - -"] {
            doc.push(body);
            let now = doc.word_count();
            assert!(now >= last);
            last = now;
        }
    }
}
