//! Prompt templates for outline planning, section writing, continuity
//! summaries, the conclusion, and direct question answering.
//!
//! Every prompt lives here so one edit changes the behaviour everywhere and so
//! tests can inspect the exact text without a live generator. The marker
//! constants are shared with [`crate::generator::LocalGenerator`], which keys
//! its deterministic output off them.

/// Citation format the generator is told to use. `X` is the page number.
pub const CITATION_FORMAT: &str = "(PDF p. X)";

/// Default system prompt sent with every provider call.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Answer using the provided sources. Cite pages like (PDF p. 3).";

/// Every outline prompt starts with this.
pub const OUTLINE_PREFIX: &str = "You are creating a detailed handbook outline.";

/// Instruction line of the outline prompt.
pub const OUTLINE_MARKER: &str = "Return ONLY a numbered outline";

/// Every continuity-summary prompt starts with this.
pub const SUMMARY_PREFIX: &str = "Summarize the key points";

/// Precedes the bracketed allowed-page list in grounded prompts.
pub const ALLOWED_PAGES_PREFIX: &str = "Cite ONLY from these pages:";

/// Every question-answering prompt starts with this.
pub const ANSWER_MARKER: &str = "Answer the question using ONLY the source excerpts.";

/// Fixed reply when the document has nothing on the question.
pub const NOT_MENTIONED: &str = "The uploaded PDFs don't mention this.";

/// Section heading of the closing section.
pub const CONCLUSION_HEADING: &str = "Conclusion";

/// Render pages as `[3, 7, 9]`.
pub fn page_list(pages: &[u32]) -> String {
    let inner: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
    format!("[{}]", inner.join(", "))
}

/// Prompt asking for a 12–18 item numbered outline.
pub fn outline_prompt(topic: &str) -> String {
    format!(
        "{OUTLINE_PREFIX}

Topic: {topic}

{OUTLINE_MARKER} with 12-18 sections, each as a short heading.
Example:
1. Introduction
2. Key Concepts
3. ...
"
    )
}

/// Citation rules for a section with the given allowed pages.
///
/// With no pages the rules forbid citations outright rather than listing an
/// empty set.
pub fn citation_rules(allowed_pages: &[u32]) -> String {
    if allowed_pages.is_empty() {
        "Citation rules:
- No source excerpts were retrieved for this section.
- Do NOT add page citations of any kind.
- Say clearly that the material is general background, not supported by the uploaded document."
            .to_string()
    } else {
        format!(
            "Citation rules:
- {ALLOWED_PAGES_PREFIX} {}
- Use the format {CITATION_FORMAT}
- If sources do not support a claim, say so clearly.",
            page_list(allowed_pages)
        )
    }
}

/// Prompt for one body section. `memory` and `context` must already be
/// truncated to their budgets.
pub fn section_prompt(
    topic: &str,
    heading: &str,
    allowed_pages: &[u32],
    memory: &str,
    context: &str,
) -> String {
    let memory = if memory.is_empty() { "(none yet)" } else { memory };
    let context = if context.is_empty() { "(none)" } else { context };
    format!(
        "You are writing a structured handbook.

Topic: {topic}
Current section: {heading}

You MUST:
- Write in Markdown
- Include subsections (###) and bullet lists where useful
- Be detailed, practical, and explanatory
- Ground content in the provided sources when available

{rules}

Continuity notes from previous sections:
{memory}

Source excerpts:
{context}

Now write this section:
- Start with \"## {heading}\"
- Aim for 1200-1800 words (if possible)
",
        rules = citation_rules(allowed_pages),
    )
}

/// Prompt asking for a 6–10 bullet digest of `section` (already truncated).
pub fn summary_prompt(section: &str) -> String {
    format!(
        "{SUMMARY_PREFIX} from the latest section in 6-10 bullet points, concise.

Section text:
{section}
"
    )
}

/// Prompt for the closing section. Independent of retrieval.
pub fn conclusion_prompt(topic: &str) -> String {
    format!(
        "Write a final conclusion section in Markdown.

Topic: {topic}

Requirements:
- Start with \"## {CONCLUSION_HEADING}\"
- Summarize the key takeaways
- Provide a short checklist of next steps
- Add a brief glossary of 8-12 terms
- Do NOT add page citations
- End with a complete final sentence (no cutoff)
"
    )
}

/// Retrieval-augmented question prompt.
pub fn answer_prompt(question: &str, allowed_pages: &[u32], context: &str) -> String {
    format!(
        "{ANSWER_MARKER}

Question:
{question}

Source excerpts (with page tags):
{context}

Rules:
- If the excerpts don't contain the answer, say: \"{NOT_MENTIONED}\"
- Be clear and concise.
- {ALLOWED_PAGES_PREFIX} {pages}. Use {CITATION_FORMAT}.
- If you cannot cite from allowed pages, say: \"{NOT_MENTIONED}\"
",
        pages = page_list(allowed_pages),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_list_matches_prompt_convention() {
        assert_eq!(page_list(&[3, 7, 9]), "[3, 7, 9]");
        assert_eq!(page_list(&[]), "[]");
    }

    #[test]
    fn section_prompt_lists_exact_pages() {
        let p = section_prompt("Caching", "Patterns", &[3, 7, 9], "", "ctx");
        assert!(p.contains("Cite ONLY from these pages: [3, 7, 9]"));
        assert!(p.contains("Start with \"## Patterns\""));
    }

    #[test]
    fn ungrounded_prompt_names_no_pages() {
        let p = section_prompt("Caching", "Patterns", &[], "", "");
        assert!(!p.contains(ALLOWED_PAGES_PREFIX));
        assert!(!p.contains("(PDF p."));
        assert!(p.contains("Do NOT add page citations"));
    }

    #[test]
    fn prompts_start_with_their_prefix() {
        assert!(summary_prompt("body").starts_with(SUMMARY_PREFIX));
        assert!(outline_prompt("Caching").starts_with(OUTLINE_PREFIX));
        assert!(answer_prompt("q", &[1], "ctx").starts_with(ANSWER_MARKER));
        assert!(!section_prompt(OUTLINE_PREFIX, "h", &[], "", "").starts_with(OUTLINE_PREFIX));
    }

    #[test]
    fn conclusion_prompt_requests_complete_sentence() {
        let p = conclusion_prompt("Caching");
        assert!(p.contains("## Conclusion"));
        assert!(p.contains("complete final sentence"));
        assert!(p.contains("glossary of 8-12 terms"));
    }
}
