//! Turn retrieved passages into the allowed-page set and the bounded
//! source-excerpt block that goes into a prompt.

use crate::retriever::RetrievedPassage;
use std::collections::BTreeSet;

/// Separator between passages in the excerpt block.
pub const PASSAGE_DELIMITER: &str = "\n\n---\n\n";

/// Union of every page carried by `passages`, sorted ascending.
pub fn allowed_pages(passages: &[RetrievedPassage]) -> Vec<u32> {
    passages
        .iter()
        .flat_map(|p| p.pages.iter().copied())
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect()
}

/// Render one passage with its page tag and similarity score.
fn format_passage(passage: &RetrievedPassage) -> String {
    format!(
        "[pages={} sim={:.3}]\n{}",
        crate::prompts::page_list(&passage.pages),
        passage.similarity,
        passage.content
    )
    .trim()
    .to_string()
}

/// Serialise every passage, then cut the whole block to `limit` characters.
///
/// The cap applies to the joined block, not per passage, so a long first
/// passage can crowd out later ones.
pub fn format_context(passages: &[RetrievedPassage], limit: usize) -> String {
    let block = passages
        .iter()
        .map(format_passage)
        .collect::<Vec<_>>()
        .join(PASSAGE_DELIMITER);
    truncate_chars(&block, limit).to_string()
}

/// Longest prefix of `s` holding at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(content: &str, pages: &[u32], similarity: f64) -> RetrievedPassage {
        RetrievedPassage {
            content: content.to_string(),
            pages: pages.to_vec(),
            similarity,
        }
    }

    #[test]
    fn allowed_pages_is_sorted_union() {
        let hits = vec![passage("a", &[7, 3], 0.9), passage("b", &[9, 7], 0.8)];
        assert_eq!(allowed_pages(&hits), vec![3, 7, 9]);
    }

    #[test]
    fn allowed_pages_empty_without_passages() {
        assert!(allowed_pages(&[]).is_empty());
        assert!(allowed_pages(&[passage("untagged", &[], 0.5)]).is_empty());
    }

    #[test]
    fn passages_are_tagged_and_delimited() {
        let hits = vec![passage("alpha", &[1], 0.91234), passage("beta", &[2, 3], 0.5)];
        let block = format_context(&hits, 12_000);
        assert_eq!(
            block,
            "[pages=[1] sim=0.912]\nalpha\n\n---\n\n[pages=[2, 3] sim=0.500]\nbeta"
        );
    }

    #[test]
    fn cap_applies_to_whole_block() {
        let hits = vec![passage(&"x".repeat(50), &[1], 0.1), passage("tail", &[2], 0.1)];
        let block = format_context(&hits, 40);
        assert_eq!(block.chars().count(), 40);
        assert!(!block.contains("tail"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
