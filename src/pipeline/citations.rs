//! Post-hoc citation checks against a section's allowed pages.
//!
//! Prompts tell the generator which pages it may cite, but nothing stops it
//! from citing others. This module finds every `(PDF p. N)` marker, including
//! the range and list forms `(PDF p. 3-4)` and `(PDF pp. 8, 9)`, and under
//! [`CitationPolicy::Enforce`] removes each marker that names any page never
//! retrieved for that section.

use crate::config::CitationPolicy;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]?\(PDF pp?\.\s*([0-9][0-9 ,\-–]*)\)").unwrap());

/// Widest `a-b` range a single marker may span before it is treated as
/// malformed.
const MAX_RANGE_SPAN: u32 = 500;

/// Result of checking one body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationCheck {
    /// Body after the policy was applied.
    pub text: String,
    /// Markers that cited a page outside the allowed set.
    pub unsupported: usize,
}

/// Pages named by one marker body: `12`, `3-4`, `8, 9`, `2–5, 7`.
/// `None` when any part is malformed.
fn marker_pages(body: &str) -> Option<Vec<u32>> {
    let mut pages = Vec::new();
    for part in body.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once(['-', '–']) {
            Some((lo, hi)) => {
                let lo: u32 = lo.trim().parse().ok()?;
                let hi: u32 = hi.trim().parse().ok()?;
                if hi < lo || hi - lo > MAX_RANGE_SPAN {
                    return None;
                }
                pages.extend(lo..=hi);
            }
            None => pages.push(part.parse().ok()?),
        }
    }
    (!pages.is_empty()).then_some(pages)
}

/// A marker is supported only if every page it names is allowed.
fn is_supported(body: &str, allowed: &[u32]) -> bool {
    marker_pages(body)
        .map(|pages| pages.iter().all(|p| allowed.binary_search(p).is_ok()))
        .unwrap_or(false)
}

/// Pages cited in `text`, in order of appearance (duplicates kept). Ranges
/// and lists are expanded; malformed markers contribute nothing.
pub fn cited_pages(text: &str) -> Vec<u32> {
    RE_CITATION
        .captures_iter(text)
        .filter_map(|caps| marker_pages(&caps[1]))
        .flatten()
        .collect()
}

/// Apply `policy` to `text`. `allowed` must be sorted ascending.
pub fn check_citations(text: &str, allowed: &[u32], policy: CitationPolicy) -> CitationCheck {
    let unsupported = RE_CITATION
        .captures_iter(text)
        .filter(|caps| !is_supported(&caps[1], allowed))
        .count();

    if unsupported == 0 || policy == CitationPolicy::Advisory {
        return CitationCheck {
            text: text.to_string(),
            unsupported,
        };
    }

    let text = RE_CITATION
        .replace_all(text, |caps: &regex::Captures<'_>| {
            if is_supported(&caps[1], allowed) {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .to_string();

    CitationCheck { text, unsupported }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_citations_survive() {
        let text = "Caches expire entries (PDF p. 3). Writes go through (PDF p. 9).";
        let check = check_citations(text, &[3, 7, 9], CitationPolicy::Enforce);
        assert_eq!(check.text, text);
        assert_eq!(check.unsupported, 0);
    }

    #[test]
    fn unsupported_citations_are_removed() {
        let text = "Claim one (PDF p. 3). Claim two (PDF p. 42).";
        let check = check_citations(text, &[3], CitationPolicy::Enforce);
        assert_eq!(check.text, "Claim one (PDF p. 3). Claim two.");
        assert_eq!(check.unsupported, 1);
    }

    #[test]
    fn empty_allowed_set_strips_everything() {
        let text = "Unsourced (PDF p. 1) and (PDF p.2).";
        let check = check_citations(text, &[], CitationPolicy::Enforce);
        assert_eq!(check.text, "Unsourced and.");
        assert!(cited_pages(&check.text).is_empty());
        assert_eq!(check.unsupported, 2);
    }

    #[test]
    fn advisory_keeps_text_but_counts() {
        let text = "Claim (PDF p. 5).";
        let check = check_citations(text, &[1], CitationPolicy::Advisory);
        assert_eq!(check.text, text);
        assert_eq!(check.unsupported, 1);
    }

    #[test]
    fn cited_pages_in_order() {
        assert_eq!(cited_pages("(PDF p. 4) x (PDF p. 2) y (PDF p. 4)"), vec![4, 2, 4]);
    }

    #[test]
    fn ranges_and_lists_are_checked_page_by_page() {
        let text = "A (PDF p. 3-4). B (PDF pp. 8, 9). C (PDF p.12).";
        let check = check_citations(text, &[3], CitationPolicy::Enforce);
        assert_eq!(check.text, "A. B. C.");
        assert_eq!(check.unsupported, 3);
    }

    #[test]
    fn fully_allowed_ranges_survive() {
        let text = "A (PDF pp. 3–4). B (PDF pp. 7, 9).";
        let check = check_citations(text, &[3, 4, 7, 9], CitationPolicy::Enforce);
        assert_eq!(check.text, text);
        assert_eq!(check.unsupported, 0);
        assert_eq!(cited_pages(text), vec![3, 4, 7, 9]);
    }

    #[test]
    fn malformed_markers_are_unsupported() {
        let text = "Backwards (PDF p. 9-3). Huge (PDF pp. 1-100000).";
        let check = check_citations(text, &[1, 2, 3, 9], CitationPolicy::Enforce);
        assert_eq!(check.text, "Backwards. Huge.");
        assert_eq!(check.unsupported, 2);
        assert!(cited_pages(text).is_empty());
    }
}
