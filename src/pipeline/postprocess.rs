//! Post-processing: deterministic cleanup of generated section Markdown.
//!
//! Even well-prompted models wrap output in ```` ```markdown ```` fences, emit
//! `\r\n`, leave zero-width characters behind, or open with a level-1 title
//! that would compete with the handbook title. These rules fix that without
//! touching content. Heading repair and citation enforcement run afterwards
//! on the cleaned text.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised because the fence
//! regex expects the raw trimmed response; invisible characters go before the
//! whitespace passes so `"\u{200B}\n"` counts as a blank line.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to a raw generator response.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Demote level-1 headings outside code blocks to level 2
/// 6. Collapse runs of blank lines to a single blank line
/// 7. Trim the whole body
pub fn normalize_section(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = demote_title_headings(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Demote level-1 headings ─────────────────────────────────────────
//
// The handbook owns the single `#` title. A section that opens with
// `# Retrieval Strategies` is usually the model restating its own heading one
// level too high; demoting it lets heading repair recognise it.

fn demote_title_headings(input: &str) -> String {
    let mut in_code = false;
    input
        .lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_code = !in_code;
                return line.to_string();
            }
            if !in_code && line.starts_with("# ") {
                format!("#{line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
