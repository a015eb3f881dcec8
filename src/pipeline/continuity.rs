//! Single-slot rolling memory carried from one section to the next.
//!
//! Only the digest of the immediately preceding section survives; each
//! update overwrites the slot. Older sections influence the next prompt only
//! through the digests that were written while they were the latest.

use super::context::truncate_chars;
use crate::error::GeneratorError;
use crate::generator::TextGenerator;
use crate::prompts::summary_prompt;

/// The continuity digest slot. Empty before the first section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuityMemory {
    digest: String,
}

impl ContinuityMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot with `digest` (trimmed).
    pub fn replace(&mut self, digest: &str) {
        self.digest = digest.trim().to_string();
    }

    /// Digest cut to `limit` characters for injection into a prompt.
    pub fn for_prompt(&self, limit: usize) -> &str {
        truncate_chars(&self.digest, limit)
    }

    pub fn as_str(&self) -> &str {
        &self.digest
    }

    pub fn is_empty(&self) -> bool {
        self.digest.is_empty()
    }
}

/// Ask the generator for a 6–10 bullet digest of `section_body`.
pub async fn summarize_section(
    generator: &dyn TextGenerator,
    section_body: &str,
    input_limit: usize,
) -> Result<String, GeneratorError> {
    let prompt = summary_prompt(truncate_chars(section_body, input_limit));
    let digest = generator.generate(&prompt).await?;
    Ok(digest.trim().to_string())
}
