//! Direct question answering over the retriever.

use crate::config::HandbookConfig;
use crate::generator::{LocalGenerator, TextGenerator};
use crate::output::GenerationMode;
use crate::pipeline::citations::check_citations;
use crate::pipeline::context::{allowed_pages, format_context};
use crate::prompts::{answer_prompt, NOT_MENTIONED};
use crate::retriever::{ContextRetriever, RetrievedPassage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Returned when no document is active.
pub const NO_DOCUMENT: &str =
    "No document is loaded, so there is nothing to answer from. Load a passage export and select a document first.";

/// A grounded answer and the material it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Pages the answer was allowed to cite.
    pub allowed_pages: Vec<u32>,
    pub passages: Vec<RetrievedPassage>,
    /// Citations removed or flagged as outside `allowed_pages`.
    pub unsupported_citations: usize,
    pub mode: GenerationMode,
}

impl Answer {
    fn fixed(text: &str) -> Self {
        Self {
            text: text.to_string(),
            allowed_pages: Vec::new(),
            passages: Vec::new(),
            unsupported_citations: 0,
            mode: GenerationMode::Full,
        }
    }
}

/// Answer `question` from the active document's passages.
///
/// Never fails: a generator error is answered by the local generator and the
/// answer is marked degraded.
pub async fn answer_question(
    question: &str,
    generator: &dyn TextGenerator,
    retriever: &dyn ContextRetriever,
    config: &HandbookConfig,
) -> Answer {
    let scope = match config.document_id.as_deref() {
        Some(scope) => scope,
        None => return Answer::fixed(NO_DOCUMENT),
    };

    let mut passages = retriever
        .retrieve(question.trim(), config.qa_top_k, Some(scope))
        .await;
    passages.truncate(config.qa_top_k);
    if passages.is_empty() {
        debug!("No passages for question; returning fixed reply");
        return Answer::fixed(NOT_MENTIONED);
    }

    let allowed = allowed_pages(&passages);
    let prompt = answer_prompt(
        question.trim(),
        &allowed,
        &format_context(&passages, config.context_char_limit),
    );

    let (raw, mode) = match generator.generate(&prompt).await {
        Ok(text) => (text, GenerationMode::Full),
        Err(e) => {
            warn!("Answer generation failed, using local generator: {}", e);
            let local = LocalGenerator::default();
            let text = local.generate(&prompt).await.unwrap_or_default();
            (
                text,
                GenerationMode::Degraded {
                    reason: e.to_string(),
                },
            )
        }
    };

    let check = check_citations(raw.trim(), &allowed, config.citation_policy);
    Answer {
        text: check.text,
        allowed_pages: allowed,
        passages,
        unsupported_citations: check.unsupported,
        mode,
    }
}
