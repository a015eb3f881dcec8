//! Step-wise handbook run.
//!
//! [`HandbookSession`] owns everything that changes during a run: the
//! continuity slot, the budget, the partially assembled document. Callers
//! pull one section at a time with [`HandbookSession::next_section`] and
//! close the run with [`HandbookSession::finish`], which consumes the
//! session so the conclusion can only be written once.
//!
//! ```text
//! start ─▶ outline ─▶ next_section* ─▶ finish
//!                     │ retrieve (skipped without a document)
//!                     │ compose + repair
//!                     │ assemble + recount
//!                     │ summarise (‖ prefetch next retrieval)
//!                     └ commit + budget check
//! ```

use crate::config::{HandbookConfig, RateLimitPolicy};
use crate::error::HandbookError;
use crate::generator::{GeneratorSelection, LocalGenerator, SwitchingGenerator, TextGenerator};
use crate::output::{
    GenerationMode, HandbookDocument, HandbookOutput, HandbookStats, SectionDocument,
};
use crate::pipeline::assemble::{handbook_title, DocumentAssembler};
use crate::pipeline::budget::{BudgetController, BudgetDecision};
use crate::pipeline::compose::{compose_conclusion, compose_section, section_query};
use crate::pipeline::continuity::{summarize_section, ContinuityMemory};
use crate::pipeline::outline::{plan_outline, Outline};
use crate::progress::ProgressEvent;
use crate::retriever::{ContextRetriever, RetrievedPassage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// One handbook run in progress.
pub struct HandbookSession {
    topic: String,
    outline: Outline,
    generator: Arc<SwitchingGenerator>,
    initial_mode: GenerationMode,
    retriever: Arc<dyn ContextRetriever>,
    config: HandbookConfig,
    memory: ContinuityMemory,
    budget: BudgetController,
    assembler: DocumentAssembler,
    sections: Vec<SectionDocument>,
    next_index: usize,
    prefetched: Option<Vec<RetrievedPassage>>,
    /// Composed section whose digest call failed.
    pending: Option<(SectionDocument, Vec<RetrievedPassage>)>,
    stopped: bool,
    stats: HandbookStats,
    started: Instant,
}

impl HandbookSession {
    /// Validate the topic and plan the outline.
    ///
    /// # Errors
    /// [`HandbookError::EmptyTopic`] for a blank topic, or
    /// [`HandbookError::Generator`] when the outline call fails.
    pub async fn start(
        topic: &str,
        selection: GeneratorSelection,
        retriever: Arc<dyn ContextRetriever>,
        config: HandbookConfig,
    ) -> Result<Self, HandbookError> {
        let started = Instant::now();
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(HandbookError::EmptyTopic);
        }

        let substitute: Option<Arc<dyn TextGenerator>> = match config.rate_limit_policy {
            RateLimitPolicy::FallbackToLocal if !selection.is_degraded() => {
                Some(Arc::new(LocalGenerator::default()))
            }
            _ => None,
        };
        let generator = Arc::new(SwitchingGenerator::new(selection.generator, substitute));

        info!(
            "Planning outline for '{}' with generator '{}'",
            topic,
            generator.name()
        );
        let outline = plan_outline(generator.as_ref(), topic)
            .await
            .map_err(|e| HandbookError::generator("outline", e))?;
        info!(
            "Outline: {} sections ({:?})",
            outline.len(),
            outline.source()
        );
        emit(
            &config,
            ProgressEvent::OutlineReady {
                sections: outline.len(),
                fallback: outline.is_fallback(),
            },
        );

        let assembler = DocumentAssembler::new(&handbook_title(topic), outline.headings());
        let stats = HandbookStats {
            target_words: config.target_words,
            sections_planned: outline.len(),
            ..Default::default()
        };

        Ok(Self {
            topic: topic.to_string(),
            budget: BudgetController::new(config.target_words),
            outline,
            generator,
            initial_mode: selection.mode,
            retriever,
            config,
            memory: ContinuityMemory::new(),
            assembler,
            sections: Vec::new(),
            next_index: 0,
            prefetched: None,
            pending: None,
            stopped: false,
            stats,
            started,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The planned outline. Fixed for the whole run.
    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    /// Sections generated so far, in outline order.
    pub fn sections(&self) -> &[SectionDocument] {
        &self.sections
    }

    /// Current word count of the assembled document.
    pub fn words(&self) -> usize {
        self.budget.total()
    }

    /// `true` once the budget stopped the loop or the outline is exhausted.
    pub fn is_done(&self) -> bool {
        self.stopped || self.next_index >= self.outline.len()
    }

    /// The mode the run would finish in if it finished now.
    pub fn mode(&self) -> GenerationMode {
        if self.initial_mode.is_degraded() {
            return self.initial_mode.clone();
        }
        match self.generator.switch_reason() {
            Some(reason) => GenerationMode::Degraded {
                reason: format!("switched to local generator: {reason}"),
            },
            None => GenerationMode::Full,
        }
    }

    /// Generate the next body section, or `Ok(None)` when the loop is over.
    ///
    /// Nothing is committed until the section's digest exists. After a
    /// failed summary call the composed section is kept, and calling again
    /// retries only the summary.
    pub async fn next_section(&mut self) -> Result<Option<SectionDocument>, HandbookError> {
        if self.is_done() {
            return Ok(None);
        }

        let total = self.outline.len();
        let index = self.next_index + 1;

        let (section, passages) = match self.pending.take() {
            Some(pending) => pending,
            None => self.compose_next(index, total).await?,
        };

        let mut staged = self.assembler.clone();
        staged.push(&section.body);
        let words = staged.word_count();

        let decision = self.budget.decision_for(words);
        let next_heading = (decision == BudgetDecision::Continue)
            .then(|| self.outline.headings().get(index).cloned())
            .flatten();

        let (digest, prefetched) = match next_heading {
            Some(next) if self.config.prefetch_retrieval && self.config.document_id.is_some() => {
                debug!("Prefetching passages for '{}'", next);
                let (digest, fetched) = futures::future::join(
                    summarize_section(
                        self.generator.as_ref(),
                        &section.body,
                        self.config.summary_input_char_limit,
                    ),
                    fetch_passages(
                        self.retriever.as_ref(),
                        &self.config,
                        &self.topic,
                        &next,
                        index + 1,
                        total,
                    ),
                )
                .await;
                if fetched.is_some() {
                    self.stats.retrieval_calls += 1;
                }
                (digest, fetched)
            }
            _ => (
                summarize_section(
                    self.generator.as_ref(),
                    &section.body,
                    self.config.summary_input_char_limit,
                )
                .await,
                None,
            ),
        };
        let digest = match digest {
            Ok(digest) => digest,
            Err(e) => {
                self.pending = Some((section, passages));
                return Err(HandbookError::generator(
                    format!("summary of section {index}"),
                    e,
                ));
            }
        };

        self.assembler = staged;
        self.memory.replace(&digest);
        self.prefetched = prefetched;
        self.budget.record(words);
        emit(
            &self.config,
            ProgressEvent::WordCount {
                index,
                total,
                words,
                target: self.config.target_words,
            },
        );

        self.next_index += 1;
        self.stats.sections_generated += 1;
        self.stats.unsupported_citations += section.unsupported_citations;
        if passages.is_empty() {
            self.stats.ungrounded_sections += 1;
        }

        if decision == BudgetDecision::Stop {
            info!(
                "Word target reached after {}/{} sections ({} ≥ {})",
                index, total, words, self.config.target_words
            );
            self.stopped = true;
            self.stats.budget_reached = true;
        }

        self.sections.push(section.clone());
        Ok(Some(section))
    }

    /// Retrieve for and compose the section at `index`. On failure the
    /// passages are kept so a retry does not retrieve again.
    async fn compose_next(
        &mut self,
        index: usize,
        total: usize,
    ) -> Result<(SectionDocument, Vec<RetrievedPassage>), HandbookError> {
        let heading = self.outline.headings()[index - 1].clone();

        let passages = match self.prefetched.take() {
            Some(p) => p,
            None => {
                let fetched = fetch_passages(
                    self.retriever.as_ref(),
                    &self.config,
                    &self.topic,
                    &heading,
                    index,
                    total,
                )
                .await;
                if fetched.is_some() {
                    self.stats.retrieval_calls += 1;
                }
                fetched.unwrap_or_default()
            }
        };

        emit(
            &self.config,
            ProgressEvent::GenerationStarted {
                index,
                total,
                heading: heading.clone(),
            },
        );
        let composed = compose_section(
            self.generator.as_ref(),
            &self.topic,
            &heading,
            &passages,
            &self.memory,
            &self.config,
        )
        .await;
        let section = match composed {
            Ok(section) => section,
            Err(e) => {
                self.prefetched = Some(passages);
                return Err(HandbookError::generator(
                    format!("section {index} '{heading}'"),
                    e,
                ));
            }
        };
        emit(
            &self.config,
            ProgressEvent::SectionGenerated {
                index,
                total,
                heading,
            },
        );
        Ok((section, passages))
    }

    /// Write the conclusion and assemble the document.
    pub async fn finish(mut self) -> Result<HandbookOutput, HandbookError> {
        emit(&self.config, ProgressEvent::ConclusionStarted);
        let conclusion = compose_conclusion(self.generator.as_ref(), &self.topic, &self.config)
            .await
            .map_err(|e| HandbookError::generator("conclusion", e))?;
        self.stats.unsupported_citations += conclusion.unsupported_citations;

        let mode = self.mode();
        self.assembler.push(&conclusion.body);
        let (markdown, words) = self.assembler.finish();
        emit(&self.config, ProgressEvent::Completed { words });

        self.stats.generator_calls = self.generator.calls();
        self.stats.total_duration_ms = self.started.elapsed().as_millis() as u64;
        info!(
            "Handbook complete: {} sections, {} words, {}ms",
            self.stats.sections_generated, words, self.stats.total_duration_ms
        );

        Ok(HandbookOutput {
            document: HandbookDocument {
                title: handbook_title(&self.topic),
                outline: self.outline.headings().to_vec(),
                outline_source: self.outline.source(),
                markdown,
                words,
            },
            sections: self.sections,
            conclusion,
            mode,
            stats: self.stats,
        })
    }
}

/// Retrieve passages for one heading. `None` when no document is active and
/// retrieval was skipped.
async fn fetch_passages(
    retriever: &dyn ContextRetriever,
    config: &HandbookConfig,
    topic: &str,
    heading: &str,
    index: usize,
    total: usize,
) -> Option<Vec<RetrievedPassage>> {
    let scope = match config.document_id.as_deref() {
        Some(scope) => scope,
        None => {
            debug!("No active document; skipping retrieval for '{}'", heading);
            return None;
        }
    };

    emit(
        config,
        ProgressEvent::RetrievalStarted {
            index,
            total,
            heading: heading.to_string(),
        },
    );
    let mut passages = retriever
        .retrieve(&section_query(topic, heading), config.top_k, Some(scope))
        .await;
    passages.truncate(config.top_k);
    emit(
        config,
        ProgressEvent::RetrievalDone {
            index,
            total,
            heading: heading.to_string(),
            passages: passages.len(),
        },
    );
    Some(passages)
}

fn emit(config: &HandbookConfig, event: ProgressEvent) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_event(&event);
    }
}
