//! Progress side channel for handbook runs.
//!
//! Inject an [`Arc<dyn HandbookProgressCallback>`] via
//! [`crate::config::HandbookConfigBuilder::progress_callback`] to receive an
//! event after every discrete pipeline step. Each event renders to a
//! human-readable status line and a completion fraction in `[0, 1]`.
//!
//! Callbacks are a reporting channel only: the pipeline ignores anything they
//! do and never waits on them beyond the synchronous call itself.
//!
//! # Example
//!
//! ```rust
//! use edgequake_handbook::{HandbookConfig, HandbookProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! struct LastStatus(Mutex<String>);
//!
//! impl HandbookProgressCallback for LastStatus {
//!     fn on_progress(&self, message: &str, _fraction: f64) {
//!         *self.0.lock().unwrap() = message.to_string();
//!     }
//! }
//!
//! let config = HandbookConfig::builder()
//!     .progress_callback(Arc::new(LastStatus(Mutex::new(String::new()))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// One step boundary of the pipeline.
///
/// `index` values are 1-based section positions; `total` is the outline length.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The outline is fixed for the run.
    OutlineReady { sections: usize, fallback: bool },
    /// Retrieval for a heading is about to start.
    RetrievalStarted {
        index: usize,
        total: usize,
        heading: String,
    },
    /// Retrieval for a heading finished (possibly with zero passages).
    RetrievalDone {
        index: usize,
        total: usize,
        heading: String,
        passages: usize,
    },
    /// The section prompt is being sent to the generator.
    GenerationStarted {
        index: usize,
        total: usize,
        heading: String,
    },
    /// The section body was produced and repaired.
    SectionGenerated {
        index: usize,
        total: usize,
        heading: String,
    },
    /// The running word count was recomputed after appending a section.
    WordCount {
        index: usize,
        total: usize,
        words: usize,
        target: usize,
    },
    /// The conclusion call is starting.
    ConclusionStarted,
    /// The document is assembled.
    Completed { words: usize },
}

impl ProgressEvent {
    /// Human-readable status line.
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::OutlineReady { sections, fallback } => {
                if *fallback {
                    format!("Outline ready: {sections} sections (fallback outline)")
                } else {
                    format!("Outline ready: {sections} sections")
                }
            }
            ProgressEvent::RetrievalStarted { heading, .. } => {
                format!("Retrieving context for: {heading}")
            }
            ProgressEvent::RetrievalDone {
                heading, passages, ..
            } => format!("Retrieved {passages} passages for: {heading}"),
            ProgressEvent::GenerationStarted { heading, .. } => {
                format!("Generating section: {heading}")
            }
            ProgressEvent::SectionGenerated { heading, .. } => {
                format!("Section complete: {heading}")
            }
            ProgressEvent::WordCount { words, target, .. } => {
                format!("Progress: {words} words (target {target})")
            }
            ProgressEvent::ConclusionStarted => "Generating final conclusion…".to_string(),
            ProgressEvent::Completed { words } => format!("Handbook complete: {words} words"),
        }
    }

    /// Completion fraction, clamped to `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        let per = |index: usize, total: usize, offset: f64| {
            (index as f64 - offset) / total.max(1) as f64
        };
        let f = match self {
            ProgressEvent::OutlineReady { .. } => 0.0,
            ProgressEvent::RetrievalStarted { index, total, .. }
            | ProgressEvent::RetrievalDone { index, total, .. } => per(*index, *total, 1.0),
            ProgressEvent::GenerationStarted { index, total, .. } => per(*index, *total, 0.5),
            ProgressEvent::SectionGenerated { index, total, .. }
            | ProgressEvent::WordCount { index, total, .. } => per(*index, *total, 0.0),
            ProgressEvent::ConclusionStarted | ProgressEvent::Completed { .. } => 1.0,
        };
        f.clamp(0.0, 1.0)
    }
}

/// Receives pipeline progress.
///
/// Implementations must be `Send + Sync`; runs may be driven from any Tokio
/// worker. Override [`on_progress`](Self::on_progress) for the plain
/// `(message, fraction)` contract, or [`on_event`](Self::on_event) for the
/// structured event.
pub trait HandbookProgressCallback: Send + Sync {
    /// Called at every step boundary. The default forwards to `on_progress`.
    fn on_event(&self, event: &ProgressEvent) {
        self.on_progress(&event.message(), event.fraction());
    }

    /// Status line plus completion fraction in `[0, 1]`.
    fn on_progress(&self, message: &str, fraction: f64) {
        let _ = (message, fraction);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl HandbookProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::HandbookConfig`].
pub type ProgressCallback = Arc<dyn HandbookProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<(String, f64)>>);

    impl HandbookProgressCallback for Recorder {
        fn on_progress(&self, message: &str, fraction: f64) {
            self.0.lock().unwrap().push((message.to_string(), fraction));
        }
    }

    #[test]
    fn fractions_follow_section_position() {
        let start = ProgressEvent::RetrievalStarted {
            index: 1,
            total: 4,
            heading: "Intro".into(),
        };
        let generating = ProgressEvent::GenerationStarted {
            index: 2,
            total: 4,
            heading: "Core".into(),
        };
        let words = ProgressEvent::WordCount {
            index: 4,
            total: 4,
            words: 10,
            target: 100,
        };
        assert_eq!(start.fraction(), 0.0);
        assert_eq!(generating.fraction(), 0.375);
        assert_eq!(words.fraction(), 1.0);
        assert_eq!(ProgressEvent::ConclusionStarted.fraction(), 1.0);
    }

    #[test]
    fn fraction_never_leaves_unit_interval() {
        let e = ProgressEvent::WordCount {
            index: 9,
            total: 0,
            words: 1,
            target: 1,
        };
        assert_eq!(e.fraction(), 1.0);
    }

    #[test]
    fn default_on_event_forwards_message() {
        let rec = Recorder(Mutex::new(Vec::new()));
        rec.on_event(&ProgressEvent::OutlineReady {
            sections: 16,
            fallback: true,
        });
        let seen = rec.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.contains("16 sections"));
        assert!(seen[0].0.contains("fallback"));
    }

    #[test]
    fn noop_callback_is_object_safe() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_event(&ProgressEvent::Completed { words: 1 });
        cb.on_progress("done", 1.0);
    }
}
