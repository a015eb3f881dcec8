//! Streaming generation API: emit sections as they complete.
//!
//! A long handbook takes many minutes. [`generate_stream`] yields the outline
//! as soon as it is planned and each section as soon as it is repaired, so
//! callers can render partial output or write incrementally. The stream ends
//! with the assembled [`HandbookOutput`], or after the first error.

use crate::config::HandbookConfig;
use crate::error::HandbookError;
use crate::generator::GeneratorSelection;
use crate::output::{HandbookOutput, OutlineSource, SectionDocument};
use crate::retriever::ContextRetriever;
use crate::session::HandbookSession;
use futures::stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// One observable step of a streamed run.
#[derive(Debug, Clone)]
pub enum HandbookEvent {
    /// The outline is fixed; every later `Section` follows its order.
    OutlinePlanned {
        headings: Vec<String>,
        source: OutlineSource,
    },
    /// A body section in outline order.
    Section(SectionDocument),
    /// The conclusion is written and the document assembled. Always last.
    Finished(HandbookOutput),
}

/// A boxed stream of handbook events.
pub type HandbookStream = Pin<Box<dyn Stream<Item = Result<HandbookEvent, HandbookError>> + Send>>;

enum State {
    Start {
        topic: String,
        selection: GeneratorSelection,
        retriever: Arc<dyn ContextRetriever>,
        config: HandbookConfig,
    },
    Running(Box<HandbookSession>),
    Done,
}

/// Generate a handbook, streaming events as they happen.
///
/// # Example
/// ```rust,no_run
/// use edgequake_handbook::{generate_stream, GeneratorSelection, HandbookConfig, HandbookEvent, NoopRetriever};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut events = generate_stream(
///     "Distributed Caching",
///     GeneratorSelection::local("offline demo"),
///     Arc::new(NoopRetriever),
///     &HandbookConfig::default(),
/// );
/// while let Some(event) = events.next().await {
///     match event {
///         Ok(HandbookEvent::Section(s)) => eprintln!("done: {}", s.heading),
///         Ok(HandbookEvent::Finished(out)) => println!("{}", out.document.markdown),
///         Ok(_) => {}
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # }
/// ```
pub fn generate_stream(
    topic: impl Into<String>,
    selection: GeneratorSelection,
    retriever: Arc<dyn ContextRetriever>,
    config: &HandbookConfig,
) -> HandbookStream {
    let topic = topic.into();
    info!("Starting streaming handbook: {}", topic);
    let initial = State::Start {
        topic,
        selection,
        retriever,
        config: config.clone(),
    };

    let s = stream::unfold(initial, |state| async move {
        match state {
            State::Start {
                topic,
                selection,
                retriever,
                config,
            } => match HandbookSession::start(&topic, selection, retriever, config).await {
                Ok(session) => {
                    let event = HandbookEvent::OutlinePlanned {
                        headings: session.outline().headings().to_vec(),
                        source: session.outline().source(),
                    };
                    Some((Ok(event), State::Running(Box::new(session))))
                }
                Err(e) => Some((Err(e), State::Done)),
            },
            State::Running(mut session) => match session.next_section().await {
                Ok(Some(section)) => Some((Ok(HandbookEvent::Section(section)), State::Running(session))),
                Ok(None) => match session.finish().await {
                    Ok(output) => Some((Ok(HandbookEvent::Finished(output)), State::Done)),
                    Err(e) => Some((Err(e), State::Done)),
                },
                Err(e) => Some((Err(e), State::Done)),
            },
            State::Done => None,
        }
    });

    Box::pin(s)
}
