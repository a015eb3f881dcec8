//! End-to-end tests against a live LLM provider.
//!
//! Gated behind the `E2E_ENABLED` environment variable so they do not run in
//! CI unless explicitly requested. The provider is auto-detected exactly as
//! the CLI does it (`OPENAI_API_KEY`, `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, …).
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use edgequake_handbook::pipeline::citations::cited_pages;
use edgequake_handbook::{
    answer_question, generate_handbook, select_generator, HandbookConfig, InMemoryRetriever,
    NoopRetriever, RateLimitPolicy,
};
use serde_json::json;
use std::sync::Arc;

/// Skip unless E2E_ENABLED is set and a real provider resolves.
macro_rules! e2e_skip_unless_ready {
    ($config:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let selection = select_generator($config);
        if selection.is_degraded() {
            println!("SKIP — no provider configured: {:?}", selection.mode);
            return;
        }
        selection
    }};
}

fn passages() -> InMemoryRetriever {
    InMemoryRetriever::from_json_value(json!([
        {"document_id": "cache-guide", "pages": [3],
         "content": "A cache-aside pattern loads data into the cache on demand. On a miss the service reads from the database and writes the value to the cache with a TTL."},
        {"document_id": "cache-guide", "pages": [7],
         "content": "Eviction policies decide which keys leave the cache when memory is full. LRU evicts the least recently used key; LFU evicts the least frequently used."},
        {"document_id": "cache-guide", "metadata": {"pages": ["9"]},
         "content": "Write-through caching updates the cache and the database in the same request, trading write latency for consistency."}
    ]))
    .expect("valid passage export")
}

/// Assert the Markdown passes basic structural checks.
fn assert_handbook_shape(md: &str, context: &str) {
    assert!(!md.trim().is_empty(), "[{context}] Markdown is empty");
    assert!(
        md.starts_with("# "),
        "[{context}] Must start with the title line"
    );
    assert!(
        md.contains("## Table of Contents"),
        "[{context}] Missing table of contents"
    );
    assert!(
        !md.lines().next().unwrap_or("").starts_with("```"),
        "[{context}] Output must not start with a code fence"
    );
    assert!(
        !md.contains("\n\n\n"),
        "[{context}] Output has runs of blank lines"
    );
    assert_eq!(
        md.matches("\n## Conclusion").count(),
        1,
        "[{context}] Exactly one conclusion expected"
    );
    println!("[{context}] ✓  {} bytes, shape checks passed", md.len());
}

#[tokio::test]
async fn test_short_ungrounded_handbook() {
    let config = HandbookConfig::builder()
        .target_words(1_500)
        .rate_limit_policy(RateLimitPolicy::FallbackToLocal)
        .build()
        .unwrap();
    let selection = e2e_skip_unless_ready!(&config);

    let output = generate_handbook("Distributed Caching", selection, Arc::new(NoopRetriever), &config)
        .await
        .expect("generation should succeed");

    assert_handbook_shape(&output.document.markdown, "ungrounded");
    assert!(output.document.words >= 1_500);
    assert!(
        cited_pages(&output.document.markdown).is_empty(),
        "no document loaded, so no page may be cited"
    );
    println!(
        "sections={} words={} calls={} mode={:?}",
        output.stats.sections_generated,
        output.document.words,
        output.stats.generator_calls,
        output.mode
    );
}

#[tokio::test]
async fn test_grounded_handbook_cites_only_retrieved_pages() {
    let config = HandbookConfig::builder()
        .target_words(2_000)
        .document_id("cache-guide")
        .build()
        .unwrap();
    let selection = e2e_skip_unless_ready!(&config);

    let output = generate_handbook("Caching Patterns", selection, Arc::new(passages()), &config)
        .await
        .expect("generation should succeed");

    assert_handbook_shape(&output.document.markdown, "grounded");
    for section in &output.sections {
        for page in cited_pages(&section.body) {
            assert!(
                section.allowed_pages.contains(&page),
                "section '{}' cites p. {page} outside {:?}",
                section.heading,
                section.allowed_pages
            );
        }
    }
}

#[tokio::test]
async fn test_answer_question_from_passages() {
    let config = HandbookConfig::builder()
        .document_id("cache-guide")
        .build()
        .unwrap();
    let selection = e2e_skip_unless_ready!(&config);

    let answer = answer_question(
        "Which eviction policy removes the least recently used key?",
        selection.generator.as_ref(),
        &passages(),
        &config,
    )
    .await;

    println!("answer: {}", answer.text);
    assert!(!answer.text.is_empty());
    assert!(answer.allowed_pages.contains(&7));
    assert!(cited_pages(&answer.text)
        .iter()
        .all(|p| answer.allowed_pages.contains(p)));
}
