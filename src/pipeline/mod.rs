//! Pipeline stages for long-document generation.
//!
//! Each submodule implements exactly one step, so each is testable without
//! a live generator. [`crate::session::HandbookSession`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! outline ──▶ ┌ retrieve ──▶ context ──▶ compose ──▶ continuity ──▶ budget ┐ ──▶ conclusion ──▶ assemble
//!             └──────────────────────── per heading ──────────────────────┘
//! ```
//!
//! 1. [`outline`]     — plan headings; parse leniently, fall back to the canonical 16
//! 2. [`context`]     — allowed-page set and the capped source-excerpt block
//! 3. [`compose`]     — section/conclusion prompts, one call, output repair
//! 4. [`postprocess`] — deterministic cleanup of generated Markdown
//! 5. [`citations`]   — check `(PDF p. N)` markers against the allowed pages
//! 6. [`continuity`]  — single-slot digest of the previous section
//! 7. [`budget`]      — word counting and the stop rule
//! 8. [`assemble`]    — title, table of contents, sections, conclusion

pub mod assemble;
pub mod budget;
pub mod citations;
pub mod compose;
pub mod context;
pub mod continuity;
pub mod outline;
pub mod postprocess;
