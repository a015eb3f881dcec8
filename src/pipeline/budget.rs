//! Word counting and the stop rule for the section loop.
//!
//! A word is a maximal run of Unicode word characters (`\b\w+\b`), so
//! `"re-ranking"` counts as two words and `"(PDF p. 3)"` as three. Every
//! length decision in the crate goes through [`word_count`].

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());

/// Count word-boundary tokens in `text`.
pub fn word_count(text: &str) -> usize {
    RE_WORD.find_iter(text).count()
}

/// Outcome of recording a new running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    Continue,
    Stop,
}

/// Tracks the running document length against the target.
///
/// The caller passes the word count of the **whole** joined document after
/// each append; deltas are never summed.
#[derive(Debug, Clone)]
pub struct BudgetController {
    target: usize,
    total: usize,
    reached: bool,
}

impl BudgetController {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            total: 0,
            reached: false,
        }
    }

    /// The decision [`record`](Self::record) would return for `total`,
    /// without recording it.
    pub fn decision_for(&self, total: usize) -> BudgetDecision {
        if self.reached || total >= self.target {
            BudgetDecision::Stop
        } else {
            BudgetDecision::Continue
        }
    }

    /// Record the recomputed total. Once `Stop` is returned it is returned
    /// for every later call.
    pub fn record(&mut self, total: usize) -> BudgetDecision {
        let decision = self.decision_for(total);
        self.total = total;
        if decision == BudgetDecision::Stop {
            self.reached = true;
        }
        decision
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// `true` once a recorded total met the target.
    pub fn reached(&self) -> bool {
        self.reached
    }
}
