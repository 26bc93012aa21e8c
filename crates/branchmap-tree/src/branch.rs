#![forbid(unsafe_code)]

//! Branch detection for a single user turn.
//!
//! A turn's sibling count comes from one of three signals, in order of trust:
//!
//! 1. A `k/n` indicator next to the navigation controls: [`Confidence::Exact`].
//! 2. The enabled/disabled state of the previous/next controls:
//!    [`Confidence::Inferred`]. This is a lower bound. A turn showing both
//!    controls enabled is assumed to sit in the middle of exactly three
//!    branches, because more cannot be seen without clicking through.
//! 3. Nothing at all: a single branch.

use std::sync::LazyLock;

use branchmap_core::{BranchSignal, Confidence, NodeContent, TurnView};
use regex::Regex;

/// Largest sibling count an indicator may claim.
pub const MAX_BRANCHES: usize = 256;

static INDICATOR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").ok());

/// Parse the first well-formed `k/n` indicator in `text`.
///
/// Returns 1-based `(k, n)` with `1 <= k <= n <= MAX_BRANCHES`. Whitespace
/// around the slash is allowed.
#[must_use]
pub fn parse_indicator(text: &str) -> Option<(usize, usize)> {
    let re = INDICATOR.as_ref()?;
    re.captures_iter(text).find_map(|caps| {
        let k: usize = caps.get(1)?.as_str().parse().ok()?;
        let n: usize = caps.get(2)?.as_str().parse().ok()?;
        (k >= 1 && n >= k && n <= MAX_BRANCHES).then_some((k, n))
    })
}

/// Determine the branch signal of one rendered turn.
#[must_use]
pub fn detect(view: &TurnView) -> BranchSignal {
    if let Some((k, n)) = view.indicator_text.as_deref().and_then(parse_indicator) {
        return BranchSignal::new(k - 1, n, Confidence::Exact);
    }

    if !view.has_controls() {
        return BranchSignal::single();
    }

    let previous = view.previous.is_some_and(|c| c.enabled);
    let next = view.next.is_some_and(|c| c.enabled);
    match (previous, next) {
        (false, true) => BranchSignal::new(0, 2, Confidence::Inferred),
        (true, false) => BranchSignal::new(1, 2, Confidence::Inferred),
        (true, true) => BranchSignal::new(1, 3, Confidence::Inferred),
        (false, false) => BranchSignal::new(0, 1, Confidence::Inferred),
    }
}

/// One sibling variant materialized from a [`BranchSignal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSlot {
    pub branch_index: usize,
    pub is_current: bool,
    pub content: NodeContent,
}

/// Expand a signal into its sibling slots.
///
/// Only the current slot carries `raw_text`; the others are placeholders.
#[must_use]
pub fn slots(signal: &BranchSignal, raw_text: &str) -> Vec<BranchSlot> {
    (0..signal.total_branches.max(1))
        .map(|branch_index| {
            let is_current = branch_index == signal.current_branch;
            let content = if is_current {
                NodeContent::observed(raw_text)
            } else {
                NodeContent::Placeholder {
                    branch_number: branch_index + 1,
                }
            };
            BranchSlot {
                branch_index,
                is_current,
                content,
            }
        })
        .collect()
}
