#![forbid(unsafe_code)]

//! Extraction pass orchestration.
//!
//! Modes are tried in priority order: the latest message graph when it holds
//! at least one user turn, then the rendered user turns, then the empty
//! state. Nothing here fails. A pass that finds nothing is an
//! [`Extraction::Empty`], which the builder turns into the empty-state tree.
//!
//! Graph observations borrow the host's turn keys by depth, so branches
//! found in the graph can still be navigated through the rendered controls.
//!
//! The page has the last word on which branch is current. A graph whose
//! sibling position disagrees with a rendered `k/n` indicator at the same
//! depth is stale (the user switched branches with the host's own controls)
//! and the pass falls back to the rendered turns.

use branchmap_core::{HostPage, TreeSource, TurnObservation, TurnView};

use crate::branch::parse_indicator;
use crate::dom::observe_dom;
use crate::graph::{GraphObservation, MessageGraph, observe_graph};

/// Output of one extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Graph(Vec<GraphObservation>),
    Dom(Vec<TurnObservation>),
    Empty,
}

impl Extraction {
    /// Which path produced this extraction.
    #[must_use]
    pub const fn source(&self) -> TreeSource {
        match self {
            Self::Graph(_) => TreeSource::Graph,
            Self::Dom(_) => TreeSource::Dom,
            Self::Empty => TreeSource::Empty,
        }
    }

    /// Number of observed user messages.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Graph(turns) => turns.len(),
            Self::Dom(turns) => turns.len(),
            Self::Empty => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run one extraction pass against an optional graph and the host page.
pub fn extract<H: HostPage + ?Sized>(graph: Option<&MessageGraph>, host: &H) -> Extraction {
    let span = tracing::debug_span!(target: "branchmap.extract", "extract", mode = tracing::field::Empty, turns = tracing::field::Empty);
    let _guard = span.enter();

    let views = host.user_turns();
    let extraction = match graph.map(observe_graph) {
        Some(turns) if !turns.is_empty() && !agrees_with_page(&turns, &views) => {
            tracing::debug!(target: "branchmap.extract", "graph disagrees with rendered indicators, falling back to DOM");
            dom_extraction(&views)
        }
        Some(mut turns) if !turns.is_empty() => {
            for turn in &mut turns {
                turn.observation.turn_key =
                    views.get(turn.depth()).and_then(|view| view.turn_key.clone());
            }
            Extraction::Graph(turns)
        }
        graph_result => {
            if graph_result.is_some() {
                tracing::debug!(target: "branchmap.extract", "graph has no user turns, falling back to DOM");
            }
            dom_extraction(&views)
        }
    };

    span.record("mode", tracing::field::debug(extraction.source()));
    span.record("turns", extraction.len());
    extraction
}

fn dom_extraction(views: &[TurnView]) -> Extraction {
    let turns = observe_dom(views);
    if turns.is_empty() {
        Extraction::Empty
    } else {
        Extraction::Dom(turns)
    }
}

/// Whether every rendered indicator matches the graph's sibling group at
/// the same depth. Depths without an indicator, or absent from the graph,
/// are not evidence either way.
fn agrees_with_page(turns: &[GraphObservation], views: &[TurnView]) -> bool {
    views.iter().enumerate().all(|(depth, view)| {
        let Some((k, n)) = view.indicator_text.as_deref().and_then(parse_indicator) else {
            return true;
        };
        turns
            .iter()
            .find(|turn| turn.depth() == depth)
            .is_none_or(|turn| {
                let signal = &turn.observation.branch_signal;
                signal.current_branch == k - 1 && signal.total_branches == n
            })
    })
}
