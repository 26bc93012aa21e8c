#![forbid(unsafe_code)]

//! Tree building.
//!
//! Both extraction modes end up here. DOM observations are expanded into one
//! node per branch slot; graph observations already name one message per
//! node. After sorting by `(depth, branch_index)`, every node below the root
//! level is attached to the active node one level up. Which earlier variant a
//! placeholder branch actually descends from cannot be seen on the page, and
//! a shared parent keeps every sibling group contiguous and centred.
//!
//! This deliberately replaces the fallback of hanging non-current variants
//! off the first node one level up, which splits a sibling group across two
//! parents as soon as the first node is not the current one.
//!
//! The builder never fails. Input it cannot make sense of (repeated or
//! missing depths, malformed sibling groups) degrades to [`build_linear`], a
//! single-branch chain with one node per turn.

use std::collections::{BTreeMap, HashSet};

use branchmap_core::{
    ConversationTree, NodeContent, TreeNode, TreeSource, TurnKey, TurnObservation,
};

use crate::branch::slots;
use crate::extract::Extraction;
use crate::graph::{GraphMessage, GraphObservation};

/// Display text for a streamed user message without readable text.
pub const NEW_MESSAGE_FALLBACK: &str = "New message";

/// Node id of a DOM-sourced node.
#[must_use]
pub fn dom_node_id(depth: usize, branch_index: usize, branched: bool) -> String {
    if branched {
        format!("dom_{depth}_branch_{branch_index}")
    } else {
        format!("dom_{depth}")
    }
}

/// Build the tree for one extraction pass.
#[must_use]
pub fn build(conversation_id: &str, extraction: &Extraction) -> ConversationTree {
    match extraction {
        Extraction::Graph(turns) => build_from_graph(conversation_id, turns),
        Extraction::Dom(turns) => build_from_observations(conversation_id, turns),
        Extraction::Empty => ConversationTree::empty(conversation_id),
    }
}

/// True when `depths` (already sorted) is exactly `0..len`.
fn is_sequence<I: IntoIterator<Item = usize>>(depths: I) -> bool {
    depths.into_iter().enumerate().all(|(i, d)| i == d)
}

/// Build from DOM observations.
#[must_use]
pub fn build_from_observations(
    conversation_id: &str,
    observations: &[TurnObservation],
) -> ConversationTree {
    if observations.is_empty() {
        return ConversationTree::empty(conversation_id);
    }

    let mut ordered: Vec<&TurnObservation> = observations.iter().collect();
    ordered.sort_by_key(|o| o.source_index);
    if !is_sequence(ordered.iter().map(|o| o.source_index)) {
        tracing::warn!(
            target: "branchmap.builder",
            turns = observations.len(),
            "turn positions are not contiguous, building linear chain"
        );
        return build_linear(conversation_id, observations);
    }

    let mut nodes = Vec::new();
    for observation in ordered {
        let depth = observation.source_index;
        let signal = observation.branch_signal;
        for slot in slots(&signal, &observation.raw_text) {
            nodes.push(TreeNode {
                id: dom_node_id(depth, slot.branch_index, signal.is_branched()),
                depth,
                branch_index: slot.branch_index,
                parent_id: None,
                is_current_branch: slot.is_current,
                total_branches: signal.total_branches,
                content: slot.content,
                turn_key: observation.turn_key.clone(),
            });
        }
    }
    finish(conversation_id, TreeSource::Dom, nodes)
}

/// Build from graph observations.
#[must_use]
pub fn build_from_graph(
    conversation_id: &str,
    observations: &[GraphObservation],
) -> ConversationTree {
    if observations.is_empty() {
        return ConversationTree::empty(conversation_id);
    }
    if !graph_groups_are_well_formed(observations) {
        tracing::warn!(
            target: "branchmap.builder",
            turns = observations.len(),
            "graph sibling groups are inconsistent, building linear chain"
        );
        let mut ordered: Vec<&GraphObservation> = observations.iter().collect();
        ordered.sort_by(|a, b| {
            (a.depth(), a.branch_index, &a.message_id).cmp(&(b.depth(), b.branch_index, &b.message_id))
        });
        let mut seen = HashSet::new();
        let items = ordered
            .into_iter()
            .filter(|o| seen.insert(o.message_id.as_str()))
            .map(|o| {
                (
                    o.message_id.clone(),
                    NodeContent::observed(&o.observation.raw_text),
                    o.observation.turn_key.clone(),
                )
            })
            .collect();
        return linear(conversation_id, TreeSource::Graph, items);
    }

    let nodes = observations
        .iter()
        .map(|o| TreeNode {
            id: o.message_id.clone(),
            depth: o.depth(),
            branch_index: o.branch_index,
            parent_id: None,
            is_current_branch: o.is_current(),
            total_branches: o.observation.branch_signal.total_branches,
            content: NodeContent::observed(&o.observation.raw_text),
            turn_key: o.observation.turn_key.clone(),
        })
        .collect();
    finish(conversation_id, TreeSource::Graph, nodes)
}

/// Each depth `0..=max` holds a group with indices `0..n`, one shared total
/// equal to `n`, and one shared current index. Message ids are unique.
fn graph_groups_are_well_formed(observations: &[GraphObservation]) -> bool {
    let mut ids = HashSet::new();
    let mut groups: BTreeMap<usize, Vec<&GraphObservation>> = BTreeMap::new();
    for o in observations {
        if !ids.insert(o.message_id.as_str()) {
            return false;
        }
        groups.entry(o.depth()).or_default().push(o);
    }
    if !is_sequence(groups.keys().copied()) {
        return false;
    }
    groups.values_mut().all(|group| {
        group.sort_by_key(|o| o.branch_index);
        let signal = group[0].observation.branch_signal;
        is_sequence(group.iter().map(|o| o.branch_index))
            && signal.total_branches == group.len()
            && group.iter().all(|o| o.observation.branch_signal == signal)
    })
}

/// Sort nodes and attach parents.
fn finish(conversation_id: &str, source: TreeSource, mut nodes: Vec<TreeNode>) -> ConversationTree {
    nodes.sort_by_key(|n| (n.depth, n.branch_index));

    let mut anchors: BTreeMap<usize, (String, bool)> = BTreeMap::new();
    for node in &nodes {
        let replace = match anchors.get(&node.depth) {
            None => true,
            Some((_, anchored_current)) => !anchored_current && node.is_current_branch,
        };
        if replace {
            anchors.insert(node.depth, (node.id.clone(), node.is_current_branch));
        }
    }

    for node in &mut nodes {
        node.parent_id = node
            .depth
            .checked_sub(1)
            .and_then(|up| anchors.get(&up).map(|(id, _)| id.clone()));
    }

    tracing::debug!(
        target: "branchmap.builder",
        conversation = conversation_id,
        ?source,
        nodes = nodes.len(),
        "built tree"
    );
    ConversationTree {
        conversation_id: conversation_id.to_owned(),
        source,
        nodes,
    }
}

fn linear(
    conversation_id: &str,
    source: TreeSource,
    items: Vec<(String, NodeContent, Option<TurnKey>)>,
) -> ConversationTree {
    let mut parent: Option<String> = None;
    let nodes = items
        .into_iter()
        .enumerate()
        .map(|(depth, (id, content, turn_key))| TreeNode {
            id: id.clone(),
            depth,
            branch_index: 0,
            parent_id: parent.replace(id),
            is_current_branch: true,
            total_branches: 1,
            content,
            turn_key,
        })
        .collect();
    ConversationTree {
        conversation_id: conversation_id.to_owned(),
        source,
        nodes,
    }
}

/// The safe fallback: every turn single-branch, one node per depth, in
/// `source_index` order.
#[must_use]
pub fn build_linear(conversation_id: &str, observations: &[TurnObservation]) -> ConversationTree {
    if observations.is_empty() {
        return ConversationTree::empty(conversation_id);
    }
    let mut ordered: Vec<&TurnObservation> = observations.iter().collect();
    ordered.sort_by_key(|o| o.source_index);
    let items = ordered
        .into_iter()
        .enumerate()
        .map(|(depth, o)| {
            (
                dom_node_id(depth, 0, false),
                NodeContent::observed(&o.raw_text),
                o.turn_key.clone(),
            )
        })
        .collect();
    linear(conversation_id, TreeSource::Dom, items)
}

/// Extend a tree with one streamed user message.
///
/// Returns `None` when the message is not user-authored, has no id, or is
/// already present. Otherwise returns a new tree with the message appended
/// one level below the deepest node, as the current single-branch child of
/// the active node above it.
#[must_use]
pub fn append_incremental(tree: &ConversationTree, message: &GraphMessage) -> Option<ConversationTree> {
    if !message.is_user() {
        return None;
    }
    let id = message.id.as_deref()?;
    if tree.node(id).is_some() {
        return None;
    }

    let depth = tree.max_depth().map_or(0, |d| d + 1);
    let parent_id = depth.checked_sub(1).and_then(|up| {
        tree.active_at(up)
            .or_else(|| tree.at_depth(up).next())
            .map(|n| n.id.clone())
    });

    let mut next = tree.clone();
    next.source = TreeSource::Incremental;
    next.nodes.push(TreeNode {
        id: id.to_owned(),
        depth,
        branch_index: 0,
        parent_id,
        is_current_branch: true,
        total_branches: 1,
        content: NodeContent::observed(message.first_text().unwrap_or(NEW_MESSAGE_FALLBACK)),
        turn_key: None,
    });
    tracing::debug!(target: "branchmap.builder", id, depth, "appended streamed message");
    Some(next)
}
