#![forbid(unsafe_code)]

//! Structural invariant checks for built trees.
//!
//! Every tree the builder produces must satisfy these. The checks are cheap
//! and are used by tests, the fuzz targets, and as a guard before a tree
//! loaded from storage is shown.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use branchmap_core::ConversationTree;

/// One broken tree invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Two nodes share an id.
    DuplicateId { id: String },
    /// A depth-0 node has a parent.
    RootHasParent { id: String },
    /// A non-root node has no parent.
    MissingParent { id: String },
    /// A parent id names no node in the tree.
    UnknownParent { id: String, parent_id: String },
    /// A parent is not exactly one level up.
    ParentDepth { id: String, depth: usize, parent_depth: usize },
    /// A depth has no current node, or more than one.
    ActiveCount { depth: usize, count: usize },
    /// The current node at a depth does not descend from the current node above.
    ActivePathBroken { depth: usize },
    /// Sibling indices under one parent are not `0..n`.
    SiblingIndices { parent_id: Option<String>, depth: usize, indices: Vec<usize> },
    /// Nodes are not stored in `(depth, branch_index)` order.
    OutOfOrder { position: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id } => write!(f, "duplicate node id {id}"),
            Self::RootHasParent { id } => write!(f, "root node {id} has a parent"),
            Self::MissingParent { id } => write!(f, "node {id} has no parent"),
            Self::UnknownParent { id, parent_id } => {
                write!(f, "node {id} references unknown parent {parent_id}")
            }
            Self::ParentDepth { id, depth, parent_depth } => write!(
                f,
                "node {id} at depth {depth} has parent at depth {parent_depth}"
            ),
            Self::ActiveCount { depth, count } => {
                write!(f, "depth {depth} has {count} current nodes")
            }
            Self::ActivePathBroken { depth } => {
                write!(f, "current node at depth {depth} is off the active path")
            }
            Self::SiblingIndices { parent_id, depth, indices } => write!(
                f,
                "siblings under {} at depth {depth} have indices {indices:?}",
                parent_id.as_deref().unwrap_or("<root>")
            ),
            Self::OutOfOrder { position } => write!(f, "node {position} is out of order"),
        }
    }
}

/// Check every tree invariant. An empty result means the tree is valid.
#[must_use]
pub fn check_invariants(tree: &ConversationTree) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    let mut by_id = HashMap::new();
    for node in &tree.nodes {
        if by_id.insert(node.id.as_str(), node).is_some() {
            violations.push(InvariantViolation::DuplicateId { id: node.id.clone() });
        }
    }

    for (position, pair) in tree.nodes.windows(2).enumerate() {
        if (pair[0].depth, pair[0].branch_index) > (pair[1].depth, pair[1].branch_index) {
            violations.push(InvariantViolation::OutOfOrder {
                position: position + 1,
            });
        }
    }

    for node in &tree.nodes {
        match (&node.parent_id, node.depth) {
            (Some(_), 0) => violations.push(InvariantViolation::RootHasParent { id: node.id.clone() }),
            (None, 0) => {}
            (None, _) => violations.push(InvariantViolation::MissingParent { id: node.id.clone() }),
            (Some(parent_id), depth) => match by_id.get(parent_id.as_str()) {
                None => violations.push(InvariantViolation::UnknownParent {
                    id: node.id.clone(),
                    parent_id: parent_id.clone(),
                }),
                Some(parent) if parent.depth + 1 != depth => {
                    violations.push(InvariantViolation::ParentDepth {
                        id: node.id.clone(),
                        depth,
                        parent_depth: parent.depth,
                    });
                }
                Some(_) => {}
            },
        }
    }

    if let Some(max_depth) = tree.max_depth() {
        let mut previous_active: Option<&str> = None;
        for depth in 0..=max_depth {
            let active: Vec<_> = tree.at_depth(depth).filter(|n| n.is_current_branch).collect();
            if active.len() != 1 {
                violations.push(InvariantViolation::ActiveCount {
                    depth,
                    count: active.len(),
                });
                previous_active = None;
                continue;
            }
            let node = active[0];
            if depth > 0 && previous_active.is_some() && node.parent_id.as_deref() != previous_active {
                violations.push(InvariantViolation::ActivePathBroken { depth });
            }
            previous_active = Some(node.id.as_str());
        }
    }

    let mut groups: BTreeMap<(usize, Option<&str>), Vec<usize>> = BTreeMap::new();
    for node in &tree.nodes {
        groups
            .entry((node.depth, node.parent_id.as_deref()))
            .or_default()
            .push(node.branch_index);
    }
    for ((depth, parent_id), mut indices) in groups {
        indices.sort_unstable();
        let contiguous = indices.iter().enumerate().all(|(i, &b)| i == b);
        let unique = indices.iter().collect::<HashSet<_>>().len() == indices.len();
        if !(contiguous && unique) {
            violations.push(InvariantViolation::SiblingIndices {
                parent_id: parent_id.map(str::to_owned),
                depth,
                indices,
            });
        }
    }

    violations
}
