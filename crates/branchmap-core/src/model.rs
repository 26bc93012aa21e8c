#![forbid(unsafe_code)]

//! Conversation tree data model.
//!
//! The pipeline moves through three shapes:
//!
//! 1. [`TurnObservation`]: one user turn as seen by the extractor, with its
//!    [`BranchSignal`].
//! 2. [`TreeNode`]: one branch variant of a turn, placed at a depth with a
//!    parent link. Non-current variants are [`NodeContent::Placeholder`]s
//!    because their text cannot be read without switching branches.
//! 3. [`ConversationTree`]: the ordered node list for one conversation. It is
//!    rebuilt wholesale on every extraction pass and never patched in place.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::host::TurnKey;

/// Maximum number of characters kept for observed node text.
pub const CONTENT_PREVIEW_CHARS: usize = 50;

/// How a [`BranchSignal`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Parsed from a `k/n` indicator or known graph structure.
    Exact,
    /// Guessed from control enabled/disabled state. A lower bound only.
    Inferred,
}

/// Sibling-branch information for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchSignal {
    /// 0-based index of the branch the host currently shows.
    pub current_branch: usize,
    /// Number of sibling branches, always at least 1.
    pub total_branches: usize,
    pub confidence: Confidence,
}

impl BranchSignal {
    /// Create a signal, clamping so that `current_branch < total_branches`.
    #[must_use]
    pub fn new(current_branch: usize, total_branches: usize, confidence: Confidence) -> Self {
        let total_branches = total_branches.max(1);
        Self {
            current_branch: current_branch.min(total_branches - 1),
            total_branches,
            confidence,
        }
    }

    /// The conservative single-branch signal.
    #[must_use]
    pub const fn single() -> Self {
        Self {
            current_branch: 0,
            total_branches: 1,
            confidence: Confidence::Exact,
        }
    }

    /// True when the turn has more than one sibling variant.
    #[inline]
    #[must_use]
    pub const fn is_branched(&self) -> bool {
        self.total_branches > 1
    }
}

impl Default for BranchSignal {
    fn default() -> Self {
        Self::single()
    }
}

/// One user turn observed by the signal extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnObservation {
    /// Position among the visible (DOM) or logical (graph) user turns.
    pub source_index: usize,
    pub raw_text: String,
    pub branch_signal: BranchSignal,
    /// Stable host identifier of the turn container, when the host exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_key: Option<TurnKey>,
}

impl TurnObservation {
    /// Single-branch observation with no host key.
    #[must_use]
    pub fn new(source_index: usize, raw_text: impl Into<String>) -> Self {
        Self {
            source_index,
            raw_text: raw_text.into(),
            branch_signal: BranchSignal::single(),
            turn_key: None,
        }
    }

    /// Attach a branch signal.
    #[must_use]
    pub fn with_signal(mut self, signal: BranchSignal) -> Self {
        self.branch_signal = signal;
        self
    }

    /// Attach the host's turn key.
    #[must_use]
    pub fn with_turn_key(mut self, key: TurnKey) -> Self {
        self.turn_key = Some(key);
        self
    }
}

/// Display payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeContent {
    /// Text actually read from the host, truncated for display.
    Observed { text: String },
    /// A sibling branch whose content is not visible in the host.
    Placeholder { branch_number: usize },
}

impl NodeContent {
    /// Observed content built from raw turn text.
    #[must_use]
    pub fn observed(raw: &str) -> Self {
        Self::Observed {
            text: content_preview(raw),
        }
    }

    /// Text shown in labels and tooltips.
    #[must_use]
    pub fn display_text(&self) -> Cow<'_, str> {
        match self {
            Self::Observed { text } => Cow::Borrowed(text.as_str()),
            Self::Placeholder { branch_number } => Cow::Owned(format!("Branch {branch_number}")),
        }
    }

    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

/// Trim and truncate turn text to [`CONTENT_PREVIEW_CHARS`] characters.
///
/// Truncated text gets a trailing `...`. Cuts on char boundaries.
#[must_use]
pub fn content_preview(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(CONTENT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_owned(),
    }
}

/// One branch variant of one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Source message id (graph mode) or synthesized from depth and branch.
    pub id: String,
    pub depth: usize,
    /// 0-based position among siblings; drives left-to-right order.
    pub branch_index: usize,
    /// `None` only at depth 0.
    pub parent_id: Option<String>,
    pub is_current_branch: bool,
    /// Sibling group size, duplicated onto every sibling.
    pub total_branches: usize,
    pub content: NodeContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_key: Option<TurnKey>,
}

impl TreeNode {
    /// 1-based display counterpart of `branch_index`.
    #[inline]
    #[must_use]
    pub const fn branch_number(&self) -> usize {
        self.branch_index + 1
    }

    #[inline]
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.depth == 0
    }

    /// Text shown in the tooltip.
    #[must_use]
    pub fn display_text(&self) -> Cow<'_, str> {
        self.content.display_text()
    }
}

/// Which extraction path produced a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeSource {
    /// Built from a message-mapping graph.
    Graph,
    /// Built from scanning visible user turns.
    Dom,
    /// Extended from a single streamed message.
    Incremental,
    /// No turns were found.
    #[default]
    Empty,
}

/// Structural fingerprint of one node, used to compare extraction passes.
pub type NodeShape = (usize, usize, Option<String>, bool);

/// The tree snapshot for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversationTree {
    pub conversation_id: String,
    #[serde(default)]
    pub source: TreeSource,
    pub nodes: Vec<TreeNode>,
}

impl ConversationTree {
    /// An empty-state tree.
    #[must_use]
    pub fn empty(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            source: TreeSource::Empty,
            nodes: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Deepest depth present, or `None` for an empty tree.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.nodes.iter().map(|n| n.depth).max()
    }

    /// Nodes at the given depth, in stored order.
    pub fn at_depth(&self, depth: usize) -> impl Iterator<Item = &TreeNode> + '_ {
        self.nodes.iter().filter(move |n| n.depth == depth)
    }

    /// Children of `parent_id` (or the roots for `None`), ordered by branch index.
    #[must_use]
    pub fn children_of(&self, parent_id: Option<&str>) -> Vec<&TreeNode> {
        let mut children: Vec<&TreeNode> = self
            .nodes
            .iter()
            .filter(|n| n.parent_id.as_deref() == parent_id)
            .collect();
        children.sort_by_key(|n| n.branch_index);
        children
    }

    /// The current node at `depth`, if any.
    #[must_use]
    pub fn active_at(&self, depth: usize) -> Option<&TreeNode> {
        self.at_depth(depth).find(|n| n.is_current_branch)
    }

    /// Current nodes from depth 0 downwards, stopping at the first gap.
    #[must_use]
    pub fn active_path(&self) -> Vec<&TreeNode> {
        let mut path = Vec::new();
        let mut depth = 0;
        while let Some(node) = self.active_at(depth) {
            path.push(node);
            depth += 1;
        }
        path
    }

    /// Structural tuples `(depth, branch_index, parent_id, is_current_branch)`
    /// in stored order.
    #[must_use]
    pub fn shape(&self) -> Vec<NodeShape> {
        self.nodes
            .iter()
            .map(|n| {
                (
                    n.depth,
                    n.branch_index,
                    n.parent_id.clone(),
                    n.is_current_branch,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(id: &str, depth: usize, branch: usize, parent: Option<&str>, current: bool) -> TreeNode {
        TreeNode {
            id: id.to_owned(),
            depth,
            branch_index: branch,
            parent_id: parent.map(str::to_owned),
            is_current_branch: current,
            total_branches: 1,
            content: NodeContent::observed(id),
            turn_key: None,
        }
    }

    #[test]
    fn signal_clamps_out_of_range_values() {
        let s = BranchSignal::new(5, 3, Confidence::Exact);
        assert_eq!(s.current_branch, 2);
        assert_eq!(s.total_branches, 3);

        let s = BranchSignal::new(0, 0, Confidence::Inferred);
        assert_eq!(s.total_branches, 1);
        assert!(!s.is_branched());
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(60);
        let preview = content_preview(&long);
        assert_eq!(preview.chars().count(), CONTENT_PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));

        assert_eq!(content_preview("  short  "), "short");
        let exact = "a".repeat(CONTENT_PREVIEW_CHARS);
        assert_eq!(content_preview(&exact), exact);
    }

    #[test]
    fn placeholder_display_text() {
        let content = NodeContent::Placeholder { branch_number: 3 };
        assert_eq!(content.display_text(), "Branch 3");
        assert!(content.is_placeholder());
    }

    #[test]
    fn active_path_stops_at_gap() {
        let tree = ConversationTree {
            conversation_id: "c".into(),
            source: TreeSource::Dom,
            nodes: vec![
                node("a", 0, 0, None, true),
                node("b", 1, 0, Some("a"), false),
                node("c", 1, 1, Some("a"), true),
                node("d", 3, 0, Some("x"), true),
            ],
        };
        let ids: Vec<&str> = tree.active_path().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(tree.max_depth(), Some(3));
    }

    #[test]
    fn children_sorted_by_branch_index() {
        let tree = ConversationTree {
            conversation_id: "c".into(),
            source: TreeSource::Dom,
            nodes: vec![
                node("root", 0, 0, None, true),
                node("second", 1, 1, Some("root"), false),
                node("first", 1, 0, Some("root"), true),
            ],
        };
        let ids: Vec<&str> = tree
            .children_of(Some("root"))
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(tree.children_of(None).len(), 1);
    }

    #[test]
    fn tree_serializes_content_as_tagged_enum() {
        let mut placeholder = node("p", 0, 1, None, false);
        placeholder.content = NodeContent::Placeholder { branch_number: 2 };
        let tree = ConversationTree {
            conversation_id: "abc".into(),
            source: TreeSource::Dom,
            nodes: vec![placeholder],
        };
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["nodes"][0]["content"]["kind"], "placeholder");
        assert_eq!(json["nodes"][0]["content"]["branch_number"], 2);
        assert_eq!(json["source"], "dom");

        let back: ConversationTree = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }
}
