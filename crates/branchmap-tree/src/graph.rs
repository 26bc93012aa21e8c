#![forbid(unsafe_code)]

//! Graph-mode observation.
//!
//! A conversation response carries a message-mapping graph: every message
//! (user, assistant, system, tool) keyed by id with a link to its parent.
//! Only user-authored messages are branch points, so the turn set is the
//! user-role entries, and a turn's depth is the number of user-role ancestors
//! on its parent chain. Assistant messages in between are skipped without the
//! caller having to filter them out.
//!
//! Messages that share a depth are siblings. Their order is creation time,
//! then id, so repeated decodes of the same graph produce the same indices.
//! The active variant of each sibling group is the one on the chain ending at
//! the graph's `current_node`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use branchmap_core::{BranchSignal, Confidence, TurnObservation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Display text used when a user message has no readable text part.
pub const USER_MESSAGE_FALLBACK: &str = "User message";

/// Role name of user-authored messages.
pub const USER_ROLE: &str = "user";

/// Author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub role: String,
}

/// Message body. Parts may be strings or structured objects.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub parts: Vec<Value>,
}

/// One message as delivered by the host API.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub create_time: Option<f64>,
}

impl GraphMessage {
    /// True when the author role is `user`.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.author.as_ref().is_some_and(|a| a.role == USER_ROLE)
    }

    /// First non-empty string part, if any.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .as_ref()?
            .parts
            .first()?
            .as_str()
            .filter(|s| !s.is_empty())
    }
}

/// One mapping entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphEntry {
    #[serde(default)]
    pub message: Option<GraphMessage>,
    #[serde(default)]
    pub parent: Option<String>,
}

impl GraphEntry {
    fn user_message(&self) -> Option<&GraphMessage> {
        self.message.as_ref().filter(|m| m.is_user())
    }
}

/// A message-mapping graph plus the id of the message the host shows last.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageGraph {
    #[serde(default)]
    pub mapping: BTreeMap<String, GraphEntry>,
    #[serde(default)]
    pub current_node: Option<String>,
}

impl MessageGraph {
    /// Build from a raw `mapping` value, skipping entries that do not parse.
    #[must_use]
    pub fn from_mapping(mapping: &Value, current_node: Option<&str>) -> Self {
        let mut graph = Self {
            mapping: BTreeMap::new(),
            current_node: current_node.map(str::to_owned),
        };
        if let Some(entries) = mapping.as_object() {
            for (id, raw) in entries {
                match GraphEntry::deserialize(raw) {
                    Ok(entry) => {
                        graph.mapping.insert(id.clone(), entry);
                    }
                    Err(err) => {
                        tracing::debug!(target: "branchmap.feed", id = %id, error = %err, "skipping malformed mapping entry");
                    }
                }
            }
        }
        graph
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Number of user-authored messages.
    #[must_use]
    pub fn user_turn_count(&self) -> usize {
        self.mapping
            .values()
            .filter(|e| e.user_message().is_some())
            .count()
    }

    /// Fold a streamed message into the graph.
    ///
    /// A known id has its message replaced. A new id is attached under the
    /// current node and becomes the current node. Messages without an id are
    /// ignored. Returns `true` if the graph changed.
    pub fn absorb(&mut self, message: GraphMessage) -> bool {
        let Some(id) = message.id.clone() else {
            return false;
        };
        if let Some(entry) = self.mapping.get_mut(&id) {
            if entry.message.as_ref() == Some(&message) {
                return false;
            }
            entry.message = Some(message);
            return true;
        }
        let entry = GraphEntry {
            message: Some(message),
            parent: self.current_node.clone(),
        };
        self.mapping.insert(id.clone(), entry);
        self.current_node = Some(id);
        true
    }

    /// Number of user-role ancestors of `id`.
    ///
    /// The walk ends at a missing parent or when an id repeats.
    #[must_use]
    pub fn user_depth(&self, id: &str) -> usize {
        let mut visited = HashSet::from([id]);
        let mut depth = 0;
        let mut cursor = self.mapping.get(id).and_then(|e| e.parent.as_deref());
        while let Some(parent_id) = cursor {
            if !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = self.mapping.get(parent_id) else {
                break;
            };
            if parent.user_message().is_some() {
                depth += 1;
            }
            cursor = parent.parent.as_deref();
        }
        depth
    }

    /// User-role ids on the chain from `id` up to the root, `id` included.
    fn user_chain(&self, id: &str) -> BTreeSet<String> {
        let mut visited = HashSet::new();
        let mut chain = BTreeSet::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                break;
            }
            let Some(entry) = self.mapping.get(current) else {
                break;
            };
            if entry.user_message().is_some() {
                chain.insert(current.to_owned());
            }
            cursor = entry.parent.as_deref();
        }
        chain
    }
}

/// A graph-mode turn observation: one user message and its place in its
/// sibling group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphObservation {
    pub message_id: String,
    /// Position of this message among its same-depth siblings.
    pub branch_index: usize,
    /// `source_index` is the computed depth. The branch signal describes the
    /// whole sibling group.
    pub observation: TurnObservation,
}

impl GraphObservation {
    #[must_use]
    pub fn depth(&self) -> usize {
        self.observation.source_index
    }

    #[must_use]
    pub fn is_current(&self) -> bool {
        self.branch_index == self.observation.branch_signal.current_branch
    }
}

struct UserTurn<'a> {
    id: &'a str,
    depth: usize,
    create_time: Option<f64>,
    text: &'a str,
}

fn sibling_order(a: &UserTurn<'_>, b: &UserTurn<'_>) -> Ordering {
    let at = a.create_time.unwrap_or(f64::NEG_INFINITY);
    let bt = b.create_time.unwrap_or(f64::NEG_INFINITY);
    at.total_cmp(&bt).then_with(|| a.id.cmp(b.id))
}

/// Observe every user turn of a graph, ordered by `(depth, branch_index)`.
#[must_use]
pub fn observe_graph(graph: &MessageGraph) -> Vec<GraphObservation> {
    let turns: Vec<UserTurn<'_>> = graph
        .mapping
        .iter()
        .filter_map(|(id, entry)| {
            let message = entry.user_message()?;
            Some(UserTurn {
                id,
                depth: graph.user_depth(id),
                create_time: message.create_time,
                text: message.first_text().unwrap_or(USER_MESSAGE_FALLBACK),
            })
        })
        .collect();
    if turns.is_empty() {
        return Vec::new();
    }

    let anchored = graph
        .current_node
        .as_deref()
        .filter(|id| graph.mapping.contains_key(*id));
    let chain = match anchored {
        Some(id) => graph.user_chain(id),
        None => turns
            .iter()
            .max_by(|a, b| a.depth.cmp(&b.depth).then_with(|| sibling_order(a, b)))
            .map(|deepest| graph.user_chain(deepest.id))
            .unwrap_or_default(),
    };

    let mut groups: BTreeMap<usize, Vec<UserTurn<'_>>> = BTreeMap::new();
    for turn in turns {
        groups.entry(turn.depth).or_default().push(turn);
    }

    let mut observations = Vec::new();
    for (depth, mut group) in groups {
        group.sort_by(sibling_order);
        let total = group.len();
        let on_chain = group.iter().position(|t| chain.contains(t.id));
        let (current, confidence) = match on_chain {
            _ if total == 1 => (0, Confidence::Exact),
            Some(index) if anchored.is_some() => (index, Confidence::Exact),
            Some(index) => (index, Confidence::Inferred),
            None => (total - 1, Confidence::Inferred),
        };
        let signal = BranchSignal::new(current, total, confidence);
        for (branch_index, turn) in group.into_iter().enumerate() {
            observations.push(GraphObservation {
                message_id: turn.id.to_owned(),
                branch_index,
                observation: TurnObservation::new(depth, turn.text).with_signal(signal),
            });
        }
    }
    observations
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user(text: &str, parent: Option<&str>, time: f64) -> Value {
        json!({
            "message": {"author": {"role": "user"}, "content": {"parts": [text]}, "create_time": time},
            "parent": parent,
        })
    }

    fn assistant(parent: &str) -> Value {
        json!({
            "message": {"author": {"role": "assistant"}, "content": {"parts": ["ok"]}},
            "parent": parent,
        })
    }

    #[test]
    fn depth_skips_assistant_turns() {
        let mapping = json!({
            "root": {"message": null, "parent": null},
            "u1": user("first", Some("root"), 1.0),
            "a1": assistant("u1"),
            "u2": user("second", Some("a1"), 2.0),
            "a2": assistant("u2"),
            "u3": user("third", Some("a2"), 3.0),
        });
        let graph = MessageGraph::from_mapping(&mapping, Some("u3"));
        assert_eq!(graph.user_depth("u1"), 0);
        assert_eq!(graph.user_depth("u3"), 2);

        let observed: Vec<(String, usize)> = observe_graph(&graph)
            .into_iter()
            .map(|o| (o.message_id.clone(), o.depth()))
            .collect();
        assert_eq!(
            observed,
            vec![("u1".into(), 0), ("u2".into(), 1), ("u3".into(), 2)]
        );
    }

    #[test]
    fn siblings_follow_current_node() {
        let mapping = json!({
            "u1": user("first", None, 1.0),
            "a1": assistant("u1"),
            "u2a": user("edit a", Some("a1"), 2.0),
            "u2b": user("edit b", Some("a1"), 5.0),
            "u2c": user("edit c", Some("a1"), 3.0),
        });
        let graph = MessageGraph::from_mapping(&mapping, Some("u2c"));
        let observations = observe_graph(&graph);
        let depth1: Vec<&GraphObservation> = observations.iter().filter(|o| o.depth() == 1).collect();
        let ids: Vec<&str> = depth1.iter().map(|o| o.message_id.as_str()).collect();
        assert_eq!(ids, vec!["u2a", "u2c", "u2b"]);
        let signal = depth1[0].observation.branch_signal;
        assert_eq!(signal, BranchSignal::new(1, 3, Confidence::Exact));
        assert!(depth1[1].is_current());
    }

    #[test]
    fn without_current_node_latest_deepest_wins() {
        let mapping = json!({
            "u1": user("first", None, 1.0),
            "u2a": user("a", Some("u1"), 2.0),
            "u2b": user("b", Some("u1"), 4.0),
        });
        let graph = MessageGraph::from_mapping(&mapping, None);
        let observations = observe_graph(&graph);
        let current: Vec<&str> = observations
            .iter()
            .filter(|o| o.is_current())
            .map(|o| o.message_id.as_str())
            .collect();
        assert_eq!(current, vec!["u1", "u2b"]);
        assert_eq!(
            observations[1].observation.branch_signal.confidence,
            Confidence::Inferred
        );
    }

    #[test]
    fn cycles_terminate() {
        let mapping = json!({
            "x": user("x", Some("y"), 1.0),
            "y": user("y", Some("x"), 2.0),
        });
        let graph = MessageGraph::from_mapping(&mapping, Some("x"));
        assert_eq!(graph.user_depth("x"), 1);
        assert_eq!(observe_graph(&graph).len(), 2);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let mapping = json!({
            "good": user("hi", None, 1.0),
            "bad": "not an object",
            "odd": {"message": {"author": {"role": "user"}, "content": {"parts": [{"image": 1}]}}},
        });
        let graph = MessageGraph::from_mapping(&mapping, None);
        assert_eq!(graph.mapping.len(), 2);
        let texts: Vec<String> = observe_graph(&graph)
            .into_iter()
            .map(|o| o.observation.raw_text)
            .collect();
        assert!(texts.contains(&USER_MESSAGE_FALLBACK.to_owned()));
    }

    #[test]
    fn absorb_extends_current_chain() {
        let mut graph = MessageGraph::from_mapping(&json!({"u1": user("a", None, 1.0)}), Some("u1"));
        let reply = GraphMessage {
            id: Some("a1".into()),
            author: Some(Author { role: "assistant".into() }),
            ..GraphMessage::default()
        };
        assert!(graph.absorb(reply.clone()));
        assert!(!graph.absorb(reply));
        let next = GraphMessage {
            id: Some("u2".into()),
            author: Some(Author { role: "user".into() }),
            ..GraphMessage::default()
        };
        assert!(graph.absorb(next));
        assert_eq!(graph.current_node.as_deref(), Some("u2"));
        assert_eq!(graph.user_depth("u2"), 1);
        assert!(!graph.absorb(GraphMessage::default()));
    }
}
