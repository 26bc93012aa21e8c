#![forbid(unsafe_code)]

//! Scene graph for one tree drawing.
//!
//! A [`Scene`] is rebuilt from scratch for every tree change, so there are
//! never stale markers left over from an earlier tree.

use branchmap_core::{ConversationTree, Point, Size, TurnKey};
use branchmap_layout::{Connector, TreeLayout};
use serde::Serialize;

/// Message shown when the tree has no nodes.
pub const EMPTY_STATE_MESSAGE: &str = "Start a conversation to see the tree";

/// One drawable item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SceneItem {
    Connector(Connector),
    Marker {
        node_id: String,
        center: Point,
        radius: f64,
        /// Drawn in the highlight colour when on the active path.
        active: bool,
        /// Tooltip text.
        title: String,
    },
    Label {
        node_id: String,
        at: Point,
        text: String,
    },
    EmptyState {
        message: String,
    },
}

/// An ordered list of drawable items. Later items draw on top.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Scene {
    pub canvas: Size,
    pub items: Vec<SceneItem>,
}

impl Scene {
    /// Build the scene for a tree and its layout.
    ///
    /// Connectors come first so markers cover their ends. Each marker is
    /// followed by its depth label (1-based).
    #[must_use]
    pub fn build(tree: &ConversationTree, layout: &TreeLayout, node_radius: f64) -> Self {
        if tree.is_empty() {
            return Self {
                canvas: layout.canvas,
                items: vec![SceneItem::EmptyState {
                    message: EMPTY_STATE_MESSAGE.to_owned(),
                }],
            };
        }

        let mut items: Vec<SceneItem> = layout
            .connectors
            .iter()
            .cloned()
            .map(SceneItem::Connector)
            .collect();
        for node in &tree.nodes {
            let Some(center) = layout.position(&node.id) else {
                tracing::debug!(target: "branchmap.render", id = %node.id, "node has no position");
                continue;
            };
            items.push(SceneItem::Marker {
                node_id: node.id.clone(),
                center,
                radius: node_radius,
                active: node.is_current_branch,
                title: node.display_text().into_owned(),
            });
            items.push(SceneItem::Label {
                node_id: node.id.clone(),
                at: center,
                text: (node.depth + 1).to_string(),
            });
        }
        Self {
            canvas: layout.canvas,
            items,
        }
    }

    #[must_use]
    pub fn is_empty_state(&self) -> bool {
        matches!(self.items.as_slice(), [SceneItem::EmptyState { .. }])
    }

    /// Number of node markers.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, SceneItem::Marker { .. }))
            .count()
    }

    /// Id of the topmost marker containing `point`.
    #[must_use]
    pub fn hit_test(&self, point: Point) -> Option<&str> {
        self.items.iter().rev().find_map(|item| match item {
            SceneItem::Marker {
                node_id,
                center,
                radius,
                ..
            } if center.distance(point) <= *radius => Some(node_id.as_str()),
            _ => None,
        })
    }

    /// Tooltip text of a marker.
    #[must_use]
    pub fn title_of(&self, node_id: &str) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            SceneItem::Marker {
                node_id: id, title, ..
            } if id == node_id => Some(title.as_str()),
            _ => None,
        })
    }
}

/// What a click on a node asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeAction {
    /// Switch the host to another branch of a turn.
    Navigate {
        turn_key: TurnKey,
        depth: usize,
        target_branch: usize,
        known_current: usize,
    },
    /// Bring the turn at `depth` into view.
    ScrollTo { depth: usize },
}

/// Action for a click on `node_id`.
///
/// A non-current node whose turn is known on the page navigates. Anything
/// else scrolls to the node's depth.
#[must_use]
pub fn action_for(tree: &ConversationTree, node_id: &str) -> Option<NodeAction> {
    let node = tree.node(node_id)?;
    let action = match (&node.turn_key, node.is_current_branch) {
        (Some(turn_key), false) => NodeAction::Navigate {
            turn_key: turn_key.clone(),
            depth: node.depth,
            target_branch: node.branch_index,
            known_current: tree.active_at(node.depth).map_or(0, |n| n.branch_index),
        },
        _ => NodeAction::ScrollTo { depth: node.depth },
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchmap_core::{BranchSignal, Confidence, LayoutConfig, TurnKey, TurnObservation};
    use branchmap_layout::layout;
    use branchmap_tree::build_from_observations;
    use pretty_assertions::assert_eq;

    fn sample() -> ConversationTree {
        build_from_observations(
            "c",
            &[
                TurnObservation::new(0, "hello").with_turn_key(TurnKey::new("t0")),
                TurnObservation::new(1, "a long question")
                    .with_signal(BranchSignal::new(1, 2, Confidence::Exact))
                    .with_turn_key(TurnKey::new("t1")),
            ],
        )
    }

    fn scene(tree: &ConversationTree) -> Scene {
        let config = LayoutConfig::default();
        Scene::build(tree, &layout(tree, &config), config.node_radius)
    }

    #[test]
    fn empty_tree_renders_message() {
        let scene = scene(&ConversationTree::empty("c"));
        assert!(scene.is_empty_state());
        assert_eq!(scene.marker_count(), 0);
        assert_eq!(
            scene.items,
            vec![SceneItem::EmptyState {
                message: EMPTY_STATE_MESSAGE.into()
            }]
        );
    }

    #[test]
    fn markers_labels_and_connectors() {
        let tree = sample();
        let scene = scene(&tree);
        assert_eq!(scene.marker_count(), 3);
        let connectors = scene
            .items
            .iter()
            .filter(|i| matches!(i, SceneItem::Connector(_)))
            .count();
        assert_eq!(connectors, 2);
        let labels: Vec<&str> = scene
            .items
            .iter()
            .filter_map(|i| match i {
                SceneItem::Label { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["1", "2", "2"]);
        assert_eq!(scene.title_of("dom_1_branch_0"), Some("Branch 1"));
        assert_eq!(scene.title_of("dom_1_branch_1"), Some("a long question"));
    }

    #[test]
    fn hit_test_uses_marker_radius() {
        let tree = sample();
        let config = LayoutConfig::default();
        let out = layout(&tree, &config);
        let scene = Scene::build(&tree, &out, config.node_radius);
        let center = out.position("dom_0").unwrap();
        assert_eq!(scene.hit_test(center.offset(21.0, 0.0)), Some("dom_0"));
        assert_eq!(scene.hit_test(center.offset(23.0, 0.0)), None);
    }

    #[test]
    fn click_actions() {
        let tree = sample();
        assert_eq!(
            action_for(&tree, "dom_1_branch_0"),
            Some(NodeAction::Navigate {
                turn_key: TurnKey::new("t1"),
                depth: 1,
                target_branch: 0,
                known_current: 1,
            })
        );
        assert_eq!(action_for(&tree, "dom_1_branch_1"), Some(NodeAction::ScrollTo { depth: 1 }));
        assert_eq!(action_for(&tree, "missing"), None);
    }

    #[test]
    fn scene_serializes_tagged_items() {
        let json = serde_json::to_value(scene(&sample())).unwrap();
        assert_eq!(json["items"][0]["kind"], "connector");
        assert!(json["canvas"]["width"].as_f64().unwrap() >= 300.0);
    }
}
