#![forbid(unsafe_code)]

//! Node-link layout for conversation trees.
//!
//! [`layout`] is a pure function of a [`ConversationTree`] and a
//! [`LayoutConfig`]. It keeps no state between calls, so a layout can be
//! re-derived at any time.
//!
//! # Placement
//!
//! - `y = top_padding + depth * vertical_spacing`.
//! - Roots are spread around the canvas centre line, ordered by branch index.
//! - Children are centred under their parent:
//!   `x = parent.x + (branch_index - (count - 1) / 2) * horizontal_spacing`.
//!   The mean child x therefore equals the parent x, and one parent's
//!   children never cross.
//!
//! The canvas fits the widest sibling group and the deepest level, never
//! shrinking below the configured minimum. Nested fan-outs can drift past the
//! left edge, in which case the whole drawing shifts right and the canvas
//! grows. There is no maximum: wide trees scroll rather than compress.

pub mod connector;

pub use branchmap_core::{LayoutConfig, Point, Size};
pub use connector::{Connector, ConnectorShape, FAN_OUT_CONTROL_RATIO};

use branchmap_core::{ConversationTree, TreeNode};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Positions, canvas size, and connectors for one tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreeLayout {
    pub positions: FxHashMap<String, Point>,
    pub canvas: Size,
    /// One connector per node whose parent is positioned, in node order.
    pub connectors: Vec<Connector>,
}

impl TreeLayout {
    /// Centre of a node's marker.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<Point> {
        self.positions.get(id).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Offset of sibling `index` of `count` from the group centre, in spacings.
#[inline]
fn centred_offset(index: usize, count: usize) -> f64 {
    index as f64 - (count.saturating_sub(1) as f64) / 2.0
}

/// Lay out a tree.
#[must_use]
pub fn layout(tree: &ConversationTree, config: &LayoutConfig) -> TreeLayout {
    let Some(max_depth) = tree.max_depth() else {
        return TreeLayout {
            canvas: Size::new(config.min_width, config.min_height),
            ..TreeLayout::default()
        };
    };

    let mut groups: FxHashMap<Option<&str>, Vec<&TreeNode>> = FxHashMap::default();
    for node in &tree.nodes {
        groups.entry(node.parent_id.as_deref()).or_default().push(node);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|n| (n.branch_index, n.depth));
    }
    let widest = groups.values().map(Vec::len).max().unwrap_or(1);

    let mut width =
        (widest as f64 * config.horizontal_spacing + config.side_padding).max(config.min_width);
    let height = (config.top_padding
        + (max_depth + 1) as f64 * config.vertical_spacing
        + config.bottom_padding)
        .max(config.min_height);
    let centre = width / 2.0;

    let mut ordered: Vec<&TreeNode> = tree.nodes.iter().collect();
    ordered.sort_by_key(|n| (n.depth, n.branch_index));

    let mut positions: FxHashMap<String, Point> = FxHashMap::default();
    for node in ordered {
        let parent = node.parent_id.as_deref();
        let siblings = groups.get(&parent).map_or(&[][..], Vec::as_slice);
        let count = siblings.len().max(1);
        let index = siblings
            .iter()
            .position(|s| std::ptr::eq(*s, node))
            .unwrap_or(0);
        let base_x = parent
            .and_then(|id| positions.get(id))
            .map_or(centre, |p| p.x);
        let x = base_x + centred_offset(index, count) * config.horizontal_spacing;
        let y = config.top_padding + node.depth as f64 * config.vertical_spacing;
        positions.insert(node.id.clone(), Point::new(x, y));
    }

    let edge = config.side_padding / 2.0;
    let min_x = positions.values().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = positions.values().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let shift = (edge - min_x).max(0.0);
    if shift > 0.0 {
        for p in positions.values_mut() {
            p.x += shift;
        }
    }
    width = width.max(max_x + shift + edge);

    let radius = config.node_radius;
    let connectors = tree
        .nodes
        .iter()
        .filter_map(|child| {
            let parent_id = child.parent_id.as_deref()?;
            let from = positions.get(parent_id)?.offset(0.0, radius);
            let to = positions.get(&child.id)?.offset(0.0, -radius);
            let siblings = groups.get(&Some(parent_id)).map_or(0, Vec::len);
            let parent_current = tree.node(parent_id).is_some_and(|p| p.is_current_branch);
            Some(Connector {
                child_id: child.id.clone(),
                parent_id: parent_id.to_owned(),
                from,
                to,
                shape: if siblings > 1 {
                    ConnectorShape::FanOut
                } else {
                    ConnectorShape::Smooth
                },
                active: child.is_current_branch && parent_current,
            })
        })
        .collect();

    TreeLayout {
        positions,
        canvas: Size::new(width, height),
        connectors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchmap_core::{BranchSignal, Confidence, TurnObservation};
    use branchmap_tree::{build_from_observations, build_linear};
    use pretty_assertions::assert_eq;

    const EPS: f64 = 1e-9;

    #[test]
    fn empty_tree_gets_minimum_canvas() {
        let out = layout(&ConversationTree::empty("c"), &LayoutConfig::default());
        assert!(out.is_empty());
        assert_eq!(out.canvas, Size::new(300.0, 300.0));
    }

    #[test]
    fn linear_chain_is_a_vertical_line() {
        let tree = build_linear(
            "c",
            &[
                TurnObservation::new(0, "a"),
                TurnObservation::new(1, "b"),
                TurnObservation::new(2, "c"),
            ],
        );
        let out = layout(&tree, &LayoutConfig::default());
        assert_eq!(out.canvas, Size::new(300.0, 390.0));
        assert_eq!(out.position("dom_0"), Some(Point::new(150.0, 40.0)));
        assert_eq!(out.position("dom_2"), Some(Point::new(150.0, 220.0)));
        assert_eq!(out.connectors.len(), 2);
        assert!(out.connectors.iter().all(|c| c.shape == ConnectorShape::Smooth && c.active));
        assert_eq!(out.connectors[0].from, Point::new(150.0, 62.0));
        assert_eq!(out.connectors[0].to, Point::new(150.0, 108.0));
    }

    #[test]
    fn branch_point_fans_out_symmetrically() {
        let tree = build_from_observations(
            "c",
            &[
                TurnObservation::new(0, "a"),
                TurnObservation::new(1, "b").with_signal(BranchSignal::new(1, 3, Confidence::Exact)),
            ],
        );
        let out = layout(&tree, &LayoutConfig::default());
        assert_eq!(out.canvas.width, 440.0);
        let root = out.position("dom_0").unwrap();
        let xs: Vec<f64> = (0..3)
            .map(|b| out.position(&format!("dom_1_branch_{b}")).unwrap().x)
            .collect();
        assert_eq!(xs, vec![root.x - 80.0, root.x, root.x + 80.0]);
        assert!(out.connectors.iter().all(|c| c.shape == ConnectorShape::FanOut));
        let active: Vec<&str> = out
            .connectors
            .iter()
            .filter(|c| c.active)
            .map(|c| c.child_id.as_str())
            .collect();
        assert_eq!(active, vec!["dom_1_branch_1"]);
    }

    #[test]
    fn drifting_fan_outs_stay_on_canvas() {
        let observations: Vec<TurnObservation> = (0..6)
            .map(|i| TurnObservation::new(i, "t").with_signal(BranchSignal::new(0, 3, Confidence::Exact)))
            .collect();
        let tree = build_from_observations("c", &observations);
        let config = LayoutConfig::default();
        let out = layout(&tree, &config);
        for p in out.positions.values() {
            assert!(p.x - config.node_radius >= 0.0, "{p:?}");
            assert!(p.x + config.node_radius <= out.canvas.width + EPS, "{p:?}");
        }
    }
}
