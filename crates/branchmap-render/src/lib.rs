#![forbid(unsafe_code)]

//! Render surface for branchmap.
//!
//! Turns a tree and its layout into a [`Scene`]: connectors, one marker and
//! depth label per node, or an empty-state message. The scene answers hit
//! tests and maps clicks to [`NodeAction`]s. [`RedrawGate`] decides when a
//! redraw may happen, and [`TooltipState`] debounces hover tooltips.

pub mod gate;
pub mod scene;
pub mod svg;
pub mod tooltip;

pub use gate::{RedrawGate, Suppression};
pub use scene::{EMPTY_STATE_MESSAGE, NodeAction, Scene, SceneItem, action_for};
pub use svg::to_svg;
pub use tooltip::TooltipState;

use branchmap_core::{ConversationTree, LayoutConfig};

/// Lay out and build the scene for a tree in one step.
#[must_use]
pub fn render(tree: &ConversationTree, config: &LayoutConfig) -> Scene {
    let layout = branchmap_layout::layout(tree, config);
    Scene::build(tree, &layout, config.node_radius)
}
