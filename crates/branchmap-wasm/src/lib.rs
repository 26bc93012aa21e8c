#![forbid(unsafe_code)]

//! WASM runner for the branchmap overlay.
//!
//! This crate provides [`BranchmapRunner`], a `wasm-bindgen`-exported struct
//! that wraps [`branchmap_web::OverlayRunner`] and exposes it to a content
//! script. The script owns the document: it serializes user turns into page
//! snapshots, forwards mutation hints and observed responses, advances time,
//! and carries out the commands the runner queues.

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::BranchmapRunner;

use branchmap_runtime::ResizeEdges;

/// Edges named by a resize handle such as `"n"`, `"se"`, or `"w"`.
///
/// Returns `None` for an empty or unknown handle name.
#[must_use]
pub fn resize_edges_from_handle(handle: &str) -> Option<ResizeEdges> {
    let mut edges = ResizeEdges::empty();
    for c in handle.chars() {
        edges |= match c.to_ascii_lowercase() {
            'n' => ResizeEdges::NORTH,
            's' => ResizeEdges::SOUTH,
            'e' => ResizeEdges::EAST,
            'w' => ResizeEdges::WEST,
            _ => return None,
        };
    }
    let opposed = edges.contains(ResizeEdges::NORTH | ResizeEdges::SOUTH)
        || edges.contains(ResizeEdges::EAST | ResizeEdges::WEST);
    (!edges.is_empty() && !opposed).then_some(edges)
}
