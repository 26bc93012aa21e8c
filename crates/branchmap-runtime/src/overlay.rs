#![forbid(unsafe_code)]

//! Overlay window geometry.
//!
//! The overlay floats over the host page. It can be dragged by its header and
//! resized from any of its four edges. All positions are viewport pixels with
//! the origin at the top-left corner.
//!
//! # Invariants
//!
//! - A dragged overlay keeps `edge_padding` between itself and every viewport
//!   edge (when the viewport is large enough to allow it).
//! - A resized overlay is never smaller than `min_width` x `min_height`, and
//!   its origin never moves above or left of `edge_padding`.
//! - Resizing from the west or north edge keeps the opposite edge fixed.

use bitflags::bitflags;
use branchmap_core::{OverlayConfig, Point, Size};
use serde::{Deserialize, Serialize};

bitflags! {
    /// Edges grabbed by a resize handle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResizeEdges: u8 {
        const NORTH = 0b0001;
        const SOUTH = 0b0010;
        const EAST  = 0b0100;
        const WEST  = 0b1000;
    }
}

impl Default for ResizeEdges {
    fn default() -> Self {
        Self::empty()
    }
}

/// Position and size of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl OverlayGeometry {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// First-run placement: a fraction of the viewport, near the top-right
    /// corner.
    #[must_use]
    pub fn default_for(viewport: Size, config: &OverlayConfig) -> Self {
        let width = (viewport.width * config.default_fraction).max(config.min_width);
        let height = (viewport.height * config.default_fraction).max(config.min_height);
        let x = (viewport.width - width - config.default_right_margin).max(config.edge_padding);
        Self::new(x, config.default_top, width, height)
    }

    #[must_use]
    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Move the origin to `origin`, clamped inside the padded viewport.
    #[must_use]
    pub fn moved_to(self, origin: Point, viewport: Size, config: &OverlayConfig) -> Self {
        let pad = config.edge_padding;
        let max_x = (viewport.width - self.width - pad).max(pad);
        let max_y = (viewport.height - self.height - pad).max(pad);
        Self {
            x: origin.x.clamp(pad, max_x),
            y: origin.y.clamp(pad, max_y),
            ..self
        }
    }

    /// Resize by dragging `edges` by `(dx, dy)` from this geometry.
    #[must_use]
    pub fn resized(
        self,
        edges: ResizeEdges,
        dx: f64,
        dy: f64,
        viewport: Size,
        config: &OverlayConfig,
    ) -> Self {
        let mut next = self;
        if edges.contains(ResizeEdges::EAST) {
            next.width = self.width + dx;
        }
        if edges.contains(ResizeEdges::WEST) {
            next.width = self.width - dx;
            next.x = self.x + dx;
        }
        if edges.contains(ResizeEdges::SOUTH) {
            next.height = self.height + dy;
        }
        if edges.contains(ResizeEdges::NORTH) {
            next.height = self.height - dy;
            next.y = self.y + dy;
        }

        if next.width < config.min_width {
            if edges.contains(ResizeEdges::WEST) {
                next.x += next.width - config.min_width;
            }
            next.width = config.min_width;
        }
        if next.height < config.min_height {
            if edges.contains(ResizeEdges::NORTH) {
                next.y += next.height - config.min_height;
            }
            next.height = config.min_height;
        }

        let pad = config.edge_padding;
        if next.x < pad {
            if edges.contains(ResizeEdges::WEST) {
                next.width -= pad - next.x;
            }
            next.x = pad;
        }
        if next.y < pad {
            if edges.contains(ResizeEdges::NORTH) {
                next.height -= pad - next.y;
            }
            next.y = pad;
        }
        next.width = next
            .width
            .min(viewport.width - pad - next.x)
            .max(config.min_width);
        next.height = next
            .height
            .min(viewport.height - pad - next.y)
            .max(config.min_height);
        next
    }

    /// Pull a restored geometry back inside a (possibly smaller) viewport.
    #[must_use]
    pub fn clamped(self, viewport: Size, config: &OverlayConfig) -> Self {
        let sized = Self {
            width: self.width.max(config.min_width),
            height: self.height.max(config.min_height),
            ..self
        };
        sized.moved_to(sized.origin(), viewport, config)
    }
}
