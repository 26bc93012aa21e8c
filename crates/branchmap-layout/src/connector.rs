#![forbid(unsafe_code)]

//! Parent-to-child connector curves.

use std::fmt::Write as _;

use branchmap_core::Point;
use serde::Serialize;

/// Control-point offset of a fan-out curve, as a fraction of the horizontal
/// distance between its ends.
pub const FAN_OUT_CONTROL_RATIO: f64 = 0.3;

/// Curve family of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorShape {
    /// Cubic Bézier leaving a branch point (the parent has several children).
    FanOut,
    /// Double quadratic S-curve to an only child.
    Smooth,
}

/// One edge of the tree drawing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connector {
    pub child_id: String,
    pub parent_id: String,
    /// Bottom of the parent marker.
    pub from: Point,
    /// Top of the child marker.
    pub to: Point,
    pub shape: ConnectorShape,
    /// Both ends are on the active path.
    pub active: bool,
}

impl Connector {
    /// SVG path data (`d` attribute) for this connector.
    #[must_use]
    pub fn path_data(&self) -> String {
        let Point { x: px, y: py } = self.from;
        let Point { x: cx, y: cy } = self.to;
        let mut d = String::with_capacity(64);
        match self.shape {
            ConnectorShape::FanOut => {
                let off = (cx - px).abs() * FAN_OUT_CONTROL_RATIO;
                let _ = write!(
                    d,
                    "M {px} {py} C {px} {}, {cx} {}, {cx} {cy}",
                    py + off,
                    cy - off
                );
            }
            ConnectorShape::Smooth => {
                let mid_y = (py + cy) / 2.0;
                let _ = write!(
                    d,
                    "M {px} {py} Q {px} {mid_y} {} {mid_y} Q {cx} {mid_y} {cx} {cy}",
                    (px + cx) / 2.0
                );
            }
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(shape: ConnectorShape, to_x: f64) -> Connector {
        Connector {
            child_id: "c".into(),
            parent_id: "p".into(),
            from: Point::new(150.0, 62.0),
            to: Point::new(to_x, 108.0),
            shape,
            active: false,
        }
    }

    #[test]
    fn fan_out_path() {
        let c = connector(ConnectorShape::FanOut, 110.0);
        assert_eq!(c.path_data(), "M 150 62 C 150 74, 110 96, 110 108");
    }

    #[test]
    fn smooth_path() {
        let c = connector(ConnectorShape::Smooth, 150.0);
        assert_eq!(c.path_data(), "M 150 62 Q 150 85 150 85 Q 150 85 150 108");
    }
}
