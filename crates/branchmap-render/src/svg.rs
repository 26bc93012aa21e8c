#![forbid(unsafe_code)]

//! SVG serialization of a [`Scene`].
//!
//! The markup carries classes rather than inline colours; the host page's
//! stylesheet decides how active and inactive items look.

use std::fmt::Write as _;

use crate::scene::{Scene, SceneItem};

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render a scene as a standalone `<svg>` element.
#[must_use]
pub fn to_svg(scene: &Scene) -> String {
    let mut out = String::new();
    let (w, h) = (scene.canvas.width, scene.canvas.height);
    let _ = write!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    for item in &scene.items {
        match item {
            SceneItem::Connector(connector) => {
                let class = if connector.active {
                    "tree-link active"
                } else {
                    "tree-link"
                };
                let _ = write!(
                    out,
                    r#"<path class="{class}" data-child="{}" d="{}" fill="none"/>"#,
                    escape(&connector.child_id),
                    connector.path_data()
                );
            }
            SceneItem::Marker {
                node_id,
                center,
                radius,
                active,
                title,
            } => {
                let class = if *active { "tree-node current" } else { "tree-node" };
                let _ = write!(
                    out,
                    r#"<circle class="{class}" data-node="{}" cx="{}" cy="{}" r="{radius}"><title>{}</title></circle>"#,
                    escape(node_id),
                    center.x,
                    center.y,
                    escape(title)
                );
            }
            SceneItem::Label { node_id, at, text } => {
                let _ = write!(
                    out,
                    r#"<text class="tree-label" data-node="{}" x="{}" y="{}" text-anchor="middle" dominant-baseline="central">{}</text>"#,
                    escape(node_id),
                    at.x,
                    at.y,
                    escape(text)
                );
            }
            SceneItem::EmptyState { message } => {
                let _ = write!(
                    out,
                    r#"<text class="tree-empty" x="{}" y="{}" text-anchor="middle">{}</text>"#,
                    w / 2.0,
                    h / 2.0,
                    escape(message)
                );
            }
        }
    }
    out.push_str("</svg>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::EMPTY_STATE_MESSAGE;
    use branchmap_core::{Point, Size};

    #[test]
    fn empty_state_svg() {
        let scene = Scene {
            canvas: Size::new(300.0, 300.0),
            items: vec![SceneItem::EmptyState {
                message: EMPTY_STATE_MESSAGE.into(),
            }],
        };
        let svg = to_svg(&scene);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"x="150" y="150""#));
        assert!(svg.contains(EMPTY_STATE_MESSAGE));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn titles_are_escaped() {
        let scene = Scene {
            canvas: Size::new(300.0, 300.0),
            items: vec![SceneItem::Marker {
                node_id: "n".into(),
                center: Point::new(10.0, 20.0),
                radius: 22.0,
                active: true,
                title: "<b>&</b>".into(),
            }],
        };
        let svg = to_svg(&scene);
        assert!(svg.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
        assert!(svg.contains(r#"class="tree-node current""#));
    }
}
