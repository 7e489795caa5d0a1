use std::fmt::Write as _;

use crate::model::TitleNode;
use crate::xhtml::escape_attr;

/// One NCX navigation entry. Ids and play order are not stored; they are
/// assigned while the finished tree is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavPoint {
    pub label: String,
    pub href: String,
    pub children: Vec<NavPoint>,
}

impl NavPoint {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        NavPoint {
            label: label.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }

    /// Mirrors a TOC subtree; `dir` is the section directory relative to the NCX.
    pub fn from_title(node: &TitleNode, dir: &str) -> Self {
        NavPoint {
            label: node.title.clone(),
            href: format!("{}/{}", dir, node.target.href()),
            children: node
                .children
                .iter()
                .map(|child| NavPoint::from_title(child, dir))
                .collect(),
        }
    }
}

/// Deepest nesting in the tree; 0 for an empty map.
pub fn nav_depth(points: &[NavPoint]) -> usize {
    points
        .iter()
        .map(|p| 1 + nav_depth(&p.children))
        .max()
        .unwrap_or(0)
}

/// Writes the `navPoint` elements in pre-order, numbering `playOrder` and
/// `navPoint-N` ids from 1.
pub fn write_nav_points(out: &mut String, points: &[NavPoint]) {
    let mut play_order = 0;
    write_level(out, points, &mut play_order, 2);
}

fn write_level(out: &mut String, points: &[NavPoint], play_order: &mut usize, indent: usize) {
    let pad = "  ".repeat(indent);
    for point in points {
        *play_order += 1;
        let _ = writeln!(
            out,
            "{pad}<navPoint id=\"navPoint-{n}\" playOrder=\"{n}\">",
            n = *play_order
        );
        let _ = writeln!(
            out,
            "{pad}  <navLabel><text>{}</text></navLabel>",
            escape_attr(&point.label)
        );
        let _ = writeln!(out, "{pad}  <content src=\"{}\"/>", escape_attr(&point.href));
        write_level(out, &point.children, play_order, indent + 1);
        let _ = writeln!(out, "{pad}</navPoint>");
    }
}
