//! Heading nesting and table of contents construction.
//!
//! Source heading levels need not start at 1 or be contiguous. The stack
//! maps them onto a properly nested hierarchy: the rendered level of a
//! heading is always the stack depth after it has been pushed.

use crate::model::{Target, TitleNode};

use super::styles::MAX_HEADING_LEVEL;

pub type NodeId = usize;

struct TocEntry {
    title: String,
    target: Target,
    children: Vec<NodeId>,
}

/// Arena of TOC entries, turned into a [`TitleNode`] tree at the end.
#[derive(Default)]
pub struct TocBuilder {
    entries: Vec<TocEntry>,
    roots: Vec<NodeId>,
}

impl TocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry at the top level or under `parent`.
    pub fn add(&mut self, parent: Option<NodeId>, title: String, target: Target) -> NodeId {
        let id = self.entries.len();
        self.entries.push(TocEntry {
            title,
            target,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.entries[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Vec<TitleNode> {
        // children are always added after their parent, so building from the
        // back finds every child already finished
        let mut built: Vec<Option<TitleNode>> = (0..self.entries.len()).map(|_| None).collect();
        for (id, entry) in self.entries.into_iter().enumerate().rev() {
            let children = entry
                .children
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            built[id] = Some(TitleNode {
                title: entry.title,
                target: entry.target,
                children,
            });
        }
        self.roots
            .iter()
            .filter_map(|&id| built[id].take())
            .collect()
    }
}

/// Where the next heading goes. Consumed by [`HeadingStack::push`].
#[derive(Debug, PartialEq, Eq)]
pub struct Placement {
    pub parent: Option<NodeId>,
    pub level: usize,
    raw_level: usize,
}

/// Ancestor chain of the current heading: (TOC node, raw source level),
/// bottom to top. Raw levels strictly increase from bottom to top.
pub struct HeadingStack {
    entries: Vec<(NodeId, usize)>,
    base: usize,
}

impl Default for HeadingStack {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadingStack {
    pub fn new() -> Self {
        HeadingStack {
            entries: Vec::new(),
            base: MAX_HEADING_LEVEL + 1,
        }
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Pops the stack for a heading at `raw_level` and reports its parent
    /// and rendered level.
    pub fn enter(&mut self, raw_level: usize) -> Placement {
        if raw_level < self.base {
            self.base = raw_level;
        }
        if raw_level == self.base {
            self.entries.clear();
        } else if let Some(&(_, top)) = self.entries.last() {
            if raw_level < top {
                while let Some(&(_, level)) = self.entries.last() {
                    if raw_level > level {
                        break;
                    }
                    self.entries.pop();
                }
            } else if raw_level == top {
                self.entries.pop();
            }
        }
        Placement {
            parent: self.entries.last().map(|&(node, _)| node),
            level: self.entries.len() + 1,
            raw_level,
        }
    }

    pub fn push(&mut self, placement: Placement, node: NodeId) {
        self.entries.push((node, placement.raw_level));
        debug_assert_eq!(self.entries.len(), placement.level);
    }
}
