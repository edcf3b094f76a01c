use serde::Serialize;

use crate::slug::slugify_or;
use crate::toc::{EntryKind, TocEntry};

/// Index of a node inside a [`TocTree`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TocNode {
    pub level: u8,
    pub title: String,
    pub slug: String,
    pub children: Vec<NodeId>,
    /// Bullets listed under the TOC node are represented by the TOC block;
    /// headings are sections of their own.
    pub kind: EntryKind,
    /// True for the node standing in for the TOC document itself.
    pub is_toc: bool,
    /// Position of the originating entry, `None` for the synthetic root.
    pub entry: Option<usize>,
}

/// Rooted tree rebuilt from the flat TOC entry list on every build.
#[derive(Clone, Debug, Serialize)]
pub struct TocTree {
    nodes: Vec<TocNode>,
    toc_node: Option<NodeId>,
}

impl TocTree {
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> &TocNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// The node marked as the TOC's own entry, if the TOC lists itself.
    pub fn toc_node(&self) -> Option<NodeId> {
        self.toc_node
    }

    /// Number of entry nodes (the synthetic root is not counted).
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry nodes in preorder: parents before children, children in order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeId> = self.children(self.root()).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }
}

/// Nests flat entries by level using a stack of open nodes seeded with a
/// level-0 root. Every entry becomes a child of the nearest preceding entry
/// with a strictly smaller level, so level jumps never drop an entry.
///
/// The first entry whose title equals `toc_title` (case-insensitive) is
/// marked as the TOC node.
pub fn build_tree(entries: &[TocEntry], toc_title: &str) -> TocTree {
    let mut nodes = vec![TocNode {
        level: 0,
        title: String::new(),
        slug: String::new(),
        children: Vec::new(),
        kind: EntryKind::Heading,
        is_toc: false,
        entry: None,
    }];
    let mut toc_node = None;
    let mut stack: Vec<NodeId> = vec![NodeId::ROOT];
    let wanted = toc_title.trim().to_lowercase();

    for (index, entry) in entries.iter().enumerate() {
        while let Some(top) = stack.last() {
            if *top != NodeId::ROOT && nodes[top.0].level >= entry.level {
                stack.pop();
            } else {
                break;
            }
        }

        let id = NodeId(nodes.len());
        let is_toc = toc_node.is_none() && entry.title.trim().to_lowercase() == wanted;
        if is_toc {
            toc_node = Some(id);
        }
        nodes.push(TocNode {
            level: entry.level,
            title: entry.title.clone(),
            slug: slugify_or(&entry.title, index + 1),
            children: Vec::new(),
            kind: entry.kind,
            is_toc,
            entry: Some(index),
        });

        let parent = stack.last().copied().unwrap_or(NodeId::ROOT);
        nodes[parent.0].children.push(id);
        stack.push(id);
    }

    TocTree { nodes, toc_node }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toc::DEFAULT_TOC_TITLE;

    fn entries(levels: &[u8]) -> Vec<TocEntry> {
        levels
            .iter()
            .enumerate()
            .map(|(i, level)| TocEntry::heading(*level, format!("Entry {i}")))
            .collect()
    }

    fn titles(tree: &TocTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| tree.node(*id).title.clone()).collect()
    }

    #[test]
    fn level_jump_nests_under_nearest_shallower_entry() {
        let tree = build_tree(&entries(&[2, 4, 3, 2]), DEFAULT_TOC_TITLE);
        let top = tree.children(tree.root());
        assert_eq!(titles(&tree, top), vec!["Entry 0", "Entry 3"]);
        assert_eq!(titles(&tree, tree.children(top[0])), vec!["Entry 1", "Entry 2"]);
    }

    #[test]
    fn every_parent_is_strictly_shallower() {
        let tree = build_tree(&entries(&[3, 1, 2, 2, 5, 4, 1, 6]), DEFAULT_TOC_TITLE);
        for id in tree.preorder() {
            for child in tree.children(id) {
                assert!(tree.node(*child).level > tree.node(id).level);
            }
        }
    }

    #[test]
    fn preorder_reproduces_source_order_for_all_small_sequences() {
        // Exhaustive over every level sequence of length 0..=5 with levels 1..=4.
        let mut sequences: Vec<Vec<u8>> = vec![Vec::new()];
        let mut frontier: Vec<Vec<u8>> = vec![Vec::new()];
        for _ in 0..5 {
            let mut next = Vec::new();
            for seq in &frontier {
                for level in 1..=4u8 {
                    let mut extended = seq.clone();
                    extended.push(level);
                    next.push(extended);
                }
            }
            sequences.extend(next.iter().cloned());
            frontier = next;
        }

        for levels in sequences {
            let input = entries(&levels);
            let tree = build_tree(&input, DEFAULT_TOC_TITLE);
            assert_eq!(tree.len(), input.len(), "{levels:?}");
            let order: Vec<usize> = tree
                .preorder()
                .into_iter()
                .map(|id| tree.node(id).entry.unwrap())
                .collect();
            let expected: Vec<usize> = (0..input.len()).collect();
            assert_eq!(order, expected, "{levels:?}");
        }
    }

    #[test]
    fn only_first_toc_title_is_marked() {
        let input = vec![
            TocEntry::heading(2, "Introduction"),
            TocEntry::heading(2, "table of contents"),
            TocEntry::heading(2, "Table of Contents"),
        ];
        let tree = build_tree(&input, DEFAULT_TOC_TITLE);
        let marked: Vec<_> = tree
            .preorder()
            .into_iter()
            .filter(|id| tree.node(*id).is_toc)
            .collect();
        assert_eq!(marked.len(), 1);
        assert_eq!(tree.toc_node(), Some(marked[0]));
        assert_eq!(tree.node(marked[0]).entry, Some(1));
    }

    #[test]
    fn tree_without_toc_entry_has_no_toc_node() {
        let tree = build_tree(&entries(&[2, 2]), DEFAULT_TOC_TITLE);
        assert_eq!(tree.toc_node(), None);
    }

    #[test]
    fn nodes_keep_entry_kind() {
        let input = vec![
            TocEntry::heading(2, "Table of Contents"),
            TocEntry {
                kind: EntryKind::ListItem,
                ..TocEntry::heading(3, "Scope")
            },
            TocEntry::heading(3, "Methods"),
        ];
        let tree = build_tree(&input, DEFAULT_TOC_TITLE);
        let kinds: Vec<_> = tree
            .preorder()
            .into_iter()
            .map(|id| tree.node(id).kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EntryKind::Heading, EntryKind::ListItem, EntryKind::Heading]
        );
    }
}
