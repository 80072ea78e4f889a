//! Facets-then-children traversal

use std::collections::btree_map;
use std::iter::FusedIterator;
use std::slice;

use trellis_core::Result;

use crate::tree::{ComponentTree, NodeId};

/// Single-pass iterator over a node's facets followed by its children.
///
/// Only the collections that are non-empty are traversed; no combined
/// collection is built.
#[derive(Debug, Clone)]
pub enum FacetsAndChildren<'a> {
    /// Neither facets nor children
    Empty,
    /// Facets only
    Facets(btree_map::Values<'a, String, NodeId>),
    /// Children only
    Children(slice::Iter<'a, NodeId>),
    /// Facets, then children
    Both {
        facets: btree_map::Values<'a, String, NodeId>,
        children: slice::Iter<'a, NodeId>,
    },
}

impl<'a> FacetsAndChildren<'a> {
    fn new(
        facets: &'a std::collections::BTreeMap<String, NodeId>,
        children: &'a [NodeId],
    ) -> Self {
        match (facets.is_empty(), children.is_empty()) {
            (true, true) => Self::Empty,
            (false, true) => Self::Facets(facets.values()),
            (true, false) => Self::Children(children.iter()),
            (false, false) => Self::Both {
                facets: facets.values(),
                children: children.iter(),
            },
        }
    }
}

impl Iterator for FacetsAndChildren<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        match self {
            Self::Empty => None,
            Self::Facets(facets) => facets.next().copied(),
            Self::Children(children) => children.next().copied(),
            Self::Both { facets, children } => {
                facets.next().or_else(|| children.next()).copied()
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = match self {
            Self::Empty => 0,
            Self::Facets(facets) => facets.len(),
            Self::Children(children) => children.len(),
            Self::Both { facets, children } => facets.len() + children.len(),
        };
        (len, Some(len))
    }
}

impl ExactSizeIterator for FacetsAndChildren<'_> {}

impl FusedIterator for FacetsAndChildren<'_> {}

impl ComponentTree {
    /// Iterate a node's facets, then its children
    pub fn facets_and_children(&self, node: NodeId) -> Result<FacetsAndChildren<'_>> {
        let found = self.node(node)?;
        Ok(FacetsAndChildren::new(found.facets(), found.children()))
    }

    /// Snapshot of the facets-then-children order, for walks that mutate
    /// the tree while visiting
    pub(crate) fn kids(&self, node: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.facets_and_children(node)?.collect())
    }

    /// Pre-order walk over a subtree, facets before children at every level
    pub fn descendants(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            order.push(current);
            let kids = self.facets_and_children(current)?;
            let start = stack.len();
            stack.extend(kids);
            stack[start..].reverse();
        }
        Ok(order)
    }
}
