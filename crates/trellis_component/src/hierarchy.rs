//! Child list and facet table
//!
//! All structural mutation of the tree goes through these operations. Each
//! node entering a container is first erased from whatever container holds
//! it now, then given its new parent, then inserted. Each node leaving a
//! container has its parent cleared. Both steps happen inside one call, so
//! callers never observe a node listed by two parents or a listed node
//! pointing at the wrong parent.
//!
//! # Example
//!
//! ```ignore
//! let mut tree = ComponentTree::new();
//! let form = tree.create(NamingContainer::new("Form"))?;
//! let field = tree.create(BaseComponent::new("Input"))?;
//!
//! tree.append_child(form, field)?;
//! tree.put_facet(form, "header", tree.create(BaseComponent::new("Output"))?)?;
//! ```

use std::collections::BTreeMap;

use trellis_core::{Error, Result};

use crate::tree::{ComponentTree, NodeId};

impl ComponentTree {
    /// Children of a node in insertion order
    pub fn children(&self, node: NodeId) -> Result<&[NodeId]> {
        Ok(self.node(node)?.children())
    }

    /// Facets of a node by name
    pub fn facets(&self, node: NodeId) -> Result<&BTreeMap<String, NodeId>> {
        Ok(self.node(node)?.facets())
    }

    /// Facet registered under `name`
    pub fn facet(&self, node: NodeId, name: &str) -> Result<Option<NodeId>> {
        Ok(self.node(node)?.facet(name))
    }

    /// Number of children, without allocating anything
    pub fn child_count(&self, node: NodeId) -> Result<usize> {
        Ok(self.node(node)?.child_count())
    }

    /// Number of facets, without allocating anything
    pub fn facet_count(&self, node: NodeId) -> Result<usize> {
        Ok(self.node(node)?.facet_count())
    }

    /// Append a child at the end of the child list
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.prepare_attach(parent, child)?;
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Insert a child at `index`, shifting later children right.
    ///
    /// The index is interpreted after the child has been detached from its
    /// current position, which matters when it already belongs to `parent`.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.check_attachable(parent, child)?;
        let len_after_erase = self.child_count(parent)?
            - usize::from(self.node(child)?.parent == Some(parent)
                && self.node(parent)?.children.contains(&child));
        if index > len_after_erase {
            return Err(Error::InvalidArgument(format!(
                "child index {} out of bounds for {} children",
                index, len_after_erase
            )));
        }

        self.prepare_attach(parent, child)?;
        self.node_mut(parent)?.children.insert(index, child);
        Ok(())
    }

    /// Replace the child at `index`, returning the node it displaced.
    ///
    /// The displaced node is left detached.
    pub fn replace_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<NodeId> {
        self.check_attachable(parent, child)?;
        let current = self.child_at(parent, index)?;
        if current == child {
            return Ok(child);
        }

        self.erase_parent(child)?;
        // Erasing may have shifted the slot when the child was an earlier sibling.
        let index = self
            .node(parent)?
            .children
            .iter()
            .position(|&c| c == current)
            .ok_or_else(|| Error::IllegalTreeState(format!("child {} vanished", current)))?;

        self.node_mut(child)?.parent = Some(parent);
        let displaced = std::mem::replace(&mut self.node_mut(parent)?.children[index], child);
        self.detach(displaced)?;
        self.invalidate_client_ids(child)?;
        Ok(displaced)
    }

    /// Remove and return the child at `index`
    pub fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        self.child_at(parent, index)?;
        let removed = self.node_mut(parent)?.children.remove(index);
        self.detach(removed)?;
        Ok(removed)
    }

    /// Remove `child` from the child list; returns whether it was present
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<bool> {
        let position = self.node(parent)?.children.iter().position(|&c| c == child);
        match position {
            Some(index) => {
                self.remove_child_at(parent, index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Append several children in order
    pub fn append_children(
        &mut self,
        parent: NodeId,
        children: impl IntoIterator<Item = NodeId>,
    ) -> Result<()> {
        for child in children {
            self.append_child(parent, child)?;
        }
        Ok(())
    }

    /// Insert several children starting at `index`, keeping their order
    pub fn insert_children(
        &mut self,
        parent: NodeId,
        index: usize,
        children: impl IntoIterator<Item = NodeId>,
    ) -> Result<()> {
        let mut at = index;
        for child in children {
            self.insert_child(parent, at, child)?;
            at = self
                .node(parent)?
                .children
                .iter()
                .position(|&c| c == child)
                .map(|p| p + 1)
                .unwrap_or(at);
        }
        Ok(())
    }

    /// Remove every listed child that is present; returns how many were removed
    pub fn remove_children(&mut self, parent: NodeId, children: &[NodeId]) -> Result<usize> {
        let mut removed = 0;
        for &child in children {
            if self.remove_child(parent, child)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove all children, clearing each one's parent
    pub fn clear_children(&mut self, parent: NodeId) -> Result<()> {
        let removed = std::mem::take(&mut self.node_mut(parent)?.children);
        for child in removed {
            self.detach(child)?;
        }
        Ok(())
    }

    /// Register `facet` under `name`, returning the facet it displaced
    pub fn put_facet(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        facet: NodeId,
    ) -> Result<Option<NodeId>> {
        let name = name.into();
        self.prepare_attach(parent, facet)?;
        let previous = self.node_mut(parent)?.facets.insert(name, facet);
        match previous {
            Some(previous) if previous != facet => {
                self.detach(previous)?;
                Ok(Some(previous))
            }
            _ => Ok(None),
        }
    }

    /// Register several facets
    pub fn put_facets(
        &mut self,
        parent: NodeId,
        facets: impl IntoIterator<Item = (String, NodeId)>,
    ) -> Result<()> {
        for (name, facet) in facets {
            self.put_facet(parent, name, facet)?;
        }
        Ok(())
    }

    /// Remove and return the facet registered under `name`
    pub fn remove_facet(&mut self, parent: NodeId, name: &str) -> Result<Option<NodeId>> {
        let removed = self.node_mut(parent)?.facets.remove(name);
        if let Some(facet) = removed {
            self.detach(facet)?;
        }
        Ok(removed)
    }

    /// Remove all facets, clearing each one's parent
    pub fn clear_facets(&mut self, parent: NodeId) -> Result<()> {
        let removed = std::mem::take(&mut self.node_mut(parent)?.facets);
        for facet in removed.into_values() {
            self.detach(facet)?;
        }
        Ok(())
    }

    /// Remove a node from whichever container of its parent holds it.
    ///
    /// Afterwards the node has no parent. A parent that does not list the
    /// node is an [`Error::IllegalTreeState`].
    pub(crate) fn erase_parent(&mut self, node: NodeId) -> Result<()> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };

        let owner = self.node_mut(parent)?;
        if let Some(index) = owner.children.iter().position(|&c| c == node) {
            owner.children.remove(index);
        } else {
            let name = owner
                .facets
                .iter()
                .find(|(_, &f)| f == node)
                .map(|(name, _)| name.clone());
            match name {
                Some(name) => {
                    owner.facets.remove(&name);
                }
                None => {
                    return Err(Error::IllegalTreeState(format!(
                        "parent {} does not list node {}",
                        parent, node
                    )));
                }
            }
        }

        self.detach(node)
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Result<NodeId> {
        let children = &self.node(parent)?.children;
        children.get(index).copied().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "child index {} out of bounds for {} children",
                index,
                children.len()
            ))
        })
    }

    /// Reject attachments that would make a node its own ancestor
    fn check_attachable(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(child)?;
        if parent == child || self.is_ancestor(parent, child)? {
            return Err(Error::InvalidArgument(format!(
                "attaching {} under {} would create a cycle",
                child, parent
            )));
        }
        Ok(())
    }

    /// Erase-then-parent step shared by every inserting operation
    fn prepare_attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_attachable(parent, child)?;
        self.erase_parent(child)?;
        self.node_mut(child)?.parent = Some(parent);
        self.invalidate_client_ids(child)
    }

    fn detach(&mut self, node: NodeId) -> Result<()> {
        self.node_mut(node)?.parent = None;
        self.invalidate_client_ids(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::BaseComponent;

    fn tree_with(n: usize) -> (ComponentTree, Vec<NodeId>) {
        let mut tree = ComponentTree::new();
        let nodes = (0..n)
            .map(|_| tree.create(BaseComponent::default()).unwrap())
            .collect();
        (tree, nodes)
    }

    #[test]
    fn test_append_reparents() {
        let (mut tree, n) = tree_with(3);
        let (a, b, x) = (n[0], n[1], n[2]);

        tree.append_child(a, x).unwrap();
        assert_eq!(tree.parent(x).unwrap(), Some(a));

        tree.append_child(b, x).unwrap();
        assert_eq!(tree.parent(x).unwrap(), Some(b));
        assert!(tree.children(a).unwrap().is_empty());
        assert_eq!(tree.children(b).unwrap(), &[x]);
    }

    #[test]
    fn test_facet_then_child_moves_node() {
        let (mut tree, n) = tree_with(2);
        let (p, x) = (n[0], n[1]);

        tree.put_facet(p, "header", x).unwrap();
        assert_eq!(tree.facet(p, "header").unwrap(), Some(x));

        tree.append_child(p, x).unwrap();
        assert_eq!(tree.facet(p, "header").unwrap(), None);
        assert_eq!(tree.children(p).unwrap(), &[x]);
        assert_eq!(tree.parent(x).unwrap(), Some(p));

        tree.put_facet(p, "footer", x).unwrap();
        assert!(tree.children(p).unwrap().is_empty());
        assert_eq!(tree.facet(p, "footer").unwrap(), Some(x));
    }

    #[test]
    fn test_insert_preserves_order() {
        let (mut tree, n) = tree_with(4);
        let p = n[0];
        tree.append_children(p, [n[1], n[2]]).unwrap();
        tree.insert_child(p, 1, n[3]).unwrap();
        assert_eq!(tree.children(p).unwrap(), &[n[1], n[3], n[2]]);

        // Moving an existing child to the end of its own list.
        tree.insert_child(p, 2, n[1]).unwrap();
        assert_eq!(tree.children(p).unwrap(), &[n[3], n[2], n[1]]);

        assert!(matches!(
            tree.insert_child(p, 9, n[1]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_insert_children_keeps_order() {
        let (mut tree, n) = tree_with(5);
        let p = n[0];
        tree.append_child(p, n[1]).unwrap();
        tree.insert_children(p, 0, [n[2], n[3], n[4]]).unwrap();
        assert_eq!(tree.children(p).unwrap(), &[n[2], n[3], n[4], n[1]]);
    }

    #[test]
    fn test_replace_detaches_previous() {
        let (mut tree, n) = tree_with(4);
        let p = n[0];
        tree.append_children(p, [n[1], n[2]]).unwrap();

        let displaced = tree.replace_child(p, 1, n[3]).unwrap();
        assert_eq!(displaced, n[2]);
        assert_eq!(tree.parent(n[2]).unwrap(), None);
        assert_eq!(tree.children(p).unwrap(), &[n[1], n[3]]);

        // Replacing with an earlier sibling shifts the target slot.
        let displaced = tree.replace_child(p, 1, n[1]).unwrap();
        assert_eq!(displaced, n[3]);
        assert_eq!(tree.children(p).unwrap(), &[n[1]]);
    }

    #[test]
    fn test_remove_and_clear_reset_parent() {
        let (mut tree, n) = tree_with(5);
        let p = n[0];
        tree.append_children(p, [n[1], n[2], n[3]]).unwrap();
        tree.put_facet(p, "f", n[4]).unwrap();

        assert_eq!(tree.remove_child_at(p, 0).unwrap(), n[1]);
        assert_eq!(tree.parent(n[1]).unwrap(), None);
        assert!(!tree.remove_child(p, n[1]).unwrap());

        tree.clear_children(p).unwrap();
        assert_eq!(tree.parent(n[2]).unwrap(), None);
        assert_eq!(tree.parent(n[3]).unwrap(), None);

        tree.clear_facets(p).unwrap();
        assert_eq!(tree.parent(n[4]).unwrap(), None);
        assert_eq!(tree.facet_count(p).unwrap(), 0);
    }

    #[test]
    fn test_put_facet_displaces_previous() {
        let (mut tree, n) = tree_with(3);
        let p = n[0];
        assert_eq!(tree.put_facet(p, "header", n[1]).unwrap(), None);
        assert_eq!(tree.put_facet(p, "header", n[2]).unwrap(), Some(n[1]));
        assert_eq!(tree.parent(n[1]).unwrap(), None);
        assert_eq!(tree.put_facet(p, "header", n[2]).unwrap(), None);
        assert_eq!(tree.parent(n[2]).unwrap(), Some(p));

        assert_eq!(tree.remove_facet(p, "header").unwrap(), Some(n[2]));
        assert_eq!(tree.parent(n[2]).unwrap(), None);
        assert_eq!(tree.remove_facet(p, "header").unwrap(), None);
    }

    #[test]
    fn test_cycles_rejected() {
        let (mut tree, n) = tree_with(3);
        tree.append_child(n[0], n[1]).unwrap();
        tree.append_child(n[1], n[2]).unwrap();

        assert!(tree.append_child(n[0], n[0]).is_err());
        assert!(tree.append_child(n[2], n[0]).is_err());
        assert!(tree.put_facet(n[2], "loop", n[1]).is_err());
        // The failed attempt left the tree untouched.
        assert_eq!(tree.parent(n[1]).unwrap(), Some(n[0]));
    }

    #[test]
    fn test_erase_parent_detects_unlisted_node() {
        let (mut tree, n) = tree_with(2);
        tree.node_mut(n[1]).unwrap().parent = Some(n[0]);
        assert!(matches!(
            tree.append_child(n[0], n[1]),
            Err(Error::IllegalTreeState(_))
        ));
    }
}
