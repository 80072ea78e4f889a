//! Node identity
//!
//! Local ids, client ids scoped by naming containers, and search
//! expressions resolving ids back to nodes.
//!
//! A client id joins the client id of the nearest naming-container ancestor
//! and the node's own id (or a generated one) with the configured separator,
//! then passes the result through the node's renderer. The result is cached
//! on the node until the id or the ancestry changes.

use trellis_core::{validate_id, Error, Result};

use crate::context::RequestScope;
use crate::tree::{ComponentTree, NodeId};

impl ComponentTree {
    /// Set or clear a node's local id.
    ///
    /// Fails with [`Error::InvalidIdentifier`] when the id breaks the id
    /// syntax. Cached client ids in the node's subtree are cleared.
    pub fn set_id(&mut self, node: NodeId, id: Option<&str>) -> Result<()> {
        if let Some(id) = id {
            validate_id(id)?;
        }
        self.node_mut(node)?.id = id.map(str::to_string);
        self.invalidate_client_ids(node)
    }

    /// Local id of a node
    pub fn id(&self, node: NodeId) -> Result<Option<&str>> {
        Ok(self.node(node)?.id())
    }

    /// Nearest ancestor acting as a naming container
    pub fn naming_container_of(&self, node: NodeId) -> Result<Option<NodeId>> {
        for ancestor in self.ancestors(node)? {
            if self.node(ancestor)?.is_naming_container() {
                return Ok(Some(ancestor));
            }
        }
        Ok(None)
    }

    /// Client id of a node, computing and caching it on first request
    pub fn client_id(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<String> {
        if let Some(cached) = self.node(node)?.cached_client_id() {
            return Ok(cached.to_string());
        }

        let container_id = match self.naming_container_of(node)? {
            Some(container) => Some(self.client_id(scope, container)?),
            None => None,
        };

        let local = match self.node(node)?.id() {
            Some(id) => id.to_string(),
            None => scope.create_unique_id(),
        };
        let mut client_id = match container_id {
            Some(prefix) => format!("{}{}{}", prefix, self.config().separator, local),
            None => local,
        };

        if let Some(renderer) = self.renderer_for(&*scope, node)? {
            client_id = renderer.convert_client_id(&*scope, client_id);
        }

        self.node_mut(node)?.client_id = Some(client_id.clone());
        Ok(client_id)
    }

    /// Resolve a search expression starting from `node`.
    ///
    /// A leading separator makes the search absolute from the root of the
    /// tree. Otherwise it starts at the nearest naming container enclosing
    /// `node` (or `node` itself when it is one), falling back to the root.
    /// Each separator-delimited segment is looked up below the current base
    /// without descending into nested naming containers; the first segment
    /// may also name the base itself. Every segment, intermediate ones
    /// included, may match any node's id, so `a/inner/b` resolves through a
    /// plain `inner` node as well as through a naming container.
    ///
    /// An unresolved intermediate segment fails with
    /// [`Error::ComponentNotFound`]; an unresolved last segment yields
    /// `Ok(None)`.
    pub fn find_component(&self, node: NodeId, expression: &str) -> Result<Option<NodeId>> {
        if expression.is_empty() {
            return Err(Error::InvalidArgument("empty search expression".into()));
        }

        let separator = self.config().separator;
        let (mut base, relative) = match expression.strip_prefix(separator) {
            Some(rest) => (self.root_of(node)?, rest),
            None => (self.search_base(node)?, expression),
        };

        let segments: Vec<&str> = relative.split(separator).collect();
        let last = segments.len() - 1;
        let mut result = None;
        for (i, segment) in segments.iter().enumerate() {
            result = self.search_below(base, segment)?;
            if i == 0 && result.is_none() && self.node(base)?.id() == Some(*segment) {
                result = Some(base);
            }
            match result {
                Some(found) => base = found,
                None if i < last => {
                    return Err(Error::ComponentNotFound(segment.to_string()));
                }
                None => {}
            }
        }
        Ok(result)
    }

    /// Find the node in `root`'s subtree whose client id equals `client_id`
    /// and run `callback` on it.
    ///
    /// Returns whether a node matched. Client ids are computed (and cached)
    /// for every node visited before the match.
    pub fn invoke_on_component<F>(
        &mut self,
        scope: &mut dyn RequestScope,
        root: NodeId,
        client_id: &str,
        callback: F,
    ) -> Result<bool>
    where
        F: FnOnce(&mut ComponentTree, &mut dyn RequestScope, NodeId) -> Result<()>,
    {
        for candidate in self.descendants(root)? {
            if self.client_id(scope, candidate)? == client_id {
                callback(self, scope, candidate)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn search_base(&self, node: NodeId) -> Result<NodeId> {
        let mut base = node;
        while let Some(parent) = self.node(base)?.parent() {
            if self.node(base)?.is_naming_container() {
                break;
            }
            base = parent;
        }
        Ok(base)
    }

    fn search_below(&self, base: NodeId, id: &str) -> Result<Option<NodeId>> {
        for kid in self.facets_and_children(base)? {
            let found = self.node(kid)?;
            if found.id() == Some(id) {
                return Ok(Some(kid));
            }
            if !found.is_naming_container() {
                if let Some(hit) = self.search_below(kid, id)? {
                    return Ok(Some(hit));
                }
            }
        }
        Ok(None)
    }
}
