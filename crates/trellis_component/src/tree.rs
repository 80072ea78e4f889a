//! Component tree and node storage
//!
//! Nodes live in a generational arena owned by [`ComponentTree`]. Ownership
//! edges are the `children` sequence and the `facets` table; the `parent`
//! field is a plain back-reference handle and owns nothing. A node leaves
//! the arena only through [`ComponentTree::destroy`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use trellis_core::{Error, Handle, HandleMap, Result, Value};

use crate::attached::AttachedRegistry;
use crate::config::TreeConfig;
use crate::event::ComponentListener;
use crate::expression::ValueExpression;
use crate::kind::ComponentKind;
use crate::properties::PropertyRegistry;

/// Handle to a node stored in a [`ComponentTree`]
pub type NodeId = Handle<ComponentNode>;

/// One element of the retained tree
pub struct ComponentNode {
    pub(crate) id: Option<String>,
    pub(crate) client_id: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) facets: BTreeMap<String, NodeId>,
    pub(crate) rendered: bool,
    pub(crate) rendered_set: bool,
    pub(crate) renderer_type: Option<String>,
    pub(crate) attributes: BTreeMap<String, Value>,
    pub(crate) bindings: BTreeMap<String, ValueExpression>,
    pub(crate) listeners: Vec<Arc<dyn ComponentListener>>,
    pub(crate) transient: bool,
    pub(crate) kind: Arc<dyn ComponentKind>,
}

impl ComponentNode {
    fn new(kind: Arc<dyn ComponentKind>) -> Self {
        Self {
            id: None,
            client_id: None,
            parent: None,
            children: Vec::new(),
            facets: BTreeMap::new(),
            rendered: true,
            rendered_set: false,
            renderer_type: None,
            attributes: BTreeMap::new(),
            bindings: BTreeMap::new(),
            listeners: Vec::new(),
            transient: false,
            kind,
        }
    }

    /// Local id
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Client id computed by the last client id request, if still valid
    pub fn cached_client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Parent back-reference
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Facets by name
    pub fn facets(&self) -> &BTreeMap<String, NodeId> {
        &self.facets
    }

    /// Facet registered under `name`
    pub fn facet(&self, name: &str) -> Option<NodeId> {
        self.facets.get(name).copied()
    }

    /// Number of children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Number of facets
    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    /// Locally stored rendered flag, ignoring any bound expression
    pub fn rendered_flag(&self) -> bool {
        self.rendered
    }

    /// Whether the rendered flag was set explicitly
    pub fn is_rendered_set(&self) -> bool {
        self.rendered_set
    }

    /// Locally stored renderer type, ignoring any bound expression
    pub fn local_renderer_type(&self) -> Option<&str> {
        self.renderer_type.as_deref()
    }

    /// Whether the node is excluded from state capture
    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Overflow attribute bag
    pub fn overflow_attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Expression bound under `name`
    pub fn value_expression(&self, name: &str) -> Option<&ValueExpression> {
        self.bindings.get(name)
    }

    /// Registered listeners in registration order
    pub fn listeners(&self) -> &[Arc<dyn ComponentListener>] {
        &self.listeners
    }

    /// Node variant
    pub fn kind(&self) -> &Arc<dyn ComponentKind> {
        &self.kind
    }

    /// Family of the node variant
    pub fn family(&self) -> &str {
        self.kind.family()
    }

    /// Whether the node variant scopes ids
    pub fn is_naming_container(&self) -> bool {
        self.kind.is_naming_container()
    }
}

impl fmt::Debug for ComponentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentNode")
            .field("family", &self.kind.family())
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("facets", &self.facets)
            .field("rendered", &self.rendered)
            .field("transient", &self.transient)
            .finish()
    }
}

/// Arena of component nodes
pub struct ComponentTree {
    nodes: HandleMap<ComponentNode>,
    config: TreeConfig,
    properties: Arc<PropertyRegistry>,
    attached: Arc<AttachedRegistry>,
}

impl ComponentTree {
    /// Create an empty tree with the default configuration and the
    /// process-wide registries
    pub fn new() -> Self {
        Self {
            nodes: HandleMap::new(),
            config: TreeConfig::default(),
            properties: PropertyRegistry::global(),
            attached: AttachedRegistry::global(),
        }
    }

    /// Create an empty tree with a custom configuration
    pub fn with_config(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Use dedicated registries instead of the process-wide ones
    pub fn with_registries(
        mut self,
        properties: Arc<PropertyRegistry>,
        attached: Arc<AttachedRegistry>,
    ) -> Self {
        self.properties = properties;
        self.attached = attached;
        self
    }

    /// Tree configuration
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Registry of declared properties
    pub fn property_registry(&self) -> &Arc<PropertyRegistry> {
        &self.properties
    }

    /// Registry of attached-object factories
    pub fn attached_registry(&self) -> &Arc<AttachedRegistry> {
        &self.attached
    }

    /// Create an empty, detached node
    pub fn create(&mut self, kind: impl ComponentKind) -> Result<NodeId> {
        self.create_shared(Arc::new(kind))
    }

    /// Create an empty, detached node with a local id
    pub fn create_with_id(&mut self, kind: impl ComponentKind, id: &str) -> Result<NodeId> {
        let node = self.create(kind)?;
        self.set_id(node, Some(id))?;
        Ok(node)
    }

    /// Create an empty, detached node from an already shared kind
    pub fn create_shared(&mut self, kind: Arc<dyn ComponentKind>) -> Result<NodeId> {
        self.nodes.insert(ComponentNode::new(kind))
    }

    /// Detach a node and free it together with its whole subtree.
    ///
    /// Returns the number of nodes freed.
    pub fn destroy(&mut self, node: NodeId) -> Result<usize> {
        self.erase_parent(node)?;

        let mut stack = vec![node];
        let mut freed = 0;
        while let Some(current) = stack.pop() {
            if let Some(removed) = self.nodes.remove(current) {
                stack.extend(removed.facets.values().copied());
                stack.extend(removed.children.iter().copied());
                freed += 1;
            }
        }

        log::debug!("Destroyed node {} with {} nodes in its subtree", node, freed);
        Ok(freed)
    }

    /// Whether the handle refers to a live node
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow a node
    pub fn node(&self, node: NodeId) -> Result<&ComponentNode> {
        self.nodes
            .get(node)
            .ok_or_else(|| Error::StaleHandle(node.to_string()))
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> Result<&mut ComponentNode> {
        self.nodes
            .get_mut(node)
            .ok_or_else(|| Error::StaleHandle(node.to_string()))
    }

    /// Shared handle to a node's variant
    pub fn kind(&self, node: NodeId) -> Result<Arc<dyn ComponentKind>> {
        Ok(Arc::clone(&self.node(node)?.kind))
    }

    /// Borrow a node's variant as a concrete type
    pub fn kind_as<K: ComponentKind>(&self, node: NodeId) -> Result<&K> {
        let found = self.node(node)?;
        found.kind.as_any().downcast_ref::<K>().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "node {} of family {} is not a {}",
                node,
                found.kind.family(),
                std::any::type_name::<K>()
            ))
        })
    }

    /// Parent of a node
    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(node)?.parent)
    }

    /// All ancestors of a node, nearest first
    pub fn ancestors(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let mut ancestors = Vec::new();
        let mut current = self.node(node)?.parent;
        while let Some(parent) = current {
            if ancestors.len() >= self.config.max_depth {
                return Err(Error::IllegalTreeState(format!(
                    "ancestor chain of {} exceeds max depth {}",
                    node, self.config.max_depth
                )));
            }
            ancestors.push(parent);
            current = self.node(parent)?.parent;
        }
        Ok(ancestors)
    }

    /// Topmost ancestor of a node, or the node itself if it has no parent
    pub fn root_of(&self, node: NodeId) -> Result<NodeId> {
        Ok(self.ancestors(node)?.last().copied().unwrap_or(node))
    }

    /// Whether `ancestor` appears in the parent chain of `node`
    pub fn is_ancestor(&self, node: NodeId, ancestor: NodeId) -> Result<bool> {
        Ok(self.ancestors(node)?.contains(&ancestor))
    }

    /// Set the explicit rendered flag
    pub fn set_rendered(&mut self, node: NodeId, rendered: bool) -> Result<()> {
        let found = self.node_mut(node)?;
        found.rendered = rendered;
        found.rendered_set = true;
        Ok(())
    }

    /// Set the renderer type used to select a renderer
    pub fn set_renderer_type(&mut self, node: NodeId, renderer_type: Option<&str>) -> Result<()> {
        self.node_mut(node)?.renderer_type = renderer_type.map(str::to_string);
        Ok(())
    }

    /// Mark a node as excluded from (or included in) state capture
    pub fn set_transient(&mut self, node: NodeId, transient: bool) -> Result<()> {
        self.node_mut(node)?.transient = transient;
        Ok(())
    }

    /// Bind or unbind an expression under `name`.
    ///
    /// The `id` and `parent` names cannot be bound.
    pub fn set_value_expression(
        &mut self,
        node: NodeId,
        name: &str,
        expression: Option<ValueExpression>,
    ) -> Result<()> {
        if name == "id" || name == "parent" {
            return Err(Error::InvalidArgument(format!(
                "expression cannot be bound to {}",
                name
            )));
        }
        let found = self.node_mut(node)?;
        match expression {
            Some(expression) => {
                found.bindings.insert(name.to_string(), expression);
            }
            None => {
                found.bindings.remove(name);
            }
        }
        Ok(())
    }

    /// Clear cached client ids for a node and every node below it
    pub(crate) fn invalidate_client_ids(&mut self, node: NodeId) -> Result<()> {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let found = self.node_mut(current)?;
            found.client_id = None;
            stack.extend(found.facets.values().copied());
            stack.extend(found.children.iter().copied());
        }
        Ok(())
    }
}

impl Default for ComponentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTree")
            .field("nodes", &self.nodes.len())
            .field("config", &self.config)
            .finish()
    }
}
