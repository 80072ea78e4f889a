//! Node variants
//!
//! Every node carries a [`ComponentKind`] describing its family, whether it
//! scopes ids, which properties it declares and how it performs the local
//! action of each phase. The tree walks themselves are shared; a variant
//! only substitutes the per-node step.
//!
//! Kinds are held behind an `Arc` so a phase can call into the kind while
//! handing it mutable access to the tree. Variant data that changes over a
//! request therefore lives behind interior mutability.

use std::any::Any;
use std::fmt;

use parking_lot::Mutex;
use trellis_core::{Error, Result, Value};

use crate::context::RequestScope;
use crate::event::ComponentEvent;
use crate::lifecycle::EncodeStep;
use crate::properties::PropertyTable;
use crate::tree::{ComponentTree, NodeId};

/// Behaviour of one node variant
pub trait ComponentKind: Any + Send + Sync {
    /// Family used together with the renderer type to select a renderer
    fn family(&self) -> &str;

    /// Whether this node is an id-scoping boundary
    fn is_naming_container(&self) -> bool {
        false
    }

    /// Add variant-specific properties on top of the base property set
    fn declare_properties(&self, _table: &mut PropertyTable) {}

    /// Local decode action
    fn decode(
        &self,
        scope: &mut dyn RequestScope,
        tree: &mut ComponentTree,
        node: NodeId,
    ) -> Result<()> {
        tree.renderer_decode(scope, node)
    }

    /// Local validate action
    fn validate(
        &self,
        _scope: &mut dyn RequestScope,
        _tree: &mut ComponentTree,
        _node: NodeId,
    ) -> Result<()> {
        Ok(())
    }

    /// Local update action
    fn update(
        &self,
        _scope: &mut dyn RequestScope,
        _tree: &mut ComponentTree,
        _node: NodeId,
    ) -> Result<()> {
        Ok(())
    }

    /// Local action for one render step
    fn encode(
        &self,
        scope: &mut dyn RequestScope,
        tree: &mut ComponentTree,
        node: NodeId,
        step: EncodeStep,
    ) -> Result<()> {
        tree.renderer_encode(scope, node, step)
    }

    /// Offer an event travelling upward from a descendant.
    ///
    /// Returning the event passes it on to the parent; returning `None`
    /// means the event was accepted here.
    fn intercept_event(&self, event: Box<dyn ComponentEvent>) -> Option<Box<dyn ComponentEvent>> {
        Some(event)
    }

    /// Variant state captured alongside the node's own state
    fn save_state(&self) -> Option<Value> {
        None
    }

    /// Restore variant state captured by [`ComponentKind::save_state`]
    fn restore_state(&self, _state: &Value) -> Result<()> {
        Ok(())
    }

    /// Get as Any reference (for downcasting)
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentKind({})", self.family())
    }
}

/// Plain node with no behaviour beyond the shared tree walks
#[derive(Debug, Clone)]
pub struct BaseComponent {
    family: String,
}

impl BaseComponent {
    /// Create a base node of the given family
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
        }
    }
}

impl Default for BaseComponent {
    fn default() -> Self {
        Self::new("Base")
    }
}

impl ComponentKind for BaseComponent {
    fn family(&self) -> &str {
        &self.family
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Id-scoping boundary
///
/// Client ids of descendants are prefixed with this node's client id, and
/// relative searches starting inside it do not look past it.
#[derive(Debug, Clone)]
pub struct NamingContainer {
    family: String,
}

impl NamingContainer {
    /// Create a naming container of the given family
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
        }
    }
}

impl Default for NamingContainer {
    fn default() -> Self {
        Self::new("NamingContainer")
    }
}

impl ComponentKind for NamingContainer {
    fn family(&self) -> &str {
        &self.family
    }

    fn is_naming_container(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Root of a view: the sink for events queued by descendants
#[derive(Default)]
pub struct ViewRoot {
    events: Mutex<Vec<Box<dyn ComponentEvent>>>,
}

impl ViewRoot {
    /// Family name of view roots
    pub const FAMILY: &'static str = "ViewRoot";

    /// Create an empty view root
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events waiting to be broadcast
    pub fn pending_events(&self) -> usize {
        self.events.lock().len()
    }

    /// Take every queued event in queue order
    pub fn drain_events(&self) -> Vec<Box<dyn ComponentEvent>> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl fmt::Debug for ViewRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRoot")
            .field("pending_events", &self.pending_events())
            .finish()
    }
}

impl ComponentKind for ViewRoot {
    fn family(&self) -> &str {
        Self::FAMILY
    }

    fn intercept_event(&self, event: Box<dyn ComponentEvent>) -> Option<Box<dyn ComponentEvent>> {
        self.events.lock().push(event);
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ComponentTree {
    /// Broadcast every event queued on a view root to its source node.
    ///
    /// Returns the number of events delivered. Processing stops at the
    /// first listener failure; events not yet delivered are dropped.
    pub fn broadcast_queued_events(&mut self, root: NodeId) -> Result<usize> {
        let kind = self.kind(root)?;
        let view = kind.as_any().downcast_ref::<ViewRoot>().ok_or_else(|| {
            Error::InvalidArgument(format!("node {} is not a view root", root))
        })?;

        let events = view.drain_events();
        let count = events.len();
        for event in events {
            self.broadcast(event.source(), event.as_ref())?;
        }
        Ok(count)
    }
}
