//! Listeners and events
//!
//! Listeners are registered per node in registration order. Events raised
//! by a node are queued upward through its ancestors until a variant
//! accepts them (a [`ViewRoot`](crate::kind::ViewRoot) accepts everything),
//! and are later broadcast to the listeners of their source node.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use trellis_core::{Error, Result, Value};

use crate::tree::{ComponentTree, NodeId};

/// Object registered on a node to receive events.
///
/// Listeners are saved with the node's state. The type key selects the
/// factory used to rebuild the listener on restore.
pub trait ComponentListener: Any + Send + Sync {
    /// Stable key naming the listener type
    fn type_key(&self) -> &str;

    /// Custom state to save; `None` rebuilds the listener from its type key alone
    fn save_state(&self) -> Option<Value> {
        None
    }

    /// Whether the listener is left out of saved state
    fn is_transient(&self) -> bool {
        false
    }

    /// View as an action listener
    fn as_action_listener(&self) -> Option<&dyn ActionListener> {
        None
    }

    /// Get as Any reference (for downcasting)
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn ComponentListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentListener({})", self.type_key())
    }
}

/// Event raised by a node
pub trait ComponentEvent: Any + Send + Sync {
    /// Node that raised the event
    fn source(&self) -> NodeId;

    /// Whether `listener` handles this kind of event
    fn is_appropriate_listener(&self, listener: &dyn ComponentListener) -> bool;

    /// Deliver the event to a listener accepted by
    /// [`ComponentEvent::is_appropriate_listener`]
    fn process_listener(&self, listener: &dyn ComponentListener) -> Result<()>;

    /// Get as Any reference (for downcasting)
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn ComponentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentEvent(source: {})", self.source())
    }
}

/// A node was activated (button press, link follow)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEvent {
    source: NodeId,
}

impl ActionEvent {
    /// Create an action event raised by `source`
    pub fn new(source: NodeId) -> Self {
        Self { source }
    }
}

impl ComponentEvent for ActionEvent {
    fn source(&self) -> NodeId {
        self.source
    }

    fn is_appropriate_listener(&self, listener: &dyn ComponentListener) -> bool {
        listener.as_action_listener().is_some()
    }

    fn process_listener(&self, listener: &dyn ComponentListener) -> Result<()> {
        match listener.as_action_listener() {
            Some(action) => action.process_action(self),
            None => Err(Error::InvalidArgument(format!(
                "listener {} does not handle action events",
                listener.type_key()
            ))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Listener for [`ActionEvent`]s.
///
/// Implementors return `Some(self)` from
/// [`ComponentListener::as_action_listener`].
pub trait ActionListener: ComponentListener {
    /// Handle an action; [`Error::AbortProcessing`] stops the broadcast
    fn process_action(&self, event: &ActionEvent) -> Result<()>;
}

impl ComponentTree {
    /// Register a listener at the end of the node's listener list
    pub fn add_listener(&mut self, node: NodeId, listener: Arc<dyn ComponentListener>) -> Result<()> {
        self.node_mut(node)?.listeners.push(listener);
        Ok(())
    }

    /// Unregister a listener by identity; returns whether it was registered
    pub fn remove_listener(
        &mut self,
        node: NodeId,
        listener: &Arc<dyn ComponentListener>,
    ) -> Result<bool> {
        let listeners = &mut self.node_mut(node)?.listeners;
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Registered listeners of one concrete type
    pub fn listeners_of<L: ComponentListener>(&self, node: NodeId) -> Result<Vec<&L>> {
        Ok(self
            .node(node)?
            .listeners()
            .iter()
            .filter_map(|l| l.as_any().downcast_ref::<L>())
            .collect())
    }

    /// Queue an event raised by `node`.
    ///
    /// The node itself never handles the event; it is offered to each
    /// ancestor in turn, nearest first. Fails with
    /// [`Error::NoEventTarget`] when the node has no parent or no ancestor
    /// accepts the event.
    pub fn queue_event(&mut self, node: NodeId, event: Box<dyn ComponentEvent>) -> Result<()> {
        let mut pending = event;
        for ancestor in self.ancestors(node)? {
            match self.kind(ancestor)?.intercept_event(pending) {
                Some(passed) => pending = passed,
                None => {
                    log::trace!("Event from {} accepted by {}", node, ancestor);
                    return Ok(());
                }
            }
        }
        Err(Error::NoEventTarget)
    }

    /// Deliver an event to the node's own listeners, in registration order,
    /// that the event considers appropriate.
    ///
    /// The first listener failure stops the broadcast and is returned.
    pub fn broadcast(&self, node: NodeId, event: &dyn ComponentEvent) -> Result<()> {
        for listener in self.node(node)?.listeners() {
            if event.is_appropriate_listener(listener.as_ref()) {
                event.process_listener(listener.as_ref())?;
            }
        }
        Ok(())
    }
}
