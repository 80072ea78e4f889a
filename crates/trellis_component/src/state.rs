//! Subtree state capture and restore
//!
//! The saved form of a node is a two-slot record: the node's own state and
//! a flat list holding one entry per non-transient child (in order) followed
//! by one named entry per non-transient facet. Own state is a fixed
//! positional record:
//!
//! ```text
//! [attributes?, listeners, client_id?, id?, rendered, rendered_set,
//!  renderer_type?, bindings?, variant_state?]
//! ```
//!
//! Restore walks an existing tree of the same shape and hands each node its
//! entry. The shape of every level is checked against the saved entries
//! before anything is written, and any difference is a
//! [`Error::StateMismatch`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use trellis_core::{validate_id, Error, Result, Value};

use crate::attached::AttachedState;
use crate::event::ComponentListener;
use crate::expression::ValueExpression;
use crate::tree::{ComponentTree, NodeId};

/// Serialization format of a saved state blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StateFormat {
    /// JSON (human readable)
    Json,
    /// Binary (compact)
    #[default]
    Binary,
}

/// Local state of a single node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "OwnStateSlots", into = "OwnStateSlots")]
pub struct OwnState {
    /// Overflow attributes, when there are any
    pub attributes: Option<BTreeMap<String, Value>>,
    /// Registered listeners
    pub listeners: AttachedState,
    /// Cached client id
    pub client_id: Option<String>,
    /// Local id
    pub id: Option<String>,
    /// Stored rendered flag
    pub rendered: bool,
    /// Whether the rendered flag was set explicitly
    pub rendered_set: bool,
    /// Local renderer type
    pub renderer_type: Option<String>,
    /// Expression bindings, when there are any
    pub bindings: Option<BTreeMap<String, ValueExpression>>,
    /// State saved by the node variant
    pub variant_state: Option<Value>,
}

#[derive(Serialize, Deserialize)]
struct OwnStateSlots(
    Option<BTreeMap<String, Value>>,
    AttachedState,
    Option<String>,
    Option<String>,
    bool,
    bool,
    Option<String>,
    Option<BTreeMap<String, ValueExpression>>,
    Option<Value>,
);

impl From<OwnStateSlots> for OwnState {
    fn from(s: OwnStateSlots) -> Self {
        Self {
            attributes: s.0,
            listeners: s.1,
            client_id: s.2,
            id: s.3,
            rendered: s.4,
            rendered_set: s.5,
            renderer_type: s.6,
            bindings: s.7,
            variant_state: s.8,
        }
    }
}

impl From<OwnState> for OwnStateSlots {
    fn from(s: OwnState) -> Self {
        Self(
            s.attributes,
            s.listeners,
            s.client_id,
            s.id,
            s.rendered,
            s.rendered_set,
            s.renderer_type,
            s.bindings,
            s.variant_state,
        )
    }
}

/// Saved state of a child or facet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChildEntry {
    /// State of the next non-transient child
    Child(NodeState),
    /// State of the facet with the given name
    Facet(String, NodeState),
}

/// Saved state of a node and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeStateSlots", into = "NodeStateSlots")]
pub struct NodeState {
    /// The node's own state
    pub own: OwnState,
    /// Children first, then facets
    pub kids: Vec<ChildEntry>,
}

#[derive(Serialize, Deserialize)]
struct NodeStateSlots(OwnState, Vec<ChildEntry>);

impl From<NodeStateSlots> for NodeState {
    fn from(s: NodeStateSlots) -> Self {
        Self { own: s.0, kids: s.1 }
    }
}

impl From<NodeState> for NodeStateSlots {
    fn from(s: NodeState) -> Self {
        Self(s.own, s.kids)
    }
}

impl NodeState {
    /// Encode to bytes
    pub fn encode(&self, format: StateFormat) -> Result<Vec<u8>> {
        match format {
            StateFormat::Json => {
                serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
            }
            StateFormat::Binary => {
                bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
            }
        }
    }

    /// Decode from bytes produced by [`NodeState::encode`]
    pub fn decode(bytes: &[u8], format: StateFormat) -> Result<Self> {
        match format {
            StateFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
            StateFormat::Binary => {
                bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
            }
        }
    }

    /// Number of nodes captured, this one included
    pub fn node_count(&self) -> usize {
        1 + self
            .kids
            .iter()
            .map(|entry| match entry {
                ChildEntry::Child(state) | ChildEntry::Facet(_, state) => state.node_count(),
            })
            .sum::<usize>()
    }
}

impl ComponentTree {
    /// Capture the state of a subtree; `None` when the node is transient
    pub fn save_state(&self, node: NodeId) -> Result<Option<NodeState>> {
        let found = self.node(node)?;
        if found.is_transient() {
            return Ok(None);
        }

        let own = self.save_own_state(node)?;
        let mut kids = Vec::with_capacity(found.child_count() + found.facet_count());
        for &child in found.children() {
            if let Some(state) = self.save_state(child)? {
                kids.push(ChildEntry::Child(state));
            }
        }
        for (name, &facet) in found.facets() {
            if let Some(state) = self.save_state(facet)? {
                kids.push(ChildEntry::Facet(name.clone(), state));
            }
        }
        Ok(Some(NodeState { own, kids }))
    }

    /// Capture the local state of one node
    pub fn save_own_state(&self, node: NodeId) -> Result<OwnState> {
        let found = self.node(node)?;
        let attributes = found.overflow_attributes();
        Ok(OwnState {
            attributes: (!attributes.is_empty()).then(|| attributes.clone()),
            listeners: AttachedState::list(found.listeners()),
            client_id: found.cached_client_id().map(str::to_string),
            id: found.id().map(str::to_string),
            rendered: found.rendered_flag(),
            rendered_set: found.is_rendered_set(),
            renderer_type: found.local_renderer_type().map(str::to_string),
            bindings: (!found.bindings.is_empty()).then(|| found.bindings.clone()),
            variant_state: found.kind().save_state(),
        })
    }

    /// Restore a subtree captured by [`ComponentTree::save_state`].
    ///
    /// The non-transient children and facets of every node must match the
    /// saved entries in number, order and facet names. The whole saved tree
    /// is checked, and its listeners rebuilt, before any node is touched, so
    /// a [`Error::StateMismatch`] leaves the subtree as it was. Only a failing
    /// variant restore can leave earlier variants already restored.
    pub fn restore_state(&mut self, node: NodeId, state: &NodeState) -> Result<()> {
        let mut plan = Vec::new();
        self.plan_restore(node, state, &mut plan)?;
        self.apply_restore(plan)
    }

    /// Restore the local state of one node.
    ///
    /// Saved listeners are appended to the node's current listeners. The
    /// overflow attributes are only replaced when some were saved.
    pub fn restore_own_state(&mut self, node: NodeId, own: &OwnState) -> Result<()> {
        let step = self.plan_own_state(node, own)?;
        self.apply_restore(vec![step])
    }

    /// Check `state` against the subtree at `node`, collecting one step per
    /// node in pre-order
    fn plan_restore<'s>(
        &self,
        node: NodeId,
        state: &'s NodeState,
        plan: &mut Vec<RestoreStep<'s>>,
    ) -> Result<()> {
        let (children, facets) = self.match_entries(node, state)?;
        plan.push(self.plan_own_state(node, &state.own)?);
        for (kid, kid_state) in children.into_iter().chain(facets) {
            self.plan_restore(kid, kid_state, plan)?;
        }
        Ok(())
    }

    fn plan_own_state<'s>(&self, node: NodeId, own: &'s OwnState) -> Result<RestoreStep<'s>> {
        if let Some(id) = &own.id {
            validate_id(id).map_err(|_| mismatch(node, format!("saved id {:?} is invalid", id)))?;
        }
        Ok(RestoreStep {
            node,
            own,
            listeners: self.attached_registry().restore_all(&own.listeners)?,
        })
    }

    fn apply_restore(&mut self, plan: Vec<RestoreStep<'_>>) -> Result<()> {
        for step in &plan {
            if let Some(variant_state) = &step.own.variant_state {
                self.kind(step.node)?.restore_state(variant_state)?;
            }
        }

        for RestoreStep { node, own, listeners } in plan {
            let found = self.node_mut(node)?;
            if let Some(attributes) = &own.attributes {
                found.attributes = attributes.clone();
            }
            found.listeners.extend(listeners);
            found.client_id = own.client_id.clone();
            found.id = own.id.clone();
            found.rendered = own.rendered;
            found.rendered_set = own.rendered_set;
            found.renderer_type = own.renderer_type.clone();
            found.bindings = own.bindings.clone().unwrap_or_default();
        }
        Ok(())
    }

    /// Pair the saved entries of `state` with the live children and facets
    /// of `node`
    #[allow(clippy::type_complexity)]
    fn match_entries<'s>(
        &self,
        node: NodeId,
        state: &'s NodeState,
    ) -> Result<(Vec<(NodeId, &'s NodeState)>, Vec<(NodeId, &'s NodeState)>)> {
        let found = self.node(node)?;

        let mut children = Vec::new();
        for &child in found.children() {
            if !self.node(child)?.is_transient() {
                children.push(child);
            }
        }
        let saved_children = state
            .kids
            .iter()
            .take_while(|entry| matches!(entry, ChildEntry::Child(_)))
            .count();
        if saved_children != children.len() {
            return Err(mismatch(
                node,
                format!(
                    "{} children saved, {} non-transient children present",
                    saved_children,
                    children.len()
                ),
            ));
        }
        let child_pairs = children
            .into_iter()
            .zip(state.kids.iter().filter_map(|entry| match entry {
                ChildEntry::Child(s) => Some(s),
                ChildEntry::Facet(..) => None,
            }))
            .collect();

        let mut facet_pairs = Vec::new();
        let mut seen = HashSet::new();
        for entry in &state.kids[saved_children..] {
            let ChildEntry::Facet(name, facet_state) = entry else {
                return Err(mismatch(node, "child entry found after facet entries".into()));
            };
            if !seen.insert(name.as_str()) {
                return Err(mismatch(node, format!("facet {} saved twice", name)));
            }
            let facet = found
                .facet(name)
                .ok_or_else(|| mismatch(node, format!("facet {} is missing", name)))?;
            if self.node(facet)?.is_transient() {
                return Err(mismatch(node, format!("facet {} is transient", name)));
            }
            facet_pairs.push((facet, facet_state));
        }

        let live_facets = found
            .facets()
            .values()
            .filter(|&&f| self.node(f).map_or(false, |n| !n.is_transient()))
            .count();
        if live_facets != facet_pairs.len() {
            return Err(mismatch(
                node,
                format!(
                    "{} facets saved, {} non-transient facets present",
                    facet_pairs.len(),
                    live_facets
                ),
            ));
        }

        Ok((child_pairs, facet_pairs))
    }
}

/// Checked restore of one node, applied once the whole subtree matched
struct RestoreStep<'s> {
    node: NodeId,
    own: &'s OwnState,
    listeners: Vec<Arc<dyn ComponentListener>>,
}

fn mismatch(node: NodeId, detail: String) -> Error {
    log::warn!("State restore mismatch at node {}: {}", node, detail);
    Error::StateMismatch(detail)
}
