//! # trellis_component - Retained Component Tree
//!
//! A tree of stateful UI nodes that lives across requests. Each request
//! runs a series of phases over the tree, and between requests the state of
//! the whole tree can be captured into a serializable blob and fed back into
//! a freshly built tree of the same shape.
//!
//! ## Architecture
//!
//! ```text
//! request driver ──► decode ──► validate ──► update ──► render
//!                       │                                  │
//!                       └──── Renderer (per family/type) ──┘
//!
//! end of request ──► save_state ──► NodeState ──► encode (json/binary)
//! next request   ──► decode blob ──► restore_state on a rebuilt tree
//! ```
//!
//! ## Key Concepts
//!
//! - **Node**: arena-owned element addressed by a [`NodeId`]; children and
//!   facets are the only ownership edges, the parent is a back-reference
//! - **Naming container**: variant that scopes client ids and searches
//! - **Facet**: named single-slot child, disjoint from the child list
//! - **Transient**: node left out of state capture and restore
//! - **Renderer**: external strategy encoding and decoding a node

pub mod attached;
pub mod attributes;
pub mod config;
pub mod context;
pub mod cursor;
pub mod event;
pub mod expression;
pub mod hierarchy;
pub mod identity;
pub mod kind;
pub mod lifecycle;
pub mod properties;
pub mod renderer;
pub mod state;
pub mod tree;

pub use attached::{AttachedRegistry, AttachedState, ListenerFactory, SavedAttached};
pub use attributes::AttributeView;
pub use config::TreeConfig;
pub use context::{RequestContext, RequestScope};
pub use cursor::FacetsAndChildren;
pub use event::{ActionEvent, ActionListener, ComponentEvent, ComponentListener};
pub use expression::ValueExpression;
pub use kind::{BaseComponent, ComponentKind, NamingContainer, ViewRoot};
pub use lifecycle::EncodeStep;
pub use properties::{
    PropertyDescriptor, PropertyGetter, PropertyRegistry, PropertySetter, PropertyTable,
};
pub use renderer::{RenderKit, Renderer};
pub use state::{ChildEntry, NodeState, OwnState, StateFormat};
pub use tree::{ComponentNode, ComponentTree, NodeId};

pub use trellis_core::{Error, Result, Value};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::context::{RequestContext, RequestScope};
    pub use crate::event::{ActionEvent, ActionListener, ComponentEvent, ComponentListener};
    pub use crate::kind::{BaseComponent, ComponentKind, NamingContainer, ViewRoot};
    pub use crate::renderer::{RenderKit, Renderer};
    pub use crate::state::{NodeState, StateFormat};
    pub use crate::tree::{ComponentTree, NodeId};
    pub use trellis_core::prelude::*;
}
