//! Renderer capability
//!
//! Renderers produce and consume the encoded form of a node. They are
//! selected by `(family, renderer type)` through the request scope, so the
//! tree itself never depends on an output format. A node without a renderer
//! type, or whose renderer cannot be found, simply skips the local action of
//! each phase.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use trellis_core::Result;

use crate::context::RequestScope;
use crate::tree::{ComponentTree, NodeId};

/// Encoding/decoding strategy for a family of nodes
pub trait Renderer: Send + Sync {
    /// Final conversion hook applied to a freshly computed client id
    fn convert_client_id(&self, _scope: &dyn RequestScope, client_id: String) -> String {
        client_id
    }

    /// Read submitted request values into the node
    fn decode(
        &self,
        _scope: &mut dyn RequestScope,
        _tree: &mut ComponentTree,
        _node: NodeId,
    ) -> Result<()> {
        Ok(())
    }

    /// Emit the opening part of the node
    fn encode_begin(
        &self,
        _scope: &mut dyn RequestScope,
        _tree: &mut ComponentTree,
        _node: NodeId,
    ) -> Result<()> {
        Ok(())
    }

    /// Emit the node's children; only called when [`Renderer::renders_children`]
    /// is true during a full encode
    fn encode_children(
        &self,
        _scope: &mut dyn RequestScope,
        _tree: &mut ComponentTree,
        _node: NodeId,
    ) -> Result<()> {
        Ok(())
    }

    /// Emit the closing part of the node
    fn encode_end(
        &self,
        _scope: &mut dyn RequestScope,
        _tree: &mut ComponentTree,
        _node: NodeId,
    ) -> Result<()> {
        Ok(())
    }

    /// Whether this renderer takes over encoding of the node's children
    fn renders_children(&self) -> bool {
        false
    }
}

/// Table of renderers keyed by `(family, renderer type)`
#[derive(Default, Clone)]
pub struct RenderKit {
    renderers: HashMap<(String, String), Arc<dyn Renderer>>,
}

impl RenderKit {
    /// Create an empty render kit
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a renderer, replacing any previous one for the same key
    pub fn add_renderer(
        &mut self,
        family: impl Into<String>,
        renderer_type: impl Into<String>,
        renderer: Arc<dyn Renderer>,
    ) -> &mut Self {
        self.renderers
            .insert((family.into(), renderer_type.into()), renderer);
        self
    }

    /// Builder-style registration
    pub fn with_renderer(
        mut self,
        family: impl Into<String>,
        renderer_type: impl Into<String>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        self.add_renderer(family, renderer_type, renderer);
        self
    }

    /// Look up a renderer
    pub fn renderer(&self, family: &str, renderer_type: &str) -> Option<Arc<dyn Renderer>> {
        self.renderers
            .get(&(family.to_string(), renderer_type.to_string()))
            .cloned()
    }

    /// Number of registered renderers
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl fmt::Debug for RenderKit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.renderers.keys().collect();
        keys.sort();
        f.debug_struct("RenderKit").field("renderers", &keys).finish()
    }
}
