//! Request processing phases
//!
//! Decode, validate and update are depth-first walks: a node that is not
//! rendered prunes its whole subtree, otherwise its facets and children are
//! processed first and its own local action runs last. Rendering is split
//! into begin, children and end steps, each a no-op on a node that is not
//! rendered.
//!
//! The tree does not enforce phase order. The request driver calls phases
//! in whatever order it needs.

use std::sync::Arc;

use trellis_core::{Error, Result, Value};

use crate::context::RequestScope;
use crate::renderer::Renderer;
use crate::tree::{ComponentTree, NodeId};

/// One step of rendering a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodeStep {
    /// Opening output
    Begin,
    /// Output of the children, when the renderer takes it over
    Children,
    /// Closing output
    End,
}

impl ComponentTree {
    /// Whether a node takes part in processing and rendering.
    ///
    /// An explicitly set flag wins. Otherwise a `rendered` binding is
    /// consulted, and only a boolean `false` result hides the node.
    pub fn is_rendered(&self, scope: &dyn RequestScope, node: NodeId) -> Result<bool> {
        let found = self.node(node)?;
        if found.is_rendered_set() {
            return Ok(found.rendered_flag());
        }
        match found.value_expression("rendered") {
            Some(expression) => Ok(expression.evaluate(scope)? != Some(Value::Bool(false))),
            None => Ok(found.rendered_flag()),
        }
    }

    /// Renderer type, falling back to a `rendererType` binding
    pub fn renderer_type(&self, scope: &dyn RequestScope, node: NodeId) -> Result<Option<String>> {
        let found = self.node(node)?;
        if let Some(local) = found.local_renderer_type() {
            return Ok(Some(local.to_string()));
        }
        let Some(expression) = found.value_expression("rendererType") else {
            return Ok(None);
        };
        match expression.evaluate(scope)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(Error::Expression(format!(
                "rendererType of {} evaluated to {}",
                node,
                other.type_name()
            ))),
        }
    }

    /// Renderer selected for a node, if any
    pub fn renderer_for(
        &self,
        scope: &dyn RequestScope,
        node: NodeId,
    ) -> Result<Option<Arc<dyn Renderer>>> {
        let family = self.node(node)?.family();
        let Some(renderer_type) = self.renderer_type(scope, node)? else {
            log::debug!("No renderer type for node {} of family {}", node, family);
            return Ok(None);
        };

        let renderer = scope.renderer(family, &renderer_type);
        if renderer.is_none() {
            log::debug!(
                "No renderer for family {} and type {} (node {})",
                family,
                renderer_type,
                node
            );
        }
        Ok(renderer)
    }

    /// Whether the node's renderer encodes the node's children itself
    pub fn renders_children(&self, scope: &dyn RequestScope, node: NodeId) -> Result<bool> {
        Ok(self
            .renderer_for(scope, node)?
            .map_or(false, |renderer| renderer.renders_children()))
    }

    /// Run the renderer's decode hook; no-op without a renderer
    pub fn renderer_decode(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<()> {
        match self.renderer_for(&*scope, node)? {
            Some(renderer) => renderer.decode(scope, self, node),
            None => Ok(()),
        }
    }

    /// Run one of the renderer's encode hooks; no-op without a renderer
    pub fn renderer_encode(
        &mut self,
        scope: &mut dyn RequestScope,
        node: NodeId,
        step: EncodeStep,
    ) -> Result<()> {
        let Some(renderer) = self.renderer_for(&*scope, node)? else {
            return Ok(());
        };
        match step {
            EncodeStep::Begin => renderer.encode_begin(scope, self, node),
            EncodeStep::Children => renderer.encode_children(scope, self, node),
            EncodeStep::End => renderer.encode_end(scope, self, node),
        }
    }

    /// Local decode action of a single node
    pub fn decode(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<()> {
        self.kind(node)?.decode(scope, self, node)
    }

    /// Decode phase over a subtree.
    ///
    /// A failing local decode signals render-response on the scope before
    /// the failure is returned.
    pub fn process_decodes(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<()> {
        if !self.is_rendered(&*scope, node)? {
            log::trace!("Decode skipped subtree of unrendered node {}", node);
            return Ok(());
        }
        for kid in self.kids(node)? {
            self.process_decodes(scope, kid)?;
        }

        if let Err(err) = self.decode(scope, node) {
            log::warn!("Decode of node {} failed, rendering response: {}", node, err);
            scope.render_response();
            return Err(err);
        }
        Ok(())
    }

    /// Validation phase over a subtree
    pub fn process_validators(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<()> {
        if !self.is_rendered(&*scope, node)? {
            log::trace!("Validation skipped subtree of unrendered node {}", node);
            return Ok(());
        }
        for kid in self.kids(node)? {
            self.process_validators(scope, kid)?;
        }
        self.kind(node)?.validate(scope, self, node)
    }

    /// Model update phase over a subtree
    pub fn process_updates(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<()> {
        if !self.is_rendered(&*scope, node)? {
            log::trace!("Update skipped subtree of unrendered node {}", node);
            return Ok(());
        }
        for kid in self.kids(node)? {
            self.process_updates(scope, kid)?;
        }
        self.kind(node)?.update(scope, self, node)
    }

    /// Opening render step
    pub fn encode_begin(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<()> {
        self.encode_step(scope, node, EncodeStep::Begin)
    }

    /// Children render step
    pub fn encode_children(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<()> {
        self.encode_step(scope, node, EncodeStep::Children)
    }

    /// Closing render step
    pub fn encode_end(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<()> {
        self.encode_step(scope, node, EncodeStep::End)
    }

    /// Render a whole subtree.
    ///
    /// Children are rendered by the node's renderer when it claims them,
    /// otherwise each child is rendered in turn. Facets are left to the
    /// renderer.
    pub fn encode_all(&mut self, scope: &mut dyn RequestScope, node: NodeId) -> Result<()> {
        if !self.is_rendered(&*scope, node)? {
            log::trace!("Render skipped subtree of unrendered node {}", node);
            return Ok(());
        }

        self.encode_begin(scope, node)?;
        if self.renders_children(&*scope, node)? {
            self.encode_children(scope, node)?;
        } else {
            let children = self.children(node)?.to_vec();
            for child in children {
                self.encode_all(scope, child)?;
            }
        }
        self.encode_end(scope, node)
    }

    fn encode_step(
        &mut self,
        scope: &mut dyn RequestScope,
        node: NodeId,
        step: EncodeStep,
    ) -> Result<()> {
        if !self.is_rendered(&*scope, node)? {
            return Ok(());
        }
        self.kind(node)?.encode(scope, self, node, step)
    }
}
