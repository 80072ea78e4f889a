//! Request scope capability
//!
//! Every phase and state operation receives the current request explicitly.
//! The scope hands out unique ids, evaluates bound expressions, looks up
//! renderers, carries submitted values and collects rendered output.

use std::collections::HashMap;
use std::sync::Arc;

use trellis_core::{Result, UniqueIdGenerator, Value};

use crate::renderer::{RenderKit, Renderer};

/// Per-request services consumed by the tree
pub trait RequestScope {
    /// Produce an id unique within the current view
    fn create_unique_id(&mut self) -> String;

    /// Evaluate an expression; `Ok(None)` when it resolves to nothing
    fn evaluate(&self, expression: &str) -> Result<Option<Value>>;

    /// Ask the driver to skip the remaining processing phases and go
    /// straight to rendering
    fn render_response(&mut self);

    /// Whether [`RequestScope::render_response`] has been signalled
    fn is_render_response(&self) -> bool;

    /// Look up the renderer for a node family and renderer type
    fn renderer(&self, family: &str, renderer_type: &str) -> Option<Arc<dyn Renderer>>;

    /// Value submitted for the given client id, if any
    fn submitted_value(&self, _client_id: &str) -> Option<&str> {
        None
    }

    /// Append a fragment of rendered output
    fn write(&mut self, _fragment: &str) {}
}

/// In-memory request scope
#[derive(Debug, Default)]
pub struct RequestContext {
    ids: UniqueIdGenerator,
    variables: HashMap<String, Value>,
    submitted: HashMap<String, String>,
    render_kit: RenderKit,
    render_response: bool,
    output: String,
}

impl RequestContext {
    /// Create an empty request context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the render kit used for renderer lookups
    pub fn with_render_kit(mut self, render_kit: RenderKit) -> Self {
        self.render_kit = render_kit;
        self
    }

    /// Use a custom prefix for generated ids
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ids = UniqueIdGenerator::with_prefix(prefix);
        self
    }

    /// Bind a variable visible to expressions
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_variable(name, value);
        self
    }

    /// Record a submitted request value
    pub fn with_submitted(mut self, client_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.submitted.insert(client_id.into(), value.into());
        self
    }

    /// Bind or rebind a variable
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Access the render kit
    pub fn render_kit_mut(&mut self) -> &mut RenderKit {
        &mut self.render_kit
    }

    /// Output written so far
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Take the output, leaving the buffer empty
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Strip the `#{...}` delimiters from an expression, if present
    fn variable_name(expression: &str) -> &str {
        let trimmed = expression.trim();
        trimmed
            .strip_prefix("#{")
            .and_then(|rest| rest.strip_suffix('}'))
            .map(str::trim)
            .unwrap_or(trimmed)
    }
}

impl RequestScope for RequestContext {
    fn create_unique_id(&mut self) -> String {
        self.ids.next_id()
    }

    fn evaluate(&self, expression: &str) -> Result<Option<Value>> {
        Ok(self.variables.get(Self::variable_name(expression)).cloned())
    }

    fn render_response(&mut self) {
        self.render_response = true;
    }

    fn is_render_response(&self) -> bool {
        self.render_response
    }

    fn renderer(&self, family: &str, renderer_type: &str) -> Option<Arc<dyn Renderer>> {
        self.render_kit.renderer(family, renderer_type)
    }

    fn submitted_value(&self, client_id: &str) -> Option<&str> {
        self.submitted.get(client_id).map(String::as_str)
    }

    fn write(&mut self, fragment: &str) {
        self.output.push_str(fragment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_lookup() {
        let ctx = RequestContext::new().with_variable("user.admin", true);
        assert_eq!(ctx.evaluate("#{user.admin}").unwrap(), Some(Value::Bool(true)));
        assert_eq!(ctx.evaluate("user.admin").unwrap(), Some(Value::Bool(true)));
        assert_eq!(ctx.evaluate("#{missing}").unwrap(), None);
    }

    #[test]
    fn test_unique_ids_and_flags() {
        let mut ctx = RequestContext::new().with_id_prefix("gen");
        assert_eq!(ctx.create_unique_id(), "gen0");
        assert_eq!(ctx.create_unique_id(), "gen1");

        assert!(!ctx.is_render_response());
        ctx.render_response();
        assert!(ctx.is_render_response());
    }

    #[test]
    fn test_output_and_submitted_values() {
        let mut ctx = RequestContext::new().with_submitted("form/name", "Ada");
        assert_eq!(ctx.submitted_value("form/name"), Some("Ada"));
        assert_eq!(ctx.submitted_value("other"), None);

        ctx.write("<p>");
        ctx.write("</p>");
        assert_eq!(ctx.take_output(), "<p></p>");
        assert_eq!(ctx.output(), "");
    }
}
