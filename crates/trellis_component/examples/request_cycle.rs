//! Request cycle demonstration
//!
//! This example shows:
//! - Building a small view with a naming container
//! - Decoding submitted values through a renderer
//! - Rendering the view to markup
//! - Carrying the view state into a rebuilt tree

use std::sync::Arc;

use trellis_component::prelude::*;
use trellis_component::StateFormat;

struct FormRenderer;

impl Renderer for FormRenderer {
    fn encode_begin(
        &self,
        scope: &mut dyn RequestScope,
        tree: &mut ComponentTree,
        node: NodeId,
    ) -> Result<()> {
        let client_id = tree.client_id(scope, node)?;
        scope.write(&format!("<form id=\"{}\">", client_id));
        Ok(())
    }

    fn encode_end(
        &self,
        scope: &mut dyn RequestScope,
        _tree: &mut ComponentTree,
        _node: NodeId,
    ) -> Result<()> {
        scope.write("</form>");
        Ok(())
    }
}

struct TextRenderer;

impl Renderer for TextRenderer {
    fn decode(
        &self,
        scope: &mut dyn RequestScope,
        tree: &mut ComponentTree,
        node: NodeId,
    ) -> Result<()> {
        let client_id = tree.client_id(scope, node)?;
        if let Some(submitted) = scope.submitted_value(&client_id).map(str::to_string) {
            tree.attributes(node)?.put(&*scope, "value", Value::from(submitted))?;
        }
        Ok(())
    }

    fn encode_begin(
        &self,
        scope: &mut dyn RequestScope,
        tree: &mut ComponentTree,
        node: NodeId,
    ) -> Result<()> {
        let client_id = tree.client_id(scope, node)?;
        let value = tree
            .attributes(node)?
            .get(&*scope, "value")?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        scope.write(&format!("<input name=\"{}\" value=\"{}\"/>", client_id, value));
        Ok(())
    }
}

fn render_kit() -> RenderKit {
    RenderKit::new()
        .with_renderer("Form", "html", Arc::new(FormRenderer))
        .with_renderer("Input", "text", Arc::new(TextRenderer))
}

fn build(tree: &mut ComponentTree) -> Result<NodeId> {
    let root = tree.create(ViewRoot::new())?;
    let form = tree.create_with_id(NamingContainer::new("Form"), "signup")?;
    tree.set_renderer_type(form, Some("html"))?;
    tree.append_child(root, form)?;

    for id in ["first", "last"] {
        let field = tree.create_with_id(BaseComponent::new("Input"), id)?;
        tree.set_renderer_type(field, Some("text"))?;
        tree.append_child(form, field)?;
    }
    Ok(root)
}

fn main() -> Result<()> {
    env_logger::init();

    println!("Request Cycle Demo");
    println!("==================\n");

    // First request: decode a submission and render
    let mut tree = ComponentTree::new();
    let root = build(&mut tree)?;
    let mut ctx = RequestContext::new()
        .with_render_kit(render_kit())
        .with_submitted("signup/first", "Ada")
        .with_submitted("signup/last", "Lovelace");

    tree.process_decodes(&mut ctx, root)?;
    tree.process_validators(&mut ctx, root)?;
    tree.process_updates(&mut ctx, root)?;
    tree.encode_all(&mut ctx, root)?;
    println!("Rendered: {}", ctx.take_output());

    // End of request: capture state
    let state = tree
        .save_state(root)?
        .ok_or_else(|| Error::IllegalTreeState("view root is transient".into()))?;
    let blob = state.encode(StateFormat::Json)?;
    println!("Saved {} nodes in {} bytes", state.node_count(), blob.len());

    // Next request: rebuild the view and restore it
    let mut rebuilt = ComponentTree::new();
    let rebuilt_root = build(&mut rebuilt)?;
    rebuilt.restore_state(rebuilt_root, &NodeState::decode(&blob, StateFormat::Json)?)?;

    let mut ctx = RequestContext::new().with_render_kit(render_kit());
    rebuilt.encode_all(&mut ctx, rebuilt_root)?;
    println!("Restored: {}", ctx.take_output());

    Ok(())
}
