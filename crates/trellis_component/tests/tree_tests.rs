//! Integration tests for trellis_component
//!
//! Builds small views, drives them through the request phases and carries
//! their state across trees.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use trellis_component::properties::expect_bool;
use trellis_component::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counts every local phase action run on the node
struct Tally {
    visits: Arc<AtomicUsize>,
}

impl ComponentKind for Tally {
    fn family(&self) -> &str {
        "Tally"
    }

    fn decode(&self, _: &mut dyn RequestScope, _: &mut ComponentTree, _: NodeId) -> Result<()> {
        self.visits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn validate(&self, _: &mut dyn RequestScope, _: &mut ComponentTree, _: NodeId) -> Result<()> {
        self.visits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn update(&self, _: &mut dyn RequestScope, _: &mut ComponentTree, _: NodeId) -> Result<()> {
        self.visits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn encode(
        &self,
        _: &mut dyn RequestScope,
        _: &mut ComponentTree,
        _: NodeId,
        _: EncodeStep,
    ) -> Result<()> {
        self.visits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Variant carrying its own saved value and a declared property
#[derive(Default)]
struct Spinner {
    value: Mutex<i64>,
    wrap: Mutex<bool>,
}

impl ComponentKind for Spinner {
    fn family(&self) -> &str {
        "Spinner"
    }

    fn declare_properties(&self, table: &mut PropertyTable) {
        table.read_write(
            "wrap",
            |tree, _, node| Ok((*tree.kind_as::<Spinner>(node)?.wrap.lock()).into()),
            |tree, node, value| {
                let wrap = expect_bool("wrap", &value)?;
                *tree.kind_as::<Spinner>(node)?.wrap.lock() = wrap;
                Ok(())
            },
        );
    }

    fn save_state(&self) -> Option<Value> {
        Some(Value::Int(*self.value.lock()))
    }

    fn restore_state(&self, state: &Value) -> Result<()> {
        let value = state
            .as_int()
            .ok_or_else(|| Error::StateMismatch("spinner state is not an integer".into()))?;
        *self.value.lock() = value;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct Greeter {
    greeting: String,
}

impl ComponentListener for Greeter {
    fn type_key(&self) -> &str {
        "test.Greeter"
    }

    fn save_state(&self) -> Option<Value> {
        Some(Value::from(self.greeting.as_str()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn registries() -> (Arc<PropertyRegistry>, Arc<AttachedRegistry>) {
    let attached = AttachedRegistry::new();
    attached.register("test.Greeter", |state| {
        let greeting = state
            .and_then(Value::as_str)
            .ok_or_else(|| Error::StateMismatch("greeter without greeting".into()))?;
        Ok(Arc::new(Greeter {
            greeting: greeting.to_string(),
        }) as Arc<dyn ComponentListener>)
    });
    (Arc::new(PropertyRegistry::new()), Arc::new(attached))
}

struct View {
    root: NodeId,
    form: NodeId,
    name: NodeId,
    spinner: NodeId,
    scratch: NodeId,
    header: NodeId,
}

/// root ─ form(naming) ─ [name, scratch(transient), spinner], header facet on form
fn build_view(tree: &mut ComponentTree) -> View {
    let root = tree.create_with_id(ViewRoot::new(), "view").unwrap();
    let form = tree.create_with_id(NamingContainer::new("Form"), "form").unwrap();
    let name = tree.create_with_id(BaseComponent::new("Input"), "name").unwrap();
    let scratch = tree.create(BaseComponent::new("Output")).unwrap();
    let spinner = tree.create_with_id(Spinner::default(), "count").unwrap();
    let header = tree.create_with_id(BaseComponent::new("Output"), "title").unwrap();

    tree.append_child(root, form).unwrap();
    tree.append_children(form, [name, scratch, spinner]).unwrap();
    tree.put_facet(form, "header", header).unwrap();
    tree.set_transient(scratch, true).unwrap();

    View {
        root,
        form,
        name,
        spinner,
        scratch,
        header,
    }
}

fn fresh_tree() -> ComponentTree {
    let (properties, attached) = registries();
    ComponentTree::new().with_registries(properties, attached)
}

#[test]
fn test_append_moves_node_between_parents() {
    let mut tree = ComponentTree::new();
    let a = tree.create(BaseComponent::default()).unwrap();
    let b = tree.create(BaseComponent::default()).unwrap();
    let x = tree.create(BaseComponent::default()).unwrap();

    tree.put_facet(a, "slot", x).unwrap();
    tree.append_child(b, x).unwrap();

    assert_eq!(tree.parent(x).unwrap(), Some(b));
    assert_eq!(tree.facet(a, "slot").unwrap(), None);
    assert!(!tree.children(a).unwrap().contains(&x));
    assert_eq!(tree.children(b).unwrap(), &[x]);
}

#[test]
fn test_facet_and_child_never_overlap() {
    let mut tree = ComponentTree::new();
    let p = tree.create(BaseComponent::default()).unwrap();
    let x = tree.create(BaseComponent::default()).unwrap();

    tree.put_facet(p, "header", x).unwrap();
    tree.append_child(p, x).unwrap();
    assert_eq!(tree.facet(p, "header").unwrap(), None);
    assert_eq!(tree.children(p).unwrap(), &[x]);

    tree.put_facet(p, "header", x).unwrap();
    assert_eq!(tree.facet(p, "header").unwrap(), Some(x));
    assert!(tree.children(p).unwrap().is_empty());
    assert_eq!(tree.facets_and_children(p).unwrap().count(), 1);
}

#[test]
fn test_state_round_trip_through_blob() {
    init_logging();
    let mut tree = fresh_tree();
    let view = build_view(&mut tree);
    let mut ctx = RequestContext::new();

    {
        let mut attrs = tree.attributes(view.name).unwrap();
        attrs.put(&ctx, "maxlength", Value::Int(40)).unwrap();
        attrs.put(&ctx, "placeholder", "Your name".into()).unwrap();
        attrs.put(&ctx, "rendererType", "text".into()).unwrap();
    }
    tree.set_rendered(view.header, false).unwrap();
    tree.set_value_expression(view.name, "title", Some(ValueExpression::new("#{hint}")))
        .unwrap();
    tree.add_listener(
        view.name,
        Arc::new(Greeter {
            greeting: "hello".into(),
        }),
    )
    .unwrap();
    *tree.kind_as::<Spinner>(view.spinner).unwrap().value.lock() = 7;
    assert_eq!(tree.client_id(&mut ctx, view.name).unwrap(), "form/name");

    let state = tree.save_state(view.root).unwrap().unwrap();
    let bytes = state.encode(StateFormat::Binary).unwrap();
    let decoded = NodeState::decode(&bytes, StateFormat::Binary).unwrap();

    let mut restored = fresh_tree();
    let copy = build_view(&mut restored);
    restored.set_id(copy.name, Some("renamed")).unwrap();
    restored.restore_state(copy.root, &decoded).unwrap();

    for (original, twin) in [
        (view.root, copy.root),
        (view.form, copy.form),
        (view.name, copy.name),
        (view.spinner, copy.spinner),
        (view.header, copy.header),
    ] {
        let a = tree.node(original).unwrap();
        let b = restored.node(twin).unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.rendered_flag(), b.rendered_flag());
        assert_eq!(a.is_rendered_set(), b.is_rendered_set());
        assert_eq!(a.local_renderer_type(), b.local_renderer_type());
        assert_eq!(a.overflow_attributes(), b.overflow_attributes());
        assert_eq!(a.cached_client_id(), b.cached_client_id());
    }

    let node = restored.node(copy.name).unwrap();
    assert_eq!(node.value_expression("title"), Some(&ValueExpression::new("#{hint}")));
    let greeters = restored.listeners_of::<Greeter>(copy.name).unwrap();
    assert_eq!(greeters.len(), 1);
    assert_eq!(greeters[0].greeting, "hello");
    assert_eq!(*restored.kind_as::<Spinner>(copy.spinner).unwrap().value.lock(), 7);
}

#[test]
fn test_transient_children_take_no_slot() {
    let mut tree = fresh_tree();
    let view = build_view(&mut tree);

    let state = tree.save_state(view.form).unwrap().unwrap();
    // name, spinner, header facet; scratch is left out
    assert_eq!(state.kids.len(), 3);
    assert_eq!(state.node_count(), 4);

    // A tree with the transient child moved elsewhere still restores.
    let mut other = fresh_tree();
    let copy = build_view(&mut other);
    other.remove_child(copy.form, copy.scratch).unwrap();
    other.append_child(copy.root, copy.scratch).unwrap();
    other.restore_state(copy.form, &state).unwrap();

    // Making the scratch node persistent changes the shape.
    let mut other = fresh_tree();
    let copy = build_view(&mut other);
    other.set_transient(copy.scratch, false).unwrap();
    assert!(matches!(
        other.restore_state(copy.form, &state),
        Err(Error::StateMismatch(_))
    ));
}

#[test]
fn test_restore_merges_listeners() {
    let mut tree = fresh_tree();
    let view = build_view(&mut tree);
    tree.add_listener(view.name, Arc::new(Greeter { greeting: "saved".into() }))
        .unwrap();
    let state = tree.save_state(view.root).unwrap().unwrap();

    let mut other = fresh_tree();
    let copy = build_view(&mut other);
    other
        .add_listener(copy.name, Arc::new(Greeter { greeting: "live".into() }))
        .unwrap();
    other.restore_state(copy.root, &state).unwrap();

    let greetings: Vec<_> = other
        .listeners_of::<Greeter>(copy.name)
        .unwrap()
        .iter()
        .map(|g| g.greeting.clone())
        .collect();
    assert_eq!(greetings, vec!["live", "saved"]);
}

#[test]
fn test_unknown_listener_type_fails_restore() {
    let mut tree = fresh_tree();
    let view = build_view(&mut tree);
    tree.add_listener(view.name, Arc::new(Greeter { greeting: "hi".into() }))
        .unwrap();
    let state = tree.save_state(view.root).unwrap().unwrap();

    // No factory for the greeter in this tree's registry.
    let mut other = ComponentTree::new()
        .with_registries(Arc::new(PropertyRegistry::new()), Arc::new(AttachedRegistry::new()));
    let copy = build_view(&mut other);
    assert!(matches!(
        other.restore_state(copy.root, &state),
        Err(Error::StateMismatch(_))
    ));
}

#[test]
fn test_deep_mismatch_leaves_tree_untouched() {
    init_logging();
    let mut tree = fresh_tree();
    let view = build_view(&mut tree);
    tree.set_id(view.root, Some("saved_root")).unwrap();
    tree.add_listener(view.root, Arc::new(Greeter { greeting: "hi".into() }))
        .unwrap();
    *tree.kind_as::<Spinner>(view.spinner).unwrap().value.lock() = 3;
    let state = tree.save_state(view.root).unwrap().unwrap();

    // The form lost its name field, two levels below the root.
    let mut other = fresh_tree();
    let copy = build_view(&mut other);
    other.set_id(copy.root, Some("live_root")).unwrap();
    other.remove_child(copy.form, copy.name).unwrap();

    for _ in 0..2 {
        assert!(matches!(
            other.restore_state(copy.root, &state),
            Err(Error::StateMismatch(_))
        ));
        assert_eq!(other.id(copy.root).unwrap(), Some("live_root"));
        assert!(other.listeners_of::<Greeter>(copy.root).unwrap().is_empty());
        assert_eq!(*other.kind_as::<Spinner>(copy.spinner).unwrap().value.lock(), 0);
    }
}

#[test]
fn test_set_id_never_leaves_stale_client_id() {
    let mut tree = ComponentTree::new();
    let view = build_view(&mut tree);
    let mut ctx = RequestContext::new();

    assert_eq!(tree.client_id(&mut ctx, view.spinner).unwrap(), "form/count");
    tree.set_id(view.spinner, Some("total")).unwrap();
    assert_eq!(tree.client_id(&mut ctx, view.spinner).unwrap(), "form/total");

    // Moving the node out of the form drops the container prefix.
    tree.append_child(view.root, view.spinner).unwrap();
    assert_eq!(tree.client_id(&mut ctx, view.spinner).unwrap(), "total");
}

#[test]
fn test_client_id_renderer_conversion_and_separator() {
    struct Upper;
    impl Renderer for Upper {
        fn convert_client_id(&self, _: &dyn RequestScope, client_id: String) -> String {
            client_id.to_uppercase()
        }
    }

    let mut tree = ComponentTree::with_config(TreeConfig::colon_separated()).unwrap();
    let view = build_view(&mut tree);
    tree.set_renderer_type(view.name, Some("upper")).unwrap();
    let kit = RenderKit::new().with_renderer("Input", "upper", Arc::new(Upper));
    let mut ctx = RequestContext::new().with_render_kit(kit);

    assert_eq!(tree.client_id(&mut ctx, view.name).unwrap(), "FORM:NAME");
    assert_eq!(tree.find_component(view.root, ":form:name").unwrap(), Some(view.name));
}

#[test]
fn test_find_component_absolute_and_scoped() {
    let mut tree = ComponentTree::new();
    let root = tree.create(ViewRoot::new()).unwrap();
    let a = tree.create_with_id(NamingContainer::default(), "a").unwrap();
    let b = tree.create_with_id(BaseComponent::default(), "b").unwrap();
    tree.append_child(root, a).unwrap();
    tree.append_child(a, b).unwrap();

    // A second container deeper down with its own `a/b`.
    let inner_a = tree.create_with_id(NamingContainer::default(), "a").unwrap();
    let inner_b = tree.create_with_id(BaseComponent::default(), "b").unwrap();
    let scope = tree.create_with_id(NamingContainer::default(), "scope").unwrap();
    let start = tree.create_with_id(BaseComponent::default(), "start").unwrap();
    tree.append_child(root, scope).unwrap();
    tree.append_children(scope, [start, inner_a]).unwrap();
    tree.append_child(inner_a, inner_b).unwrap();

    assert_eq!(tree.find_component(start, "/a/b").unwrap(), Some(b));
    assert_eq!(tree.find_component(start, "a/b").unwrap(), Some(inner_b));
    assert_eq!(tree.find_component(start, "scope").unwrap(), Some(scope));
    assert!(matches!(
        tree.find_component(start, "missing/b"),
        Err(Error::ComponentNotFound(_))
    ));
}

#[test]
fn test_queue_event_from_root_has_no_target() {
    let mut tree = ComponentTree::new();
    let view = build_view(&mut tree);
    assert_eq!(
        tree.queue_event(view.root, Box::new(ActionEvent::new(view.root))),
        Err(Error::NoEventTarget)
    );
    tree.queue_event(view.name, Box::new(ActionEvent::new(view.name)))
        .unwrap();
    assert_eq!(tree.broadcast_queued_events(view.root).unwrap(), 1);
}

#[test]
fn test_unrendered_node_prunes_every_phase() {
    init_logging();
    let mut tree = ComponentTree::new();
    let mut ctx = RequestContext::new();
    let visits = Arc::new(AtomicUsize::new(0));

    let root = tree.create(ViewRoot::new()).unwrap();
    let panel = tree.create(BaseComponent::new("Panel")).unwrap();
    let counted = tree
        .create(Tally {
            visits: visits.clone(),
        })
        .unwrap();
    let counted_facet = tree
        .create(Tally {
            visits: visits.clone(),
        })
        .unwrap();
    tree.append_child(root, panel).unwrap();
    tree.append_child(panel, counted).unwrap();
    tree.put_facet(panel, "footer", counted_facet).unwrap();

    let run_all = |tree: &mut ComponentTree, ctx: &mut RequestContext| {
        tree.process_decodes(ctx, root).unwrap();
        tree.process_validators(ctx, root).unwrap();
        tree.process_updates(ctx, root).unwrap();
        tree.encode_all(ctx, root).unwrap();
    };

    run_all(&mut tree, &mut ctx);
    // Two tallies, three processing phases plus begin/end for the counted child.
    assert_eq!(visits.load(Ordering::SeqCst), 2 * 3 + 2);

    visits.store(0, Ordering::SeqCst);
    tree.set_rendered(panel, false).unwrap();
    run_all(&mut tree, &mut ctx);
    assert_eq!(visits.load(Ordering::SeqCst), 0);

    // A binding evaluating to false hides the subtree just the same.
    let mut tree2 = ComponentTree::new();
    let host = tree2.create(BaseComponent::default()).unwrap();
    let inner = tree2.create(Tally { visits: visits.clone() }).unwrap();
    tree2.append_child(host, inner).unwrap();
    tree2
        .set_value_expression(host, "rendered", Some(ValueExpression::new("#{visible}")))
        .unwrap();
    let mut ctx2 = RequestContext::new().with_variable("visible", false);
    tree2.process_validators(&mut ctx2, host).unwrap();
    assert_eq!(visits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_variant_properties_through_attribute_view() {
    let mut tree = ComponentTree::new();
    let ctx = RequestContext::new();
    let spinner = tree.create(Spinner::default()).unwrap();

    let mut attrs = tree.attributes(spinner).unwrap();
    assert_eq!(attrs.get(&ctx, "wrap").unwrap(), Some(Value::Bool(false)));
    attrs.put(&ctx, "wrap", true.into()).unwrap();
    assert!(attrs.is_property("wrap"));
    assert_eq!(attrs.len().unwrap(), 0);
    drop(attrs);

    assert!(*tree.kind_as::<Spinner>(spinner).unwrap().wrap.lock());
}

#[test]
fn test_destroy_releases_subtree() {
    let mut tree = ComponentTree::new();
    let view = build_view(&mut tree);
    let before = tree.len();

    assert_eq!(tree.destroy(view.form).unwrap(), 5);
    assert_eq!(tree.len(), before - 5);
    assert!(tree.children(view.root).unwrap().is_empty());
    assert!(matches!(tree.node(view.name), Err(Error::StaleHandle(_))));
}
