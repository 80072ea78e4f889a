//! Declared property tables
//!
//! Each node variant exposes a fixed set of named properties through typed
//! accessor/mutator functions. The table for a variant is built once, the
//! first time a node of that variant asks for it, and shared for the rest
//! of the process.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use trellis_core::{Error, Result, Value};

use crate::context::RequestScope;
use crate::kind::ComponentKind;
use crate::tree::{ComponentTree, NodeId};

/// Reads a declared property
pub type PropertyGetter = fn(&ComponentTree, &dyn RequestScope, NodeId) -> Result<Value>;

/// Writes a declared property
pub type PropertySetter = fn(&mut ComponentTree, NodeId, Value) -> Result<()>;

/// Accessor pair for one declared property
#[derive(Clone, Copy)]
pub struct PropertyDescriptor {
    getter: PropertyGetter,
    setter: Option<PropertySetter>,
}

impl PropertyDescriptor {
    /// Whether the property can be written
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Read the property
    pub fn read(&self, tree: &ComponentTree, scope: &dyn RequestScope, node: NodeId) -> Result<Value> {
        (self.getter)(tree, scope, node)
    }

    /// Write the property; read-only properties fail with
    /// [`Error::UnsupportedProperty`]
    pub fn write(&self, tree: &mut ComponentTree, node: NodeId, name: &str, value: Value) -> Result<()> {
        match self.setter {
            Some(setter) => setter(tree, node, value),
            None => Err(Error::UnsupportedProperty(format!(
                "property {} is read-only",
                name
            ))),
        }
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Named properties declared by one node variant
#[derive(Debug, Clone, Default)]
pub struct PropertyTable {
    properties: BTreeMap<String, PropertyDescriptor>,
}

impl PropertyTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding the properties every node has
    pub fn base() -> Self {
        let mut table = Self::new();
        table.read_write("id", base::id, base::set_id);
        table.read_write("rendered", base::rendered, base::set_rendered);
        table.read_write("rendererType", base::renderer_type, base::set_renderer_type);
        table.read_write("transient", base::transient, base::set_transient);
        table.read_only("family", base::family);
        table.read_only("childCount", base::child_count);
        table.read_only("facetCount", base::facet_count);
        table
    }

    /// Declare a read-only property, replacing any previous declaration
    pub fn read_only(&mut self, name: impl Into<String>, getter: PropertyGetter) -> &mut Self {
        self.properties.insert(
            name.into(),
            PropertyDescriptor {
                getter,
                setter: None,
            },
        );
        self
    }

    /// Declare a read/write property, replacing any previous declaration
    pub fn read_write(
        &mut self,
        name: impl Into<String>,
        getter: PropertyGetter,
        setter: PropertySetter,
    ) -> &mut Self {
        self.properties.insert(
            name.into(),
            PropertyDescriptor {
                getter,
                setter: Some(setter),
            },
        );
        self
    }

    /// Look up a property
    pub fn get(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    /// Check if a property is declared
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Declared property names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Number of declared properties
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Process-wide map from node variant type to its property table
#[derive(Default)]
pub struct PropertyRegistry {
    tables: RwLock<HashMap<TypeId, Arc<PropertyTable>>>,
}

impl PropertyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every tree that does not bring its own
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<PropertyRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(PropertyRegistry::new())))
    }

    /// Property table for the variant of `kind`, building it on first use
    pub fn table_for(&self, kind: &dyn ComponentKind) -> Arc<PropertyTable> {
        let type_id = Any::type_id(kind.as_any());
        if let Some(table) = self.tables.read().get(&type_id) {
            return Arc::clone(table);
        }

        let mut table = PropertyTable::base();
        kind.declare_properties(&mut table);

        // Another thread may have registered the variant in between; the
        // first table stored wins.
        let mut tables = self.tables.write();
        let entry = tables.entry(type_id).or_insert_with(|| {
            log::trace!(
                "Registered {} properties for family {}",
                table.len(),
                kind.family()
            );
            Arc::new(table)
        });
        Arc::clone(entry)
    }

    /// Register a variant ahead of first use
    pub fn register(&self, kind: &dyn ComponentKind) {
        self.table_for(kind);
    }

    /// Whether the variant with this type id has a table
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.tables.read().contains_key(&type_id)
    }

    /// Number of registered variants
    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

impl fmt::Debug for PropertyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRegistry")
            .field("variants", &self.len())
            .finish()
    }
}

impl ComponentTree {
    /// Property table for a node's variant
    pub fn property_table(&self, node: NodeId) -> Result<Arc<PropertyTable>> {
        let kind = self.kind(node)?;
        Ok(self.property_registry().table_for(kind.as_ref()))
    }
}

/// Expect a boolean property value
pub fn expect_bool(name: &str, value: &Value) -> Result<bool> {
    value.as_bool().ok_or_else(|| type_mismatch(name, "Bool", value))
}

/// Expect an optional string property value; `Null` clears
pub fn expect_optional_str<'v>(name: &str, value: &'v Value) -> Result<Option<&'v str>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(type_mismatch(name, "String", other)),
    }
}

fn type_mismatch(name: &str, expected: &str, value: &Value) -> Error {
    Error::InvalidArgument(format!(
        "property {} expects {}, got {}",
        name,
        expected,
        value.type_name()
    ))
}

mod base {
    use super::*;

    pub fn id(tree: &ComponentTree, _: &dyn RequestScope, node: NodeId) -> Result<Value> {
        Ok(tree.node(node)?.id().into())
    }

    pub fn set_id(tree: &mut ComponentTree, node: NodeId, value: Value) -> Result<()> {
        let id = expect_optional_str("id", &value)?;
        tree.set_id(node, id)
    }

    pub fn rendered(tree: &ComponentTree, scope: &dyn RequestScope, node: NodeId) -> Result<Value> {
        Ok(tree.is_rendered(scope, node)?.into())
    }

    pub fn set_rendered(tree: &mut ComponentTree, node: NodeId, value: Value) -> Result<()> {
        let rendered = expect_bool("rendered", &value)?;
        tree.set_rendered(node, rendered)
    }

    pub fn renderer_type(
        tree: &ComponentTree,
        scope: &dyn RequestScope,
        node: NodeId,
    ) -> Result<Value> {
        Ok(tree.renderer_type(scope, node)?.into())
    }

    pub fn set_renderer_type(tree: &mut ComponentTree, node: NodeId, value: Value) -> Result<()> {
        let renderer_type = expect_optional_str("rendererType", &value)?;
        tree.set_renderer_type(node, renderer_type)
    }

    pub fn transient(tree: &ComponentTree, _: &dyn RequestScope, node: NodeId) -> Result<Value> {
        Ok(tree.node(node)?.is_transient().into())
    }

    pub fn set_transient(tree: &mut ComponentTree, node: NodeId, value: Value) -> Result<()> {
        let transient = expect_bool("transient", &value)?;
        tree.set_transient(node, transient)
    }

    pub fn family(tree: &ComponentTree, _: &dyn RequestScope, node: NodeId) -> Result<Value> {
        Ok(tree.node(node)?.family().into())
    }

    pub fn child_count(tree: &ComponentTree, _: &dyn RequestScope, node: NodeId) -> Result<Value> {
        Ok(tree.node(node)?.child_count().into())
    }

    pub fn facet_count(tree: &ComponentTree, _: &dyn RequestScope, node: NodeId) -> Result<Value> {
        Ok(tree.node(node)?.facet_count().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{BaseComponent, NamingContainer};

    struct Labelled;

    impl ComponentKind for Labelled {
        fn family(&self) -> &str {
            "Labelled"
        }

        fn declare_properties(&self, table: &mut PropertyTable) {
            table.read_only("label", |_, _, _| Ok(Value::from("fixed")));
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_base_table() {
        let table = PropertyTable::base();
        assert!(table.get("id").unwrap().is_writable());
        assert!(table.get("rendered").unwrap().is_writable());
        assert!(!table.get("family").unwrap().is_writable());
        assert!(!table.contains("label"));
        assert_eq!(table.len(), 7);
    }

    #[test]
    fn test_registry_builds_once_per_variant() {
        let registry = PropertyRegistry::new();
        let first = registry.table_for(&Labelled);
        let second = registry.table_for(&Labelled);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.contains("label"));
        assert!(first.contains("id"));

        // Different families of the same variant type share one table.
        registry.register(&BaseComponent::new("A"));
        registry.register(&BaseComponent::new("B"));
        registry.register(&NamingContainer::default());
        assert_eq!(registry.len(), 3);
        assert!(registry.contains(TypeId::of::<NamingContainer>()));
    }

    #[test]
    fn test_registry_concurrent_lookup() {
        let registry = Arc::new(PropertyRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.table_for(&Labelled))
            })
            .collect();

        let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(tables.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_typed_setters_reject_wrong_type() {
        assert!(expect_bool("rendered", &Value::from("yes")).is_err());
        assert_eq!(expect_optional_str("id", &Value::Null).unwrap(), None);
        assert!(matches!(
            expect_optional_str("id", &Value::Int(1)),
            Err(Error::InvalidArgument(_))
        ));
    }
}
