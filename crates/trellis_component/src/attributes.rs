//! Map view over a node's attributes
//!
//! Keys naming a declared property read and write through the property's
//! accessors. Every other key lives in the node's overflow bag. Only
//! overflow entries count towards the size of the view or show up when
//! iterating it.

use std::collections::btree_map;
use std::sync::Arc;

use trellis_core::{Error, Result, Value};

use crate::context::RequestScope;
use crate::properties::PropertyTable;
use crate::tree::{ComponentTree, NodeId};

/// Attribute map of one node
pub struct AttributeView<'a> {
    tree: &'a mut ComponentTree,
    node: NodeId,
    table: Arc<PropertyTable>,
}

impl<'a> AttributeView<'a> {
    /// Node this view belongs to
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether `key` names a declared property
    pub fn is_property(&self, key: &str) -> bool {
        self.table.contains(key)
    }

    /// Read an attribute.
    ///
    /// Declared properties come first, then the overflow bag, then an
    /// expression bound under the same key. Expression results are not
    /// cached.
    pub fn get(&self, scope: &dyn RequestScope, key: &str) -> Result<Option<Value>> {
        if let Some(property) = self.table.get(key) {
            let value = property.read(&*self.tree, scope, self.node)?;
            return Ok((!value.is_null()).then_some(value));
        }

        let node = self.tree.node(self.node)?;
        if let Some(value) = node.overflow_attributes().get(key) {
            return Ok(Some(value.clone()));
        }
        match node.value_expression(key) {
            Some(expression) => expression.evaluate(scope),
            None => Ok(None),
        }
    }

    /// Write an attribute, returning the previous value.
    ///
    /// Read-only properties fail with [`Error::UnsupportedProperty`]. A
    /// `Null` value for an overflow key fails with [`Error::InvalidKey`].
    pub fn put(
        &mut self,
        scope: &dyn RequestScope,
        key: &str,
        value: Value,
    ) -> Result<Option<Value>> {
        if let Some(property) = self.table.get(key).copied() {
            if !property.is_writable() {
                return Err(Error::UnsupportedProperty(format!(
                    "property {} is read-only",
                    key
                )));
            }
            let previous = property.read(&*self.tree, scope, self.node)?;
            property.write(self.tree, self.node, key, value)?;
            return Ok((!previous.is_null()).then_some(previous));
        }

        if value.is_null() {
            return Err(Error::InvalidKey(format!(
                "null value for attribute {}",
                key
            )));
        }
        Ok(self
            .tree
            .node_mut(self.node)?
            .attributes
            .insert(key.to_string(), value))
    }

    /// Write several attributes in order, stopping at the first failure
    pub fn put_all(
        &mut self,
        scope: &dyn RequestScope,
        entries: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<()> {
        for (key, value) in entries {
            self.put(scope, &key, value)?;
        }
        Ok(())
    }

    /// Remove an overflow attribute.
    ///
    /// Declared properties cannot be removed and fail with
    /// [`Error::UnsupportedProperty`].
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        if self.is_property(key) {
            return Err(Error::UnsupportedProperty(format!(
                "property {} cannot be removed",
                key
            )));
        }
        Ok(self.tree.node_mut(self.node)?.attributes.remove(key))
    }

    /// Whether an overflow attribute is stored under `key`.
    ///
    /// Declared properties are never reported as contained.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        if self.is_property(key) {
            return Ok(false);
        }
        Ok(self.overflow()?.contains_key(key))
    }

    /// Number of overflow attributes
    pub fn len(&self) -> Result<usize> {
        Ok(self.overflow()?.len())
    }

    /// Check if there are no overflow attributes
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.overflow()?.is_empty())
    }

    /// Overflow attribute keys in sorted order
    pub fn keys(&self) -> Result<impl Iterator<Item = &str> + '_> {
        Ok(self.overflow()?.keys().map(String::as_str))
    }

    /// Overflow attributes in key order
    pub fn iter(&self) -> Result<btree_map::Iter<'_, String, Value>> {
        Ok(self.overflow()?.iter())
    }

    /// Drop every overflow attribute; declared properties are untouched
    pub fn clear(&mut self) -> Result<()> {
        self.tree.node_mut(self.node)?.attributes.clear();
        Ok(())
    }

    fn overflow(&self) -> Result<&std::collections::BTreeMap<String, Value>> {
        Ok(self.tree.node(self.node)?.overflow_attributes())
    }
}

impl ComponentTree {
    /// Attribute view over a node
    pub fn attributes(&mut self, node: NodeId) -> Result<AttributeView<'_>> {
        let table = self.property_table(node)?;
        Ok(AttributeView {
            tree: self,
            node,
            table,
        })
    }
}
