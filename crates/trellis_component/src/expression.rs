//! Value expressions
//!
//! An expression is opaque to the tree: it is stored as text and resolved
//! through the request scope each time it is read. Results are never
//! cached on the node.

use serde::{Deserialize, Serialize};
use trellis_core::{Result, Value};

use crate::context::RequestScope;

/// Expression bound to a node property or attribute name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueExpression {
    expression: String,
}

impl ValueExpression {
    /// Wrap an expression string
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    /// The expression text
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate against the current request
    pub fn evaluate(&self, scope: &dyn RequestScope) -> Result<Option<Value>> {
        scope.evaluate(&self.expression)
    }
}
