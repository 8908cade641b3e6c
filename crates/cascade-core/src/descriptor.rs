//! Operation descriptors
//!
//! An [`OperationDescriptor`] describes one operation, either the root
//! operation submitted by the host or a sub-operation implied by its
//! arguments. Sub-operations carry a [`Scope`] linking them to the
//! descriptor they were extracted from.

use crate::action::{Action, LogicalOperator, Modifier};
use cascade_schema::RelationPair;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Record describing one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    /// Model the operation acts on
    pub model: String,
    /// Operation kind
    pub action: Action,
    /// Operation payload, never interpreted beyond relation and action keys
    #[serde(default)]
    pub args: Value,
    /// Link to the parent operation; `None` for the root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    /// Passed through untouched to the executor
    #[serde(default)]
    pub run_in_transaction: bool,
    /// Host-maintained path of the operation; reset for sub-operations
    #[serde(default)]
    pub data_path: Vec<String>,
}

impl OperationDescriptor {
    /// Create new root descriptor
    #[inline]
    #[must_use]
    pub fn new(model: impl Into<String>, action: impl Into<Action>, args: Value) -> Self {
        Self {
            model: model.into(),
            action: action.into(),
            args,
            scope: None,
            run_in_transaction: false,
            data_path: Vec::new(),
        }
    }

    /// Mark as running inside a transaction
    #[inline]
    #[must_use]
    pub fn in_transaction(mut self) -> Self {
        self.run_in_transaction = true;
        self
    }

    /// Same operation with a different action and payload
    #[inline]
    #[must_use]
    pub fn with_action(mut self, action: impl Into<Action>, args: Value) -> Self {
        self.action = action.into();
        self.args = args;
        self
    }

    /// Check if this is a root operation
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.scope.is_none()
    }

    /// Descriptor this one was extracted from
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&OperationDescriptor> {
        self.scope.as_ref().map(|scope| scope.parent.as_ref())
    }

    /// Number of ancestors
    #[must_use]
    pub fn depth(&self) -> usize {
        std::iter::successors(self.parent(), |d| d.parent()).count()
    }
}

/// Linkage from a sub-operation back to its parent
///
/// The parent is shared as an immutable snapshot, so the ancestor chain
/// can be walked without any back references from parent to child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Descriptor the sub-operation was extracted from
    pub parent: Arc<OperationDescriptor>,
    /// Relation connecting parent and sub-operation
    pub relations: RelationPair,
    /// List qualifier that produced a filter sub-operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<Modifier>,
    /// Logical combinators traversed to reach a filter sub-operation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logical_operators: Vec<LogicalOperator>,
}

impl Scope {
    /// Create new scope
    #[inline]
    #[must_use]
    pub fn new(parent: Arc<OperationDescriptor>, relations: RelationPair) -> Self {
        Self {
            parent,
            relations,
            modifier: None,
            logical_operators: Vec::new(),
        }
    }
}
