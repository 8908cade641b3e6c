//! Relation metadata
//!
//! A [`RelationDescriptor`] describes one side of a relation between two
//! models. Relations always come in symmetric pairs; [`RelationPair`] holds
//! both sides as seen from a nested operation.

use serde::{Deserialize, Serialize};

/// One side of a relation, as declared on its owning model
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDescriptor {
    /// Field name on the owning model (e.g. `posts`)
    pub name: String,
    /// Model the relation points at (e.g. `Post`)
    pub target_model: String,
    /// Field name of the opposite side on `target_model` (e.g. `author`)
    pub opposite_relation_name: String,
    /// Whether the field holds many records
    pub is_list: bool,
}

impl RelationDescriptor {
    /// Create new relation descriptor
    #[inline]
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        target_model: impl Into<String>,
        opposite_relation_name: impl Into<String>,
        is_list: bool,
    ) -> Self {
        Self {
            name: name.into(),
            target_model: target_model.into(),
            opposite_relation_name: opposite_relation_name.into(),
            is_list,
        }
    }

    /// To-many relation
    #[inline]
    #[must_use]
    pub fn list(
        name: impl Into<String>,
        target_model: impl Into<String>,
        opposite_relation_name: impl Into<String>,
    ) -> Self {
        Self::new(name, target_model, opposite_relation_name, true)
    }

    /// To-one relation
    #[inline]
    #[must_use]
    pub fn single(
        name: impl Into<String>,
        target_model: impl Into<String>,
        opposite_relation_name: impl Into<String>,
    ) -> Self {
        Self::new(name, target_model, opposite_relation_name, false)
    }
}

/// Both sides of the relation a nested operation was reached through
///
/// `to` is declared on the parent model and points at the nested model,
/// `from` is declared on the nested model and points back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationPair {
    /// Parent -> nested side
    pub to: RelationDescriptor,
    /// Nested -> parent side
    pub from: RelationDescriptor,
}

impl RelationPair {
    /// Create new relation pair
    #[inline]
    #[must_use]
    pub fn new(to: RelationDescriptor, from: RelationDescriptor) -> Self {
        Self { to, from }
    }
}
