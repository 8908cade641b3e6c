//! Schema catalog trait and in-memory implementation
//!
//! The interception pipeline never inspects models directly; everything it
//! needs to know about the schema flows through [`SchemaCatalog`].

use crate::error::SchemaError;
use crate::relation::RelationDescriptor;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Source of per-model relation metadata
pub trait SchemaCatalog: Send + Sync + std::fmt::Debug {
    /// Relations declared on `model`, empty if the model has none or is unknown
    fn relations_of(&self, model: &str) -> &[RelationDescriptor];

    /// The other side of `relation`
    fn opposite_relation(&self, relation: &RelationDescriptor) -> Option<&RelationDescriptor> {
        self.relations_of(&relation.target_model)
            .iter()
            .find(|candidate| candidate.name == relation.opposite_relation_name)
    }
}

/// Catalog backed by an ordered model -> relations map
///
/// Relation order is declaration order, which is also the order in which
/// nested operations are extracted.
///
/// # Example
///
/// ```rust
/// use cascade_schema::{SchemaCatalog, StaticSchema};
///
/// let schema = StaticSchema::new()
///     .one_to_many("User", "posts", "Post", "author")
///     .one_to_one("User", "profile", "Profile", "user");
///
/// assert_eq!(schema.relations_of("User").len(), 2);
/// assert!(schema.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticSchema {
    models: IndexMap<String, Vec<RelationDescriptor>>,
}

impl StaticSchema {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from JSON and validate it
    ///
    /// The document has the shape
    /// `{"models": {"User": [{"name": "posts", "targetModel": "Post", ...}]}}`.
    pub fn from_json(document: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_json::from_str(document)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Declare a model with no relations (yet)
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.models.entry(model.into()).or_default();
        self
    }

    /// Add one relation side to `model`
    #[must_use]
    pub fn with_relation(mut self, model: impl Into<String>, relation: RelationDescriptor) -> Self {
        self.insert(model.into(), relation);
        self
    }

    /// Declare a one-to-many pair: `one.many_field` is a list of `many`,
    /// `many.one_field` points back to a single `one`
    #[must_use]
    pub fn one_to_many(self, one: &str, many_field: &str, many: &str, one_field: &str) -> Self {
        self.with_relation(one, RelationDescriptor::list(many_field, many, one_field))
            .with_relation(many, RelationDescriptor::single(one_field, one, many_field))
    }

    /// Declare a one-to-one pair
    #[must_use]
    pub fn one_to_one(self, a: &str, a_field: &str, b: &str, b_field: &str) -> Self {
        self.with_relation(a, RelationDescriptor::single(a_field, b, b_field))
            .with_relation(b, RelationDescriptor::single(b_field, a, a_field))
    }

    /// Declare a many-to-many pair
    #[must_use]
    pub fn many_to_many(self, a: &str, a_field: &str, b: &str, b_field: &str) -> Self {
        self.with_relation(a, RelationDescriptor::list(a_field, b, b_field))
            .with_relation(b, RelationDescriptor::list(b_field, a, a_field))
    }

    /// Known model names, in declaration order
    #[must_use]
    pub fn models(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    /// Check that every relation has a unique name on its model and a
    /// matching opposite side
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (model, relations) in &self.models {
            for (position, relation) in relations.iter().enumerate() {
                if relations[..position].iter().any(|r| r.name == relation.name) {
                    return Err(SchemaError::DuplicateRelation {
                        model: model.clone(),
                        relation: relation.name.clone(),
                    });
                }
                if !self.models.contains_key(&relation.target_model) {
                    return Err(SchemaError::UnknownModel(relation.target_model.clone()));
                }
                if self.opposite_relation(relation).is_none() {
                    return Err(SchemaError::MissingOpposite {
                        model: model.clone(),
                        relation: relation.name.clone(),
                        target: relation.target_model.clone(),
                        opposite: relation.opposite_relation_name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, model: String, relation: RelationDescriptor) {
        let target = relation.target_model.clone();
        self.models.entry(model).or_default().push(relation);
        self.models.entry(target).or_default();
    }
}

impl SchemaCatalog for StaticSchema {
    fn relations_of(&self, model: &str) -> &[RelationDescriptor] {
        self.models.get(model).map(Vec::as_slice).unwrap_or(&[])
    }
}
