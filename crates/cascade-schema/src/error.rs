//! Error types for schema catalogs

/// Schema catalog errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Model is not known to the catalog
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// Relation has no declared opposite side
    #[error("relation {model}.{relation} has no opposite relation {opposite} on {target}")]
    MissingOpposite {
        /// Owning model
        model: String,
        /// Relation field name
        relation: String,
        /// Model the relation points at
        target: String,
        /// Expected opposite field name
        opposite: String,
    },

    /// Relation declared twice on the same model
    #[error("duplicate relation {model}.{relation}")]
    DuplicateRelation {
        /// Owning model
        model: String,
        /// Relation field name
        relation: String,
    },

    /// Catalog document could not be parsed
    #[error("invalid schema document: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
