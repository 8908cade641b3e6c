//! Cascade Schema
//!
//! Relation metadata consumed by nested operation interception.
//!
//! # Overview
//!
//! - **RelationDescriptor**: one side of a relation between two models
//! - **RelationPair**: both sides, as seen from a nested operation
//! - **SchemaCatalog**: per-model relation lookup
//! - **StaticSchema**: in-memory catalog with a builder and JSON loader
//!
//! # Example
//!
//! ```rust
//! use cascade_schema::{SchemaCatalog, StaticSchema};
//!
//! let schema = StaticSchema::new().one_to_many("User", "posts", "Post", "author");
//! let posts = &schema.relations_of("User")[0];
//! assert_eq!(schema.opposite_relation(posts).unwrap().name, "author");
//! ```

#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod relation;

// Re-exports
pub use catalog::{SchemaCatalog, StaticSchema};
pub use error::SchemaError;
pub use relation::{RelationDescriptor, RelationPair};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
