//! Cascade Core - Nested Operation Interception
//!
//! Applies one interception to a root data operation and, independently, to
//! every nested sub-operation its arguments imply:
//! - Extracts nested writes, include/select shapes and relation filters
//! - Runs the interception for each of them concurrently
//! - Recomposes rewritten (and converted) sub-operations into one operation
//! - Correlates the executed result back to each sub-operation for
//!   post-processing
//!
//! # Example
//!
//! ```rust,ignore
//! use cascade_core::prelude::*;
//! use cascade_schema::StaticSchema;
//!
//! # async fn example(executor: Arc<dyn Executor>) -> Result<(), InterceptError> {
//! let schema = StaticSchema::new().one_to_many("User", "posts", "Post", "author");
//! let interceptor = NestedInterceptor::new(
//!     |descriptor: OperationDescriptor, next: Next| async move { next.run(descriptor).await },
//!     Arc::new(schema),
//! );
//!
//! let descriptor = OperationDescriptor::new(
//!     "User",
//!     WriteAction::Create,
//!     serde_json::json!({"data": {"posts": {"create": [{"title": "a"}]}}}),
//! );
//! let user = interceptor.execute(descriptor, executor).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod action;
pub mod config;
pub mod correlate;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod interceptor;
pub mod nested;
pub mod path;
pub mod recompose;
pub mod runner;
pub mod target;

// Re-exports for convenience
pub use action::{
    ensure_conversion, write_fields, Action, ActionCategory, FieldSlot, LogicalOperator, Modifier,
    QueryAction, ReadAction, WriteAction, NESTED_WRITE_FIELDS, ROOT_WRITE_FIELDS,
};
pub use config::{InterceptConfig, UnplaceablePolicy};
pub use correlate::{correlate, Slice, SliceItem, SliceParent};
pub use descriptor::{OperationDescriptor, Scope};
pub use error::InterceptError;
pub use extract::{Extractor, Seed};
pub use interceptor::{Executor, InterceptFuture, Interceptor, Next};
pub use nested::NestedInterceptor;
pub use path::{is_absent, ArgPath, PathSegment};
pub use recompose::recompose;
pub use runner::{reject_all, release_all, run_calls, NodeCall};
pub use target::{FilterTarget, LogicalStep, ReadTarget, Target, WriteTarget};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Cascade Core
    pub use crate::{
        Action, Executor, InterceptConfig, InterceptError, Interceptor, NestedInterceptor, Next,
        OperationDescriptor, QueryAction, ReadAction, WriteAction,
    };
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
