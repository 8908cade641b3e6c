//! Error types for Cascade Core
//!
//! Provides error handling for:
//! - Invalid action conversions requested by an interception
//! - Malformed or unsupported nested operations
//! - Executor and interception failures
//! - Unwinding of the call tree after a failure
//!
//! [`InterceptError`] is `Clone`: one failure is delivered to the root
//! caller and to every sub-operation continuation still waiting.

use crate::action::Action;
use cascade_schema::SchemaError;

/// Main interception error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterceptError {
    /// Sub-operation changed action across categories
    #[error("invalid action change from {from} to {to}")]
    InvalidActionChange {
        /// Action as extracted
        from: Action,
        /// Action requested by the interception
        to: Action,
    },

    /// Action has no read, write or filter shape for a nested target
    #[error("action {action} is not valid for a nested operation")]
    InvalidTargetAction {
        /// Offending action
        action: Action,
    },

    /// Action name not recognised
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Backing executor failed
    #[error("executor failed: {0}")]
    Executor(String),

    /// Raised by an interception
    #[error("interception failed: {0}")]
    Interceptor(String),

    /// Interception finished without calling its continuation
    #[error("interception of nested {action} on {model} finished without calling next")]
    ContinuationDropped {
        /// Model of the nested operation
        model: String,
        /// Action of the nested operation
        action: Action,
    },

    /// Interception task panicked
    #[error("interception panicked: {0}")]
    Panicked(String),

    /// Continuation abandoned before a result was delivered
    #[error("operation cancelled")]
    Cancelled,

    /// Nesting deeper than configured
    #[error("nesting depth exceeded (max: {0})")]
    DepthExceeded(usize),

    /// Converted sub-operation has no slot in its parent
    #[error("no slot for nested {action} on relation {relation}")]
    Unplaceable {
        /// Relation the sub-operation belongs to
        relation: String,
        /// Action it was converted to
        action: Action,
    },

    /// Schema catalog error
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl InterceptError {
    /// Error raised from inside an interception
    #[inline]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Interceptor(message.into())
    }

    /// Error raised by an executor
    #[inline]
    pub fn executor(message: impl Into<String>) -> Self {
        Self::Executor(message.into())
    }

    /// Check if the error comes from an illegal action change
    #[inline]
    #[must_use]
    pub fn is_invalid_change(&self) -> bool {
        matches!(
            self,
            Self::InvalidActionChange { .. } | Self::InvalidTargetAction { .. }
        )
    }
}
