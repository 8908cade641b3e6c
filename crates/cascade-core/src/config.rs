//! Interception configuration

use serde::{Deserialize, Serialize};

/// What to do with a converted sub-operation that has no slot in its parent
///
/// This happens when a parent was itself converted and none of the argument
/// fields its new action exposes holds data for the child's relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnplaceablePolicy {
    /// Drop the sub-operation and log a warning
    #[default]
    Drop,
    /// Fail the root operation with `InterceptError::Unplaceable`
    Reject,
}

/// Nested interception configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Maximum nesting depth followed by extraction
    pub max_depth: usize,
    /// Handling of sub-operations that cannot be recomposed
    pub unplaceable: UnplaceablePolicy,
    /// Record key used to re-associate rewritten list elements with their
    /// parent records
    pub identity_field: Option<String>,
}

impl InterceptConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With maximum nesting depth
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// With unplaceable sub-operation policy
    #[inline]
    #[must_use]
    pub fn with_unplaceable(mut self, policy: UnplaceablePolicy) -> Self {
        self.unplaceable = policy;
        self
    }

    /// With record identity field (`None` disables identity matching)
    #[inline]
    #[must_use]
    pub fn with_identity_field(mut self, field: Option<String>) -> Self {
        self.identity_field = field;
        self
    }
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            unplaceable: UnplaceablePolicy::Drop,
            identity_field: Some("id".to_string()),
        }
    }
}
