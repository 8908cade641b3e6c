//! Sub-operation targets
//!
//! A [`Target`] locates a sub-operation inside its parent's arguments and
//! names its action. Targets chain to their parent's target, so the chain
//! also yields the sub-operation's position in the result tree.

use crate::action::{ensure_conversion, Action, LogicalOperator, Modifier, ReadAction, WriteAction};
use crate::error::InterceptError;
use crate::path::ArgPath;
use std::sync::Arc;

/// Location of a sub-operation within its parent
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Nested write
    Write(WriteTarget),
    /// Nested include/select
    Read(ReadTarget),
    /// Nested relation filter
    Filter(FilterTarget),
}

/// Nested write location
#[derive(Debug, Clone, PartialEq)]
pub struct WriteTarget {
    /// Argument slot holding the relation (`data`, `create`, ...); `None`
    /// when the relation sits directly in the parent's args
    pub field: Option<String>,
    /// Relation field name
    pub relation_name: String,
    /// Write action
    pub action: WriteAction,
    /// Position in an array of identical actions
    pub index: Option<usize>,
    /// Enclosing sub-operation, `None` under the root
    pub parent: Option<Arc<Target>>,
}

/// Nested include/select location
#[derive(Debug, Clone, PartialEq)]
pub struct ReadTarget {
    /// Enclosing read shape when this one is nested inside the other
    /// (a `select` inside an `include` of the same relation)
    pub field: Option<ReadAction>,
    /// Relation field name
    pub relation_name: String,
    /// Read action
    pub action: ReadAction,
    /// Enclosing sub-operation, `None` under the root
    pub parent: Option<Arc<Target>>,
}

/// Nested relation filter location
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTarget {
    /// Relation field name
    pub relation_name: String,
    /// List qualifier the filter sits under
    pub modifier: Option<Modifier>,
    /// Logical operators traversed from the where clause to the relation
    pub operations: Vec<LogicalStep>,
    /// Set when this is the where clause of an include/select
    pub read_action: Option<ReadAction>,
    /// Enclosing sub-operation, `None` under the root
    pub parent: Option<Arc<Target>>,
}

/// One logical operator step, with the element index for array operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalStep {
    /// Operator key
    pub operator: LogicalOperator,
    /// Element position when the operand is an array
    pub index: Option<usize>,
}

impl Target {
    /// Action of the sub-operation
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Write(t) => Action::Write(t.action),
            Self::Read(t) => Action::Read(t.action),
            Self::Filter(_) => Action::Where,
        }
    }

    /// Relation the sub-operation belongs to
    #[must_use]
    pub fn relation_name(&self) -> &str {
        match self {
            Self::Write(t) => &t.relation_name,
            Self::Read(t) => &t.relation_name,
            Self::Filter(t) => &t.relation_name,
        }
    }

    /// Enclosing target
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<Target>> {
        match self {
            Self::Write(t) => t.parent.as_ref(),
            Self::Read(t) => t.parent.as_ref(),
            Self::Filter(t) => t.parent.as_ref(),
        }
    }

    /// Nesting depth, 1 for direct children of the root
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.parent().map_or(0, |parent| parent.depth())
    }

    /// Array position, for writes extracted from an array
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Write(t) => t.index,
            _ => None,
        }
    }

    /// Check if this is a filter target
    #[inline]
    #[must_use]
    pub fn is_filter(&self) -> bool {
        matches!(self, Self::Filter(_))
    }

    /// Check if `candidate` is this target's parent
    #[must_use]
    pub fn is_child_of(&self, candidate: &Arc<Target>) -> bool {
        self.parent()
            .is_some_and(|parent| Arc::ptr_eq(parent, candidate))
    }

    /// Same location with a different action
    ///
    /// The index is dropped: a converted operation is no longer one of the
    /// array it was extracted from.
    pub fn converted(&self, action: Action) -> Result<Self, InterceptError> {
        ensure_conversion(self.action(), action)?;
        match (self, action) {
            (Self::Write(t), Action::Write(action)) => Ok(Self::Write(WriteTarget {
                action,
                index: None,
                ..t.clone()
            })),
            (Self::Read(t), Action::Read(action)) => Ok(Self::Read(ReadTarget {
                action,
                ..t.clone()
            })),
            (Self::Filter(_), Action::Where) => Ok(self.clone()),
            _ => Err(InterceptError::InvalidTargetAction { action }),
        }
    }

    /// Path of the sub-operation's args relative to its parent's args
    #[must_use]
    pub fn args_path(&self) -> ArgPath {
        match self {
            Self::Write(t) => ArgPath::root()
                .maybe_key(t.field.as_deref())
                .key(&t.relation_name)
                .key(t.action.as_str())
                .maybe_index(t.index),
            Self::Read(t) => match t.field {
                Some(field) => ArgPath::root()
                    .key(field.as_str())
                    .key(&t.relation_name)
                    .key(t.action.as_str()),
                None => ArgPath::root().key(t.action.as_str()).key(&t.relation_name),
            },
            Self::Filter(t) => {
                if t.read_action.is_some() {
                    return ArgPath::root().key("where");
                }
                let base = match t.parent.as_deref() {
                    Some(Self::Filter(_)) => ArgPath::root(),
                    _ => ArgPath::root().key("where"),
                };
                t.operations
                    .iter()
                    .fold(base, |path, step| {
                        path.key(step.operator.as_str()).maybe_index(step.index)
                    })
                    .key(&t.relation_name)
                    .maybe_key(t.modifier.map(Modifier::as_str))
            }
        }
    }

    /// Relation names leading from the root result to this sub-operation's
    /// result, `None` for filters (they produce no result)
    #[must_use]
    pub fn result_path(&self) -> Option<Vec<String>> {
        if self.is_filter() {
            return None;
        }
        let mut path = match self.parent() {
            Some(parent) => parent.result_path()?,
            None => Vec::new(),
        };
        path.push(self.relation_name().to_string());
        Some(path)
    }

    /// Logical operators traversed to reach a filter
    #[must_use]
    pub fn logical_operators(&self) -> Vec<LogicalOperator> {
        match self {
            Self::Filter(t) => t.operations.iter().map(|step| step.operator).collect(),
            _ => Vec::new(),
        }
    }
}

impl WriteTarget {
    /// Path of the relation container (`field.relation`) in the parent's args
    #[must_use]
    pub fn container_path(&self, field: Option<&str>) -> ArgPath {
        ArgPath::root().maybe_key(field).key(&self.relation_name)
    }
}
