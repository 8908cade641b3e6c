//! Action model
//!
//! Every operation, root or nested, carries an [`Action`]. Nested actions
//! fall into three categories (write, read-shape, filter); root-only query
//! actions form a fourth. Conversions are only legal inside a category.
//!
//! Which argument slots of a write may hold relation writes is kept as data
//! in [`NESTED_WRITE_FIELDS`] and [`ROOT_WRITE_FIELDS`].

use crate::error::InterceptError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Nested or root write action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteAction {
    Create,
    Update,
    Upsert,
    ConnectOrCreate,
    CreateMany,
    UpdateMany,
    Delete,
    DeleteMany,
    Connect,
    Disconnect,
}

impl WriteAction {
    /// All write actions, in the order nested writes are extracted
    pub const ALL: [Self; 10] = [
        Self::Create,
        Self::Update,
        Self::Upsert,
        Self::ConnectOrCreate,
        Self::CreateMany,
        Self::UpdateMany,
        Self::Delete,
        Self::DeleteMany,
        Self::Connect,
        Self::Disconnect,
    ];

    /// Argument key for this action
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Upsert => "upsert",
            Self::ConnectOrCreate => "connectOrCreate",
            Self::CreateMany => "createMany",
            Self::UpdateMany => "updateMany",
            Self::Delete => "delete",
            Self::DeleteMany => "deleteMany",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }

    /// Look up a write action by argument key
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }

    /// Whether a to-one relation accepts at most one of these per slot
    ///
    /// Converted operations landing on such a slot are merged field by
    /// field instead of being turned into an array.
    #[inline]
    #[must_use]
    pub fn is_singular(self) -> bool {
        matches!(
            self,
            Self::Update
                | Self::Create
                | Self::Delete
                | Self::Connect
                | Self::Disconnect
                | Self::Upsert
                | Self::ConnectOrCreate
        )
    }
}

/// Result-shaping action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadAction {
    Include,
    Select,
}

impl ReadAction {
    /// Both read actions
    pub const ALL: [Self; 2] = [Self::Include, Self::Select];

    /// Argument key for this action
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Select => "select",
        }
    }

    /// The read action that may be nested inside this one
    #[inline]
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::Include => Self::Select,
            Self::Select => Self::Include,
        }
    }
}

/// Root-only query action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryAction {
    FindUnique,
    FindUniqueOrThrow,
    FindFirst,
    FindFirstOrThrow,
    FindMany,
    Count,
    Aggregate,
    GroupBy,
}

impl QueryAction {
    /// All query actions
    pub const ALL: [Self; 8] = [
        Self::FindUnique,
        Self::FindUniqueOrThrow,
        Self::FindFirst,
        Self::FindFirstOrThrow,
        Self::FindMany,
        Self::Count,
        Self::Aggregate,
        Self::GroupBy,
    ];

    /// Action name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FindUnique => "findUnique",
            Self::FindUniqueOrThrow => "findUniqueOrThrow",
            Self::FindFirst => "findFirst",
            Self::FindFirstOrThrow => "findFirstOrThrow",
            Self::FindMany => "findMany",
            Self::Count => "count",
            Self::Aggregate => "aggregate",
            Self::GroupBy => "groupBy",
        }
    }
}

/// Category an action belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    Write,
    Read,
    Filter,
    Query,
}

/// Action of an operation descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    /// Nested or root write
    Write(WriteAction),
    /// Nested include/select
    Read(ReadAction),
    /// Nested where clause
    Where,
    /// Root-only query
    Query(QueryAction),
}

impl Action {
    /// Category of this action
    #[inline]
    #[must_use]
    pub fn category(self) -> ActionCategory {
        match self {
            Self::Write(_) => ActionCategory::Write,
            Self::Read(_) => ActionCategory::Read,
            Self::Where => ActionCategory::Filter,
            Self::Query(_) => ActionCategory::Query,
        }
    }

    /// Action name as used in operation arguments
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write(action) => action.as_str(),
            Self::Read(action) => action.as_str(),
            Self::Where => "where",
            Self::Query(action) => action.as_str(),
        }
    }

    /// Write action, if this is one
    #[inline]
    #[must_use]
    pub fn as_write(self) -> Option<WriteAction> {
        match self {
            Self::Write(action) => Some(action),
            _ => None,
        }
    }

    /// Read action, if this is one
    #[inline]
    #[must_use]
    pub fn as_read(self) -> Option<ReadAction> {
        match self {
            Self::Read(action) => Some(action),
            _ => None,
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = InterceptError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name == "where" {
            return Ok(Self::Where);
        }
        if let Some(action) = WriteAction::from_name(name) {
            return Ok(Self::Write(action));
        }
        if let Some(action) = ReadAction::ALL.into_iter().find(|a| a.as_str() == name) {
            return Ok(Self::Read(action));
        }
        QueryAction::ALL
            .into_iter()
            .find(|a| a.as_str() == name)
            .map(Self::Query)
            .ok_or_else(|| InterceptError::UnknownAction(name.to_string()))
    }
}

impl TryFrom<String> for Action {
    type Error = InterceptError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

impl From<WriteAction> for Action {
    fn from(action: WriteAction) -> Self {
        Self::Write(action)
    }
}

impl From<ReadAction> for Action {
    fn from(action: ReadAction) -> Self {
        Self::Read(action)
    }
}

impl From<QueryAction> for Action {
    fn from(action: QueryAction) -> Self {
        Self::Query(action)
    }
}

/// Check that a sub-operation may change from `from` to `to`
///
/// Writes may become other writes and read shapes other read shapes.
/// Filters cannot change at all, and no nested operation may become a
/// root query.
pub fn ensure_conversion(from: Action, to: Action) -> Result<(), InterceptError> {
    if to.category() == ActionCategory::Query {
        return Err(InterceptError::InvalidTargetAction { action: to });
    }
    match (from.category(), to.category()) {
        (ActionCategory::Write, ActionCategory::Write)
        | (ActionCategory::Read, ActionCategory::Read) => Ok(()),
        _ if from == to => Ok(()),
        _ => Err(InterceptError::InvalidActionChange { from, to }),
    }
}

/// List qualifier on a relation filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Modifier {
    Some,
    Every,
    None,
    Is,
    IsNot,
}

impl Modifier {
    /// All modifiers, in extraction order
    pub const ALL: [Self; 5] = [Self::Some, Self::Every, Self::None, Self::Is, Self::IsNot];

    /// Argument key for this modifier
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Some => "some",
            Self::Every => "every",
            Self::None => "none",
            Self::Is => "is",
            Self::IsNot => "isNot",
        }
    }
}

/// Logical combinator inside a where clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

impl LogicalOperator {
    /// All operators, in extraction order
    pub const ALL: [Self; 3] = [Self::And, Self::Or, Self::Not];

    /// Argument key for this operator
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
        }
    }
}

/// Argument slot holding relation writes; `None` means the args themselves
pub type FieldSlot = Option<&'static str>;

/// Slots of a nested write that may hold relation writes
pub const NESTED_WRITE_FIELDS: &[(WriteAction, &[FieldSlot])] = &[
    (WriteAction::Create, &[None]),
    (WriteAction::Update, &[None, Some("data")]),
    (WriteAction::Upsert, &[Some("update"), Some("create")]),
    (WriteAction::ConnectOrCreate, &[Some("create")]),
    (WriteAction::CreateMany, &[]),
    (WriteAction::UpdateMany, &[]),
    (WriteAction::Delete, &[]),
    (WriteAction::DeleteMany, &[]),
    (WriteAction::Connect, &[]),
    (WriteAction::Disconnect, &[]),
];

/// Slots of a root write that may hold relation writes
pub const ROOT_WRITE_FIELDS: &[(WriteAction, &[FieldSlot])] = &[
    (WriteAction::Create, &[Some("data")]),
    (WriteAction::Update, &[Some("data")]),
    (WriteAction::Upsert, &[Some("update"), Some("create")]),
];

/// Slots that may hold relation writes for `action`
#[must_use]
pub fn write_fields(action: WriteAction, nested: bool) -> &'static [FieldSlot] {
    let table = if nested {
        NESTED_WRITE_FIELDS
    } else {
        ROOT_WRITE_FIELDS
    };
    table
        .iter()
        .find(|(candidate, _)| *candidate == action)
        .map(|(_, fields)| *fields)
        .unwrap_or(&[])
}
