//! Paths into argument and result trees
//!
//! Provides [`ArgPath`] for addressing values inside a `serde_json::Value`
//! tree by object key and array index.

use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};

/// Single step of an [`ArgPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object key
    Key(String),
    /// Array position
    Index(usize),
}

/// Path within a value tree
///
/// # Examples
/// - `data.posts.create[1]` addresses the second nested create of `posts`
/// - `where.AND[0].author.is` addresses a relation filter inside `AND`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ArgPath(Vec<PathSegment>);

impl ArgPath {
    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Empty path (the tree itself)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append an object key
    #[inline]
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathSegment::Key(key.into()));
        self
    }

    /// Append an array index
    #[inline]
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    /// Append an optional key, skipping `None`
    #[inline]
    #[must_use]
    pub fn maybe_key(self, key: Option<&str>) -> Self {
        match key {
            Some(key) => self.key(key),
            None => self,
        }
    }

    /// Append an optional index, skipping `None`
    #[inline]
    #[must_use]
    pub fn maybe_index(self, index: Option<usize>) -> Self {
        match index {
            Some(index) => self.index(index),
            None => self,
        }
    }

    /// Concatenate another path
    #[inline]
    #[must_use]
    pub fn join(mut self, other: &Self) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.split_last().map(|(_, rest)| Self(rest.to_vec()))
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Value at this path
    #[must_use]
    pub fn get<'a>(&self, tree: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(tree, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object()?.get(key),
            PathSegment::Index(index) => node.as_array()?.get(*index),
        })
    }

    /// Mutable value at this path
    pub fn get_mut<'a>(&self, tree: &'a mut Value) -> Option<&'a mut Value> {
        self.0.iter().try_fold(tree, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object_mut()?.get_mut(key),
            PathSegment::Index(index) => node.as_array_mut()?.get_mut(*index),
        })
    }

    /// Write `value` at this path, creating intermediate objects
    ///
    /// `null` intermediates are replaced by objects. An index may address an
    /// existing element or the position just past the end. Returns `false`
    /// if the path runs through a scalar or out of bounds.
    pub fn set(&self, tree: &mut Value, value: Value) -> bool {
        let Some((last, prefix)) = self.0.split_last() else {
            *tree = value;
            return true;
        };

        let mut node = tree;
        for segment in prefix {
            node = match segment {
                PathSegment::Key(key) => {
                    if node.is_null() {
                        *node = Value::Object(Map::new());
                    }
                    let Some(map) = node.as_object_mut() else {
                        return false;
                    };
                    map.entry(key.clone())
                        .or_insert_with(|| Value::Object(Map::new()))
                }
                PathSegment::Index(index) => {
                    match node.as_array_mut().and_then(|items| items.get_mut(*index)) {
                        Some(item) => item,
                        None => return false,
                    }
                }
            };
        }

        match last {
            PathSegment::Key(key) => {
                if node.is_null() {
                    *node = Value::Object(Map::new());
                }
                match node.as_object_mut() {
                    Some(map) => {
                        map.insert(key.clone(), value);
                        true
                    }
                    None => false,
                }
            }
            PathSegment::Index(index) => match node.as_array_mut() {
                Some(items) if *index < items.len() => {
                    items[*index] = value;
                    true
                }
                Some(items) if *index == items.len() => {
                    items.push(value);
                    true
                }
                _ => false,
            },
        }
    }

    /// Remove the value at this path, preserving sibling order
    pub fn remove(&self, tree: &mut Value) -> Option<Value> {
        let (last, prefix) = self.0.split_last()?;
        let parent = Self(prefix.to_vec()).get_mut(tree)?;
        match last {
            PathSegment::Key(key) => parent.as_object_mut()?.shift_remove(key),
            PathSegment::Index(index) => {
                let items = parent.as_array_mut()?;
                (*index < items.len()).then(|| items.remove(*index))
            }
        }
    }
}

impl Display for ArgPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromIterator<PathSegment> for ArgPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// True for `null`, `false` and missing values
#[inline]
#[must_use]
pub fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null | Value::Bool(false)))
}
