//! Result correlation
//!
//! Once the composite root operation has produced a result, every nested
//! call receives the slice of the result its relation produced, may
//! post-process it, and the processed slices are spliced back deepest
//! first.
//!
//! A slice drawn from a list of parents (posts of many users, or comments
//! of every post of a user) is delivered as one flat list. Each element's
//! owning parent is recorded in a side table of result paths; the result
//! itself is never annotated. Processed elements are matched back to the
//! originals by equality, then by identity field, then by position, each
//! original at most once.
//!
//! Calls sharing a result path (sibling writes on one relation, a `select`
//! nested in an `include`) each hold a copy of the same records: deeper
//! results are spliced into every copy, and parts a call left untouched are
//! not written back over its siblings.

use crate::config::InterceptConfig;
use crate::error::InterceptError;
use crate::path::ArgPath;
use crate::runner::NodeCall;
use futures::future::join_all;
use serde_json::Value;
use std::cmp::Reverse;
use tracing::trace;

/// Portion of the root result produced by one nested call
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    /// Relation names from the root result down to the slice
    pub path: Vec<String>,
    /// Records holding the relation
    pub parents: Vec<SliceParent>,
    /// Values drawn from the parents, in order
    pub items: Vec<SliceItem>,
    /// Gathered from a list of parents
    pub gathered: bool,
    /// Value handed to the call
    pub value: Value,
}

/// Record holding a sliced relation
#[derive(Debug, Clone, PartialEq)]
pub struct SliceParent {
    /// Location of the record in the root result
    pub pointer: ArgPath,
    /// Whether the relation value was a list
    pub was_list: bool,
}

/// One value of a slice
#[derive(Debug, Clone, PartialEq)]
pub struct SliceItem {
    /// Location in the root result
    pub pointer: ArgPath,
    /// Value as produced by the root operation
    pub value: Value,
    /// Position of the owning record in [`Slice::parents`]
    pub parent: usize,
}

impl Slice {
    /// Cut the slice at `path` out of `result`
    ///
    /// Returns `None` if no record holds a value for the relation.
    #[must_use]
    pub fn cut(result: &Value, path: &[String]) -> Option<Self> {
        let (relation, prefix) = path.split_last()?;

        let mut gathered = false;
        let mut nodes: Vec<ArgPath> = match result {
            Value::Array(items) => {
                gathered = true;
                (0..items.len()).map(|index| ArgPath::root().index(index)).collect()
            }
            _ => vec![ArgPath::root()],
        };
        for name in prefix {
            let mut expanded = Vec::new();
            for node in nodes {
                match node.get(result).and_then(|record| record.get(name)) {
                    Some(Value::Array(items)) => {
                        gathered = true;
                        let base = node.key(name);
                        expanded.extend(
                            items
                                .iter()
                                .enumerate()
                                .filter(|(_, item)| item.is_object())
                                .map(|(index, _)| base.clone().index(index)),
                        );
                    }
                    Some(Value::Object(_)) => expanded.push(node.key(name)),
                    _ => {}
                }
            }
            nodes = expanded;
        }

        if gathered {
            Self::gather(result, relation, path, nodes)
        } else {
            Self::single(result, relation, path, nodes.into_iter().next()?)
        }
    }

    fn single(result: &Value, relation: &str, path: &[String], parent: ArgPath) -> Option<Self> {
        let value = parent.get(result)?.get(relation)?;
        if value.is_null() {
            return None;
        }
        let base = parent.clone().key(relation);
        let items = match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| SliceItem {
                    pointer: base.clone().index(index),
                    value: item.clone(),
                    parent: 0,
                })
                .collect(),
            other => vec![SliceItem {
                pointer: base,
                value: other.clone(),
                parent: 0,
            }],
        };
        Some(Self {
            path: path.to_vec(),
            parents: vec![SliceParent {
                pointer: parent,
                was_list: value.is_array(),
            }],
            items,
            gathered: false,
            value: value.clone(),
        })
    }

    fn gather(result: &Value, relation: &str, path: &[String], nodes: Vec<ArgPath>) -> Option<Self> {
        let mut parents = Vec::new();
        let mut items = Vec::new();
        for node in nodes {
            let Some(value) = node.get(result).and_then(|record| record.get(relation)) else {
                continue;
            };
            let parent = parents.len();
            let base = node.clone().key(relation);
            match value {
                Value::Array(elements) => {
                    items.extend(
                        elements
                            .iter()
                            .enumerate()
                            .filter(|(_, element)| element.is_object())
                            .map(|(index, element)| SliceItem {
                                pointer: base.clone().index(index),
                                value: element.clone(),
                                parent,
                            }),
                    );
                }
                Value::Object(_) => items.push(SliceItem {
                    pointer: base,
                    value: value.clone(),
                    parent,
                }),
                _ => continue,
            }
            parents.push(SliceParent {
                pointer: node,
                was_list: value.is_array(),
            });
        }
        if parents.is_empty() {
            return None;
        }
        let value = Value::Array(items.iter().map(|item| item.value.clone()).collect());
        Some(Self {
            path: path.to_vec(),
            parents,
            items,
            gathered: true,
            value,
        })
    }
}

/// A call's slice after post-processing
#[derive(Debug)]
struct Delivery {
    slice: Slice,
    shape: Shape,
    elements: Vec<Value>,
    /// Position in `slice.items` each element was matched to
    owners: Vec<Option<usize>>,
}

/// Shape of a processed value, restored when it is spliced back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    List,
    Null,
    Single,
}

impl Delivery {
    fn new(slice: Slice, processed: Value, identity: Option<&str>) -> Self {
        let (shape, elements) = match processed {
            Value::Array(elements) => (Shape::List, elements),
            Value::Null => (Shape::Null, Vec::new()),
            other => (Shape::Single, vec![other]),
        };
        let owners = align(&slice.items, &elements, identity);
        Self {
            slice,
            shape,
            elements,
            owners,
        }
    }

    /// Processed value to write back at each parent record
    fn parts(&self) -> Vec<(ArgPath, Value)> {
        if !self.slice.gathered {
            let value = match self.shape {
                Shape::List => Value::Array(self.elements.clone()),
                Shape::Null => Value::Null,
                Shape::Single => self.elements.first().cloned().unwrap_or(Value::Null),
            };
            return self
                .slice
                .parents
                .iter()
                .map(|parent| (parent.pointer.clone(), value.clone()))
                .collect();
        }

        self.slice
            .parents
            .iter()
            .enumerate()
            .map(|(position, parent)| {
                let mut owned = self
                    .elements
                    .iter()
                    .zip(&self.owners)
                    .filter(|(_, owner)| {
                        owner.is_some_and(|item| self.slice.items[item].parent == position)
                    })
                    .map(|(element, _)| element.clone());
                let value = if parent.was_list {
                    Value::Array(owned.collect())
                } else {
                    owned.next().unwrap_or(Value::Null)
                };
                (parent.pointer.clone(), value)
            })
            .collect()
    }

    /// Write `value` under `relation` into every processed element drawn
    /// from the record at `pointer`
    fn splice(&mut self, pointer: &ArgPath, relation: &str, value: &Value) -> bool {
        let Some(item) = self.slice.items.iter().position(|item| &item.pointer == pointer) else {
            return false;
        };
        let mut spliced = false;
        for (element, owner) in self.elements.iter_mut().zip(&self.owners) {
            if *owner != Some(item) {
                continue;
            }
            if let Value::Object(record) = element {
                record.insert(relation.to_string(), value.clone());
                spliced = true;
            }
        }
        spliced
    }
}

/// Match processed elements back to the slice items they came from
///
/// Each element is matched to an unmatched item equal to it, then to an
/// unmatched item with the same identity field, then to the next unmatched
/// position. The search starts after the previous match and wraps around.
fn align(items: &[SliceItem], elements: &[Value], identity: Option<&str>) -> Vec<Option<usize>> {
    if items.is_empty() {
        return vec![None; elements.len()];
    }
    let last = items.len() - 1;
    let mut taken = vec![false; items.len()];
    let mut cursor = 0;
    let mut owners = Vec::with_capacity(elements.len());
    for element in elements {
        let free: Vec<usize> = (cursor..items.len())
            .chain(0..cursor.min(items.len()))
            .filter(|&index| !taken[index])
            .collect();
        let exact = free.iter().copied().find(|&index| &items[index].value == element);
        let by_identity = || {
            let field = identity?;
            let id = element.get(field).filter(|id| !id.is_null())?;
            free.iter()
                .copied()
                .find(|&index| items[index].value.get(field) == Some(id))
        };
        let owner = exact
            .or_else(by_identity)
            .or_else(|| free.first().copied())
            .unwrap_or_else(|| cursor.min(last));
        taken[owner] = true;
        cursor = owner + 1;
        owners.push(Some(owner));
    }
    owners
}

/// Hand each call its slice of `result` and splice the processed slices
/// back, deepest first
///
/// Calls whose slice is missing or `null` (and filter calls, which produce
/// no result) receive `null` and take no part in splicing. A part the call
/// left identical to the root result is not spliced either. Every call is
/// settled before this returns; the first interception error is returned.
pub async fn correlate(
    result: Value,
    calls: Vec<NodeCall>,
    config: &InterceptConfig,
) -> Result<Value, InterceptError> {
    let original = result.clone();
    let mut root = result;

    let mut pending = Vec::with_capacity(calls.len());
    for mut call in calls {
        let slice = call
            .target
            .result_path()
            .and_then(|path| Slice::cut(&root, &path));
        let value = slice.as_ref().map_or(Value::Null, |slice| slice.value.clone());
        call.resolve(Ok(value));
        pending.push((slice, call));
    }

    let outcomes = join_all(
        pending
            .into_iter()
            .map(|(slice, call)| async move { (slice, call.settle().await) }),
    )
    .await;

    let identity = config.identity_field.as_deref();
    let mut deliveries = Vec::new();
    let mut first_error = None;
    for (slice, outcome) in outcomes {
        match (outcome, slice) {
            (Err(err), _) => {
                first_error.get_or_insert(err);
            }
            (Ok(processed), Some(slice)) => {
                deliveries.push(Delivery::new(slice, processed, identity));
            }
            (Ok(_), None) => {}
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }

    let mut order: Vec<usize> = (0..deliveries.len()).collect();
    order.sort_by_key(|&index| Reverse(deliveries[index].slice.path.len()));

    for (position, &index) in order.iter().enumerate() {
        let delivery = &deliveries[index];
        let Some((relation, parent_path)) = delivery.slice.path.split_last() else {
            continue;
        };
        let relation = relation.clone();
        // untouched parts stay as siblings and parent left them
        let parts: Vec<(ArgPath, Value)> = delivery
            .parts()
            .into_iter()
            .filter(|(pointer, value)| {
                pointer.get(&original).and_then(|record| record.get(&relation)) != Some(value)
            })
            .collect();
        if parts.is_empty() {
            continue;
        }

        // later entries are shallower and not yet spliced themselves; every
        // call sharing the parent path holds its own copy of the records
        let candidates: Vec<usize> = order[position + 1..]
            .iter()
            .copied()
            .filter(|&other| deliveries[other].slice.path.as_slice() == parent_path)
            .collect();

        trace!(
            path = %delivery.slice.path.join("."),
            nested = !candidates.is_empty(),
            parts = parts.len(),
            "splicing processed result"
        );
        if candidates.is_empty() {
            for (pointer, value) in parts {
                if let Some(Value::Object(record)) = pointer.get_mut(&mut root) {
                    record.insert(relation.clone(), value);
                }
            }
            continue;
        }
        for other in candidates {
            for (pointer, value) in &parts {
                deliveries[other].splice(pointer, &relation, value);
            }
        }
    }

    Ok(root)
}
