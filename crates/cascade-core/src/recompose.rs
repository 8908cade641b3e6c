//! Recomposition of intercepted sub-operations
//!
//! Folds the descriptors handed on by nested interceptions back into one
//! composite root descriptor. Calls are merged deepest first, so a parent
//! already carries its children's edits when it is merged into its own
//! parent. Within one depth, unchanged calls go before converted ones: a
//! converted call must find its siblings' slots already settled.
//!
//! A converted write moves from its original slot to the slot of its new
//! action. Removing the original slot is deferred until every sibling has
//! been placed, so array positions stay valid while siblings are merged.

use crate::action::{write_fields, Action, WriteAction};
use crate::config::{InterceptConfig, UnplaceablePolicy};
use crate::descriptor::OperationDescriptor;
use crate::error::InterceptError;
use crate::path::{is_absent, ArgPath};
use crate::runner::NodeCall;
use crate::target::{Target, WriteTarget};
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::warn;

/// Merge intercepted sub-operations into a composite root descriptor
///
/// `root` is left untouched.
pub fn recompose(
    root: &OperationDescriptor,
    calls: &[NodeCall],
    config: &InterceptConfig,
) -> Result<OperationDescriptor, InterceptError> {
    let mut composite = root.clone();
    let parents: Vec<Option<usize>> = (0..calls.len())
        .map(|index| parent_index(calls, index))
        .collect();
    let mut args: Vec<Value> = calls.iter().map(|call| call.descriptor.args.clone()).collect();
    // one list per call plus one for the root, which sits at `calls.len()`
    let mut removals: Vec<Vec<Removal>> = (0..=calls.len()).map(|_| Vec::new()).collect();

    let mut order: Vec<usize> = (0..calls.len()).collect();
    order.sort_by_key(|&index| {
        let call = &calls[index];
        (Reverse(call.depth()), call.is_converted(), is_nested_shape(call))
    });

    for index in order {
        let call = &calls[index];
        let mut value = std::mem::take(&mut args[index]);
        flush(&mut value, std::mem::take(&mut removals[index]));

        let (parent_args, parent_action, nested, slot) = match parents[index] {
            Some(parent) => (
                &mut args[parent],
                calls[parent].descriptor.action,
                true,
                parent,
            ),
            None => (&mut composite.args, composite.action, false, calls.len()),
        };

        let placed = match (call.origin.as_ref(), call.target.as_ref()) {
            (Target::Write(origin), Target::Write(target)) => place_write(
                parent_args,
                WriteParent {
                    action: parent_action,
                    nested,
                },
                call,
                origin,
                target,
                value,
                &mut removals[slot],
            ),
            (Target::Read(_), Target::Read(_)) => place_read(parent_args, call, value),
            (Target::Filter(_), target @ Target::Filter(_)) => {
                target.args_path().set(parent_args, value)
            }
            _ => false,
        };

        if !placed {
            unplaceable(config, call)?;
        }
    }

    flush(&mut composite.args, std::mem::take(&mut removals[calls.len()]));
    Ok(composite)
}

/// Index of the call a call was extracted beneath, `None` for the root
fn parent_index(calls: &[NodeCall], index: usize) -> Option<usize> {
    let parent = calls[index].origin.parent()?;
    calls
        .iter()
        .position(|call| Arc::ptr_eq(&call.origin, parent) || Arc::ptr_eq(&call.target, parent))
}

fn unplaceable(config: &InterceptConfig, call: &NodeCall) -> Result<(), InterceptError> {
    let relation = call.target.relation_name().to_string();
    let action = call.target.action();
    match config.unplaceable {
        UnplaceablePolicy::Drop => {
            warn!(
                %relation,
                %action,
                path = %call.origin.args_path(),
                "dropping nested operation with no slot in its parent"
            );
            Ok(())
        }
        UnplaceablePolicy::Reject => Err(InterceptError::Unplaceable { relation, action }),
    }
}

#[derive(Debug, Clone, Copy)]
struct WriteParent {
    action: Action,
    nested: bool,
}

/// Original slot of a converted write, removed once its siblings are placed
#[derive(Debug, Clone)]
struct Removal {
    container: ArgPath,
    action: WriteAction,
    index: Option<usize>,
}

fn place_write(
    parent_args: &mut Value,
    parent: WriteParent,
    call: &NodeCall,
    origin: &WriteTarget,
    target: &WriteTarget,
    value: Value,
    removals: &mut Vec<Removal>,
) -> bool {
    let Some(parent_action) = parent.action.as_write() else {
        return false;
    };
    let legal = write_fields(parent_action, parent.nested);
    let fields: Vec<Option<&str>> = if legal.iter().any(|field| *field == origin.field.as_deref())
    {
        vec![origin.field.as_deref()]
    } else {
        // parent was converted: follow the relation into whichever of its
        // new slots holds it
        legal
            .iter()
            .copied()
            .filter(|field| {
                origin
                    .container_path(*field)
                    .get(parent_args)
                    .is_some_and(Value::is_object)
            })
            .collect()
    };

    let relation_is_list = call
        .descriptor
        .scope
        .as_ref()
        .map_or(true, |scope| scope.relations.to.is_list);
    let converted = origin.action != target.action;

    let mut placed = false;
    for field in fields {
        let container = origin.container_path(field);
        if !converted {
            let slot = container.key(target.action.as_str());
            let path = match target.index {
                Some(index) => slot.index(index),
                None if slot.get(parent_args).is_some_and(Value::is_array) => slot.index(0),
                None => slot,
            };
            placed |= path.set(parent_args, value.clone());
            continue;
        }

        let Some(Value::Object(map)) = container.get_mut(parent_args) else {
            continue;
        };
        merge_converted(map, target.action, relation_is_list, value.clone());
        removals.push(Removal {
            container,
            action: origin.action,
            index: origin.index,
        });
        placed = true;
    }
    placed
}

/// Add a converted write to the slot of its new action
fn merge_converted(
    container: &mut Map<String, Value>,
    action: WriteAction,
    relation_is_list: bool,
    value: Value,
) {
    let key = action.as_str();
    match container.get_mut(key) {
        None | Some(Value::Null | Value::Bool(_)) => {
            container.insert(key.to_string(), value);
        }
        Some(existing) if action == WriteAction::CreateMany => {
            append_records(existing, create_many_records(value));
        }
        Some(Value::Object(existing))
            if !relation_is_list && action.is_singular() && value.is_object() =>
        {
            if let Value::Object(incoming) = value {
                existing.extend(incoming);
            }
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

fn create_many_records(value: Value) -> Vec<Value> {
    match value {
        Value::Object(mut args) if args.contains_key("data") => match args.shift_remove("data") {
            Some(Value::Array(items)) => items,
            Some(item) => vec![item],
            None => Vec::new(),
        },
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn append_records(create_many: &mut Value, records: Vec<Value>) {
    let Some(args) = create_many.as_object_mut() else {
        return;
    };
    match args.get_mut("data") {
        Some(Value::Array(items)) => items.extend(records),
        Some(existing) => {
            let mut items = vec![existing.take()];
            items.extend(records);
            *existing = Value::Array(items);
        }
        None => {
            args.insert("data".to_string(), Value::Array(records));
        }
    }
}

/// Apply deferred removals, highest array positions first
fn flush(args: &mut Value, mut removals: Vec<Removal>) {
    removals.sort_by_key(|removal| Reverse(removal.index.unwrap_or(0)));
    for removal in removals {
        let slot = removal.container.clone().key(removal.action.as_str());
        let is_array = slot.get(args).map(Value::is_array);
        match (removal.index, is_array) {
            (Some(index), Some(true)) => {
                slot.clone().index(index).remove(args);
            }
            (None, Some(true)) => {
                slot.clone().index(0).remove(args);
            }
            (_, Some(false)) => {
                slot.remove(args);
            }
            (_, None) => {}
        }

        if slot
            .get(args)
            .and_then(Value::as_array)
            .is_some_and(Vec::is_empty)
        {
            slot.remove(args);
        }
        prune_empty(args, &removal.container);
    }
}

/// Remove the object at `path` if it has no keys left
fn prune_empty(args: &mut Value, path: &ArgPath) {
    if path
        .get(args)
        .and_then(Value::as_object)
        .is_some_and(Map::is_empty)
    {
        path.remove(args);
    }
}

/// `select` inside an `include` (or the reverse) on the same relation
fn is_nested_shape(call: &NodeCall) -> bool {
    matches!(call.origin.as_ref(), Target::Read(read) if read.field.is_some())
}

fn place_read(parent_args: &mut Value, call: &NodeCall, value: Value) -> bool {
    let path = call.target.args_path();
    if !call.is_converted() {
        // the enclosing shape already carried this one, children's edits
        // included: only the keys this call changed are applied over it
        if is_nested_shape(call) {
            if let Some(current) = path.get_mut(parent_args) {
                apply_edits(current, &call.extracted.args, value);
                return true;
            }
        }
        return path.set(parent_args, value);
    }

    // both shapes on one relation are left for the executor to reject
    if !is_absent(path.get(parent_args)) {
        return true;
    }
    let previous = call.origin.args_path();
    previous.remove(parent_args);
    if let Some(container) = previous.parent() {
        prune_empty(parent_args, &container);
    }
    path.set(parent_args, value)
}

/// Apply the changes between `before` and `after` onto `current`, key by key
fn apply_edits(current: &mut Value, before: &Value, after: Value) {
    match (current, before, after) {
        (Value::Object(current), Value::Object(before), Value::Object(after)) => {
            for key in before.keys() {
                if !after.contains_key(key) {
                    current.shift_remove(key);
                }
            }
            for (key, value) in after {
                if before.get(&key) != Some(&value) {
                    current.insert(key, value);
                }
            }
        }
        (current, before, after) => {
            if *before != after {
                *current = after;
            }
        }
    }
}
