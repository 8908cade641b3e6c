//! Sub-operation extraction
//!
//! Walks an operation's arguments against the schema's relation metadata and
//! produces one [`Seed`] per nested sub-operation:
//!
//! - nested writes under the argument slots legal for the write action
//! - `include`/`select` entries, plus a `select` nested inside an `include`
//!   of the same relation (and the reverse)
//! - relation filters in `where`, at any depth of `AND`/`OR`/`NOT`
//!
//! [`Extractor::extract`] returns the full transitive closure for a root
//! operation; [`Extractor::children`] only the direct children of one
//! descriptor.

use crate::action::{write_fields, Action, LogicalOperator, Modifier, ReadAction, WriteAction};
use crate::descriptor::{OperationDescriptor, Scope};
use crate::error::InterceptError;
use crate::path::is_absent;
use crate::target::{FilterTarget, LogicalStep, ReadTarget, Target, WriteTarget};
use cascade_schema::{RelationDescriptor, RelationPair, SchemaCatalog, SchemaError};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::trace;

/// Extracted sub-operation, not yet intercepted
#[derive(Debug, Clone)]
pub struct Seed {
    /// Location within the parent
    pub target: Arc<Target>,
    /// Sub-operation descriptor, scoped to its parent
    pub descriptor: Arc<OperationDescriptor>,
    /// Excluded from further extraction
    pub leaf: bool,
}

impl Seed {
    /// Identity of the seed within its parent, ignoring array position
    #[must_use]
    pub fn key(&self) -> (String, Action) {
        (self.target.relation_name().to_string(), self.target.action())
    }
}

/// Extracts nested sub-operations from operation arguments
#[derive(Debug, Clone)]
pub struct Extractor {
    schema: Arc<dyn SchemaCatalog>,
    max_depth: usize,
}

impl Extractor {
    /// Create new extractor
    #[must_use]
    pub fn new(schema: Arc<dyn SchemaCatalog>) -> Self {
        Self {
            schema,
            max_depth: 32,
        }
    }

    /// With maximum nesting depth
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Every nested sub-operation of a root operation, parents before
    /// their children
    pub fn extract(&self, root: &OperationDescriptor) -> Result<Vec<Seed>, InterceptError> {
        self.closure(&Arc::new(root.clone()), None)
    }

    /// Nested sub-operations beneath `descriptor`, located under `target`
    pub fn closure(
        &self,
        descriptor: &Arc<OperationDescriptor>,
        target: Option<&Arc<Target>>,
    ) -> Result<Vec<Seed>, InterceptError> {
        self.expand(self.children(descriptor, target)?)
    }

    /// Seeds followed by all of their descendants
    pub fn expand(&self, seeds: Vec<Seed>) -> Result<Vec<Seed>, InterceptError> {
        let mut all = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let descendants = if seed.leaf {
                Vec::new()
            } else {
                self.closure(&seed.descriptor, Some(&seed.target))?
            };
            all.push(seed);
            all.extend(descendants);
        }
        Ok(all)
    }

    /// Direct children of `descriptor`
    pub fn children(
        &self,
        descriptor: &Arc<OperationDescriptor>,
        target: Option<&Arc<Target>>,
    ) -> Result<Vec<Seed>, InterceptError> {
        let depth = target.map_or(0, |t| t.depth());
        let relations = self.schema.relations_of(&descriptor.model);
        if relations.is_empty() {
            return Ok(Vec::new());
        }

        let mut scan = Scan {
            schema: self.schema.as_ref(),
            parent: descriptor,
            parent_target: target,
            seeds: Vec::new(),
        };
        let root = descriptor.is_root();
        match descriptor.action {
            Action::Write(action) => {
                scan.writes(relations, action, !root)?;
                if root {
                    scan.reads(relations)?;
                    scan.root_filters(relations)?;
                }
            }
            Action::Read(action) => {
                scan.reads(relations)?;
                scan.read_filter(action)?;
            }
            Action::Where => {
                scan.filters(relations, &descriptor.args, &[])?;
            }
            Action::Query(_) => {
                scan.reads(relations)?;
                scan.root_filters(relations)?;
            }
        }

        if !scan.seeds.is_empty() && depth >= self.max_depth {
            return Err(InterceptError::DepthExceeded(self.max_depth));
        }
        trace!(
            model = %descriptor.model,
            action = %descriptor.action,
            depth,
            count = scan.seeds.len(),
            "extracted nested operations"
        );
        Ok(scan.seeds)
    }
}

/// Scan of one descriptor's arguments
struct Scan<'a> {
    schema: &'a dyn SchemaCatalog,
    parent: &'a Arc<OperationDescriptor>,
    parent_target: Option<&'a Arc<Target>>,
    seeds: Vec<Seed>,
}

impl Scan<'_> {
    fn pair(&self, relation: &RelationDescriptor) -> Result<RelationPair, InterceptError> {
        let opposite = self.schema.opposite_relation(relation).ok_or_else(|| {
            SchemaError::MissingOpposite {
                model: self.parent.model.clone(),
                relation: relation.name.clone(),
                target: relation.target_model.clone(),
                opposite: relation.opposite_relation_name.clone(),
            }
        })?;
        Ok(RelationPair::new(relation.clone(), opposite.clone()))
    }

    fn child(&self, model: &str, action: Action, args: Value, scope: Scope) -> OperationDescriptor {
        OperationDescriptor {
            model: model.to_string(),
            action,
            args,
            scope: Some(scope),
            run_in_transaction: self.parent.run_in_transaction,
            data_path: Vec::new(),
        }
    }

    fn push(&mut self, target: Target, descriptor: OperationDescriptor, leaf: bool) {
        self.seeds.push(Seed {
            target: Arc::new(target),
            descriptor: Arc::new(descriptor),
            leaf,
        });
    }

    fn writes(
        &mut self,
        relations: &[RelationDescriptor],
        action: WriteAction,
        nested: bool,
    ) -> Result<(), InterceptError> {
        let parent = self.parent;
        for relation in relations {
            for field in write_fields(action, nested) {
                let slot = match field {
                    Some(field) => parent.args.get(*field),
                    None => Some(&parent.args),
                };
                let Some(Value::Object(container)) = slot.and_then(|v| v.get(&relation.name))
                else {
                    continue;
                };
                for (key, value) in container {
                    let Some(child_action) = WriteAction::from_name(key) else {
                        continue;
                    };
                    match value {
                        Value::Null => {}
                        Value::Array(items) => {
                            for (index, item) in items.iter().enumerate() {
                                self.write(relation, *field, child_action, Some(index), item)?;
                            }
                        }
                        other => self.write(relation, *field, child_action, None, other)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn write(
        &mut self,
        relation: &RelationDescriptor,
        field: Option<&str>,
        action: WriteAction,
        index: Option<usize>,
        args: &Value,
    ) -> Result<(), InterceptError> {
        let scope = Scope::new(self.parent.clone(), self.pair(relation)?);
        let descriptor = self.child(
            &relation.target_model,
            Action::Write(action),
            args.clone(),
            scope,
        );
        let target = Target::Write(WriteTarget {
            field: field.map(str::to_string),
            relation_name: relation.name.clone(),
            action,
            index,
            parent: self.parent_target.cloned(),
        });
        self.push(target, descriptor, false);
        Ok(())
    }

    fn reads(&mut self, relations: &[RelationDescriptor]) -> Result<(), InterceptError> {
        let parent = self.parent;
        for relation in relations {
            for action in ReadAction::ALL {
                let Some(value) = parent
                    .args
                    .get(action.as_str())
                    .and_then(|shape| shape.get(&relation.name))
                    .filter(|value| !is_absent(Some(value)))
                else {
                    continue;
                };

                let pair = self.pair(relation)?;
                let descriptor = self.child(
                    &relation.target_model,
                    Action::Read(action),
                    value.clone(),
                    Scope::new(self.parent.clone(), pair.clone()),
                );
                self.push(
                    Target::Read(ReadTarget {
                        field: None,
                        relation_name: relation.name.clone(),
                        action,
                        parent: self.parent_target.cloned(),
                    }),
                    descriptor,
                    false,
                );

                // `include: { posts: { select: ... } }` shapes the same relation twice
                let inner_action = action.other();
                let inner = value
                    .get(inner_action.as_str())
                    .filter(|inner| !is_absent(Some(inner)));
                if let Some(inner) = inner {
                    let descriptor = self.child(
                        &relation.target_model,
                        Action::Read(inner_action),
                        inner.clone(),
                        Scope::new(self.parent.clone(), pair),
                    );
                    self.push(
                        Target::Read(ReadTarget {
                            field: Some(action),
                            relation_name: relation.name.clone(),
                            action: inner_action,
                            parent: self.parent_target.cloned(),
                        }),
                        descriptor,
                        true,
                    );
                }
            }
        }
        Ok(())
    }

    /// The `where` of a nested include/select, as one filter on its relation
    fn read_filter(&mut self, action: ReadAction) -> Result<(), InterceptError> {
        let parent = self.parent;
        let Some(filter @ Value::Object(_)) = parent.args.get("where") else {
            return Ok(());
        };
        let Some(scope) = parent.scope.as_ref() else {
            return Ok(());
        };
        let relation = &scope.relations.to;
        let descriptor = self.child(
            &parent.model,
            Action::Where,
            filter.clone(),
            Scope::new(parent.clone(), scope.relations.clone()),
        );
        let target = Target::Filter(FilterTarget {
            relation_name: relation.name.clone(),
            modifier: None,
            operations: Vec::new(),
            read_action: Some(action),
            parent: self.parent_target.cloned(),
        });
        self.push(target, descriptor, false);
        Ok(())
    }

    fn root_filters(&mut self, relations: &[RelationDescriptor]) -> Result<(), InterceptError> {
        let parent = self.parent;
        match parent.args.get("where") {
            Some(filter) => self.filters(relations, filter, &[]),
            None => Ok(()),
        }
    }

    fn filters(
        &mut self,
        relations: &[RelationDescriptor],
        filter: &Value,
        operations: &[LogicalStep],
    ) -> Result<(), InterceptError> {
        let Some(clause) = filter.as_object() else {
            return Ok(());
        };

        for relation in relations {
            let Some(value) = clause.get(&relation.name) else {
                continue;
            };
            let Some(object) = value.as_object() else {
                continue;
            };
            if has_modifier(object) {
                for modifier in Modifier::ALL {
                    if let Some(inner @ Value::Object(_)) = object.get(modifier.as_str()) {
                        self.filter(relation, Some(modifier), operations, inner)?;
                    }
                }
            } else {
                self.filter(relation, None, operations, value)?;
            }
        }

        for operator in LogicalOperator::ALL {
            match clause.get(operator.as_str()) {
                Some(Value::Array(items)) => {
                    for (index, item) in items.iter().enumerate() {
                        if !item.is_object() {
                            continue;
                        }
                        let steps = with_step(operations, operator, Some(index));
                        self.filters(relations, item, &steps)?;
                    }
                }
                Some(item @ Value::Object(_)) => {
                    let steps = with_step(operations, operator, None);
                    self.filters(relations, item, &steps)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn filter(
        &mut self,
        relation: &RelationDescriptor,
        modifier: Option<Modifier>,
        operations: &[LogicalStep],
        args: &Value,
    ) -> Result<(), InterceptError> {
        let mut scope = Scope::new(self.parent.clone(), self.pair(relation)?);
        scope.modifier = modifier;
        scope.logical_operators = operations.iter().map(|step| step.operator).collect();
        let descriptor = self.child(&relation.target_model, Action::Where, args.clone(), scope);
        let target = Target::Filter(FilterTarget {
            relation_name: relation.name.clone(),
            modifier,
            operations: operations.to_vec(),
            read_action: None,
            parent: self.parent_target.cloned(),
        });
        self.push(target, descriptor, false);
        Ok(())
    }
}

fn has_modifier(object: &Map<String, Value>) -> bool {
    Modifier::ALL
        .iter()
        .any(|modifier| object.contains_key(modifier.as_str()))
}

fn with_step(
    operations: &[LogicalStep],
    operator: LogicalOperator,
    index: Option<usize>,
) -> Vec<LogicalStep> {
    let mut steps = operations.to_vec();
    steps.push(LogicalStep { operator, index });
    steps
}
