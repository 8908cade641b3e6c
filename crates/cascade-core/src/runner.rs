//! Call runner
//!
//! Runs the interception once per extracted sub-operation. Each interception
//! runs as its own task; the runner waits until it has handed on its updated
//! descriptor, then parks the task on a one-shot result channel until the
//! root operation produces the sub-operation's result.
//!
//! Sibling sub-operations are run concurrently and joined with collect-all
//! semantics: every sibling gets to hand on its descriptor before the first
//! failure is reported, and every call already parked is rejected so no
//! interception is left waiting.

use crate::descriptor::OperationDescriptor;
use crate::error::InterceptError;
use crate::extract::{Extractor, Seed};
use crate::interceptor::{Interceptor, Next};
use crate::target::Target;
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Intercepted sub-operation waiting for its result
#[derive(Debug)]
pub struct NodeCall {
    /// Location as extracted
    pub origin: Arc<Target>,
    /// Location after any action conversion
    pub target: Arc<Target>,
    /// Descriptor handed on by the interception
    pub descriptor: OperationDescriptor,
    /// Descriptor as extracted
    pub extracted: Arc<OperationDescriptor>,
    result_tx: Option<oneshot::Sender<Result<Value, InterceptError>>>,
    handle: Option<JoinHandle<Result<Value, InterceptError>>>,
}

impl NodeCall {
    /// Check if the interception changed the action
    #[inline]
    #[must_use]
    pub fn is_converted(&self) -> bool {
        self.target.action() != self.origin.action()
    }

    /// Nesting depth of the sub-operation
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.origin.depth()
    }

    /// Hand the sub-operation its result; later calls are ignored
    pub fn resolve(&mut self, result: Result<Value, InterceptError>) {
        if let Some(tx) = self.result_tx.take() {
            // receiver gone means the interception already finished
            let _ = tx.send(result);
        }
    }

    /// Wait for the interception to finish, returning its final result
    ///
    /// An unresolved call is cancelled first.
    pub async fn settle(mut self) -> Result<Value, InterceptError> {
        self.result_tx.take();
        match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|err| InterceptError::Panicked(err.to_string()))?,
            None => Ok(Value::Null),
        }
    }

    /// Resolve and settle
    pub async fn deliver(
        mut self,
        result: Result<Value, InterceptError>,
    ) -> Result<Value, InterceptError> {
        self.resolve(result);
        self.settle().await
    }

    /// Call without a running interception, for recomposition tests
    #[cfg(test)]
    pub(crate) fn detached(seed: &Seed, descriptor: OperationDescriptor) -> Self {
        let target = if descriptor.action == seed.descriptor.action {
            seed.target.clone()
        } else {
            Arc::new(seed.target.converted(descriptor.action).unwrap())
        };
        Self {
            origin: seed.target.clone(),
            target,
            descriptor,
            extracted: seed.descriptor.clone(),
            result_tx: None,
            handle: None,
        }
    }
}

/// Run the interception for every seed concurrently
///
/// On failure every call that was produced is rejected with the first
/// error and awaited before the error is returned.
pub async fn run_calls(
    interceptor: &Arc<dyn Interceptor>,
    extractor: &Extractor,
    seeds: Vec<Seed>,
) -> Result<Vec<NodeCall>, InterceptError> {
    let outcomes = join_all(
        seeds
            .into_iter()
            .map(|seed| run_seed(interceptor, extractor, seed)),
    )
    .await;

    let mut calls = Vec::new();
    let mut first_error = None;
    for outcome in outcomes {
        match outcome {
            Ok(produced) => calls.extend(produced),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => {
            reject_all(calls, &err).await;
            Err(err)
        }
        None => Ok(calls),
    }
}

/// Reject every call with `err` and wait for all of them to finish
///
/// Errors raised while unwinding are logged and dropped.
pub async fn reject_all(calls: Vec<NodeCall>, err: &InterceptError) {
    let outcomes = join_all(calls.into_iter().map(|call| call.deliver(Err(err.clone())))).await;
    for outcome in outcomes {
        match outcome {
            Err(secondary) if secondary != *err => {
                warn!(error = %secondary, "nested interception failed while unwinding");
            }
            _ => {}
        }
    }
}

/// Resolve every call with `null` and wait for all of them to finish
///
/// Errors raised while unwinding are logged and dropped.
pub async fn release_all(calls: Vec<NodeCall>) {
    let outcomes = join_all(calls.into_iter().map(|call| call.deliver(Ok(Value::Null)))).await;
    for secondary in outcomes.into_iter().filter_map(Result::err) {
        warn!(error = %secondary, "nested interception failed after release");
    }
}

fn run_seed<'a>(
    interceptor: &'a Arc<dyn Interceptor>,
    extractor: &'a Extractor,
    seed: Seed,
) -> BoxFuture<'a, Result<Vec<NodeCall>, InterceptError>> {
    async move {
        let (descriptor_tx, descriptor_rx) = oneshot::channel::<OperationDescriptor>();
        let (result_tx, result_rx) = oneshot::channel();
        let next = Next::new(move |updated| async move {
            descriptor_tx
                .send(updated)
                .map_err(|_| InterceptError::Cancelled)?;
            result_rx.await.unwrap_or(Err(InterceptError::Cancelled))
        });

        let original = seed.descriptor.as_ref().clone();
        let model = original.model.clone();
        let action = original.action;
        let task = interceptor.clone();
        let handle = tokio::spawn(async move { task.intercept(original, next).await });

        let Ok(mut updated) = descriptor_rx.await else {
            return Err(match handle.await {
                Ok(Err(err)) => err,
                Ok(Ok(_)) => InterceptError::ContinuationDropped { model, action },
                Err(err) => InterceptError::Panicked(err.to_string()),
            });
        };
        if updated.scope.is_none() {
            updated.scope = seed.descriptor.scope.clone();
        }

        let mut call = NodeCall {
            origin: seed.target.clone(),
            target: seed.target.clone(),
            descriptor: updated,
            extracted: seed.descriptor.clone(),
            result_tx: Some(result_tx),
            handle: Some(handle),
        };
        if call.descriptor.action == action {
            return Ok(vec![call]);
        }

        let target = match seed.target.converted(call.descriptor.action) {
            Ok(target) => Arc::new(target),
            Err(err) => {
                call.resolve(Err(err.clone()));
                let _ = call.settle().await;
                return Err(err);
            }
        };
        debug!(
            model = %call.descriptor.model,
            from = %action,
            to = %call.descriptor.action,
            path = %seed.target.args_path(),
            "nested operation converted"
        );
        call.target = target.clone();

        // Sub-operations the conversion introduced; those already present
        // beneath the original action were extracted with it
        let introduced = match introduced_seeds(extractor, &seed, &call.descriptor, &target) {
            Ok(seeds) => seeds,
            Err(err) => {
                call.resolve(Err(err.clone()));
                let _ = call.settle().await;
                return Err(err);
            }
        };
        if introduced.is_empty() {
            return Ok(vec![call]);
        }

        match run_calls(interceptor, extractor, introduced).await {
            Ok(nested) => {
                let mut calls = Vec::with_capacity(nested.len() + 1);
                calls.push(call);
                calls.extend(nested);
                Ok(calls)
            }
            Err(err) => {
                call.resolve(Err(err.clone()));
                let _ = call.settle().await;
                Err(err)
            }
        }
    }
    .boxed()
}

fn introduced_seeds(
    extractor: &Extractor,
    seed: &Seed,
    updated: &OperationDescriptor,
    target: &Arc<Target>,
) -> Result<Vec<Seed>, InterceptError> {
    let known: HashSet<_> = extractor
        .children(&seed.descriptor, Some(&seed.target))?
        .iter()
        .map(Seed::key)
        .collect();
    let fresh = extractor
        .children(&Arc::new(updated.clone()), Some(target))?
        .into_iter()
        .filter(|child| !known.contains(&child.key()))
        .collect();
    extractor.expand(fresh)
}
