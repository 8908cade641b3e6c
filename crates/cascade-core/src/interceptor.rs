//! Interception and execution seams
//!
//! An [`Interceptor`] wraps one operation: it receives the descriptor and a
//! [`Next`] continuation, may rewrite the descriptor before handing it on,
//! and may post-process whatever the continuation returns. An [`Executor`]
//! is what finally performs a root operation.

use crate::descriptor::OperationDescriptor;
use crate::error::InterceptError;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Boxed future resolving to an operation result
pub type InterceptFuture = BoxFuture<'static, Result<Value, InterceptError>>;

/// Interception applied to a root operation and to every nested one
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Intercept one operation
    ///
    /// Calling `next` hands the (possibly rewritten) descriptor on and
    /// resolves to the operation's result. Returning an error without
    /// calling `next` fails the whole root operation.
    async fn intercept(
        &self,
        descriptor: OperationDescriptor,
        next: Next,
    ) -> Result<Value, InterceptError>;
}

#[async_trait]
impl<F, Fut> Interceptor for F
where
    F: Fn(OperationDescriptor, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, InterceptError>> + Send + 'static,
{
    async fn intercept(
        &self,
        descriptor: OperationDescriptor,
        next: Next,
    ) -> Result<Value, InterceptError> {
        self(descriptor, next).await
    }
}

/// Backing executor for root operations
///
/// Returning `Value::Null` signals that the operation was skipped.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Perform the operation
    async fn execute(&self, descriptor: OperationDescriptor) -> Result<Value, InterceptError>;
}

/// Single-use continuation handed to an interception
pub struct Next {
    run: Box<dyn FnOnce(OperationDescriptor) -> InterceptFuture + Send>,
}

impl Next {
    /// Create continuation from a closure
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(OperationDescriptor) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, InterceptError>> + Send + 'static,
    {
        Self {
            run: Box::new(move |descriptor| f(descriptor).boxed()),
        }
    }

    /// Continuation that hands the descriptor to an executor
    #[must_use]
    pub fn from_executor(executor: Arc<dyn Executor>) -> Self {
        Self::new(move |descriptor| async move { executor.execute(descriptor).await })
    }

    /// Continuation that resolves to a fixed value
    #[must_use]
    pub fn resolved(value: Value) -> Self {
        Self::new(move |_| async move { Ok(value) })
    }

    /// Hand the descriptor on and wait for the result
    pub async fn run(self, descriptor: OperationDescriptor) -> Result<Value, InterceptError> {
        (self.run)(descriptor).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}
