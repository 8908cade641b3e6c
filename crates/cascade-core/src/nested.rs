//! Nested interception entry point
//!
//! [`NestedInterceptor`] wraps a single interception so that it also runs
//! for every nested sub-operation of a root operation:
//!
//! 1. extract all nested sub-operations
//! 2. run the interception for each of them concurrently
//! 3. fold the rewritten sub-operations into a composite root operation
//! 4. run the interception for the composite root
//! 5. when the root continuation produces a result, hand every nested
//!    interception its slice and splice the processed slices back
//!
//! No nested interception is left waiting: on any failure all outstanding
//! continuations are rejected and awaited before the error is returned.

use crate::config::InterceptConfig;
use crate::correlate::correlate;
use crate::descriptor::OperationDescriptor;
use crate::error::InterceptError;
use crate::extract::Extractor;
use crate::interceptor::{Executor, Interceptor, Next};
use crate::recompose::recompose;
use crate::runner::{reject_all, release_all, run_calls, NodeCall};
use async_trait::async_trait;
use cascade_schema::SchemaCatalog;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Interception applied to a root operation and all its nested operations
///
/// # Example
///
/// ```rust,ignore
/// use cascade_core::prelude::*;
///
/// let interceptor = NestedInterceptor::new(
///     |descriptor: OperationDescriptor, next: Next| async move {
///         tracing::info!(model = %descriptor.model, action = %descriptor.action);
///         next.run(descriptor).await
///     },
///     Arc::new(schema),
/// );
/// let result = interceptor.execute(descriptor, executor).await?;
/// ```
#[derive(Clone)]
pub struct NestedInterceptor {
    inner: Arc<dyn Interceptor>,
    extractor: Extractor,
    config: InterceptConfig,
}

impl NestedInterceptor {
    /// Wrap an interception
    pub fn new(inner: impl Interceptor + 'static, schema: Arc<dyn SchemaCatalog>) -> Self {
        Self::from_shared(Arc::new(inner), schema)
    }

    /// Wrap a shared interception
    #[must_use]
    pub fn from_shared(inner: Arc<dyn Interceptor>, schema: Arc<dyn SchemaCatalog>) -> Self {
        let config = InterceptConfig::default();
        Self {
            inner,
            extractor: Extractor::new(schema).with_max_depth(config.max_depth),
            config,
        }
    }

    /// With configuration
    #[must_use]
    pub fn with_config(mut self, config: InterceptConfig) -> Self {
        self.extractor = self.extractor.with_max_depth(config.max_depth);
        self.config = config;
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &InterceptConfig {
        &self.config
    }

    /// Run a root operation through the interception and `executor`
    pub async fn execute(
        &self,
        descriptor: OperationDescriptor,
        executor: Arc<dyn Executor>,
    ) -> Result<Value, InterceptError> {
        self.intercept(descriptor, Next::from_executor(executor))
            .await
    }

    async fn intercept_nested(
        &self,
        descriptor: OperationDescriptor,
        next: Next,
    ) -> Result<Value, InterceptError> {
        let seeds = self.extractor.extract(&descriptor)?;
        if seeds.is_empty() {
            return self.inner.intercept(descriptor, next).await;
        }
        debug!(
            model = %descriptor.model,
            action = %descriptor.action,
            nested = seeds.len(),
            "intercepting nested operations"
        );

        let calls = run_calls(&self.inner, &self.extractor, seeds).await?;
        let composite = match recompose(&descriptor, &calls, &self.config) {
            Ok(composite) => composite,
            Err(err) => {
                reject_all(calls, &err).await;
                return Err(err);
            }
        };

        let pending: Arc<Mutex<Option<Vec<NodeCall>>>> = Arc::new(Mutex::new(Some(calls)));
        let slot = pending.clone();
        let config = self.config.clone();
        let root_next = Next::new(move |updated| async move {
            let calls = slot.lock().take().unwrap_or_default();
            match next.run(updated).await {
                Err(err) => {
                    reject_all(calls, &err).await;
                    Err(err)
                }
                Ok(Value::Null) => {
                    debug!("root operation skipped");
                    release_all(calls).await;
                    Ok(Value::Null)
                }
                Ok(result) => correlate(result, calls, &config).await,
            }
        });

        let outcome = self.inner.intercept(composite, root_next).await;

        // root interception finished without running its continuation
        let leftover = pending.lock().take();
        if let Some(calls) = leftover {
            match &outcome {
                Ok(_) => release_all(calls).await,
                Err(err) => reject_all(calls, err).await,
            }
        }
        outcome
    }
}

#[async_trait]
impl Interceptor for NestedInterceptor {
    async fn intercept(
        &self,
        descriptor: OperationDescriptor,
        next: Next,
    ) -> Result<Value, InterceptError> {
        self.intercept_nested(descriptor, next).await
    }
}

impl std::fmt::Debug for NestedInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestedInterceptor")
            .field("extractor", &self.extractor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
