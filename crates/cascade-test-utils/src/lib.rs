//! Testing utilities for Cascade workspace
//!
//! Shared test helpers, fixtures, and executors.

#![allow(missing_docs)]

use async_trait::async_trait;
use cascade_core::{Action, Executor, InterceptError, OperationDescriptor};
use cascade_schema::StaticSchema;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Blog schema used across tests
///
/// - `User.posts` / `Post.author` (one to many)
/// - `Post.comments` / `Comment.post` (one to many)
/// - `User.profile` / `Profile.user` (one to one)
pub fn blog_schema() -> StaticSchema {
    StaticSchema::new()
        .one_to_many("User", "posts", "Post", "author")
        .one_to_many("Post", "comments", "Comment", "post")
        .one_to_one("User", "profile", "Profile", "user")
}

/// Executor returning a canned result and recording what it was asked to run
#[derive(Debug)]
pub struct RecordingExecutor {
    result: Result<Value, InterceptError>,
    seen: Mutex<Vec<OperationDescriptor>>,
}

impl RecordingExecutor {
    pub fn new(result: Value) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(result),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: InterceptError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(error),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Descriptors executed so far
    pub fn executed(&self) -> Vec<OperationDescriptor> {
        self.seen.lock().clone()
    }

    /// Last executed descriptor
    pub fn last(&self) -> Option<OperationDescriptor> {
        self.seen.lock().last().cloned()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&self, descriptor: OperationDescriptor) -> Result<Value, InterceptError> {
        self.seen.lock().push(descriptor);
        self.result.clone()
    }
}

/// Shared log of intercepted operations
#[derive(Debug, Clone, Default)]
pub struct InterceptLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

/// One intercepted operation
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub model: String,
    pub action: Action,
    pub depth: usize,
    pub root: bool,
    /// Outcome of the continuation, once it has settled
    pub outcome: Option<Result<Value, InterceptError>>,
}

impl InterceptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an operation as it is intercepted; returns its position
    pub fn record(&self, descriptor: &OperationDescriptor) -> usize {
        let mut entries = self.entries.lock();
        entries.push(LogEntry {
            model: descriptor.model.clone(),
            action: descriptor.action,
            depth: descriptor.depth(),
            root: descriptor.is_root(),
            outcome: None,
        });
        entries.len() - 1
    }

    /// Record the settled outcome of a continuation
    pub fn settle(&self, position: usize, outcome: &Result<Value, InterceptError>) {
        if let Some(entry) = self.entries.lock().get_mut(position) {
            entry.outcome = Some(outcome.clone());
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// `Model.action` of every recorded operation, sorted
    pub fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .lock()
            .iter()
            .map(|entry| format!("{}.{}", entry.model, entry.action))
            .collect();
        names.sort();
        names
    }

    /// Whether every nested operation's continuation has settled
    pub fn all_settled(&self) -> bool {
        self.entries
            .lock()
            .iter()
            .filter(|entry| !entry.root)
            .all(|entry| entry.outcome.is_some())
    }
}

/// Install a test subscriber honouring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
