//! # Task Handler Registry
//!
//! In-memory registry resolving a task kind to its do/undo handler pair.
//!
//! ## Usage
//!
//! ```rust
//! use steward_core::registry::{handler_fn, HandlerRegistry};
//!
//! let registry = HandlerRegistry::new();
//! registry.register(
//!     "download",
//!     handler_fn(|_ctx| async { Ok(()) }),
//!     None,
//! );
//! assert!(registry.contains("download"));
//! ```

use crate::orchestration::{HandlerResult, TaskContext};
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Type-erased async task handler
pub type HandlerFn = Arc<dyn Fn(TaskContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wrap an async closure into a [`HandlerFn`]
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx: TaskContext| -> BoxFuture<'static, HandlerResult> { Box::pin(f(ctx)) })
}

/// Handlers registered for one task kind
#[derive(Clone)]
pub struct HandlerPair {
    pub do_handler: HandlerFn,
    pub undo_handler: Option<HandlerFn>,
}

/// Thread-safe kind -> handler pair registry
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<DashMap<String, HandlerPair>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handlers for a task kind
    pub fn register(&self, kind: &str, do_handler: HandlerFn, undo_handler: Option<HandlerFn>) {
        debug!(
            kind = %kind,
            has_undo = undo_handler.is_some(),
            "Registering task handler"
        );
        self.handlers.insert(
            kind.to_string(),
            HandlerPair {
                do_handler,
                undo_handler,
            },
        );
    }

    pub fn get(&self, kind: &str) -> Option<HandlerPair> {
        self.handlers.get(kind).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        kinds.sort();
        kinds
    }
}
