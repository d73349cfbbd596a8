//! Lazy children loading.
//!
//! A raw record opts into lazy loading through the configured async marker
//! field; the actual fetching collaborator is injected per tree as a
//! [`ChildrenLoader`]. The loader is declared as an explicit sync/async
//! variant rather than discovered by runtime type inspection, and the
//! marker resolves into the node's `async` flag once, at enhance time.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use hypertree_core::prelude::*;
use hypertree_core::NodeId;

/// Context handed to the loader when a node's children are requested.
#[derive(Debug, Clone)]
pub struct LoaderContext {
    /// Identifier of the requesting tree.
    pub tree_id: String,
    /// Id of the node being expanded.
    pub node_id: NodeId,
    /// The node's raw record at request time.
    pub data: Value,
}

/// Synchronous loader: produces raw child records immediately.
pub type SyncLoaderFn = Arc<dyn Fn(&LoaderContext) -> Vec<Value> + Send + Sync>;

/// Asynchronous loader: resolves to raw child records, or fails.
pub type AsyncLoaderFn =
    Arc<dyn Fn(LoaderContext) -> BoxFuture<'static, Result<Vec<Value>>> + Send + Sync>;

/// The external collaborator invoked on first expand of an async node.
///
/// No timeout is imposed here; a stalled loader leaves the node loading
/// indefinitely, and callers needing deadlines wrap the loader themselves.
#[derive(Clone)]
pub enum ChildrenLoader {
    Sync(SyncLoaderFn),
    Async(AsyncLoaderFn),
}

impl ChildrenLoader {
    /// Wrap a synchronous closure.
    pub fn sync(f: impl Fn(&LoaderContext) -> Vec<Value> + Send + Sync + 'static) -> Self {
        ChildrenLoader::Sync(Arc::new(f))
    }

    /// Wrap a closure returning a boxed future.
    pub fn asynchronous(
        f: impl Fn(LoaderContext) -> BoxFuture<'static, Result<Vec<Value>>> + Send + Sync + 'static,
    ) -> Self {
        ChildrenLoader::Async(Arc::new(f))
    }

    /// Invoke the loader.
    pub async fn load(&self, context: LoaderContext) -> Result<Vec<Value>> {
        match self {
            ChildrenLoader::Sync(f) => Ok(f(&context)),
            ChildrenLoader::Async(f) => f(context).await,
        }
    }
}

impl fmt::Debug for ChildrenLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildrenLoader::Sync(_) => f.write_str("ChildrenLoader::Sync"),
            ChildrenLoader::Async(_) => f.write_str("ChildrenLoader::Async"),
        }
    }
}
