//! Directory of live tree instances and their command handlers.
//!
//! The registry is an explicit, dependency-injected context object (not a
//! process singleton): hosts create one, share it (`Arc`) with whatever code
//! needs to command trees by identifier, and drop it with the application.
//! Entries are replaced wholesale when a tree is re-created and patched
//! per-handler as the controller republishes after each change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use serde_json::Value;

use hypertree_core::prelude::*;

use crate::controller::TreeHandle;

/// Positional JSON arguments for an externally invoked handler.
pub type HandlerArgs = Vec<Value>;

/// An externally invokable command bound to one tree.
pub type Handler = Arc<dyn Fn(HandlerArgs) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

struct TreeEntry {
    handle: TreeHandle,
    handlers: HashMap<String, Handler>,
}

/// Maps tree identifiers to their current instance and handler bag.
#[derive(Default)]
pub struct TreeRegistry {
    trees: Mutex<HashMap<String, TreeEntry>>,
}

impl TreeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers of all registered trees.
    pub fn ids(&self) -> Vec<String> {
        self.trees.lock().expect("registry lock").keys().cloned().collect()
    }

    pub fn contains(&self, tree_id: &str) -> bool {
        self.trees.lock().expect("registry lock").contains_key(tree_id)
    }

    /// Install or replace the instance for `tree_id`.
    ///
    /// Replacement is wholesale: the handler bag is reset, and the controller
    /// republishes its handlers afterwards. Handlers belonging to the
    /// previous instance never survive a re-creation.
    pub fn safe_update(&self, tree_id: impl Into<String>, handle: TreeHandle) {
        let mut trees = self.trees.lock().expect("registry lock");
        trees.insert(
            tree_id.into(),
            TreeEntry {
                handle,
                handlers: HashMap::new(),
            },
        );
    }

    /// Patch a single named handler, preserving the rest of the bag.
    /// Unknown tree identifiers no-op.
    pub fn safe_update_handler(&self, tree_id: &str, name: impl Into<String>, handler: Handler) {
        let mut trees = self.trees.lock().expect("registry lock");
        if let Some(entry) = trees.get_mut(tree_id) {
            entry.handlers.insert(name.into(), handler);
        }
    }

    /// Remove a single named handler. Unknown identifiers no-op.
    pub fn remove_handler(&self, tree_id: &str, name: &str) {
        let mut trees = self.trees.lock().expect("registry lock");
        if let Some(entry) = trees.get_mut(tree_id) {
            entry.handlers.remove(name);
        }
    }

    /// Tear down a tree's entry entirely.
    pub fn remove(&self, tree_id: &str) {
        self.trees.lock().expect("registry lock").remove(tree_id);
    }

    /// The current instance handle for a tree, if registered.
    pub fn get(&self, tree_id: &str) -> Option<TreeHandle> {
        self.trees
            .lock()
            .expect("registry lock")
            .get(tree_id)
            .map(|entry| entry.handle.clone())
    }

    /// A named handler for a tree, if both exist.
    pub fn handler(&self, tree_id: &str, name: &str) -> Option<Handler> {
        self.trees
            .lock()
            .expect("registry lock")
            .get(tree_id)
            .and_then(|entry| entry.handlers.get(name).cloned())
    }

    /// Invoke a named handler with positional JSON arguments.
    pub async fn call(&self, tree_id: &str, name: &str, args: HandlerArgs) -> Result<Value> {
        let handler = {
            let trees = self.trees.lock().expect("registry lock");
            let entry = trees
                .get(tree_id)
                .ok_or_else(|| Error::unknown_tree(tree_id))?;
            entry
                .handlers
                .get(name)
                .cloned()
                .ok_or_else(|| Error::unknown_handler(tree_id, name))?
        };
        handler(args).await
    }
}

impl std::fmt::Debug for TreeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let trees = self.trees.lock().expect("registry lock");
        let mut dbg = f.debug_map();
        for (id, entry) in trees.iter() {
            let mut names: Vec<&String> = entry.handlers.keys().collect();
            names.sort();
            dbg.entry(id, &names);
        }
        dbg.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use hypertree_core::TreeOptions;
    use serde_json::json;

    fn registered(registry: &Arc<TreeRegistry>) -> TreeHandle {
        TreeHandle::new(
            "main",
            vec![json!({ "id": 1 })],
            TreeOptions::default(),
            None,
            registry.clone(),
        )
    }

    fn ping() -> Handler {
        Arc::new(|_| {
            let fut: BoxFuture<'static, Result<Value>> = Box::pin(async { Ok(json!("pong")) });
            fut
        })
    }

    #[tokio::test]
    async fn test_patch_preserves_unrelated_handlers() {
        let registry = Arc::new(TreeRegistry::new());
        let _handle = registered(&registry);

        registry.safe_update_handler("main", "ping", ping());
        assert_eq!(registry.call("main", "ping", vec![]).await.unwrap(), json!("pong"));
        // the published command handlers survived the patch
        assert!(registry.handler("main", commands::SET_OPEN).is_some());
        assert!(registry.handler("main", commands::HANDLE_DROP).is_some());
    }

    #[tokio::test]
    async fn test_remove_handler_leaves_rest_of_bag() {
        let registry = Arc::new(TreeRegistry::new());
        let _handle = registered(&registry);

        registry.safe_update_handler("main", "ping", ping());
        registry.remove_handler("main", "ping");
        assert!(registry.handler("main", "ping").is_none());
        assert!(registry.handler("main", commands::SET_OPEN).is_some());
        assert!(registry.contains("main"));
    }

    #[tokio::test]
    async fn test_safe_update_resets_handler_bag() {
        let registry = Arc::new(TreeRegistry::new());
        let handle = registered(&registry);
        registry.safe_update_handler("main", "ping", ping());

        // wholesale replacement: every previous handler is gone until the
        // new instance republishes
        registry.safe_update("main", handle.clone());
        assert!(registry.handler("main", "ping").is_none());
        assert!(registry.handler("main", commands::SET_OPEN).is_none());
        assert!(registry.get("main").is_some());
    }

    #[tokio::test]
    async fn test_patch_on_unknown_tree_is_noop() {
        let registry = Arc::new(TreeRegistry::new());
        registry.safe_update_handler("ghost", "ping", ping());
        registry.remove_handler("ghost", "ping");
        assert!(!registry.contains("ghost"));
        assert!(registry.handler("ghost", "ping").is_none());
    }

    #[tokio::test]
    async fn test_call_errors_on_unknown_tree_or_handler() {
        let registry = Arc::new(TreeRegistry::new());
        assert!(matches!(
            registry.call("ghost", "ping", vec![]).await,
            Err(Error::UnknownTree { .. })
        ));

        let _handle = registered(&registry);
        assert!(matches!(
            registry.call("main", "noSuchCommand", vec![]).await,
            Err(Error::UnknownHandler { .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_and_ids() {
        let registry = Arc::new(TreeRegistry::new());
        let _handle = registered(&registry);
        assert_eq!(registry.ids(), vec!["main".to_string()]);

        registry.remove("main");
        assert!(registry.ids().is_empty());
        assert!(registry.get("main").is_none());
    }
}
