//! # Tree Controller
//!
//! Wires user intents (toggle, select, drop, lazy load) into `TreeView`
//! mutations, runs the async open protocol, owns the drag gesture, and
//! republishes the tree's command handlers into the registry after every
//! change so external code can keep driving the current instance.
//!
//! One [`TreeHandle`] wraps one tree behind a `tokio::sync::Mutex`. All
//! mutation is serialized through that lock; the only suspension point is
//! the children-loader await, performed with the lock released and the node
//! flagged `loading`, so a second open of the same node while a fetch is in
//! flight is suppressed rather than duplicated.

use std::sync::{Arc, Mutex as StdMutex, Weak};

use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use hypertree_core::prelude::*;
use hypertree_core::{
    InsertPosition, Node, NodeId, SiblingPosition, TreeOptions, TreeView,
};

use crate::commands;
use crate::drag::{DragState, DropKind};
use crate::loader::{ChildrenLoader, LoaderContext};
use crate::registry::{Handler, HandlerArgs, TreeRegistry};

/// Callback fired after every observable mutation (the "rerender" signal).
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// Mutable state of one tree instance.
#[derive(Debug)]
struct TreeController {
    tree: TreeView,
    loader: Option<ChildrenLoader>,
    drag: DragState,
}

/// Cloneable front door to one tree: async commands, registry publication,
/// and snapshot reads for the rendering layer.
#[derive(Clone)]
pub struct TreeHandle {
    tree_id: String,
    inner: Arc<Mutex<TreeController>>,
    registry: Arc<TreeRegistry>,
    notifier: Arc<StdMutex<Option<ChangeListener>>>,
}

/// Weak form captured by published handlers; a handler that outlives its
/// tree upgrades to nothing and no-ops instead of mutating a disposed tree.
#[derive(Clone)]
struct WeakTreeHandle {
    tree_id: String,
    inner: Weak<Mutex<TreeController>>,
    registry: Weak<TreeRegistry>,
    notifier: Weak<StdMutex<Option<ChangeListener>>>,
}

impl WeakTreeHandle {
    fn upgrade(&self) -> Option<TreeHandle> {
        Some(TreeHandle {
            tree_id: self.tree_id.clone(),
            inner: self.inner.upgrade()?,
            registry: self.registry.upgrade()?,
            notifier: self.notifier.upgrade()?,
        })
    }
}

impl TreeHandle {
    /// Create a tree, register it (replacing any previous instance under the
    /// same identifier wholesale), and publish its command handlers.
    pub fn new(
        tree_id: impl Into<String>,
        data: Vec<Value>,
        options: TreeOptions,
        loader: Option<ChildrenLoader>,
        registry: Arc<TreeRegistry>,
    ) -> Self {
        let tree_id = tree_id.into();
        let tree = TreeView::new(tree_id.clone(), data, options);
        let handle = Self {
            tree_id: tree_id.clone(),
            inner: Arc::new(Mutex::new(TreeController {
                tree,
                loader,
                drag: DragState::new(),
            })),
            registry: registry.clone(),
            notifier: Arc::new(StdMutex::new(None)),
        };
        registry.safe_update(&tree_id, handle.clone());
        handle.republish();
        handle
    }

    pub fn id(&self) -> &str {
        &self.tree_id
    }

    /// Register the callback fired after every observable mutation.
    pub fn set_change_listener(&self, listener: impl Fn() + Send + Sync + 'static) {
        *self.notifier.lock().expect("notifier lock") = Some(Arc::new(listener));
    }

    /// Remove this tree from the registry. In-flight loads resolving after
    /// teardown are dropped by the post-await existence guard.
    pub fn unmount(&self) {
        self.registry.remove(&self.tree_id);
    }

    /// Read a snapshot of the tree under the lock.
    pub async fn read<R>(&self, f: impl FnOnce(&TreeView) -> R) -> R {
        let ctrl = self.inner.lock().await;
        f(&ctrl.tree)
    }

    // ─────────────────────────────────────────────────────────────
    // Mount / bootstrap
    // ─────────────────────────────────────────────────────────────

    /// First-mount bootstrap: publish handlers and run the default-open
    /// sequence.
    ///
    /// Matching nodes are opened in flattened order, awaiting each async
    /// load. If any opened node declared a loader, a second identical pass
    /// runs to reach descendants only discoverable after the first pass's
    /// fetches resolved. Two passes maximum.
    pub async fn mount(&self) -> Result<()> {
        self.republish();
        let policy = self.read(|tree| tree.options().default_opened.clone()).await;
        if policy.is_none() || self.read(TreeView::is_empty).await {
            return Ok(());
        }
        for _ in 0..2 {
            let targets: Vec<NodeId> = self
                .read(|tree| {
                    tree.flat()
                        .into_iter()
                        .filter(|id| policy.matches(id))
                        .collect()
                })
                .await;
            let mut saw_async = false;
            for id in targets {
                saw_async |= self
                    .read(|tree| {
                        tree.get_node_by_id(&id).is_some_and(Node::is_async)
                    })
                    .await;
                self.set_open(id, false).await?;
            }
            if !saw_async {
                break;
            }
        }
        Ok(())
    }

    /// Replace the input data; rebuilds the forest only when the data's
    /// fingerprint actually changed. Returns whether a rebuild happened.
    pub async fn update_data(&self, data: Vec<Value>) -> bool {
        let rebuilt = {
            let mut ctrl = self.inner.lock().await;
            ctrl.tree.update_data(data)
        };
        if rebuilt {
            self.changed();
        }
        rebuilt
    }

    // ─────────────────────────────────────────────────────────────
    // Open / load protocol
    // ─────────────────────────────────────────────────────────────

    /// Toggle a node open/closed (`toggle = false` forces open).
    ///
    /// Async nodes not yet loaded (or due a refresh) fetch their children
    /// first: `loading` is set before the await and observable meanwhile; a
    /// failed fetch logs, clears `loading`, and leaves the node collapsed so
    /// the user may retry. A node already `loading` is left alone — the
    /// in-flight load is authoritative.
    pub async fn set_open(&self, target: impl Into<NodeId>, toggle: bool) -> Result<()> {
        let id = target.into();
        let pending = {
            let mut ctrl = self.inner.lock().await;
            let Some(node) = ctrl.tree.get_node_by_id(&id) else {
                return Ok(());
            };
            if node.is_loading() {
                debug!(tree = %self.tree_id, node = %id, "load in flight, duplicate open suppressed");
                return Ok(());
            }
            let needs_fetch = node.is_async()
                && !node.is_opened()
                && (!node.is_async_data_loaded() || ctrl.tree.options().refresh_async_nodes);
            if !needs_fetch {
                Self::toggle_node(&mut ctrl, &id, toggle);
                None
            } else if let Some(loader) = ctrl.loader.clone() {
                let context = LoaderContext {
                    tree_id: self.tree_id.clone(),
                    node_id: id.clone(),
                    data: node.data().clone(),
                };
                if let Some(node) = ctrl.tree.get_node_by_id_mut(&id) {
                    node.set_loading(true);
                }
                Some((loader, context))
            } else {
                warn!(tree = %self.tree_id, node = %id, "async node but no loader configured");
                Self::toggle_node(&mut ctrl, &id, toggle);
                None
            }
        };
        self.changed();

        let Some((loader, context)) = pending else {
            return Ok(());
        };
        let result = loader.load(context).await;

        {
            let mut ctrl = self.inner.lock().await;
            if !ctrl.tree.contains(&id) {
                debug!(tree = %self.tree_id, node = %id, "node gone after load, result dropped");
                return Ok(());
            }
            match result {
                Ok(children) => {
                    let refresh = ctrl.tree.options().refresh_async_nodes;
                    // a refetch may return the previous batch's ids; the old
                    // children must leave the arena before re-wrapping or the
                    // duplicate guard would skip every record
                    ctrl.tree.clear_node_children(&id);
                    let child_ids = ctrl.tree.static_enhance(&children, Some(&id));
                    ctrl.tree
                        .set_node_children(&id, child_ids, InsertPosition::Last, true);
                    if let Some(node) = ctrl.tree.get_node_by_id_mut(&id) {
                        node.set_loading(false);
                        node.set_opened(true);
                        if !refresh {
                            node.set_async_data_loaded(true);
                        }
                    }
                    ctrl.tree.enhance_nodes();
                }
                Err(err) => {
                    warn!(
                        tree = %self.tree_id,
                        node = %id,
                        error = %err,
                        "async children load failed, node stays collapsed"
                    );
                    if let Some(node) = ctrl.tree.get_node_by_id_mut(&id) {
                        node.set_loading(false);
                    }
                }
            }
        }
        self.changed();
        Ok(())
    }

    fn toggle_node(ctrl: &mut TreeController, id: &NodeId, toggle: bool) {
        let next = match ctrl.tree.get_node_by_id(id) {
            Some(node) => {
                if toggle {
                    !node.is_opened()
                } else {
                    true
                }
            }
            None => return,
        };
        if let Some(node) = ctrl.tree.get_node_by_id_mut(id) {
            node.set_opened(next);
        }
        ctrl.tree.enhance_nodes();
    }

    /// Open every node named along a separator-joined id path, strictly
    /// sequentially: segment N+1's open starts only after segment N's open
    /// (including any fetch) fully resolved. Unresolvable segments stop the
    /// walk.
    pub async fn set_open_by_path(&self, path: &str) -> Result<()> {
        let separator = self.read(|tree| tree.options().path_separator).await;
        for segment in path.split(separator).filter(|s| !s.is_empty()) {
            let id = NodeId::parse(segment);
            if !self.read(|tree| tree.contains(&id)).await {
                debug!(tree = %self.tree_id, segment = %id, "path segment not found, open stops");
                break;
            }
            self.set_open(id, false).await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────

    /// Select or deselect a node. Under single-select (the default) a
    /// selection first clears every other node's flag.
    pub async fn set_selected(&self, target: impl Into<NodeId>, selected: bool) {
        let id = target.into();
        let applied = {
            let mut ctrl = self.inner.lock().await;
            if ctrl.tree.contains(&id) {
                if selected && !ctrl.tree.options().multiple_select {
                    ctrl.tree.unselect_all();
                }
                if let Some(node) = ctrl.tree.get_node_by_id_mut(&id) {
                    node.set_selected(selected);
                }
                true
            } else {
                false
            }
        };
        if applied {
            self.changed();
        }
    }

    /// Open every ancestor along the path, then select the final node
    /// (`toggle` flips its current state instead of forcing selection).
    /// `select_all_along` additionally selects each ancestor — meaningful
    /// only under multi-select, where earlier selections survive.
    pub async fn set_selected_by_path(
        &self,
        path: &str,
        select_all_along: bool,
        toggle: bool,
    ) -> Result<()> {
        let separator = self.read(|tree| tree.options().path_separator).await;
        let segments: Vec<NodeId> = path
            .split(separator)
            .filter(|s| !s.is_empty())
            .map(NodeId::parse)
            .collect();
        let Some((last, ancestors)) = segments.split_last() else {
            return Ok(());
        };
        for id in ancestors {
            if !self.read(|tree| tree.contains(id)).await {
                debug!(tree = %self.tree_id, segment = %id, "path segment not found, selection stops");
                return Ok(());
            }
            self.set_open(id.clone(), false).await?;
            if select_all_along {
                self.set_selected(id.clone(), true).await;
            }
        }
        let selected = if toggle {
            !self
                .read(|tree| {
                    tree.get_node_by_id(last).is_some_and(Node::is_selected)
                })
                .await
        } else {
            true
        };
        self.set_selected(last.clone(), selected).await;
        Ok(())
    }

    /// Select every node. No-op unless multi-select is enabled.
    pub async fn select_all(&self) {
        let applied = {
            let mut ctrl = self.inner.lock().await;
            if ctrl.tree.options().multiple_select {
                ctrl.tree.select_all();
                true
            } else {
                debug!(tree = %self.tree_id, "selectAll ignored under single-select");
                false
            }
        };
        if applied {
            self.changed();
        }
    }

    pub async fn unselect_all(&self) {
        {
            let mut ctrl = self.inner.lock().await;
            ctrl.tree.unselect_all();
        }
        self.changed();
    }

    // ─────────────────────────────────────────────────────────────
    // Node state and payload
    // ─────────────────────────────────────────────────────────────

    pub async fn set_loading(&self, target: impl Into<NodeId>, loading: bool) {
        let id = target.into();
        let applied = {
            let mut ctrl = self.inner.lock().await;
            match ctrl.tree.get_node_by_id_mut(&id) {
                Some(node) => {
                    node.set_loading(loading);
                    true
                }
                None => false,
            }
        };
        if applied {
            self.changed();
        }
    }

    /// Snapshot of the canonical current node, `None` when unresolvable.
    pub async fn get_node(&self, target: impl Into<NodeId>) -> Option<Node> {
        let id = target.into();
        self.read(|tree| tree.get_node_by_id(&id).cloned()).await
    }

    pub async fn get_node_data(&self, target: impl Into<NodeId>) -> Option<Value> {
        let id = target.into();
        self.read(|tree| tree.get_node_by_id(&id).map(|node| node.data().clone()))
            .await
    }

    /// Replace a node's raw payload in place, preserving its identity and
    /// open/selected state.
    pub async fn set_node_data(&self, target: impl Into<NodeId>, data: Value) {
        let id = target.into();
        let applied = {
            let mut ctrl = self.inner.lock().await;
            match ctrl.tree.get_node_by_id_mut(&id) {
                Some(node) => {
                    node.set_data(data);
                    true
                }
                None => false,
            }
        };
        if applied {
            self.changed();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Structural commands
    // ─────────────────────────────────────────────────────────────

    /// Install already-enhanced children under a parent.
    pub async fn set_children(
        &self,
        parent: impl Into<NodeId>,
        children: Vec<NodeId>,
        position: InsertPosition,
        reset: bool,
    ) {
        let parent = parent.into();
        {
            let mut ctrl = self.inner.lock().await;
            ctrl.tree.set_node_children(&parent, children, position, reset);
        }
        self.changed();
    }

    /// Wrap raw records (no filter/sort) and install them under a parent.
    pub async fn set_raw_children(
        &self,
        parent: impl Into<NodeId>,
        records: Vec<Value>,
        position: InsertPosition,
        reset: bool,
    ) {
        let parent = parent.into();
        let applied = {
            let mut ctrl = self.inner.lock().await;
            if ctrl.tree.contains(&parent) {
                if reset {
                    // the batch may re-install records under their existing ids
                    ctrl.tree.clear_node_children(&parent);
                }
                let ids = ctrl.tree.static_enhance(&records, Some(&parent));
                ctrl.tree.set_node_children(&parent, ids, position, reset);
                true
            } else {
                false
            }
        };
        if applied {
            self.changed();
        }
    }

    /// Insert raw records as siblings immediately before/after the target.
    /// Targets that are neither parented nor rooted no-op.
    pub async fn set_siblings(
        &self,
        target: impl Into<NodeId>,
        records: Vec<Value>,
        position: SiblingPosition,
    ) {
        let target = target.into();
        let applied = {
            let mut ctrl = self.inner.lock().await;
            let parent = match ctrl.tree.get_node_by_id(&target) {
                Some(node) => node.parent().cloned(),
                None => return,
            };
            let ids = ctrl.tree.static_enhance(&records, parent.as_ref());
            if ctrl.tree.insert_siblings(&target, ids.clone(), position) {
                true
            } else {
                // insertion raced away; drop the freshly wrapped orphans
                for id in &ids {
                    ctrl.tree.remove_subtree(id);
                }
                false
            }
        };
        if applied {
            self.changed();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Drag and drop
    // ─────────────────────────────────────────────────────────────

    pub async fn handle_drag_start(&self, source: impl Into<NodeId>) {
        let id = source.into();
        let mut ctrl = self.inner.lock().await;
        if ctrl.tree.contains(&id) {
            ctrl.drag.start(id);
        }
    }

    pub async fn handle_drag_enter(&self, target: impl Into<NodeId>, kind: DropKind) {
        let id = target.into();
        let applied = {
            let mut ctrl = self.inner.lock().await;
            if ctrl.tree.contains(&id) {
                ctrl.drag.enter(id, kind);
                true
            } else {
                false
            }
        };
        if applied {
            self.changed();
        }
    }

    pub async fn handle_drag_leave(&self, target: impl Into<NodeId>) {
        let id = target.into();
        {
            let mut ctrl = self.inner.lock().await;
            ctrl.drag.leave(&id);
        }
        self.changed();
    }

    /// Apply the drop: detach the source, then reparent it under the target
    /// (`Children`, appended last) or insert it as the target's sibling
    /// (`Before`/`After`). Dropping onto itself or into its own subtree is a
    /// guarded no-op.
    pub async fn handle_drop(&self, source: impl Into<NodeId>) {
        let id = source.into();
        let applied = {
            let mut ctrl = self.inner.lock().await;
            let Some((target, kind)) = ctrl.drag.finish() else {
                return;
            };
            if target == id
                || ctrl.tree.is_descendant(&id, &target)
                || !ctrl.tree.contains(&id)
                || !ctrl.tree.contains(&target)
            {
                debug!(tree = %self.tree_id, source = %id, target = %target, "drop ignored");
                false
            } else {
                ctrl.tree.detach(&id);
                match kind {
                    DropKind::Children => {
                        ctrl.tree.append_child(&target, &id);
                    }
                    DropKind::Before => {
                        if !ctrl.tree.insert_siblings(&target, vec![id.clone()], SiblingPosition::Before)
                        {
                            ctrl.tree.attach_root(&id);
                        }
                    }
                    DropKind::After => {
                        if !ctrl.tree.insert_siblings(&target, vec![id.clone()], SiblingPosition::After)
                        {
                            ctrl.tree.attach_root(&id);
                        }
                    }
                }
                true
            }
        };
        if applied {
            self.changed();
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Change propagation
    // ─────────────────────────────────────────────────────────────

    /// Fire the change listener and republish handlers so the registry
    /// always points at the current instance's behavior.
    fn changed(&self) {
        let listener = self.notifier.lock().expect("notifier lock").clone();
        if let Some(listener) = listener {
            listener();
        }
        self.republish();
    }

    fn downgrade(&self) -> WeakTreeHandle {
        WeakTreeHandle {
            tree_id: self.tree_id.clone(),
            inner: Arc::downgrade(&self.inner),
            registry: Arc::downgrade(&self.registry),
            notifier: Arc::downgrade(&self.notifier),
        }
    }

    fn publish(
        &self,
        name: &'static str,
        f: impl Fn(TreeHandle, HandlerArgs) -> BoxFuture<'static, Result<Value>>
            + Send
            + Sync
            + 'static,
    ) {
        let weak = self.downgrade();
        let handler: Handler = Arc::new(move |args| match weak.upgrade() {
            Some(handle) => f(handle, args),
            None => Box::pin(async { Ok(Value::Null) }),
        });
        self.registry.safe_update_handler(&self.tree_id, name, handler);
    }

    /// (Re)publish every command handler for this tree.
    fn republish(&self) {
        self.publish(commands::RERENDER, |handle, _| {
            Box::pin(async move {
                let listener = handle.notifier.lock().expect("notifier lock").clone();
                if let Some(listener) = listener {
                    listener();
                }
                Ok(Value::Null)
            })
        });
        self.publish(commands::SET_OPEN, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::SET_OPEN)?;
                let toggle = arg_bool(&args, 1, true);
                handle.set_open(id, toggle).await?;
                Ok(Value::Null)
            })
        });
        self.publish(commands::SET_OPEN_BY_PATH, |handle, args| {
            Box::pin(async move {
                let path = arg_str(&args, 0, commands::SET_OPEN_BY_PATH)?;
                handle.set_open_by_path(&path).await?;
                Ok(Value::Null)
            })
        });
        self.publish(commands::SET_LOADING, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::SET_LOADING)?;
                let loading = arg_bool(&args, 1, true);
                handle.set_loading(id, loading).await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::SET_SELECTED, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::SET_SELECTED)?;
                let selected = arg_bool(&args, 1, true);
                handle.set_selected(id, selected).await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::SET_SELECTED_BY_PATH, |handle, args| {
            Box::pin(async move {
                let path = arg_str(&args, 0, commands::SET_SELECTED_BY_PATH)?;
                let select_all_along = arg_bool(&args, 1, false);
                let toggle = arg_bool(&args, 2, false);
                handle
                    .set_selected_by_path(&path, select_all_along, toggle)
                    .await?;
                Ok(Value::Null)
            })
        });
        self.publish(commands::SET_RAW_CHILDREN, |handle, args| {
            Box::pin(async move {
                let parent = arg_node_id(&args, 0, commands::SET_RAW_CHILDREN)?;
                let records = arg_records(&args, 1, commands::SET_RAW_CHILDREN)?;
                let position = arg_insert_position(&args, 2);
                let reset = arg_bool(&args, 3, false);
                handle.set_raw_children(parent, records, position, reset).await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::SET_CHILDREN, |handle, args| {
            Box::pin(async move {
                let parent = arg_node_id(&args, 0, commands::SET_CHILDREN)?;
                let children = arg_node_ids(&args, 1, commands::SET_CHILDREN)?;
                let position = arg_insert_position(&args, 2);
                let reset = arg_bool(&args, 3, false);
                handle.set_children(parent, children, position, reset).await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::SET_SIBLINGS, |handle, args| {
            Box::pin(async move {
                let target = arg_node_id(&args, 0, commands::SET_SIBLINGS)?;
                let records = arg_records(&args, 1, commands::SET_SIBLINGS)?;
                let position = arg_sibling_position(&args, 2, commands::SET_SIBLINGS)?;
                handle.set_siblings(target, records, position).await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::GET_NODE, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::GET_NODE)?;
                Ok(handle
                    .get_node(id)
                    .await
                    .map(|node| node_summary(&node))
                    .unwrap_or(Value::Null))
            })
        });
        self.publish(commands::SET_NODE_DATA, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::SET_NODE_DATA)?;
                let data = arg_value(&args, 1, commands::SET_NODE_DATA)?;
                handle.set_node_data(id, data).await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::GET_NODE_DATA, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::GET_NODE_DATA)?;
                Ok(handle.get_node_data(id).await.unwrap_or(Value::Null))
            })
        });
        self.publish(commands::SELECT_ALL, |handle, _| {
            Box::pin(async move {
                handle.select_all().await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::UNSELECT_ALL, |handle, _| {
            Box::pin(async move {
                handle.unselect_all().await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::HANDLE_DRAG_START, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::HANDLE_DRAG_START)?;
                handle.handle_drag_start(id).await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::HANDLE_DRAG_ENTER, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::HANDLE_DRAG_ENTER)?;
                let kind = arg_str(&args, 1, commands::HANDLE_DRAG_ENTER)?;
                let kind = DropKind::parse(&kind).ok_or_else(|| {
                    Error::handler_args(commands::HANDLE_DRAG_ENTER, "unknown drop kind")
                })?;
                handle.handle_drag_enter(id, kind).await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::HANDLE_DRAG_LEAVE, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::HANDLE_DRAG_LEAVE)?;
                handle.handle_drag_leave(id).await;
                Ok(Value::Null)
            })
        });
        self.publish(commands::HANDLE_DROP, |handle, args| {
            Box::pin(async move {
                let id = arg_node_id(&args, 0, commands::HANDLE_DROP)?;
                handle.handle_drop(id).await;
                Ok(Value::Null)
            })
        });
    }
}

impl std::fmt::Debug for TreeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeHandle")
            .field("tree_id", &self.tree_id)
            .finish()
    }
}

/// JSON summary of a node for handler consumers outside the crate boundary.
pub fn node_summary(node: &Node) -> Value {
    json!({
        "id": node.id.to_value(),
        "data": node.data(),
        "parent": node.parent().map(NodeId::to_value),
        "opened": node.is_opened(),
        "selected": node.is_selected(),
        "loading": node.is_loading(),
        "asyncDataLoaded": node.is_async_data_loaded(),
        "root": node.is_root(),
        "leaf": node.is_leaf(),
        "hasChildren": node.has_children(),
        "async": node.is_async(),
        "childrenCount": node.children_count(),
        "currentChildrenCount": node.current_children_count(),
    })
}

// ─────────────────────────────────────────────────────────────────
// Handler argument parsing
// ─────────────────────────────────────────────────────────────────

fn arg_node_id(args: &HandlerArgs, index: usize, handler: &str) -> Result<NodeId> {
    args.get(index).and_then(NodeId::from_value).ok_or_else(|| {
        Error::handler_args(handler, format!("argument {index} must be a node id"))
    })
}

fn arg_node_ids(args: &HandlerArgs, index: usize, handler: &str) -> Result<Vec<NodeId>> {
    match args.get(index) {
        Some(Value::Array(entries)) => entries
            .iter()
            .map(|entry| {
                NodeId::from_value(entry).ok_or_else(|| {
                    Error::handler_args(handler, format!("argument {index} must hold node ids"))
                })
            })
            .collect(),
        _ => Err(Error::handler_args(
            handler,
            format!("argument {index} must be an array of node ids"),
        )),
    }
}

fn arg_bool(args: &HandlerArgs, index: usize, default: bool) -> bool {
    args.get(index).and_then(Value::as_bool).unwrap_or(default)
}

fn arg_str(args: &HandlerArgs, index: usize, handler: &str) -> Result<String> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::handler_args(handler, format!("argument {index} must be a string")))
}

fn arg_value(args: &HandlerArgs, index: usize, handler: &str) -> Result<Value> {
    args.get(index)
        .cloned()
        .ok_or_else(|| Error::handler_args(handler, format!("argument {index} is required")))
}

fn arg_records(args: &HandlerArgs, index: usize, handler: &str) -> Result<Vec<Value>> {
    match args.get(index) {
        Some(Value::Array(records)) => Ok(records.clone()),
        _ => Err(Error::handler_args(
            handler,
            format!("argument {index} must be an array of records"),
        )),
    }
}

fn arg_insert_position(args: &HandlerArgs, index: usize) -> InsertPosition {
    match args.get(index).and_then(Value::as_str) {
        Some("first") => InsertPosition::First,
        _ => InsertPosition::Last,
    }
}

fn arg_sibling_position(args: &HandlerArgs, index: usize, handler: &str) -> Result<SiblingPosition> {
    match args.get(index).and_then(Value::as_str) {
        Some("before") => Ok(SiblingPosition::Before),
        Some("after") | None => Ok(SiblingPosition::After),
        Some(other) => Err(Error::handler_args(
            handler,
            format!("unknown sibling position '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypertree_core::DefaultOpened;
    use serde_json::json;

    fn sample_data() -> Vec<Value> {
        vec![json!({
            "id": 1,
            "name": "root",
            "children": [
                { "id": 2, "name": "first", "children": [{ "id": 4 }, { "id": 5 }] },
                { "id": 3, "name": "second" },
            ],
        })]
    }

    fn handle_with(
        data: Vec<Value>,
        options: TreeOptions,
        loader: Option<ChildrenLoader>,
    ) -> TreeHandle {
        TreeHandle::new("main", data, options, loader, Arc::new(TreeRegistry::new()))
    }

    fn counting_loader() -> ChildrenLoader {
        ChildrenLoader::asynchronous(|ctx| {
            Box::pin(async move {
                Ok(vec![json!({ "id": 100, "loadedFor": ctx.node_id.to_value() })])
            })
        })
    }

    #[tokio::test]
    async fn test_set_open_toggles_and_recounts() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_open(1, true).await.unwrap();
        let root = handle.get_node(1).await.unwrap();
        assert!(root.is_opened());
        assert_eq!(root.children_count(), 2);

        handle.set_open(2, true).await.unwrap();
        let root = handle.get_node(1).await.unwrap();
        assert_eq!(root.children_count(), 4);

        handle.set_open(1, true).await.unwrap();
        assert!(!handle.get_node(1).await.unwrap().is_opened());
    }

    #[tokio::test]
    async fn test_set_open_force_keeps_open() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_open(1, false).await.unwrap();
        handle.set_open(1, false).await.unwrap();
        assert!(handle.get_node(1).await.unwrap().is_opened());
    }

    #[tokio::test]
    async fn test_set_open_unknown_id_is_noop() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_open(99, true).await.unwrap();
        assert!(handle.get_node(99).await.is_none());
    }

    #[tokio::test]
    async fn test_async_open_installs_fetched_children() {
        let data = vec![json!({ "id": 1, "asyncChildren": true })];
        let handle = handle_with(data, TreeOptions::default(), Some(counting_loader()));
        handle.set_open(1, true).await.unwrap();

        let node = handle.get_node(1).await.unwrap();
        assert!(node.is_opened());
        assert!(!node.is_loading());
        assert!(node.is_async_data_loaded());
        assert_eq!(node.children(), &[NodeId::Num(100)]);
        let child = handle.get_node(100).await.unwrap();
        assert_eq!(child.parent(), Some(&NodeId::Num(1)));
        assert_eq!(child.data()["loadedFor"], 1);
    }

    #[tokio::test]
    async fn test_async_open_failure_leaves_node_collapsed() {
        let loader = ChildrenLoader::asynchronous(|ctx| {
            Box::pin(async move { Err(Error::load(ctx.tree_id, ctx.node_id, "backend down")) })
        });
        let data = vec![json!({ "id": 1, "asyncChildren": true })];
        let handle = handle_with(data, TreeOptions::default(), Some(loader));
        handle.set_open(1, true).await.unwrap();

        let node = handle.get_node(1).await.unwrap();
        assert!(!node.is_opened());
        assert!(!node.is_loading());
        assert!(!node.is_async_data_loaded());
        assert!(node.is_leaf());
    }

    #[tokio::test]
    async fn test_async_open_fetches_only_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let loader = ChildrenLoader::asynchronous(move |_| {
            let seen = seen.clone();
            Box::pin(async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(vec![json!({ "id": 100 })])
            })
        });
        let data = vec![json!({ "id": 1, "asyncChildren": true })];
        let handle = handle_with(data, TreeOptions::default(), Some(loader));

        handle.set_open(1, true).await.unwrap(); // fetch
        handle.set_open(1, true).await.unwrap(); // close
        handle.set_open(1, true).await.unwrap(); // reopen, already loaded
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handle.get_node(1).await.unwrap().is_opened());
    }

    #[tokio::test]
    async fn test_refresh_async_nodes_refetches_every_open() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let loader = ChildrenLoader::asynchronous(move |_| {
            let seen = seen.clone();
            Box::pin(async move {
                let n = seen.fetch_add(1, Ordering::SeqCst);
                Ok(vec![json!({ "id": 100 + n as i64 })])
            })
        });
        let data = vec![json!({ "id": 1, "asyncChildren": true })];
        let options = TreeOptions::new().with_refresh_async_nodes(true);
        let handle = handle_with(data, options, Some(loader));

        handle.set_open(1, true).await.unwrap();
        handle.set_open(1, true).await.unwrap(); // close
        handle.set_open(1, true).await.unwrap(); // reopen refetches
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // the refetch replaced the previous children wholesale
        let node = handle.get_node(1).await.unwrap();
        assert_eq!(node.children(), &[NodeId::Num(101)]);
        assert!(handle.get_node(100).await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_refetch_of_same_ids_keeps_children() {
        let loader =
            ChildrenLoader::sync(|_| vec![json!({ "id": 100 }), json!({ "id": 101 })]);
        let data = vec![json!({ "id": 1, "asyncChildren": true })];
        let options = TreeOptions::new().with_refresh_async_nodes(true);
        let handle = handle_with(data, options, Some(loader));

        handle.set_open(1, true).await.unwrap();
        handle.set_open(1, true).await.unwrap(); // close
        handle.set_open(1, true).await.unwrap(); // reopen refetches the same ids

        let node = handle.get_node(1).await.unwrap();
        assert!(node.is_opened());
        assert_eq!(node.children(), &[NodeId::Num(100), NodeId::Num(101)]);
        assert_eq!(
            handle.get_node(100).await.unwrap().parent(),
            Some(&NodeId::Num(1))
        );
    }

    #[tokio::test]
    async fn test_set_raw_children_reset_reinstalls_same_ids() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle
            .set_raw_children(
                2,
                vec![json!({ "id": 4, "name": "fresh" }), json!({ "id": 5 })],
                InsertPosition::Last,
                true,
            )
            .await;
        let parent = handle.get_node(2).await.unwrap();
        assert_eq!(parent.children(), &[NodeId::Num(4), NodeId::Num(5)]);
        assert_eq!(handle.get_node(4).await.unwrap().data()["name"], "fresh");
    }

    #[tokio::test]
    async fn test_async_node_without_loader_plain_toggles() {
        let data = vec![json!({ "id": 1, "asyncChildren": true })];
        let handle = handle_with(data, TreeOptions::default(), None);
        handle.set_open(1, true).await.unwrap();
        assert!(handle.get_node(1).await.unwrap().is_opened());
    }

    #[tokio::test]
    async fn test_set_open_by_path_opens_every_segment() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_open_by_path("1/2/4").await.unwrap();
        assert!(handle.get_node(1).await.unwrap().is_opened());
        assert!(handle.get_node(2).await.unwrap().is_opened());
        assert!(handle.get_node(4).await.unwrap().is_opened());
        assert!(!handle.get_node(3).await.unwrap().is_opened());
    }

    #[tokio::test]
    async fn test_set_open_by_path_stops_at_unknown_segment() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_open_by_path("1/99/4").await.unwrap();
        assert!(handle.get_node(1).await.unwrap().is_opened());
        assert!(!handle.get_node(4).await.unwrap().is_opened());
    }

    #[tokio::test]
    async fn test_single_select_clears_previous_selection() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_selected(4, true).await;
        handle.set_selected(5, true).await;
        assert!(!handle.get_node(4).await.unwrap().is_selected());
        assert!(handle.get_node(5).await.unwrap().is_selected());
    }

    #[tokio::test]
    async fn test_multiple_select_keeps_previous_selection() {
        let options = TreeOptions::new().with_multiple_select(true);
        let handle = handle_with(sample_data(), options, None);
        handle.set_selected(4, true).await;
        handle.set_selected(5, true).await;
        assert!(handle.get_node(4).await.unwrap().is_selected());
        assert!(handle.get_node(5).await.unwrap().is_selected());
    }

    #[tokio::test]
    async fn test_select_all_noop_under_single_select() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.select_all().await;
        assert!(!handle.get_node(1).await.unwrap().is_selected());

        let options = TreeOptions::new().with_multiple_select(true);
        let handle = handle_with(sample_data(), options, None);
        handle.select_all().await;
        assert!(handle.get_node(1).await.unwrap().is_selected());
        handle.unselect_all().await;
        assert!(!handle.get_node(1).await.unwrap().is_selected());
    }

    #[tokio::test]
    async fn test_set_selected_by_path_opens_ancestors_and_selects_last() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_selected_by_path("1/2/5", false, false).await.unwrap();
        assert!(handle.get_node(1).await.unwrap().is_opened());
        assert!(handle.get_node(2).await.unwrap().is_opened());
        let leaf = handle.get_node(5).await.unwrap();
        assert!(leaf.is_selected());
        assert!(!leaf.is_opened());
    }

    #[tokio::test]
    async fn test_set_selected_by_path_toggle_flips() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_selected_by_path("1/2", false, true).await.unwrap();
        assert!(handle.get_node(2).await.unwrap().is_selected());
        handle.set_selected_by_path("1/2", false, true).await.unwrap();
        assert!(!handle.get_node(2).await.unwrap().is_selected());
    }

    #[tokio::test]
    async fn test_node_data_round_trip() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_selected(3, true).await;
        handle.set_node_data(3, json!({ "id": 3, "name": "patched" })).await;
        let node = handle.get_node(3).await.unwrap();
        // payload replaced in place; identity and selection preserved
        assert!(node.is_selected());
        assert_eq!(node.data()["name"], "patched");
        assert_eq!(
            handle.get_node_data(3).await.unwrap()["name"],
            "patched"
        );
        assert!(handle.get_node_data(99).await.is_none());
    }

    #[tokio::test]
    async fn test_set_raw_children_appends() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle
            .set_raw_children(3, vec![json!({ "id": 30 })], InsertPosition::Last, false)
            .await;
        let parent = handle.get_node(3).await.unwrap();
        assert_eq!(parent.children(), &[NodeId::Num(30)]);
        assert!(!parent.is_leaf());
        assert_eq!(
            handle.get_node(30).await.unwrap().parent(),
            Some(&NodeId::Num(3))
        );
    }

    #[tokio::test]
    async fn test_set_siblings_inserts_before() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle
            .set_siblings(3, vec![json!({ "id": 31 })], SiblingPosition::Before)
            .await;
        let root = handle.get_node(1).await.unwrap();
        assert_eq!(root.children(), &[NodeId::Num(2), NodeId::Num(31), NodeId::Num(3)]);
    }

    #[tokio::test]
    async fn test_set_siblings_of_root_becomes_root() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle
            .set_siblings(1, vec![json!({ "id": 40 })], SiblingPosition::After)
            .await;
        let roots = handle.read(|tree| tree.roots().to_vec()).await;
        assert_eq!(roots, vec![NodeId::Num(1), NodeId::Num(40)]);
        assert!(handle.get_node(40).await.unwrap().is_root());
    }

    #[tokio::test]
    async fn test_drop_as_children_reparents_appended() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle
            .set_raw_children(3, vec![json!({ "id": 30 })], InsertPosition::Last, false)
            .await;
        handle.handle_drag_start(4).await;
        handle.handle_drag_enter(3, DropKind::Children).await;
        handle.handle_drop(4).await;

        let target = handle.get_node(3).await.unwrap();
        // existing children preserved, dropped node appended last
        assert_eq!(target.children(), &[NodeId::Num(30), NodeId::Num(4)]);
        let moved = handle.get_node(4).await.unwrap();
        assert_eq!(moved.parent(), Some(&NodeId::Num(3)));
        assert!(!moved.is_root());
        let old_parent = handle.get_node(2).await.unwrap();
        assert_eq!(old_parent.children(), &[NodeId::Num(5)]);
    }

    #[tokio::test]
    async fn test_drop_before_inserts_sibling() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.handle_drag_start(5).await;
        handle.handle_drag_enter(2, DropKind::Before).await;
        handle.handle_drop(5).await;
        let root = handle.get_node(1).await.unwrap();
        assert_eq!(root.children(), &[NodeId::Num(5), NodeId::Num(2), NodeId::Num(3)]);
        assert_eq!(
            handle.get_node(5).await.unwrap().parent(),
            Some(&NodeId::Num(1))
        );
    }

    #[tokio::test]
    async fn test_drop_into_own_subtree_is_ignored() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.handle_drag_start(2).await;
        handle.handle_drag_enter(4, DropKind::Children).await;
        handle.handle_drop(2).await;
        // structure unchanged
        let root = handle.get_node(1).await.unwrap();
        assert_eq!(root.children(), &[NodeId::Num(2), NodeId::Num(3)]);
        assert_eq!(
            handle.get_node(2).await.unwrap().parent(),
            Some(&NodeId::Num(1))
        );
    }

    #[tokio::test]
    async fn test_drop_without_target_is_ignored() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.handle_drag_start(2).await;
        handle.handle_drop(2).await;
        let root = handle.get_node(1).await.unwrap();
        assert_eq!(root.children(), &[NodeId::Num(2), NodeId::Num(3)]);
    }

    #[tokio::test]
    async fn test_drag_enter_retargets() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.handle_drag_start(5).await;
        handle.handle_drag_enter(2, DropKind::Children).await;
        handle.handle_drag_enter(3, DropKind::After).await;
        handle.handle_drop(5).await;
        // drop applied against the latest target (after node 3)
        let root = handle.get_node(1).await.unwrap();
        assert_eq!(root.children(), &[NodeId::Num(2), NodeId::Num(3), NodeId::Num(5)]);
    }

    #[tokio::test]
    async fn test_mount_opens_default_ids() {
        let options = TreeOptions::new()
            .with_default_opened(DefaultOpened::Ids(vec![NodeId::Num(1), NodeId::Num(2)]));
        let handle = handle_with(sample_data(), options, None);
        handle.mount().await.unwrap();
        assert!(handle.get_node(1).await.unwrap().is_opened());
        assert!(handle.get_node(2).await.unwrap().is_opened());
        assert!(!handle.get_node(3).await.unwrap().is_opened());
    }

    #[tokio::test]
    async fn test_mount_two_pass_reaches_fetched_descendants() {
        // node 2 is async; its fetched child 100 is itself matched by the
        // second pass under defaultOpened=All
        let data = vec![json!({
            "id": 1,
            "children": [{ "id": 2, "asyncChildren": true }],
        })];
        let options = TreeOptions::new().with_default_opened(DefaultOpened::All);
        let handle = handle_with(data, options, Some(counting_loader()));
        handle.mount().await.unwrap();

        assert!(handle.get_node(1).await.unwrap().is_opened());
        assert!(handle.get_node(2).await.unwrap().is_opened());
        // the fetched node was only discoverable after the first pass
        assert!(handle.get_node(100).await.unwrap().is_opened());
    }

    #[tokio::test]
    async fn test_update_data_rebuild_and_noop() {
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        handle.set_open(1, true).await.unwrap();
        assert!(!handle.update_data(sample_data()).await);
        assert!(handle.get_node(1).await.unwrap().is_opened());

        let changed = vec![json!({ "id": 7 })];
        assert!(handle.update_data(changed).await);
        assert!(handle.get_node(1).await.is_none());
        assert!(handle.get_node(7).await.is_some());
    }

    #[tokio::test]
    async fn test_change_listener_fires_on_mutation() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let handle = handle_with(sample_data(), TreeOptions::default(), None);
        let fired = Arc::new(AtomicUsize::new(0));
        let seen = fired.clone();
        handle.set_change_listener(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        handle.set_open(1, true).await.unwrap();
        handle.set_selected(2, true).await;
        assert!(fired.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_node_summary_shape() {
        let node = Node::new(NodeId::Num(1), json!({ "id": 1, "name": "n" }), None, true);
        let summary = node_summary(&node);
        assert_eq!(summary["id"], 1);
        assert_eq!(summary["root"], true);
        assert_eq!(summary["leaf"], true);
        assert_eq!(summary["async"], true);
        assert_eq!(summary["opened"], false);
        assert_eq!(summary["data"]["name"], "n");
        assert_eq!(summary["parent"], Value::Null);
    }
}
