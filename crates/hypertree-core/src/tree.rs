//! # TreeView
//!
//! Owns one tree: the raw input records, the per-tree options, and the
//! enhanced node forest. Nodes live in an arena keyed by [`NodeId`]; the
//! ordered `roots` list plus each node's `children` list give the tree its
//! shape, and every structural or open/close mutation ends with a counter
//! recount so the rendering layer never observes stale layout numbers.
//!
//! Ids must be unique tree-wide. A duplicate id met during enhancement is
//! logged and the duplicate record skipped, keeping the first-seen node
//! authoritative.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tracing::warn;

use crate::config::TreeOptions;
use crate::id::{fingerprint, NodeId};
use crate::node::{InsertPosition, Node, SiblingPosition};

/// What happens to a removed record's children during a raw-data removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveChildren {
    /// Splice the orphaned children at the start of the parent's child list.
    Start,
    /// Splice the orphaned children at the end of the parent's child list.
    End,
}

/// One tree instance: raw input, options, and the enhanced node forest.
#[derive(Debug)]
pub struct TreeView {
    id: String,
    data: Vec<Value>,
    options: TreeOptions,
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    fingerprint: u64,
}

impl TreeView {
    /// Build a tree and enhance it from its input data.
    pub fn new(id: impl Into<String>, data: Vec<Value>, options: TreeOptions) -> Self {
        let mut tree = Self {
            id: id.into(),
            fingerprint: fingerprint(&data),
            data,
            options,
            nodes: HashMap::new(),
            roots: Vec::new(),
        };
        tree.enhance(None);
        tree
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// The raw input records.
    pub fn data(&self) -> &[Value] {
        &self.data
    }

    /// Ordered root node ids of the enhanced forest.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of live nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ─────────────────────────────────────────────────────────────
    // Enhancement
    // ─────────────────────────────────────────────────────────────

    /// Rebuild the node forest from raw input.
    ///
    /// Applies the filter at every level, sorts each sibling level, wraps the
    /// surviving records as fresh nodes (prior node state is discarded), and
    /// recounts. The default-opened policy applies only to non-async nodes:
    /// opening an async node triggers a fetch side effect, which must come
    /// from an explicit command, never a bulk default.
    pub fn enhance(&mut self, data: Option<Vec<Value>>) {
        if let Some(data) = data {
            self.fingerprint = fingerprint(&data);
            self.data = data;
        }
        self.nodes.clear();
        self.roots.clear();
        let records = self.data.clone();
        self.roots = self.enhance_level(&records, None);
        self.recount_forest();
    }

    /// Re-enhance only when the input actually changed.
    ///
    /// Returns `true` when a rebuild happened. Equal fingerprints keep the
    /// current forest (and its open/selected state) untouched.
    pub fn update_data(&mut self, data: Vec<Value>) -> bool {
        if fingerprint(&data) == self.fingerprint {
            return false;
        }
        self.enhance(Some(data));
        true
    }

    /// Wrap pre-fetched or pre-ordered records without filter, sort, or the
    /// default-opened policy, attaching them under `parent` (back-reference
    /// only; the caller installs them into the parent's child list).
    ///
    /// Returns the top-level ids of the wrapped batch, in input order.
    pub fn static_enhance(&mut self, records: &[Value], parent: Option<&NodeId>) -> Vec<NodeId> {
        let ids = self.wrap_level(records, parent.cloned(), false);
        for id in &ids {
            self.recount_subtree(id);
        }
        ids
    }

    /// Recompute every node's derived counters without rebuilding from raw
    /// data. Idempotent; called after every open/close or structural change.
    pub fn enhance_nodes(&mut self) {
        self.recount_forest();
    }

    fn enhance_level(&mut self, records: &[Value], parent: Option<NodeId>) -> Vec<NodeId> {
        let mut level: Vec<&Value> = records
            .iter()
            .filter(|record| self.options.accepts(record))
            .collect();
        level.sort_by(|a, b| self.options.compare(a, b));
        let level: Vec<Value> = level.into_iter().cloned().collect();
        self.wrap_level(&level, parent, true)
    }

    /// Shared wrapping step. `enhanced` selects the full enhance semantics
    /// (filter/sort recursion, default-opened) over the static ones.
    fn wrap_level(&mut self, records: &[Value], parent: Option<NodeId>, enhanced: bool) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = self.record_id(record).unwrap_or_else(NodeId::generate);
            if self.nodes.contains_key(&id) {
                warn!(tree = %self.id, node = %id, "duplicate node id, record skipped");
                continue;
            }

            let declares_async = self.options.declares_async(record);
            let mut node = Node::new(id.clone(), record.clone(), parent.clone(), declares_async);
            if enhanced && !declares_async && self.options.default_opened.matches(&id) {
                node.set_opened(true);
            }
            self.nodes.insert(id.clone(), node);

            let children = match record.get(&self.options.children_key) {
                Some(Value::Array(children)) if !children.is_empty() => {
                    if enhanced {
                        self.enhance_level(children.clone().as_slice(), Some(id.clone()))
                    } else {
                        self.wrap_level(children.clone().as_slice(), Some(id.clone()), false)
                    }
                }
                _ => Vec::new(),
            };
            if let Some(node) = self.nodes.get_mut(&id) {
                node.set_children(children);
            }
            ids.push(id);
        }
        ids
    }

    fn record_id(&self, record: &Value) -> Option<NodeId> {
        record.get(&self.options.id_key).and_then(NodeId::from_value)
    }

    // ─────────────────────────────────────────────────────────────
    // Counters
    // ─────────────────────────────────────────────────────────────

    fn recount_forest(&mut self) {
        let roots = self.roots.clone();
        for id in &roots {
            self.recount_subtree(id);
        }
    }

    /// Post-order recount: children first, then the node, so each parent sees
    /// fresh child counts.
    ///
    /// `children_count` = Σ over immediate children c of
    /// `1 + (children_count(c) if c is opened else 0)`.
    /// `current_children_count` subtracts the open last child's own count,
    /// which is exactly the span of the vertical connector line.
    fn recount_subtree(&mut self, id: &NodeId) {
        let children = match self.nodes.get(id) {
            Some(node) => node.children().to_vec(),
            None => return,
        };

        let mut total = 0;
        for child in &children {
            self.recount_subtree(child);
            if let Some(child_node) = self.nodes.get(child) {
                total += 1;
                if child_node.is_opened() {
                    total += child_node.children_count();
                }
            }
        }

        let current = match children.last().and_then(|last| self.nodes.get(last)) {
            Some(last) if last.is_opened() => total - last.children_count(),
            _ => total,
        };

        if let Some(node) = self.nodes.get_mut(id) {
            node.set_counters(total, current);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Lookup and traversal
    // ─────────────────────────────────────────────────────────────

    /// Resolve an id into its node. `None` for ids absent from the tree.
    pub fn get_node_by_id(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_node_by_id_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterate all live nodes in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// The full node list in depth-first pre-order (each node before its
    /// descendants), materialized per call.
    pub fn flat(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for root in &self.roots {
            self.flatten_into(root, &mut out);
        }
        out
    }

    fn flatten_into(&self, id: &NodeId, out: &mut Vec<NodeId>) {
        out.push(id.clone());
        if let Some(node) = self.nodes.get(id) {
            for child in node.children() {
                self.flatten_into(child, out);
            }
        }
    }

    /// Flatten the raw input records in pre-order, with the children field
    /// stripped from each flattened record.
    pub fn flat_raw(&self) -> Vec<Value> {
        let mut out = Vec::new();
        Self::flatten_raw_into(&self.data, &self.options.children_key, &mut out);
        out
    }

    fn flatten_raw_into(records: &[Value], children_key: &str, out: &mut Vec<Value>) {
        for record in records {
            let mut flat = record.clone();
            let children = match &mut flat {
                Value::Object(map) => map.remove(children_key),
                _ => None,
            };
            out.push(flat);
            if let Some(Value::Array(children)) = children {
                Self::flatten_raw_into(&children, children_key, out);
            }
        }
    }

    /// Visit every node with `(node, sibling_index, depth)`.
    ///
    /// `deep` selects depth-first pre-order; otherwise the walk is
    /// breadth-first, level by level.
    pub fn traverse(&self, mut callback: impl FnMut(&Node, usize, usize), deep: bool) {
        if deep {
            for (index, root) in self.roots.iter().enumerate() {
                self.traverse_deep(root, index, 0, &mut callback);
            }
        } else {
            let mut queue: VecDeque<(NodeId, usize, usize)> = self
                .roots
                .iter()
                .enumerate()
                .map(|(index, id)| (id.clone(), index, 0))
                .collect();
            while let Some((id, index, depth)) = queue.pop_front() {
                if let Some(node) = self.nodes.get(&id) {
                    callback(node, index, depth);
                    for (child_index, child) in node.children().iter().enumerate() {
                        queue.push_back((child.clone(), child_index, depth + 1));
                    }
                }
            }
        }
    }

    fn traverse_deep(
        &self,
        id: &NodeId,
        index: usize,
        depth: usize,
        callback: &mut impl FnMut(&Node, usize, usize),
    ) {
        if let Some(node) = self.nodes.get(id) {
            callback(node, index, depth);
            for (child_index, child) in node.children().to_vec().iter().enumerate() {
                self.traverse_deep(child, child_index, depth + 1, callback);
            }
        }
    }

    /// Whether `id` lies inside the subtree rooted at `ancestor` (a node is
    /// not its own descendant).
    pub fn is_descendant(&self, ancestor: &NodeId, id: &NodeId) -> bool {
        let mut current = self.nodes.get(id).and_then(|n| n.parent().cloned());
        while let Some(parent) = current {
            if &parent == ancestor {
                return true;
            }
            current = self.nodes.get(&parent).and_then(|n| n.parent().cloned());
        }
        false
    }

    // ─────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────

    pub fn unselect_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.set_selected(false);
        }
    }

    /// Select every node. Single-select enforcement is the binding layer's
    /// job; the engine does not block this.
    pub fn select_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.set_selected(true);
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Structural mutation (node graph)
    // ─────────────────────────────────────────────────────────────

    /// Install already-enhanced children under a parent node.
    ///
    /// With `reset`, previous children not present in the new list are pruned
    /// from the arena (their subtrees drop with them). Counters are recounted
    /// before returning. Unknown parents no-op.
    pub fn set_node_children(
        &mut self,
        parent: &NodeId,
        children: Vec<NodeId>,
        position: InsertPosition,
        reset: bool,
    ) {
        if !self.nodes.contains_key(parent) {
            return;
        }
        if reset {
            let old: Vec<NodeId> = self
                .nodes
                .get(parent)
                .map(|n| n.children().to_vec())
                .unwrap_or_default();
            for id in old {
                if !children.contains(&id) {
                    self.prune(&id);
                }
            }
        }
        for id in &children {
            if let Some(node) = self.nodes.get_mut(id) {
                node.set_parent(Some(parent.clone()));
            }
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.insert_children(children, position, reset);
        }
        self.recount_forest();
    }

    /// Unlink a node from its parent (or the root list) keeping its subtree
    /// intact, ready for re-insertion elsewhere. The detached node's parent
    /// reference is cleared so no dangling back-reference survives.
    pub fn detach(&mut self, id: &NodeId) {
        let parent = match self.nodes.get(id) {
            Some(node) => node.parent().cloned(),
            None => return,
        };
        match parent {
            Some(parent_id) => {
                if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                    parent_node.remove_child(id);
                }
            }
            None => self.roots.retain(|root| root != id),
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_parent(None);
        }
        self.recount_forest();
    }

    /// Drop every child subtree of a parent, emptying its child list.
    ///
    /// A fresh batch installed afterwards may reuse the removed ids: ids are
    /// unique tree-wide, so the old children must leave the arena before a
    /// replacement batch with the same ids can be wrapped.
    pub fn clear_node_children(&mut self, parent: &NodeId) {
        let old: Vec<NodeId> = match self.nodes.get(parent) {
            Some(node) => node.children().to_vec(),
            None => return,
        };
        for id in &old {
            self.prune(id);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.set_children(Vec::new());
        }
        self.recount_forest();
    }

    /// Remove a node and its whole subtree from the tree.
    pub fn remove_subtree(&mut self, id: &NodeId) {
        self.detach(id);
        self.roots.retain(|root| root != id);
        self.prune(id);
        self.recount_forest();
    }

    /// Drop a subtree from the arena without touching sibling lists.
    fn prune(&mut self, id: &NodeId) {
        if let Some(node) = self.nodes.remove(id) {
            for child in node.children() {
                self.prune(child);
            }
        }
    }

    /// Append one node under a new parent (drop-as-children semantics:
    /// existing children are preserved, the node lands last).
    pub fn append_child(&mut self, parent: &NodeId, id: &NodeId) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(id) {
            return;
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_parent(Some(parent.clone()));
        }
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            let index = parent_node.children().len();
            parent_node.insert_child_at(index, id.clone());
        }
        self.recount_forest();
    }

    /// Re-root a detached node at the end of the root list. No-op for
    /// unknown ids and for nodes that still have a parent.
    pub fn attach_root(&mut self, id: &NodeId) {
        let detached = self
            .nodes
            .get(id)
            .is_some_and(|node| node.parent().is_none());
        if detached && !self.roots.contains(id) {
            self.roots.push(id.clone());
            self.recount_forest();
        }
    }

    /// Insert nodes immediately before/after `target` within its parent's
    /// child list, or within the root list when the target is a root.
    ///
    /// Targets that are neither rooted nor parented (a reachable state during
    /// drag/drop races) make this a no-op; returns whether anything happened.
    pub fn insert_siblings(
        &mut self,
        target: &NodeId,
        ids: Vec<NodeId>,
        position: SiblingPosition,
    ) -> bool {
        let parent = match self.nodes.get(target) {
            Some(node) => node.parent().cloned(),
            None => return false,
        };
        let inserted = match parent {
            Some(parent_id) => {
                let index = self
                    .nodes
                    .get(&parent_id)
                    .and_then(|p| p.child_index(target));
                match index {
                    Some(index) => {
                        let at = match position {
                            SiblingPosition::Before => index,
                            SiblingPosition::After => index + 1,
                        };
                        for id in &ids {
                            if let Some(node) = self.nodes.get_mut(id) {
                                node.set_parent(Some(parent_id.clone()));
                            }
                        }
                        if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                            for (offset, id) in ids.iter().enumerate() {
                                parent_node.insert_child_at(at + offset, id.clone());
                            }
                        }
                        true
                    }
                    None => false,
                }
            }
            None => match self.roots.iter().position(|root| root == target) {
                Some(index) => {
                    let at = match position {
                        SiblingPosition::Before => index,
                        SiblingPosition::After => index + 1,
                    };
                    for (offset, id) in ids.iter().enumerate() {
                        if let Some(node) = self.nodes.get_mut(id) {
                            node.set_parent(None);
                        }
                        self.roots.insert(at + offset, id.clone());
                    }
                    true
                }
                None => false,
            },
        };
        if inserted {
            self.recount_forest();
        }
        inserted
    }

    // ─────────────────────────────────────────────────────────────
    // Structural mutation (raw data, pre-enhancement)
    // ─────────────────────────────────────────────────────────────

    /// Insert raw child records under the raw record with `parent_id`,
    /// for callers that mutate input data before an `enhance` pass.
    pub fn add_children_raw(
        &mut self,
        parent_id: &NodeId,
        records: Vec<Value>,
        position: InsertPosition,
    ) {
        let id_key = self.options.id_key.clone();
        let children_key = self.options.children_key.clone();
        Self::raw_add_children(&mut self.data, parent_id, records, position, &id_key, &children_key);
    }

    fn raw_add_children(
        data: &mut [Value],
        parent_id: &NodeId,
        records: Vec<Value>,
        position: InsertPosition,
        id_key: &str,
        children_key: &str,
    ) -> bool {
        for record in data.iter_mut() {
            if record.get(id_key).and_then(NodeId::from_value).as_ref() == Some(parent_id) {
                let existing = match record.get_mut(children_key) {
                    Some(Value::Array(children)) => std::mem::take(children),
                    _ => Vec::new(),
                };
                let merged = match position {
                    InsertPosition::First => {
                        let mut merged = records;
                        merged.extend(existing);
                        merged
                    }
                    InsertPosition::Last => {
                        let mut merged = existing;
                        merged.extend(records);
                        merged
                    }
                };
                if let Value::Object(map) = record {
                    map.insert(children_key.to_string(), Value::Array(merged));
                }
                return true;
            }
            if let Some(Value::Array(children)) = record.get_mut(children_key) {
                if Self::raw_add_children(
                    children,
                    parent_id,
                    records.clone(),
                    position,
                    id_key,
                    children_key,
                ) {
                    return true;
                }
            }
        }
        false
    }

    /// Insert a raw sibling record before/after the raw record with `target`.
    pub fn add_sibling_raw(&mut self, target: &NodeId, record: Value, position: SiblingPosition) {
        let id_key = self.options.id_key.clone();
        let children_key = self.options.children_key.clone();
        Self::raw_add_sibling(&mut self.data, target, record, position, &id_key, &children_key);
    }

    fn raw_add_sibling(
        data: &mut Vec<Value>,
        target: &NodeId,
        record: Value,
        position: SiblingPosition,
        id_key: &str,
        children_key: &str,
    ) -> bool {
        if let Some(index) = data
            .iter()
            .position(|r| r.get(id_key).and_then(NodeId::from_value).as_ref() == Some(target))
        {
            let at = match position {
                SiblingPosition::Before => index,
                SiblingPosition::After => index + 1,
            };
            data.insert(at, record);
            return true;
        }
        for entry in data.iter_mut() {
            if let Some(Value::Array(children)) = entry.get_mut(children_key) {
                if Self::raw_add_sibling(children, target, record.clone(), position, id_key, children_key)
                {
                    return true;
                }
            }
        }
        false
    }

    /// Remove the raw record with `target` from the input data.
    ///
    /// With a [`LeaveChildren`] policy the removed record's children are
    /// spliced into the sibling list it was removed from, at the start or
    /// end; without one they are dropped with the record.
    pub fn remove_raw(&mut self, target: &NodeId, leave_children: Option<LeaveChildren>) {
        let id_key = self.options.id_key.clone();
        let children_key = self.options.children_key.clone();
        Self::raw_remove(&mut self.data, target, leave_children, &id_key, &children_key);
    }

    fn raw_remove(
        data: &mut Vec<Value>,
        target: &NodeId,
        leave_children: Option<LeaveChildren>,
        id_key: &str,
        children_key: &str,
    ) -> bool {
        if let Some(index) = data
            .iter()
            .position(|r| r.get(id_key).and_then(NodeId::from_value).as_ref() == Some(target))
        {
            let removed = data.remove(index);
            if let Some(policy) = leave_children {
                if let Some(Value::Array(orphans)) = removed.get(children_key) {
                    match policy {
                        LeaveChildren::Start => {
                            for (offset, orphan) in orphans.iter().enumerate() {
                                data.insert(offset, orphan.clone());
                            }
                        }
                        LeaveChildren::End => data.extend(orphans.iter().cloned()),
                    }
                }
            }
            return true;
        }
        for entry in data.iter_mut() {
            if let Some(Value::Array(children)) = entry.get_mut(children_key) {
                if Self::raw_remove(children, target, leave_children, id_key, children_key) {
                    return true;
                }
            }
        }
        false
    }
}
