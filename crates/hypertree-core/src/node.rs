//! # Tree Node
//!
//! A single entry in an enhanced tree: the raw record it wraps, its view
//! state (opened/selected/loading), its structural links, and the derived
//! counters the rendering layer uses to size connector lines.
//!
//! Nodes live in the arena owned by [`TreeView`](crate::tree::TreeView);
//! parent and child links are [`NodeId`] keys into that arena, never owning
//! references, so ownership flows strictly tree → node and no reference
//! cycles can form.

use serde_json::Value;

use crate::id::NodeId;

/// Where newly inserted children land relative to existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertPosition {
    First,
    #[default]
    Last,
}

/// Where newly inserted siblings land relative to the target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingPosition {
    Before,
    After,
}

/// A node in an enhanced tree.
///
/// Identity is the `id`; a full re-enhancement from raw data creates fresh
/// nodes and does not migrate state. In-place mutation (open, select, insert,
/// reparent) is the supported way to change a tree without losing state.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique id, taken from the raw record or generated.
    pub id: NodeId,

    /// The raw record this node wraps; opaque to the engine.
    data: Value,

    /// Ordered child ids.
    children: Vec<NodeId>,

    /// Non-owning back-reference; `None` for root nodes.
    parent: Option<NodeId>,

    opened: bool,
    selected: bool,
    loading: bool,
    async_data_loaded: bool,

    /// Resolved at enhance time from the configured async marker field.
    async_children: bool,

    /// Descendants visible through each descendant's own `opened` flag.
    children_count: usize,

    /// `children_count` minus the open last child's own count; sizes the
    /// vertical connector line spanning currently visible descendants.
    current_children_count: usize,
}

impl From<&Node> for NodeId {
    fn from(node: &Node) -> Self {
        node.id.clone()
    }
}

impl Node {
    pub fn new(id: NodeId, data: Value, parent: Option<NodeId>, async_children: bool) -> Self {
        Self {
            id,
            data,
            children: Vec::new(),
            parent,
            opened: false,
            selected: false,
            loading: false,
            async_data_loaded: false,
            async_children,
            children_count: 0,
            current_children_count: 0,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Payload
    // ─────────────────────────────────────────────────────────────

    /// The raw record.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Replace the raw record, preserving node identity and view state.
    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    // ─────────────────────────────────────────────────────────────
    // Structure
    // ─────────────────────────────────────────────────────────────

    /// Ordered child ids; empty slice when none.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn first_child(&self) -> Option<&NodeId> {
        self.children.first()
    }

    pub fn last_child(&self) -> Option<&NodeId> {
        self.children.last()
    }

    /// Install children: wholesale when the node has none (or `reset`),
    /// otherwise prepend or append per `position`.
    pub fn insert_children(&mut self, ids: Vec<NodeId>, position: InsertPosition, reset: bool) {
        if !self.has_children() || reset {
            self.children = ids;
            return;
        }
        match position {
            InsertPosition::First => {
                let mut merged = ids;
                merged.append(&mut self.children);
                self.children = merged;
            }
            InsertPosition::Last => self.children.extend(ids),
        }
    }

    /// Replace the child list outright.
    pub fn set_children(&mut self, ids: Vec<NodeId>) {
        self.children = ids;
    }

    /// Unlink one child id. The caller clears the removed node's own parent
    /// reference when reparenting, so no dangling back-reference survives.
    pub fn remove_child(&mut self, id: &NodeId) {
        self.children.retain(|child| child != id);
    }

    /// Insert a child id at an exact position (clamped to the list length).
    pub fn insert_child_at(&mut self, index: usize, id: NodeId) {
        let index = index.min(self.children.len());
        self.children.insert(index, id);
    }

    /// Position of a child id among this node's children.
    pub fn child_index(&self, id: &NodeId) -> Option<usize> {
        self.children.iter().position(|child| child == id)
    }

    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    // ─────────────────────────────────────────────────────────────
    // Derived structural flags
    // ─────────────────────────────────────────────────────────────

    /// A node is root iff it has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// A node is leaf iff it has zero children in the resulting tree.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether the raw record declared lazily loaded children.
    pub fn is_async(&self) -> bool {
        self.async_children
    }

    // ─────────────────────────────────────────────────────────────
    // View state flags
    // ─────────────────────────────────────────────────────────────

    pub fn set_opened(&mut self, opened: bool) {
        self.opened = opened;
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_async_data_loaded(&mut self, loaded: bool) {
        self.async_data_loaded = loaded;
    }

    pub fn is_async_data_loaded(&self) -> bool {
        self.async_data_loaded
    }

    // ─────────────────────────────────────────────────────────────
    // Derived counters
    // ─────────────────────────────────────────────────────────────

    pub fn children_count(&self) -> usize {
        self.children_count
    }

    pub fn current_children_count(&self) -> usize {
        self.current_children_count
    }

    pub(crate) fn set_counters(&mut self, children_count: usize, current_children_count: usize) {
        self.children_count = children_count;
        self.current_children_count = current_children_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: i64) -> Node {
        Node::new(NodeId::Num(id), json!({ "id": id }), None, false)
    }

    #[test]
    fn test_new_node_defaults() {
        let n = node(1);
        assert!(n.is_root());
        assert!(n.is_leaf());
        assert!(!n.has_children());
        assert!(!n.is_opened());
        assert!(!n.is_selected());
        assert!(!n.is_loading());
        assert!(!n.is_async());
        assert!(!n.is_async_data_loaded());
        assert_eq!(n.children_count(), 0);
        assert_eq!(n.first_child(), None);
        assert_eq!(n.last_child(), None);
    }

    #[test]
    fn test_insert_children_wholesale_when_empty() {
        let mut n = node(1);
        n.insert_children(vec![NodeId::Num(2), NodeId::Num(3)], InsertPosition::First, false);
        assert_eq!(n.children(), &[NodeId::Num(2), NodeId::Num(3)]);
    }

    #[test]
    fn test_insert_children_prepend_and_append() {
        let mut n = node(1);
        n.set_children(vec![NodeId::Num(2)]);
        n.insert_children(vec![NodeId::Num(3)], InsertPosition::Last, false);
        assert_eq!(n.children(), &[NodeId::Num(2), NodeId::Num(3)]);
        n.insert_children(vec![NodeId::Num(4)], InsertPosition::First, false);
        assert_eq!(n.children(), &[NodeId::Num(4), NodeId::Num(2), NodeId::Num(3)]);
    }

    #[test]
    fn test_insert_children_reset_replaces() {
        let mut n = node(1);
        n.set_children(vec![NodeId::Num(2), NodeId::Num(3)]);
        n.insert_children(vec![NodeId::Num(9)], InsertPosition::Last, true);
        assert_eq!(n.children(), &[NodeId::Num(9)]);
    }

    #[test]
    fn test_remove_child_and_index() {
        let mut n = node(1);
        n.set_children(vec![NodeId::Num(2), NodeId::Num(3), NodeId::Num(4)]);
        assert_eq!(n.child_index(&NodeId::Num(3)), Some(1));
        n.remove_child(&NodeId::Num(3));
        assert_eq!(n.children(), &[NodeId::Num(2), NodeId::Num(4)]);
        assert_eq!(n.child_index(&NodeId::Num(3)), None);
    }

    #[test]
    fn test_first_and_last_child() {
        let mut n = node(1);
        n.set_children(vec![NodeId::Num(2), NodeId::Num(3)]);
        assert_eq!(n.first_child(), Some(&NodeId::Num(2)));
        assert_eq!(n.last_child(), Some(&NodeId::Num(3)));
    }

    #[test]
    fn test_parent_and_root_flag() {
        let mut n = node(2);
        assert!(n.is_root());
        n.set_parent(Some(NodeId::Num(1)));
        assert!(!n.is_root());
        assert_eq!(n.parent(), Some(&NodeId::Num(1)));
        n.set_parent(None);
        assert!(n.is_root());
    }

    #[test]
    fn test_set_data_preserves_state() {
        let mut n = node(1);
        n.set_opened(true);
        n.set_selected(true);
        n.set_data(json!({ "id": 1, "name": "renamed" }));
        assert!(n.is_opened());
        assert!(n.is_selected());
        assert_eq!(n.data()["name"], "renamed");
    }
}
