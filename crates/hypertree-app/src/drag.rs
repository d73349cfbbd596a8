//! Drag-and-drop state.
//!
//! Tracks the node being dragged and the current drop target with its drop
//! kind. The structural effect of a drop (detach + reparent or sibling
//! insert) is applied by the controller; this module only owns the state
//! machine the drag zones drive.

use hypertree_core::NodeId;

/// Position of a drop relative to the target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    /// Insert as the target's preceding sibling.
    Before,
    /// Reparent under the target, appended after its existing children.
    Children,
    /// Insert as the target's following sibling.
    After,
}

impl DropKind {
    /// Parse the wire form used by drag-zone callbacks.
    pub fn parse(kind: &str) -> Option<DropKind> {
        match kind {
            "before" => Some(DropKind::Before),
            "children" => Some(DropKind::Children),
            "after" => Some(DropKind::After),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DropKind::Before => "before",
            DropKind::Children => "children",
            DropKind::After => "after",
        }
    }
}

/// Live drag gesture state for one tree.
#[derive(Debug, Default)]
pub struct DragState {
    source: Option<NodeId>,
    target: Option<(NodeId, DropKind)>,
}

impl DragState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin dragging a node.
    pub fn start(&mut self, source: NodeId) {
        self.source = Some(source);
        self.target = None;
    }

    /// Mark a node as the current drop target.
    ///
    /// Entering a different node replaces the previous target (its drop
    /// indicator clears); re-entering the same node just updates the kind.
    pub fn enter(&mut self, target: NodeId, kind: DropKind) {
        self.target = Some((target, kind));
    }

    /// Clear the drop indicator when leaving `target`. Leaving a node that is
    /// no longer the target (the gesture already moved on) changes nothing.
    pub fn leave(&mut self, target: &NodeId) {
        if self.target.as_ref().is_some_and(|(id, _)| id == target) {
            self.target = None;
        }
    }

    /// Consume the gesture, yielding the drop target if one is set.
    pub fn finish(&mut self) -> Option<(NodeId, DropKind)> {
        self.source = None;
        self.target.take()
    }

    /// Abandon the gesture entirely.
    pub fn clear(&mut self) {
        self.source = None;
        self.target = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<&NodeId> {
        self.source.as_ref()
    }

    pub fn target(&self) -> Option<&(NodeId, DropKind)> {
        self.target.as_ref()
    }
}
