//! Names of the externally invokable tree commands.
//!
//! These are the keys under which a tree's handlers are published into the
//! [`TreeRegistry`](crate::registry::TreeRegistry), so decoupled code can
//! command a tree it only knows by identifier.

pub const RERENDER: &str = "rerender";
pub const SET_OPEN: &str = "setOpen";
pub const SET_OPEN_BY_PATH: &str = "setOpenByPath";
pub const SET_LOADING: &str = "setLoading";
pub const SET_SELECTED: &str = "setSelected";
pub const SET_SELECTED_BY_PATH: &str = "setSelectedByPath";
pub const SET_RAW_CHILDREN: &str = "setRawChildren";
pub const SET_CHILDREN: &str = "setChildren";
pub const SET_SIBLINGS: &str = "setSiblings";
pub const GET_NODE: &str = "getNode";
pub const SET_NODE_DATA: &str = "setNodeData";
pub const GET_NODE_DATA: &str = "getNodeData";
pub const SELECT_ALL: &str = "selectAll";
pub const UNSELECT_ALL: &str = "unselectAll";
pub const HANDLE_DRAG_START: &str = "handleDragStart";
pub const HANDLE_DRAG_ENTER: &str = "handleDragEnter";
pub const HANDLE_DRAG_LEAVE: &str = "handleDragLeave";
pub const HANDLE_DROP: &str = "handleDrop";

/// Every command name, in publication order.
pub const ALL: &[&str] = &[
    RERENDER,
    SET_OPEN,
    SET_OPEN_BY_PATH,
    SET_LOADING,
    SET_SELECTED,
    SET_SELECTED_BY_PATH,
    SET_RAW_CHILDREN,
    SET_CHILDREN,
    SET_SIBLINGS,
    GET_NODE,
    SET_NODE_DATA,
    GET_NODE_DATA,
    SELECT_ALL,
    UNSELECT_ALL,
    HANDLE_DRAG_START,
    HANDLE_DRAG_ENTER,
    HANDLE_DRAG_LEAVE,
    HANDLE_DROP,
];
