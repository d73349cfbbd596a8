//! Per-tree configuration.
//!
//! Mirrors the option surface a hosting application hands to the engine:
//! which record fields carry the id / children / async marker, how records
//! are filtered and ordered, which nodes start opened, and the selection
//! policy the binding layer enforces.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::id::NodeId;

/// Default field name holding a record's id.
pub const DEFAULT_ID_KEY: &str = "id";

/// Default field name holding a record's children array.
pub const DEFAULT_CHILDREN_KEY: &str = "children";

/// Default field name marking a record as async (children fetched lazily).
pub const DEFAULT_ASYNC_KEY: &str = "asyncChildren";

/// Default separator for path-based commands ("1/2/5").
pub const DEFAULT_PATH_SEPARATOR: char = '/';

/// Predicate applied to raw records at every level during enhancement.
pub type FilterFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Comparator ordering sibling records during enhancement.
pub type SortFn = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// Which nodes start opened after a full enhancement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DefaultOpened {
    /// Everything starts collapsed.
    #[default]
    None,
    /// Every non-async node starts opened.
    All,
    /// Only nodes with these ids start opened (async nodes still excluded).
    Ids(Vec<NodeId>),
}

impl DefaultOpened {
    /// Whether the policy opens the node with this id.
    pub fn matches(&self, id: &NodeId) -> bool {
        match self {
            DefaultOpened::None => false,
            DefaultOpened::All => true,
            DefaultOpened::Ids(ids) => ids.contains(id),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, DefaultOpened::None)
    }
}

/// Configuration for one tree instance.
#[derive(Clone)]
pub struct TreeOptions {
    /// Record field holding the node id.
    pub id_key: String,

    /// Record field holding the nested children array.
    pub children_key: String,

    /// Record field whose truthy value marks the node as async-loaded.
    pub async_key: String,

    /// Records failing this predicate are excluded at every level.
    pub filter: Option<FilterFn>,

    /// Sibling ordering applied at every level.
    pub sort: Option<SortFn>,

    /// Which nodes open automatically (async nodes always start closed).
    pub default_opened: DefaultOpened,

    /// When false, selecting a node clears every other selection first.
    pub multiple_select: bool,

    /// When true, every open of an async node refetches its children.
    pub refresh_async_nodes: bool,

    /// Separator for path-based commands.
    pub path_separator: char,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            id_key: DEFAULT_ID_KEY.to_string(),
            children_key: DEFAULT_CHILDREN_KEY.to_string(),
            async_key: DEFAULT_ASYNC_KEY.to_string(),
            filter: None,
            sort: None,
            default_opened: DefaultOpened::None,
            multiple_select: false,
            refresh_async_nodes: false,
            path_separator: DEFAULT_PATH_SEPARATOR,
        }
    }
}

impl fmt::Debug for TreeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeOptions")
            .field("id_key", &self.id_key)
            .field("children_key", &self.children_key)
            .field("async_key", &self.async_key)
            .field("has_filter", &self.filter.is_some())
            .field("has_sort", &self.sort.is_some())
            .field("default_opened", &self.default_opened)
            .field("multiple_select", &self.multiple_select)
            .field("refresh_async_nodes", &self.refresh_async_nodes)
            .field("path_separator", &self.path_separator)
            .finish()
    }
}

impl TreeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id_key(mut self, key: impl Into<String>) -> Self {
        self.id_key = key.into();
        self
    }

    pub fn with_children_key(mut self, key: impl Into<String>) -> Self {
        self.children_key = key.into();
        self
    }

    pub fn with_async_key(mut self, key: impl Into<String>) -> Self {
        self.async_key = key.into();
        self
    }

    pub fn with_filter(mut self, filter: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_sort(
        mut self,
        sort: impl Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.sort = Some(Arc::new(sort));
        self
    }

    pub fn with_default_opened(mut self, default_opened: DefaultOpened) -> Self {
        self.default_opened = default_opened;
        self
    }

    pub fn with_multiple_select(mut self, multiple_select: bool) -> Self {
        self.multiple_select = multiple_select;
        self
    }

    pub fn with_refresh_async_nodes(mut self, refresh: bool) -> Self {
        self.refresh_async_nodes = refresh;
        self
    }

    pub fn with_path_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }

    /// Whether a raw record passes the filter (no filter accepts everything).
    pub fn accepts(&self, record: &Value) -> bool {
        match &self.filter {
            Some(filter) => filter(record),
            None => true,
        }
    }

    /// Compare two sibling records (no comparator keeps input order).
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match &self.sort {
            Some(sort) => sort(a, b),
            None => Ordering::Equal,
        }
    }

    /// Whether a raw record declares async children.
    ///
    /// Any truthy marker counts: `true`, a non-zero number, or a non-empty
    /// string. The marker is resolved once, at enhance time, into the node's
    /// `async` flag.
    pub fn declares_async(&self, record: &Value) -> bool {
        match record.get(&self.async_key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            _ => false,
        }
    }
}
