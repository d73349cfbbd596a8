//! # hypertree-core - Tree State Engine
//!
//! Foundation crate for hypertree. Wraps raw hierarchical records
//! (`serde_json::Value`) into a stateful node forest with open/selected/
//! loading flags, derived visible-descendant counters, structural mutation,
//! and filtering/sorting — everything a tree widget needs short of rendering.
//!
//! This crate has **zero internal dependencies** -- it only depends on
//! external crates (serde, serde_json, thiserror, tracing, uuid).
//!
//! ## Public API
//!
//! ### Identity (`id`)
//! - [`NodeId`] - String or integer node id, generated when the record has none
//! - [`fingerprint()`] - Deep content hash used to detect input-data changes
//!
//! ### Configuration (`config`)
//! - [`TreeOptions`] - id/children/async field names, filter, sort,
//!   default-opened policy, selection policy, refresh policy
//! - [`DefaultOpened`] - Which nodes start opened after enhancement
//!
//! ### Nodes (`node`)
//! - [`Node`] - One wrapped record with view state and derived counters
//! - [`InsertPosition`], [`SiblingPosition`] - Placement of inserted nodes
//!
//! ### Trees (`tree`)
//! - [`TreeView`] - Owns the arena-backed forest; enhancement, traversal,
//!   lookup, structural mutation, raw-data mutation
//! - [`LeaveChildren`] - Orphan policy for raw-data removal
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum; lookup misses are `Option`s, not errors
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use hypertree_core::prelude::*;
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod logging;
pub mod node;
pub mod tree;

/// Prelude for common imports used throughout all hypertree crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use config::{
    DefaultOpened, FilterFn, SortFn, TreeOptions, DEFAULT_ASYNC_KEY, DEFAULT_CHILDREN_KEY,
    DEFAULT_ID_KEY, DEFAULT_PATH_SEPARATOR,
};
pub use error::{Error, Result, ResultExt};
pub use id::{fingerprint, NodeId};
pub use node::{InsertPosition, Node, SiblingPosition};
pub use tree::{LeaveChildren, TreeView};
