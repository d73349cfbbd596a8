//! # hypertree-app - Tree Orchestration
//!
//! Sits above `hypertree-core` and wires user intents into tree mutations:
//! the async open/load protocol, path-based commands, selection policy,
//! drag-and-drop, the default-open bootstrap, and the registry through which
//! external code commands a tree it only knows by identifier.
//!
//! ## Public API
//!
//! ### Controller (`controller`)
//! - [`TreeHandle`] - Cloneable async front door to one tree instance
//! - [`node_summary()`] - JSON snapshot of a node for handler consumers
//!
//! ### Registry (`registry`)
//! - [`TreeRegistry`] - Injected directory of live trees and handler bags
//! - [`Handler`], [`HandlerArgs`] - Externally invokable command shape
//!
//! ### Lazy loading (`loader`)
//! - [`ChildrenLoader`] - Tagged sync/async children-fetching collaborator
//! - [`LoaderContext`] - Tree/node context handed to the loader
//!
//! ### Drag and drop (`drag`)
//! - [`DragState`], [`DropKind`] - Gesture state and drop classification
//!
//! ### Command names (`commands`)
//! - String constants for every published handler name

pub mod commands;
pub mod controller;
pub mod drag;
pub mod loader;
pub mod registry;

pub use controller::{node_summary, ChangeListener, TreeHandle};
pub use drag::{DragState, DropKind};
pub use loader::{AsyncLoaderFn, ChildrenLoader, LoaderContext, SyncLoaderFn};
pub use registry::{Handler, HandlerArgs, TreeRegistry};
