//! Application error types with rich context

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Tree Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Async children load failed for node '{node_id}' in tree '{tree_id}': {message}")]
    Load {
        tree_id: String,
        node_id: String,
        message: String,
    },

    #[error("Unknown tree: {tree_id}")]
    UnknownTree { tree_id: String },

    #[error("Unknown handler '{handler}' for tree '{tree_id}'")]
    UnknownHandler { tree_id: String, handler: String },

    #[error("Invalid handler arguments for '{handler}': {message}")]
    HandlerArgs { handler: String, message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn load(
        tree_id: impl Into<String>,
        node_id: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::Load {
            tree_id: tree_id.into(),
            node_id: node_id.to_string(),
            message: message.into(),
        }
    }

    pub fn unknown_tree(tree_id: impl Into<String>) -> Self {
        Self::UnknownTree {
            tree_id: tree_id.into(),
        }
    }

    pub fn unknown_handler(tree_id: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::UnknownHandler {
            tree_id: tree_id.into(),
            handler: handler.into(),
        }
    }

    pub fn handler_args(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerArgs {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Whether this error is expected during normal interactive use.
    ///
    /// Load failures are recoverable: the node simply stays collapsed and the
    /// user may toggle it again to retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Load { .. } | Error::UnknownTree { .. } | Error::UnknownHandler { .. }
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
