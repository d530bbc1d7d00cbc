//! Error types for shop-hooks

use crate::dispatcher::{CallbackError, HookKind};

/// Result type for dispatcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the event dispatcher
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A registered callback returned an error while the dispatcher runs
    /// under [`CallbackErrorPolicy::Propagate`](crate::CallbackErrorPolicy::Propagate).
    #[error("{kind} callback on '{event}' registered by {owner} failed: {source}")]
    Callback {
        kind: HookKind,
        event: String,
        owner: String,
        #[source]
        source: CallbackError,
    },

    /// A typed filter value could not be converted to or from JSON.
    #[error("filter '{event}' produced a value of the wrong shape: {source}")]
    Value {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}
