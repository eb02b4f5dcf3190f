//! Error taxonomy for the reactive core.
//!
//! Failures are isolated per binding or per subscription: one broken
//! widget must never take down the rest of the bar. Accordingly the
//! engine mostly *reports* these errors (via `tracing`) instead of
//! propagating them; only operations with an obvious caller to inform
//! (`get`, `bind`) return them.
//!
//! Releasing an already-released handle is not an error at all —
//! handles are RAII guards whose release is idempotent by
//! construction, so there is no stale-handle failure to surface.

use thiserror::Error;

use crate::source::SourceId;

pub type Result<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The owner never registered a property by this name. Fatal only
    /// to the single read or binding that asked.
    #[error("unknown property {name:?} on {owner}")]
    UnknownProperty { owner: SourceId, name: String },

    /// A binding's transform failed. The sink keeps its last good
    /// value and the binding stays live.
    #[error("transform failed for {name:?} on {owner}: {source}")]
    Transform {
        owner: SourceId,
        name: String,
        source: TransformError,
    },

    /// The source object was torn down externally. Registrations tied
    /// to it are invalidated; nothing crashes.
    #[error("{owner} has been torn down")]
    DeadSource { owner: SourceId },
}

impl SourceError {
    #[must_use]
    pub fn unknown_property(owner: SourceId, name: impl Into<String>) -> Self {
        Self::UnknownProperty {
            owner,
            name: name.into(),
        }
    }
}

/// Failure raised by a fallible binding transform.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransformError {
    message: String,
}

impl TransformError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
