//! Error Types
//!
//! Failures that can escape the engine. Missing lookups (unknown fields,
//! records or graph nodes) are not errors; they surface as `None` or empty
//! collections.

use thiserror::Error;

use crate::graph::CyclicDependency;

/// Boxed error returned by effect callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The effect graph has no total order. Fatal until the offending edge
    /// is removed.
    #[error(transparent)]
    CyclicDependency(#[from] CyclicDependency<String>),

    /// An effect callback failed. Nodes later in the pass were not evaluated
    /// and mutations made by earlier nodes were kept.
    #[error("effect `{key}` failed: {source}")]
    Effect {
        key: String,
        #[source]
        source: BoxError,
    },

    /// `trigger_effects` was called while another pass on the same manager
    /// had not finished.
    #[error("an effect pass is already in progress")]
    PassInProgress,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
