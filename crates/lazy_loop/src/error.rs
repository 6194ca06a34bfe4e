//! src/error.rs
//!
//! Error kinds raised by the loop engine itself.
//!
//! User stage functions report failures through `anyhow::Error`. The engine
//! never replaces those errors; it attaches a `LoopError::Stage` context so
//! callers can recover the failing item's position with `downcast_ref` while
//! `root_cause()` still reaches the original error.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoopError {
    /// Context attached to an error returned by a stage function.
    #[error("stage failed on item {index}")]
    Stage { index: usize },

    /// A pooled task panicked. The panic payload is kept as text.
    #[error("task for item {index} panicked: {message}")]
    Panicked { index: usize, message: String },

    /// A pooled task was discarded before it produced a value.
    #[error("task for item {index} was dropped before completing (pool shut down?)")]
    Disconnected { index: usize },

    #[error("reduce() of empty sequence with no initial value")]
    EmptyReduce,

    /// Rejected configuration, signaled when the configuration call is made.
    #[error("invalid loop configuration: {0}")]
    InvalidConfig(String),

    /// Keyword-splat binding received an item that is not a key/value record.
    #[error("keyword unpacking requires a mapping item, got {0}")]
    NotAMapping(String),

    #[error("got multiple values for keyword argument '{0}'")]
    DuplicateKeyword(String),
}

impl LoopError {
    /// The source position this error refers to, when it concerns one item.
    pub fn index(&self) -> Option<usize> {
        match self {
            LoopError::Stage { index }
            | LoopError::Panicked { index, .. }
            | LoopError::Disconnected { index } => Some(*index),
            _ => None,
        }
    }

    /// Whether the error was produced by one item's stages rather than by
    /// the loop machinery.
    pub fn is_item_failure(&self) -> bool {
        self.index().is_some()
    }
}

/// Finds the `LoopError` carried by `err`, either as the error itself or as
/// context attached at any depth.
pub fn loop_error(err: &anyhow::Error) -> Option<&LoopError> {
    err.downcast_ref::<LoopError>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_stage_context_keeps_root_cause() {
        let err = Err::<(), _>(anyhow!("division by zero"))
            .context(LoopError::Stage { index: 1 })
            .unwrap_err();

        assert_eq!(loop_error(&err), Some(&LoopError::Stage { index: 1 }));
        assert_eq!(err.root_cause().to_string(), "division by zero");
        assert_eq!(err.to_string(), "stage failed on item 1");
    }

    #[test]
    fn test_item_failure_classification() {
        assert!(LoopError::Panicked {
            index: 3,
            message: "boom".into()
        }
        .is_item_failure());
        assert!(!LoopError::EmptyReduce.is_item_failure());
        assert_eq!(LoopError::InvalidConfig("x".into()).index(), None);
    }
}
