//! src/executor/mod.rs
//!
//! Execution backends for pooled loops.
//!
//! A backend accepts one task per item and hands back a [`Pending`] handle.
//! The loop engine keeps the handles in submission order and waits on them
//! in that order, so results are observed in source order regardless of
//! which task finishes first.
//!
//! - `immediate`: [`Immediate`] runs each task on the consuming thread the
//!   first time its handle is waited on.
//! - `pool`: [`ThreadPool`] runs tasks on named worker threads.
//! - `thread`: thread-local worker IDs.

use anyhow::Result;
use crossbeam_channel::Receiver;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

pub(crate) mod immediate;
pub(crate) mod pool;
pub(crate) mod thread;

pub use immediate::Immediate;
pub use pool::ThreadPool;

/// Work submitted for one item.
pub type Task<R> = Box<dyn FnOnce() -> R + Send + 'static>;

/// Accepts tasks and returns handles to their eventual results.
pub trait Executor<R: Send + 'static> {
    fn submit(&self, task: Task<R>) -> Result<Pending<R>>;
}

/// Why a task produced no value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task was dropped before completing")]
    Disconnected,
}

enum Source<R> {
    /// Not started yet; runs on the waiting thread.
    Deferred(Option<Task<R>>),
    /// Running (or queued) on a worker; delivers through a one-shot channel.
    Remote(Receiver<std::thread::Result<R>>),
}

/// Handle to the result of a submitted task.
///
/// [`Pending::wait`] blocks until the result is available and caches it, so
/// waiting again returns the same value without running anything twice.
pub struct Pending<R> {
    source: Source<R>,
    outcome: Option<Result<R, TaskError>>,
}

impl<R> Pending<R> {
    pub(crate) fn deferred(task: Task<R>) -> Self {
        Self {
            source: Source::Deferred(Some(task)),
            outcome: None,
        }
    }

    pub(crate) fn remote(rx: Receiver<std::thread::Result<R>>) -> Self {
        Self {
            source: Source::Remote(rx),
            outcome: None,
        }
    }

    /// Whether the result has already been observed.
    pub fn is_ready(&self) -> bool {
        self.outcome.is_some()
    }

    /// Blocks until the task has finished, returning a reference to its value.
    pub fn wait(&mut self) -> Result<&R, TaskError> {
        let source = &mut self.source;
        self.outcome
            .get_or_insert_with(|| resolve(source))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Blocks until the task has finished and takes its value.
    pub fn into_inner(mut self) -> Result<R, TaskError> {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => resolve(&mut self.source),
        }
    }
}

fn resolve<R>(source: &mut Source<R>) -> Result<R, TaskError> {
    match source {
        Source::Deferred(task) => match task.take() {
            Some(task) => {
                panic::catch_unwind(AssertUnwindSafe(task)).map_err(|payload| {
                    TaskError::Panicked(panic_message(payload.as_ref()))
                })
            }
            None => Err(TaskError::Disconnected),
        },
        Source::Remote(rx) => match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
            Err(_) => Err(TaskError::Disconnected),
        },
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
