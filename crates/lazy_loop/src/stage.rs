//! src/stage.rs
//!
//! Per-item stages and the pipeline they compose into.
//!
//! A `Stage<T, R>` is either a transform (replaces the running value) or a
//! filter (keeps or drops it). Stages are chained with [`Pipeline::then`]
//! into one `I -> Step<O>` function that a loop runs for every item, either
//! on the calling thread or inside a pool task. Once a value is
//! [`Step::Dropped`], later stages are not invoked for that item.

use anyhow::{Error, Result};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::executor::{panic_message, TaskError};

/// Running value of one item as it moves through the stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Keep(T),
    /// Rejected by a filter. Nothing is yielded for the item.
    Dropped,
}

impl<T> Step<T> {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Step::Dropped)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Step::Keep(value) => Some(value),
            Step::Dropped => None,
        }
    }
}

type TransformFn<T, R> = Arc<dyn Fn(T) -> Result<R> + Send + Sync>;
type FilterFn<T, R> = Arc<dyn Fn(T) -> Result<Step<R>> + Send + Sync>;

/// One registered stage.
///
/// `Filter` is only ever constructed with `R = T` (see [`Stage::filter`]).
pub enum Stage<T, R> {
    Transform(TransformFn<T, R>),
    Filter(FilterFn<T, R>),
}

impl<T, R> Clone for Stage<T, R> {
    fn clone(&self) -> Self {
        match self {
            Stage::Transform(f) => Stage::Transform(Arc::clone(f)),
            Stage::Filter(f) => Stage::Filter(Arc::clone(f)),
        }
    }
}

impl<T, R> fmt::Debug for Stage<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Transform(_) => f.write_str("Stage::Transform"),
            Stage::Filter(_) => f.write_str("Stage::Filter"),
        }
    }
}

impl<T: 'static, R: 'static> Stage<T, R> {
    pub fn transform<F>(f: F) -> Self
    where
        F: Fn(T) -> Result<R> + Send + Sync + 'static,
    {
        Stage::Transform(Arc::new(f))
    }

    #[inline]
    pub fn apply(&self, value: T) -> Result<Step<R>> {
        match self {
            Stage::Transform(f) => f(value).map(Step::Keep),
            Stage::Filter(f) => f(value),
        }
    }
}

impl<T: 'static> Stage<T, T> {
    /// Keeps the value when `predicate` holds, drops it otherwise.
    pub fn filter<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> Result<bool> + Send + Sync + 'static,
    {
        Stage::Filter(Arc::new(move |value: T| -> Result<Step<T>> {
            Ok(if predicate(&value)? {
                Step::Keep(value)
            } else {
                Step::Dropped
            })
        }))
    }
}

/// The composed stage chain of a loop: `I -> Step<O>`.
///
/// Cheap to clone; pool tasks each hold a clone.
pub struct Pipeline<I, O> {
    run: Arc<dyn Fn(I) -> Result<Step<O>> + Send + Sync>,
    stages: usize,
}

impl<I, O> Clone for Pipeline<I, O> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
            stages: self.stages,
        }
    }
}

impl<I, O> fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .finish()
    }
}

impl<I: 'static> Pipeline<I, I> {
    /// The empty chain: every item passes through unchanged.
    pub fn identity() -> Self {
        Self {
            run: Arc::new(|item: I| -> Result<Step<I>> { Ok(Step::Keep(item)) }),
            stages: 0,
        }
    }
}

impl<I, O> Pipeline<I, O> {
    #[inline]
    pub fn apply(&self, item: I) -> Result<Step<O>> {
        (self.run)(item)
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages == 0
    }
}

impl<I: 'static, O: 'static> Pipeline<I, O> {
    /// Appends `stage`. It only runs on values the earlier stages kept.
    pub fn then<R: 'static>(self, stage: Stage<O, R>) -> Pipeline<I, R> {
        let previous = self.run;
        Pipeline {
            run: Arc::new(move |item: I| -> Result<Step<R>> {
                match previous(item)? {
                    Step::Keep(value) => stage.apply(value),
                    Step::Dropped => Ok(Step::Dropped),
                }
            }),
            stages: self.stages + 1,
        }
    }

    /// Turns failures of the chain into values: an error or a panic while
    /// running an item becomes `Keep(Err(..))`. Dropped items stay dropped.
    pub fn capture(self) -> Pipeline<I, Result<O>> {
        let inner = self.run;
        Pipeline {
            run: Arc::new(move |item: I| -> Result<Step<Result<O>>> {
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| inner(item))) {
                    Ok(Ok(Step::Keep(value))) => Ok(value),
                    Ok(Ok(Step::Dropped)) => return Ok(Step::Dropped),
                    Ok(Err(err)) => Err(err),
                    Err(payload) => Err(Error::new(TaskError::Panicked(panic_message(
                        payload.as_ref(),
                    )))),
                };
                Ok(Step::Keep(outcome))
            }),
            stages: self.stages,
        }
    }
}
