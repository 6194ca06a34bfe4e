//! src/config.rs
//!
//! Configuration for pooled evaluation.
//!
//! Example:
//! ```ignore
//! let config = PoolConfig::builder()
//!     .backend(Backend::Threads)
//!     .max_workers(4)
//!     .chunk_size(100)
//!     .build();
//!
//! // Failed items are yielded as `Err` values instead of ending the pass.
//! let looped = looped.concurrently_with(config, ReturnAsValue)?;
//! ```
//!
//! # Memory considerations:
//! - `chunk_size`: bounds how many source items are materialized and in
//!   flight at once. Without it the whole source is read before the first
//!   value is yielded, which never finishes for an infinite source.
//! - `max_workers`: the job queue holds `2 * max_workers` tasks.

use anyhow::{ensure, Result};
use std::fmt;
use std::str::FromStr;
use std::thread;

use crate::error::LoopError;
use crate::executor::{Executor, Immediate, ThreadPool};
use crate::stage::Pipeline;

/// Where pooled tasks run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    /// Worker threads.
    #[default]
    Threads,
    /// On the consuming thread, one task at a time, when its result is
    /// needed. Exercises the pooled code path without any threads.
    Immediate,
}

impl FromStr for Backend {
    type Err = LoopError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "threads" | "threading" | "multi-threading" => Ok(Backend::Threads),
            "immediate" | "sync" => Ok(Backend::Immediate),
            "processes" | "multi-processing" => Err(LoopError::InvalidConfig(format!(
                "backend '{name}' is not supported: closures cannot be sent to another process, \
                use 'threads'"
            ))),
            other => Err(LoopError::InvalidConfig(format!(
                "unknown backend '{other}', expected 'threads' or 'immediate'"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Threads => "threads",
            Backend::Immediate => "immediate",
        })
    }
}

/// What happens when a pooled item fails.
///
/// The policy decides the value type the loop yields from here on, so it is
/// chosen by type: [`RaiseFirst`] keeps it, [`ReturnAsValue`] wraps it in
/// `Result`.
pub trait ExceptionPolicy<I, O> {
    type Output;

    fn wrap(pipeline: Pipeline<I, O>) -> Pipeline<I, Self::Output>;
}

/// The first failure in source order is yielded as `Err` and ends the pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaiseFirst;

/// Each failure, including a panic, becomes the item's output: the loop
/// yields `Ok(packed)` with an `Err` in the output position, advances the
/// progress sink and carries on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReturnAsValue;

impl<I, O> ExceptionPolicy<I, O> for RaiseFirst {
    type Output = O;

    fn wrap(pipeline: Pipeline<I, O>) -> Pipeline<I, O> {
        pipeline
    }
}

impl<I: 'static, O: 'static> ExceptionPolicy<I, O> for ReturnAsValue {
    type Output = Result<O>;

    fn wrap(pipeline: Pipeline<I, O>) -> Pipeline<I, Result<O>> {
        pipeline.capture()
    }
}

/// Configuration for pooled loops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolConfig {
    pub backend: Backend,
    /// Number of worker threads (defaults to the available parallelism)
    pub max_workers: Option<usize>,
    /// Items submitted per chunk (defaults to the whole source)
    pub chunk_size: Option<usize>,
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Checks the values that can only be wrong at runtime.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.chunk_size != Some(0),
            LoopError::InvalidConfig("chunk_size must be > 0".to_string())
        );
        ensure!(
            self.max_workers != Some(0),
            LoopError::InvalidConfig("max_workers must be > 0".to_string())
        );
        Ok(())
    }

    /// Worker count actually used by the threads backend.
    pub fn effective_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Builds the executor for one pass.
    pub(crate) fn executor<R: Send + 'static>(&self) -> Result<Box<dyn Executor<R>>> {
        let executor: Box<dyn Executor<R>> = match self.backend {
            Backend::Threads => {
                let workers = self.effective_workers();
                Box::new(ThreadPool::new(workers, workers * 2)?)
            }
            Backend::Immediate => Box::new(Immediate),
        };
        Ok(executor)
    }
}

/// Builder for PoolConfig with method chaining
#[derive(Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the number of worker threads (must be > 0)
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.max_workers = Some(workers);
        self
    }

    /// Set the chunk size (must be > 0)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = Some(size);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

/// How a loop evaluates its stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// On the consuming thread, one item at a time, fully lazy.
    #[default]
    Immediate,
    Pooled(PoolConfig),
}
