//! Fluent lazy loops.
//!
//! Wrap any iterator in a [`Loop`], chain per-item `map`/`filter` stages,
//! choose what each item reports with [`Loop::returning`], attach a
//! progress sink, optionally evaluate in a thread pool, then iterate.
//!
//! ```ignore
//! use lazy_loop::{loop_range, PoolConfig};
//!
//! let total = loop_range(1_000)
//!     .filter(|x| x % 3 == 0)
//!     .map(|x| x * x)
//!     .concurrently(PoolConfig::builder().chunk_size(100).build())?
//!     .fold(0, |acc, x| acc + x)?;
//! ```

pub mod batched;
pub mod call;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod layout;
pub mod packer;
pub mod progress;
pub mod stage;

use std::ops::Range;

pub use batched::{batched, Batched};
pub use config::{
    Backend, ExceptionPolicy, ExecutionMode, PoolConfig, PoolConfigBuilder, RaiseFirst,
    ReturnAsValue,
};
pub use engine::{Loop, LoopIter};
pub use error::{loop_error, LoopError};
pub use executor::thread::current_worker;
pub use executor::{Executor, Immediate, Pending, Task, TaskError, ThreadPool};
pub use layout::{ItemFirst, ItemLast, Keywords, Kwargs, Layout, Splat, SplatLast};
pub use packer::{
    All, Enumerations, EnumerationsInputs, EnumerationsOutputs, Inputs, InputsOutputs, Nothing,
    Outputs, Packed, Packer, ReturnShape,
};
pub use progress::{NoProgress, Progbar, ProgressSink};
pub use stage::Step;

/// Starts a loop over `iterable`.
pub fn loop_over<I>(iterable: I) -> Loop<I::IntoIter, I::Item>
where
    I: IntoIterator,
    I::Item: 'static,
{
    Loop::new(iterable)
}

/// Starts a loop over `0..n`.
pub fn loop_range(n: usize) -> Loop<Range<usize>, usize> {
    loop_over(0..n)
}
