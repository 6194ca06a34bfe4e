//! src/engine/iter.rs
//!
//! The pull-based iterator that drives one pass of a loop.
//!
//! # Iterator Variants
//!
//! - `Sequential`: runs the stage chain on the consuming thread, one source
//!   item per step. Nothing is read from the source ahead of demand.
//! - `Pooled`: reads the source one chunk at a time, submits one task per
//!   item to the executor and resolves the handles strictly in submission
//!   order. The next chunk is read only once the current one is drained.
//!
//! Both variants end in `Done`. `Failed` holds an error raised while
//! starting the pass; it is yielded once and the iterator is then done.

use anyhow::{Error, Result};
use log::{debug, trace};
use std::collections::VecDeque;
use std::iter::{Enumerate, FusedIterator};
use std::thread;
use std::time::Duration;

use crate::batched::Batched;
use crate::config::ExecutionMode;
use crate::error::LoopError;
use crate::executor::{Executor, Pending, TaskError};
use crate::packer::Packer;
use crate::progress::ProgressSink;
use crate::stage::{Pipeline, Step};

/// What a pooled task hands back: the item's final step or its failure.
type Outcome<O> = Result<Step<O>>;

/// Iterator over the packed results of a loop.
///
/// Created by `Loop::iter()` or `Loop::into_iter()`. Yields `Ok(packed)`
/// per surviving item, in source order. An `Err` ends the pass: the iterator
/// is done afterwards (see [`LoopIter::is_terminated`]). Failures captured
/// with [`ReturnAsValue`](crate::config::ReturnAsValue) are outputs, so they
/// arrive inside `Ok`.
pub struct LoopIter<Src, Out, P, S>
where
    Src: Iterator,
    Src::Item: Send + 'static,
    Out: Send + 'static,
    P: Packer<Src::Item, Out>,
    S: ProgressSink<P::Packed>,
{
    inner: IterImpl<Src, Out, P::Kept>,
    packer: P,
    progress: S,
    acquired: bool,
    delay: Option<Duration>,
    yielded: usize,
}

enum IterImpl<Src, Out, K>
where
    Src: Iterator,
    Out: Send + 'static,
{
    Sequential {
        source: Enumerate<Src>,
        pipeline: Pipeline<Src::Item, Out>,
    },

    /// - `pending`: submitted tasks of the current chunk, in source order,
    ///   with what the packer retained of each input
    Pooled {
        chunks: Batched<Enumerate<Src>>,
        pipeline: Pipeline<Src::Item, Out>,
        executor: Box<dyn Executor<Outcome<Out>>>,
        pending: VecDeque<(usize, K, Pending<Outcome<Out>>)>,
    },

    Failed(Option<Error>),

    Done,
}

/// Result of advancing the pass by one yielded item.
enum Produced<O, K> {
    Item(usize, K, O),
    /// Ends the pass.
    Failed(Error),
    Done,
}

impl<Src, Out, K> IterImpl<Src, Out, K>
where
    Src: Iterator,
    Src::Item: Send + 'static,
    Out: Send + 'static,
{
    /// Runs items until one survives the stage chain, fails, or the source
    /// ends. Dropped items are consumed silently.
    fn produce<P>(&mut self, packer: &P) -> Produced<Out, K>
    where
        P: Packer<Src::Item, Out, Kept = K>,
    {
        match self {
            IterImpl::Sequential { source, pipeline } => {
                for (index, item) in source.by_ref() {
                    let kept = packer.retain(&item);
                    match pipeline.apply(item) {
                        Ok(Step::Keep(output)) => return Produced::Item(index, kept, output),
                        Ok(Step::Dropped) => continue,
                        Err(err) => {
                            return Produced::Failed(err.context(LoopError::Stage { index }))
                        }
                    }
                }
                Produced::Done
            }

            IterImpl::Pooled {
                chunks,
                pipeline,
                executor,
                pending,
            } => loop {
                if let Some((index, kept, handle)) = pending.pop_front() {
                    let failure = match handle.into_inner() {
                        Ok(Ok(Step::Keep(output))) => return Produced::Item(index, kept, output),
                        Ok(Ok(Step::Dropped)) => continue,
                        Ok(Err(err)) => err.context(LoopError::Stage { index }),
                        Err(TaskError::Panicked(message)) => {
                            Error::new(LoopError::Panicked { index, message })
                        }
                        Err(TaskError::Disconnected) => {
                            Error::new(LoopError::Disconnected { index })
                        }
                    };
                    return Produced::Failed(failure);
                }

                let Some(chunk) = chunks.next() else {
                    return Produced::Done;
                };
                trace!("submitting chunk of {} items", chunk.len());

                for (index, item) in chunk {
                    let kept = packer.retain(&item);
                    let pipeline = pipeline.clone();
                    match executor.submit(Box::new(move || pipeline.apply(item))) {
                        Ok(handle) => pending.push_back((index, kept, handle)),
                        Err(err) => return Produced::Failed(err),
                    }
                }
            },

            IterImpl::Failed(err) => match err.take() {
                Some(err) => Produced::Failed(err),
                None => Produced::Done,
            },

            IterImpl::Done => Produced::Done,
        }
    }
}

impl<Src, Out, P, S> LoopIter<Src, Out, P, S>
where
    Src: Iterator,
    Src::Item: Send + 'static,
    Out: Send + 'static,
    P: Packer<Src::Item, Out>,
    S: ProgressSink<P::Packed>,
{
    /// Acquires the progress sink and sets up the executor for one pass.
    /// A startup failure is kept as the first item.
    pub(crate) fn start(
        source: Src,
        pipeline: Pipeline<Src::Item, Out>,
        packer: P,
        progress: S,
        mode: ExecutionMode,
        delay: Option<Duration>,
    ) -> Self {
        let mut iter = Self {
            inner: IterImpl::Done,
            packer,
            progress,
            acquired: false,
            delay,
            yielded: 0,
        };
        iter.inner = match iter.open(source, pipeline, mode) {
            Ok(inner) => inner,
            Err(err) => IterImpl::Failed(Some(err)),
        };
        iter
    }

    fn open(
        &mut self,
        source: Src,
        pipeline: Pipeline<Src::Item, Out>,
        mode: ExecutionMode,
    ) -> Result<IterImpl<Src, Out, P::Kept>> {
        let len_hint = match source.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(lower as u64),
            _ => None,
        };
        self.progress.acquire(len_hint)?;
        self.acquired = true;

        let source = source.enumerate();
        Ok(match mode {
            ExecutionMode::Immediate => {
                debug!("starting sequential pass over {} stages", pipeline.len());
                IterImpl::Sequential { source, pipeline }
            }
            ExecutionMode::Pooled(config) => {
                config.validate()?;
                let chunks = Batched::new(source, config.chunk_size)?;
                let executor = config.executor()?;
                debug!(
                    "starting pooled pass over {} stages (backend={}, chunk_size={:?})",
                    pipeline.len(),
                    config.backend,
                    config.chunk_size
                );
                IterImpl::Pooled {
                    chunks,
                    pipeline,
                    executor,
                    pending: VecDeque::new(),
                }
            }
        })
    }

    /// Takes the startup error, if starting the pass failed.
    pub(crate) fn take_startup_error(&mut self) -> Option<Error> {
        match &mut self.inner {
            IterImpl::Failed(err) => {
                let err = err.take();
                self.finish();
                err
            }
            _ => None,
        }
    }

    /// Whether the pass is over. Once true, `next()` only returns `None`.
    pub fn is_terminated(&self) -> bool {
        matches!(self.inner, IterImpl::Done)
    }

    /// Number of values yielded so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn finish(&mut self) {
        if !self.is_terminated() {
            debug!("loop pass finished after {} values", self.yielded);
        }
        // Drops the executor; a thread pool joins its workers here.
        self.inner = IterImpl::Done;
        self.release();
    }

    fn release(&mut self) {
        if self.acquired {
            self.acquired = false;
            self.progress.release();
        }
    }
}

impl<Src, Out, P, S> Iterator for LoopIter<Src, Out, P, S>
where
    Src: Iterator,
    Src::Item: Send + 'static,
    Out: Send + 'static,
    P: Packer<Src::Item, Out>,
    S: ProgressSink<P::Packed>,
{
    type Item = Result<P::Packed>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_terminated() {
            return None;
        }
        if self.yielded > 0 {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
        }

        match self.inner.produce(&self.packer) {
            Produced::Item(index, kept, output) => {
                let packed = self.packer.pack(index, kept, output);
                self.progress.advance(&packed);
                self.yielded += 1;
                Some(Ok(packed))
            }
            Produced::Failed(err) => {
                self.finish();
                Some(Err(err))
            }
            Produced::Done => {
                self.finish();
                None
            }
        }
    }
}

impl<Src, Out, P, S> FusedIterator for LoopIter<Src, Out, P, S>
where
    Src: Iterator,
    Src::Item: Send + 'static,
    Out: Send + 'static,
    P: Packer<Src::Item, Out>,
    S: ProgressSink<P::Packed>,
{
}

impl<Src, Out, P, S> Drop for LoopIter<Src, Out, P, S>
where
    Src: Iterator,
    Src::Item: Send + 'static,
    Out: Send + 'static,
    P: Packer<Src::Item, Out>,
    S: ProgressSink<P::Packed>,
{
    fn drop(&mut self) {
        self.release();
    }
}
