//! src/engine/mod.rs
//!
//! The `Loop` builder.
//!
//! A `Loop` owns a single-pass source and accumulates configuration by
//! value: per-item stages, the return shape, a progress sink, the execution
//! mode and an optional delay. Nothing runs until the loop is consumed
//! through [`Loop::iter`], `IntoIterator`, [`Loop::exhaust`], [`Loop::reduce`]
//! or [`Loop::fold`].
//!
//! ```ignore
//! let squares = loop_range(10)
//!     .filter(|x| x % 2 == 0)
//!     .map(|x| x * x)
//!     .returning(EnumerationsOutputs)
//!     .concurrently(PoolConfig::builder().max_workers(4).build())?
//!     .iter()?
//!     .collect::<Result<Vec<_>>>()?;
//! ```
//!
//! # Call layouts
//!
//! `map`, `filter` and their `try_` forms call `f(item)`. The `_with` forms
//! additionally bind a tuple of extra arguments and honour the layout set by
//! [`Loop::next_call_with`]; that layout applies to the next registered
//! stage only. Closures passed to `_with` forms need explicit parameter
//! types.
//!
//! # Type parameters:
//! - `Src`: the source iterator
//! - `Out`: the value type after all stages registered so far
//! - `P`: the packer (defaults to [`Outputs`])
//! - `S`: the progress sink (defaults to [`NoProgress`])
//! - `L`: the layout for the next stage (defaults to [`ItemFirst`])

use anyhow::Result;
use log::debug;
use std::time::Duration;

use crate::call::Call;
use crate::config::{Backend, ExceptionPolicy, ExecutionMode, PoolConfig, RaiseFirst};
use crate::error::LoopError;
use crate::layout::{ItemFirst, Layout, Splat};
use crate::packer::{Outputs, Packer};
use crate::progress::{NoProgress, ProgressSink};
use crate::stage::{Pipeline, Stage};

pub(crate) mod iter;

pub use iter::LoopIter;

// ================================================================================================
// 1. Core Type
// ================================================================================================
pub struct Loop<Src: Iterator, Out, P = Outputs, S = NoProgress, L = ItemFirst> {
    source: Src,
    pipeline: Pipeline<Src::Item, Out>,
    packer: P,
    progress: S,
    layout: L,
    mode: ExecutionMode,
    delay: Option<Duration>,
}

impl<Src> Loop<Src, Src::Item, Outputs, NoProgress, ItemFirst>
where
    Src: Iterator,
    Src::Item: 'static,
{
    pub fn new(source: impl IntoIterator<IntoIter = Src>) -> Self {
        Self {
            source: source.into_iter(),
            pipeline: Pipeline::identity(),
            packer: Outputs,
            progress: NoProgress,
            layout: ItemFirst,
            mode: ExecutionMode::Immediate,
            delay: None,
        }
    }
}

// ================================================================================================
// 2. Stages with the default layout
// ================================================================================================
impl<Src, Out, P, S> Loop<Src, Out, P, S, ItemFirst>
where
    Src: Iterator,
    Src::Item: 'static,
    Out: 'static,
{
    /// Replaces each value with `f(value)`.
    pub fn map<R, F>(self, f: F) -> Loop<Src, R, P, S>
    where
        R: 'static,
        F: Fn(Out) -> R + Send + Sync + 'static,
    {
        self.push(Stage::transform(move |value: Out| -> Result<R> {
            Ok(f(value))
        }))
    }

    /// Like [`Loop::map`]; an `Err` from `f` fails the item.
    pub fn try_map<R, F>(self, f: F) -> Loop<Src, R, P, S>
    where
        R: 'static,
        F: Fn(Out) -> Result<R> + Send + Sync + 'static,
    {
        self.push(Stage::transform(f))
    }

    /// Alias of [`Loop::map`].
    pub fn apply<R, F>(self, f: F) -> Loop<Src, R, P, S>
    where
        R: 'static,
        F: Fn(Out) -> R + Send + Sync + 'static,
    {
        self.map(f)
    }

    /// Keeps the values for which `predicate` holds.
    pub fn filter<F>(self, predicate: F) -> Loop<Src, Out, P, S>
    where
        F: Fn(&Out) -> bool + Send + Sync + 'static,
    {
        self.push(Stage::filter(move |value: &Out| -> Result<bool> {
            Ok(predicate(value))
        }))
    }

    pub fn try_filter<F>(self, predicate: F) -> Loop<Src, Out, P, S>
    where
        F: Fn(&Out) -> Result<bool> + Send + Sync + 'static,
    {
        self.push(Stage::filter(predicate))
    }
}

// ================================================================================================
// 3. Stages with bound arguments and layouts
// ================================================================================================
impl<Src, Out, P, S, L> Loop<Src, Out, P, S, L>
where
    Src: Iterator,
    Src::Item: 'static,
    Out: 'static,
{
    fn push<R: 'static>(self, stage: Stage<Out, R>) -> Loop<Src, R, P, S> {
        Loop {
            source: self.source,
            pipeline: self.pipeline.then(stage),
            packer: self.packer,
            progress: self.progress,
            layout: ItemFirst,
            mode: self.mode,
            delay: self.delay,
        }
    }

    /// Sets how the next stage's function is called. See [`crate::layout`].
    pub fn next_call_with<L2>(self, layout: L2) -> Loop<Src, Out, P, S, L2>
    where
        L2: Clone + Send + Sync + 'static,
    {
        Loop {
            source: self.source,
            pipeline: self.pipeline,
            packer: self.packer,
            progress: self.progress,
            layout,
            mode: self.mode,
            delay: self.delay,
        }
    }

    /// Replaces each value with `f(..)`, called with the value and `args`
    /// arranged by the current layout.
    pub fn map_with<A, R, F>(self, f: F, args: A) -> Loop<Src, R, P, S>
    where
        L: Layout<Out, A>,
        A: Clone + Send + Sync + 'static,
        R: 'static,
        F: Call<<L as Layout<Out, A>>::Args, Output = R> + Send + Sync + 'static,
    {
        let layout = self.layout.clone();
        self.push(Stage::transform(move |value: Out| -> Result<R> {
            let call_args = layout.arrange(value, args.clone())?;
            Ok(f.call_with(call_args))
        }))
    }

    pub fn try_map_with<A, R, F>(self, f: F, args: A) -> Loop<Src, R, P, S>
    where
        L: Layout<Out, A>,
        A: Clone + Send + Sync + 'static,
        R: 'static,
        F: Call<<L as Layout<Out, A>>::Args, Output = Result<R>> + Send + Sync + 'static,
    {
        let layout = self.layout.clone();
        self.push(Stage::transform(move |value: Out| -> Result<R> {
            let call_args = layout.arrange(value, args.clone())?;
            f.call_with(call_args)
        }))
    }

    /// Keeps the values for which the predicate, called like
    /// [`Loop::map_with`], holds. The predicate sees a clone of the value.
    pub fn filter_with<A, F>(self, predicate: F, args: A) -> Loop<Src, Out, P, S>
    where
        Out: Clone,
        L: Layout<Out, A>,
        A: Clone + Send + Sync + 'static,
        F: Call<<L as Layout<Out, A>>::Args, Output = bool> + Send + Sync + 'static,
    {
        let layout = self.layout.clone();
        self.push(Stage::filter(move |value: &Out| -> Result<bool> {
            let call_args = layout.arrange(value.clone(), args.clone())?;
            Ok(predicate.call_with(call_args))
        }))
    }

    pub fn try_filter_with<A, F>(self, predicate: F, args: A) -> Loop<Src, Out, P, S>
    where
        Out: Clone,
        L: Layout<Out, A>,
        A: Clone + Send + Sync + 'static,
        F: Call<<L as Layout<Out, A>>::Args, Output = Result<bool>> + Send + Sync + 'static,
    {
        let layout = self.layout.clone();
        self.push(Stage::filter(move |value: &Out| -> Result<bool> {
            let call_args = layout.arrange(value.clone(), args.clone())?;
            predicate.call_with(call_args)
        }))
    }

    /// Spreads each tuple value over the parameters of `f`.
    pub fn unpack_map<R, F>(self, f: F) -> Loop<Src, R, P, S>
    where
        Splat: Layout<Out, ()>,
        R: 'static,
        F: Call<<Splat as Layout<Out, ()>>::Args, Output = R> + Send + Sync + 'static,
    {
        self.next_call_with(Splat).map_with(f, ())
    }

    /// Alias of [`Loop::unpack_map`].
    pub fn unpack_apply<R, F>(self, f: F) -> Loop<Src, R, P, S>
    where
        Splat: Layout<Out, ()>,
        R: 'static,
        F: Call<<Splat as Layout<Out, ()>>::Args, Output = R> + Send + Sync + 'static,
    {
        self.unpack_map(f)
    }
}

// ================================================================================================
// 4. Output, progress and execution settings
// ================================================================================================
impl<Src: Iterator, Out, P, S, L> Loop<Src, Out, P, S, L> {
    /// Chooses what is yielded per item. See [`crate::packer`].
    pub fn returning<Q>(self, packer: Q) -> Loop<Src, Out, Q, S, L> {
        Loop {
            source: self.source,
            pipeline: self.pipeline,
            packer,
            progress: self.progress,
            layout: self.layout,
            mode: self.mode,
            delay: self.delay,
        }
    }

    /// Reports every yielded value to `sink`.
    pub fn progress<S2>(self, sink: S2) -> Loop<Src, Out, P, S2, L> {
        Loop {
            source: self.source,
            pipeline: self.pipeline,
            packer: self.packer,
            progress: sink,
            layout: self.layout,
            mode: self.mode,
            delay: self.delay,
        }
    }

    /// Evaluates the stages in a pool; the first failed item ends the pass.
    /// Fails on an invalid configuration.
    pub fn concurrently(self, config: PoolConfig) -> Result<Self> {
        self.concurrently_with(config, RaiseFirst)
    }

    /// Evaluates the stages in a pool with the given exception policy.
    ///
    /// With [`ReturnAsValue`](crate::config::ReturnAsValue) the value type
    /// becomes `Result<Out>` and failed items are packed and yielded like any
    /// other value.
    pub fn concurrently_with<E>(
        self,
        config: PoolConfig,
        _policy: E,
    ) -> Result<Loop<Src, E::Output, P, S, L>>
    where
        E: ExceptionPolicy<Src::Item, Out>,
    {
        config.validate()?;
        Ok(Loop {
            source: self.source,
            pipeline: E::wrap(self.pipeline),
            packer: self.packer,
            progress: self.progress,
            layout: self.layout,
            mode: ExecutionMode::Pooled(config),
            delay: self.delay,
        })
    }

    /// [`Loop::concurrently`] with the backend given by name (`"threads"` or
    /// `"immediate"`).
    pub fn concurrently_named(self, backend: &str) -> Result<Self> {
        let config = PoolConfig::builder()
            .backend(backend.parse::<Backend>()?)
            .build();
        self.concurrently(config)
    }

    /// Sleeps for `delay` between successive yielded values.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    /// Number of registered stages.
    pub fn stages(&self) -> usize {
        self.pipeline.len()
    }
}

// ================================================================================================
// 5. Consumption
// ================================================================================================
impl<Src, Out, P, S, L> Loop<Src, Out, P, S, L>
where
    Src: Iterator,
    Src::Item: Send + 'static,
    Out: Send + 'static,
    P: Packer<Src::Item, Out>,
    S: ProgressSink<P::Packed>,
{
    /// Starts the pass. Fails if the progress sink or the pool cannot be set
    /// up.
    pub fn iter(self) -> Result<LoopIter<Src, Out, P, S>> {
        let mut iter = self.into_iter();
        match iter.take_startup_error() {
            Some(err) => Err(err),
            None => Ok(iter),
        }
    }

    /// Runs the loop for its side effects. Returns the error that ended the
    /// pass, if any.
    pub fn exhaust(self) -> Result<()> {
        let mut iter = self.iter()?;
        iter.try_for_each(|next| next.map(drop))?;
        debug!("exhausted loop after {} values", iter.yielded());
        Ok(())
    }

    /// Left fold seeded with the first value. Fails on an empty loop and on
    /// the error that ends the pass. Failures captured by
    /// [`ReturnAsValue`](crate::config::ReturnAsValue) are folded as values.
    pub fn reduce<F>(self, mut f: F) -> Result<P::Packed>
    where
        F: FnMut(P::Packed, P::Packed) -> P::Packed,
    {
        let mut iter = self.iter()?;
        let first = iter.next().ok_or(LoopError::EmptyReduce)??;
        iter.try_fold(first, |acc, value| value.map(|value| f(acc, value)))
    }

    /// Left fold from `init`. Fails on the error that ends the pass.
    pub fn fold<B, F>(self, init: B, mut f: F) -> Result<B>
    where
        F: FnMut(B, P::Packed) -> B,
    {
        self.iter()?
            .try_fold(init, |acc, value| value.map(|value| f(acc, value)))
    }
}

impl<Src, Out, P, S, L> IntoIterator for Loop<Src, Out, P, S, L>
where
    Src: Iterator,
    Src::Item: Send + 'static,
    Out: Send + 'static,
    P: Packer<Src::Item, Out>,
    S: ProgressSink<P::Packed>,
{
    type Item = Result<P::Packed>;
    type IntoIter = LoopIter<Src, Out, P, S>;

    /// A startup failure becomes the first and only item.
    fn into_iter(self) -> Self::IntoIter {
        LoopIter::start(
            self.source,
            self.pipeline,
            self.packer,
            self.progress,
            self.mode,
            self.delay,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReturnAsValue;
    use crate::layout::ItemLast;
    use anyhow::anyhow;

    fn collect<I: IntoIterator<Item = Result<T>>, T>(iter: I) -> Result<Vec<T>> {
        iter.into_iter().collect()
    }

    #[test]
    fn test_layout_resets_after_one_stage() -> Result<()> {
        let looped = Loop::new(vec![1, 2, 3])
            .next_call_with(ItemLast)
            .map_with(|prefix: i32, x: i32| prefix * 100 + x, (5,))
            .map_with(|x: i32, suffix: i32| x * 10 + suffix, (7,));

        assert_eq!(looped.stages(), 2);
        assert_eq!(collect(looped)?, vec![5017, 5027, 5037]);
        Ok(())
    }

    #[test]
    fn test_startup_error_surfaces_from_iter_and_into_iter() {
        struct Broken;
        impl ProgressSink<i32> for Broken {
            fn acquire(&mut self, _len_hint: Option<u64>) -> Result<()> {
                Err(anyhow!("no terminal"))
            }
            fn advance(&mut self, _value: &i32) {}
        }

        let err = Loop::new(vec![1]).progress(Broken).iter().err().unwrap();
        assert_eq!(err.to_string(), "no terminal");

        let mut iter = Loop::new(vec![1]).progress(Broken).into_iter();
        assert!(iter.next().unwrap().is_err());
        assert!(iter.is_terminated());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_concurrently_validates_eagerly() {
        assert!(Loop::new(0..3)
            .concurrently(PoolConfig::builder().chunk_size(0).build())
            .is_err());
        assert!(Loop::new(0..3).concurrently_named("processes").is_err());
        assert!(Loop::new(0..3).concurrently_named("fibers").is_err());

        let looped = Loop::new(0..3).concurrently_named("immediate").unwrap();
        assert!(matches!(looped.mode(), ExecutionMode::Pooled(config)
            if config.backend == Backend::Immediate));
    }

    #[test]
    fn test_return_as_value_folds_failures() -> Result<()> {
        let (ok, failed) = Loop::new(vec![2, 0, 4, 0])
            .try_map(|x: i32| {
                if x == 0 {
                    return Err(anyhow!("zero"));
                }
                Ok(x)
            })
            .concurrently_with(PoolConfig::builder().max_workers(2).build(), ReturnAsValue)?
            .fold((0, 0), |(ok, failed), value| match value {
                Ok(x) => (ok + x, failed),
                Err(_) => (ok, failed + 1),
            })?;

        assert_eq!((ok, failed), (6, 2));
        Ok(())
    }
}
