//! src/progress.rs
//!
//! Progress reporting for loops.
//!
//! A loop advances its sink once per yielded value, before the value reaches
//! the consumer. Dropped items and failures never advance it. The sink is
//! acquired when iteration starts and released exactly once when it ends,
//! whether the loop was exhausted, failed, or dropped part way.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix} [{elapsed_precise}] {pos} {msg}";

/// Receives one `advance` per value a loop yields.
pub trait ProgressSink<T> {
    /// Called when iteration starts. `len_hint` is the source length when it
    /// is known exactly.
    fn acquire(&mut self, _len_hint: Option<u64>) -> Result<()> {
        Ok(())
    }

    fn advance(&mut self, value: &T);

    /// Called once when iteration ends. Implementations must tolerate
    /// repeated calls.
    fn release(&mut self) {}
}

/// The default sink. Does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl<T> ProgressSink<T> for NoProgress {
    #[inline]
    fn advance(&mut self, _value: &T) {}
}

/// Computes the text shown after the bar from the latest yielded value.
pub trait Postfix<T> {
    fn postfix(&self, value: &T) -> Option<String>;
}

/// No computed postfix.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPostfix;

impl<T> Postfix<T> for NoPostfix {
    fn postfix(&self, _value: &T) -> Option<String> {
        None
    }
}

/// Postfix computed by a closure over the yielded value.
#[derive(Clone)]
pub struct PostfixFn<F>(F);

impl<T, F> Postfix<T> for PostfixFn<F>
where
    F: Fn(&T) -> String,
{
    fn postfix(&self, value: &T) -> Option<String> {
        Some((self.0)(value))
    }
}

/// Terminal progress bar.
///
/// ```ignore
/// loop_over(paths)
///     .map(load)
///     .progress(Progbar::new().desc("loading").postfix_fn(|doc: &Doc| doc.title.clone()))
///     .exhaust()?;
/// ```
pub struct Progbar<F = NoPostfix> {
    total: Option<u64>,
    desc: Option<String>,
    postfix: Option<String>,
    postfix_fn: F,
    refresh: bool,
    hidden: bool,
    bar: Option<ProgressBar>,
}

impl Default for Progbar<NoPostfix> {
    fn default() -> Self {
        Self {
            total: None,
            desc: None,
            postfix: None,
            postfix_fn: NoPostfix,
            refresh: false,
            hidden: false,
            bar: None,
        }
    }
}

impl Progbar<NoPostfix> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `f(value)` after the bar, updated on every advance.
    pub fn postfix_fn<F>(self, f: F) -> Progbar<PostfixFn<F>> {
        Progbar {
            total: self.total,
            desc: self.desc,
            postfix: self.postfix,
            postfix_fn: PostfixFn(f),
            refresh: self.refresh,
            hidden: self.hidden,
            bar: None,
        }
    }
}

impl<F> Progbar<F> {
    /// Expected number of items. Defaults to the source length when known.
    pub fn total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// Label shown before the bar.
    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Fixed text shown after the bar.
    pub fn postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = Some(postfix.into());
        self
    }

    /// Redraw on every advance instead of at the bar's own rate.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Track progress without drawing anything.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Current position, if the bar has been acquired.
    pub fn position(&self) -> Option<u64> {
        self.bar.as_ref().map(ProgressBar::position)
    }
}

impl<T, F> ProgressSink<T> for Progbar<F>
where
    F: Postfix<T>,
{
    fn acquire(&mut self, len_hint: Option<u64>) -> Result<()> {
        let bar = match self.total.or(len_hint) {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(BAR_TEMPLATE)?
                        .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(ProgressStyle::default_spinner().template(SPINNER_TEMPLATE)?);
                bar
            }
        };

        if self.hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Some(desc) = &self.desc {
            bar.set_prefix(desc.clone());
        }
        if let Some(postfix) = &self.postfix {
            bar.set_message(postfix.clone());
        }

        self.bar = Some(bar);
        Ok(())
    }

    fn advance(&mut self, value: &T) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
            if let Some(text) = self.postfix_fn.postfix(value) {
                bar.set_message(text);
            }
            if self.refresh {
                bar.tick();
            }
        }
    }

    fn release(&mut self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.finish();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progbar_counts_advances() -> Result<()> {
        let mut bar = Progbar::new().hidden(true).desc("squares");
        ProgressSink::<i32>::acquire(&mut bar, Some(3))?;

        for value in [1, 4, 9] {
            bar.advance(&value);
        }
        assert_eq!(bar.position(), Some(3));

        ProgressSink::<i32>::release(&mut bar);
        ProgressSink::<i32>::release(&mut bar);
        assert_eq!(bar.position(), Some(3));
        Ok(())
    }

    #[test]
    fn test_progbar_without_length_uses_spinner() -> Result<()> {
        let mut bar = Progbar::new().hidden(true).postfix_fn(|v: &i32| format!("last={v}"));
        ProgressSink::<i32>::acquire(&mut bar, None)?;
        ProgressSink::<i32>::advance(&mut bar, &7);

        assert_eq!(bar.position(), Some(1));
        assert_eq!(
            bar.bar.as_ref().map(|b| b.message()),
            Some("last=7".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_advance_before_acquire_is_ignored() {
        let mut bar = Progbar::new();
        ProgressSink::<()>::advance(&mut bar, &());
        assert_eq!(bar.position(), None);
    }
}
