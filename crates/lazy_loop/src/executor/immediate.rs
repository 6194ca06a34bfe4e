//! src/executor/immediate.rs
//!
//! In-process backend. Nothing runs at submission; each task runs on the
//! thread that first waits on its handle, and the result is memoized.

use anyhow::Result;

use super::{Executor, Pending, Task};

#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl<R: Send + 'static> Executor<R> for Immediate {
    fn submit(&self, task: Task<R>) -> Result<Pending<R>> {
        Ok(Pending::deferred(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_submit_is_lazy() -> Result<()> {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let mut pending: Pending<&str> = Immediate.submit(Box::new(move || {
            flag.store(true, Ordering::SeqCst);
            "done"
        }))?;
        assert!(!ran.load(Ordering::SeqCst));

        assert_eq!(pending.wait(), Ok(&"done"));
        assert!(ran.load(Ordering::SeqCst));
        Ok(())
    }
}
