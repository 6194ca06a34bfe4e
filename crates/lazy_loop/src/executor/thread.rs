//! Thread-local storage for worker identification.
//!
//! Each pool worker records its index when spawned so that tasks can tell
//! which worker runs them, for debugging and for per-worker resources.

use std::cell::Cell;

thread_local! {
    /// Index of the pool worker running on this thread (0 to max_workers-1).
    /// `None` on threads that are not pool workers.
    pub(crate) static WORKER_ID: Cell<Option<usize>> = const { Cell::new(None) };
}

/// The pool worker index of the current thread, or `None` when called
/// outside a pool worker (immediate mode, or the consuming thread).
pub fn current_worker() -> Option<usize> {
    WORKER_ID.with(Cell::get)
}

pub(crate) fn set_worker_id(worker_id: usize) {
    WORKER_ID.with(|id| id.set(Some(worker_id)));
}
