#![allow(dead_code)]

use lazy_loop::{Backend, PoolConfig, ProgressSink};

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// `10 / x`, failing on zero.
pub fn ten_over(x: i32) -> Result<f64> {
    if x == 0 {
        return Err(anyhow!("division by zero"));
    }
    Ok(10.0 / x as f64)
}

/// Thread pool config with a small fixed worker count.
pub fn threads(chunk_size: Option<usize>) -> PoolConfig {
    let builder = PoolConfig::builder()
        .backend(Backend::Threads)
        .max_workers(3);
    match chunk_size {
        Some(size) => builder.chunk_size(size).build(),
        None => builder.build(),
    }
}

/// Shared counters of a [`CountingSink`], readable after the sink moved
/// into a loop.
#[derive(Default)]
pub struct SinkLog {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub len_hint: Mutex<Option<u64>>,
    pub advanced: Mutex<Vec<String>>,
}

impl SinkLog {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn advanced(&self) -> Vec<String> {
        self.advanced.lock().unwrap().clone()
    }

    pub fn len_hint(&self) -> Option<u64> {
        *self.len_hint.lock().unwrap()
    }
}

/// Progress sink that records every call it receives.
pub struct CountingSink {
    pub log: Arc<SinkLog>,
}

impl CountingSink {
    pub fn new() -> (Self, Arc<SinkLog>) {
        let log = Arc::new(SinkLog::default());
        (Self { log: log.clone() }, log)
    }
}

impl<T: std::fmt::Debug> ProgressSink<T> for CountingSink {
    fn acquire(&mut self, len_hint: Option<u64>) -> Result<()> {
        self.log.acquired.fetch_add(1, Ordering::SeqCst);
        *self.log.len_hint.lock().unwrap() = len_hint;
        Ok(())
    }

    fn advance(&mut self, value: &T) {
        self.log.advanced.lock().unwrap().push(format!("{value:?}"));
    }

    fn release(&mut self) {
        self.log.released.fetch_add(1, Ordering::SeqCst);
    }
}
