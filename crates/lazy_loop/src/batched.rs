//! src/batched.rs
//!
//! Splits a (possibly infinite) sequence into bounded chunks.
//!
//! Pooled loops submit one chunk at a time, so the chunk size bounds how many
//! items are materialized and in flight at once. Without a chunk size the
//! whole source becomes a single chunk.
//!
//! The first chunk is always produced, even when empty: batching `[]` yields
//! `[[]]`. Later chunks are never empty.

use anyhow::{ensure, Result};
use std::iter::Fuse;

use crate::error::LoopError;

/// Iterator over chunks of `size` items; the last one may be shorter.
#[derive(Debug, Clone)]
pub struct Batched<It: Iterator> {
    inner: Fuse<It>,
    size: Option<usize>,
    emitted: bool,
    exhausted: bool,
}

impl<It: Iterator> Batched<It> {
    pub fn new(iter: impl IntoIterator<IntoIter = It>, size: Option<usize>) -> Result<Self> {
        ensure!(
            size != Some(0),
            LoopError::InvalidConfig("chunk size must be > 0, but got chunk_size=0".to_string())
        );
        Ok(Self {
            inner: iter.into_iter().fuse(),
            size,
            emitted: false,
            exhausted: false,
        })
    }
}

/// Chunks `iter` into vectors of up to `size` items (`None`: one chunk).
pub fn batched<I: IntoIterator>(iter: I, size: Option<usize>) -> Result<Batched<I::IntoIter>> {
    Batched::new(iter, size)
}

impl<It: Iterator> Iterator for Batched<It> {
    type Item = Vec<It::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let chunk: Vec<_> = match self.size {
            Some(size) => self.inner.by_ref().take(size).collect(),
            None => self.inner.by_ref().collect(),
        };

        if chunk.is_empty() && self.emitted {
            self.exhausted = true;
            return None;
        }

        // A short chunk means the source ran dry.
        if self.size.map_or(true, |size| chunk.len() < size) {
            self.exhausted = true;
        }
        self.emitted = true;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::loop_error;

    fn chunks<T>(iter: impl IntoIterator<Item = T>, size: Option<usize>) -> Vec<Vec<T>> {
        batched(iter, size).unwrap().collect()
    }

    #[test]
    fn test_empty_source_yields_one_empty_chunk() {
        let expected: Vec<Vec<i32>> = vec![vec![]];
        assert_eq!(chunks(Vec::<i32>::new(), None), expected);
        assert_eq!(chunks(Vec::<i32>::new(), Some(1)), expected);
        assert_eq!(chunks(Vec::<i32>::new(), Some(100)), expected);
    }

    #[test]
    fn test_no_size_is_one_chunk() {
        assert_eq!(chunks([1, 2, 3], None), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_size_one() {
        for n in 1..10 {
            let expected: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
            assert_eq!(chunks(0..n, Some(1)), expected);
        }
    }

    #[test]
    fn test_divisible() {
        assert_eq!(
            chunks(0..12, Some(3)),
            vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8], vec![9, 10, 11]]
        );
    }

    #[test]
    fn test_non_divisible() {
        assert_eq!(
            chunks(0..10, Some(3)),
            vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8], vec![9]]
        );
    }

    #[test]
    fn test_infinite_source_is_lazy() {
        let mut iter = batched(0.., Some(2)).unwrap();
        assert_eq!(iter.next(), Some(vec![0, 1]));
        assert_eq!(iter.next(), Some(vec![2, 3]));
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = batched(0..3, Some(0)).unwrap_err();
        assert!(matches!(
            loop_error(&err),
            Some(LoopError::InvalidConfig(_))
        ));
    }
}
