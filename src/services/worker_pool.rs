//! Bounded concurrency for independent I/O operations.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Fixed-size pool for running independent operations concurrently.
///
/// Sized once from configuration and handed to whichever service needs
/// fan-out. Only ever used for operations with no ordering requirement
/// between them; `map_ordered` restores input order on the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    size: usize,
}

impl WorkerPool {
    /// A pool of `size` workers; zero is raised to one.
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    /// Run `f` over `items`, at most `size` at a time, returning outputs in
    /// input order.
    pub async fn map_ordered<I, F, Fut>(&self, items: I, f: F) -> Vec<Fut::Output>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future,
    {
        stream::iter(items).map(f).buffered(self.size).collect().await
    }

    /// Run `f` over `items`, at most `size` at a time, returning outputs in
    /// completion order.
    pub async fn map_unordered<I, F, Fut>(&self, items: I, f: F) -> Vec<Fut::Output>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future,
    {
        stream::iter(items)
            .map(f)
            .buffer_unordered(self.size)
            .collect()
            .await
    }
}
