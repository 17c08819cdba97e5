//! Completed-result queue drained by the consumer thread.

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;
use std::vec;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Unbounded FIFO of finished results.
///
/// Any worker may push; only the consumer thread drains. A drain takes exactly
/// the items visible when it starts, so it always terminates even while
/// workers keep publishing. Items pushed during a drain wait for the next one.
pub struct ResultQueue<R> {
    tx: Sender<Arc<R>>,
    rx: Receiver<Arc<R>>,
}

impl<R> ResultQueue<R> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Publish a result.
    pub fn push(&self, result: Arc<R>) {
        // The queue owns a receiver, so the channel can never be disconnected.
        let _ = self.tx.send(result);
    }

    /// Number of results waiting to be drained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Atomically take every result currently queued.
    #[must_use]
    pub fn drain(&self) -> ResultDrain<R> {
        let visible = self.rx.len();
        let items: Vec<_> = self.rx.try_iter().take(visible).collect();
        ResultDrain {
            inner: items.into_iter(),
        }
    }

    /// Discard every queued result and return how many were dropped.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }
}

impl<R> Default for ResultQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot, finite sequence of drained results.
pub struct ResultDrain<R> {
    inner: vec::IntoIter<Arc<R>>,
}

impl<R> ResultDrain<R> {
    /// An empty drain.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: Vec::new().into_iter(),
        }
    }

    /// Whether the drain holds no results.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }
}

impl<R> Iterator for ResultDrain<R> {
    type Item = Arc<R>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<R> ExactSizeIterator for ResultDrain<R> {}

impl<R> FusedIterator for ResultDrain<R> {}

impl<R> fmt::Debug for ResultDrain<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultDrain")
            .field("remaining", &self.inner.len())
            .finish()
    }
}
