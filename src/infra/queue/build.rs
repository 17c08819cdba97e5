//! Closeable FIFO of admitted work.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;

/// Unbounded multi-consumer FIFO that can be closed and reopened.
///
/// Workers block on a [`Receiver`] obtained from [`BuildQueue::receiver`].
/// Closing drops the only sender, which wakes every blocked receiver once the
/// remaining items are gone; there is no window in which a close signal can be
/// missed. Reopening installs a fresh channel, so receivers from a previous
/// session never see new work.
pub struct BuildQueue<T> {
    sender: RwLock<Option<Sender<T>>>,
    receiver: RwLock<Receiver<T>>,
}

impl<T> BuildQueue<T> {
    /// Create a queue in the closed state.
    #[must_use]
    pub fn new() -> Self {
        let (_, rx) = unbounded();
        Self {
            sender: RwLock::new(None),
            receiver: RwLock::new(rx),
        }
    }

    /// Open the queue with a fresh channel. No-op if already open.
    pub fn open(&self) {
        let mut sender = self.sender.write();
        if sender.is_some() {
            return;
        }
        let (tx, rx) = unbounded();
        *self.receiver.write() = rx;
        *sender = Some(tx);
    }

    /// Close the queue. Items already queued stay poppable until drained.
    pub fn close(&self) {
        self.sender.write().take();
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Append an item, handing it back if the queue is closed.
    ///
    /// # Errors
    ///
    /// Returns the item unchanged when the queue is closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        match self.sender.read().as_ref() {
            Some(tx) => tx.send(item).map_err(|err| err.into_inner()),
            None => Err(item),
        }
    }

    #[cfg(test)]
    pub(crate) fn try_pop(&self) -> Option<T> {
        self.receiver.read().try_recv().ok()
    }

    /// A receiver for a worker to block on.
    #[must_use]
    pub fn receiver(&self) -> Receiver<T> {
        self.receiver.read().clone()
    }

    /// Observed number of queued items. Only a heuristic under concurrency.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.read().len()
    }

    /// Whether no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.read().is_empty()
    }

    /// Remove and return every queued item.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.read().try_iter().collect()
    }
}

impl<T> Default for BuildQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_closed_queue_rejects() {
        let queue = BuildQueue::new();
        assert!(!queue.is_open());
        assert_eq!(queue.push(1), Err(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let queue = BuildQueue::new();
        queue.open();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.try_pop(), Some(0));
        assert_eq!(queue.drain(), vec![1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_close_wakes_blocked_receivers() {
        let queue = BuildQueue::<u32>::new();
        queue.open();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let rx = queue.receiver();
                thread::spawn(move || rx.recv().is_err())
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        queue.close();
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }

    #[test]
    fn test_close_keeps_queued_items_poppable() {
        let queue = BuildQueue::new();
        queue.open();
        queue.push("a").unwrap();
        queue.close();
        assert_eq!(queue.push("b"), Err("b"));
        assert_eq!(queue.drain(), vec!["a"]);
    }

    #[test]
    fn test_reopen_uses_fresh_channel() {
        let queue = BuildQueue::new();
        queue.open();
        let stale = queue.receiver();
        queue.close();
        queue.open();
        queue.push(7).unwrap();
        assert!(stale.try_recv().is_err());
        assert_eq!(queue.try_pop(), Some(7));
    }
}
