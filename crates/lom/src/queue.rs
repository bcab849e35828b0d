//! Transfer Queue - Bounded FIFO for Cross-Thread Handoff
//!
//! Companion to the tuple codec: one context pushes packed buffers, another
//! pops and unpacks them. The queue is a bounded FIFO with OS-thread
//! blocking on both ends:
//!
//! - `push` blocks while the queue is full
//! - `pop` blocks while the queue is empty
//!
//! Blocking is cancellable only through [`interrupt_all`], which wakes every
//! currently blocked thread with the distinguished [`Interrupted`] outcome.
//! Threads that block later are unaffected; an interrupt is an event, not a
//! state.
//!
//! [`terminate`] is permanent: pushes fail immediately, pops drain whatever
//! is left and then fail with [`QueueClosed`].
//!
//! [`Interrupted`]: crate::error::LomError::Interrupted
//! [`QueueClosed`]: crate::error::LomError::QueueClosed
//! [`interrupt_all`]: TransferQueue::interrupt_all
//! [`terminate`]: TransferQueue::terminate

use crate::error::{LomError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// Bounded blocking FIFO
pub struct TransferQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

struct Inner<T> {
    items: VecDeque<T>,
    /// Bumped by every interrupt; waiters compare against their snapshot.
    interrupt_epoch: u64,
    terminated: bool,
}

impl<T> TransferQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// A zero capacity is rounded up to one; a queue that can never accept
    /// an item would deadlock every producer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lom::queue::TransferQueue;
    ///
    /// let queue: TransferQueue<u32> = TransferQueue::new(4);
    /// queue.push(7)?;
    /// assert_eq!(queue.pop()?, 7);
    /// # Ok::<(), lom::LomError>(())
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.max(1)),
                interrupt_epoch: 0,
                terminated: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Push an item, blocking while the queue is full
    ///
    /// # Returns
    /// - `Ok(())` - Item enqueued
    /// - `Err(LomError::Interrupted)` - Woken by [`interrupt_all`](Self::interrupt_all)
    /// - `Err(LomError::QueueClosed)` - Queue was terminated
    pub fn push(&self, item: T) -> Result<()> {
        let mut inner = self.inner.lock();

        loop {
            if inner.terminated {
                return Err(LomError::QueueClosed);
            }

            if inner.items.len() < self.capacity {
                inner.items.push_back(item);
                self.not_empty.notify_one();
                return Ok(());
            }

            let epoch = inner.interrupt_epoch;
            self.not_full.wait(&mut inner);

            if inner.interrupt_epoch != epoch {
                return Err(LomError::Interrupted);
            }
        }
    }

    /// Pop an item, blocking while the queue is empty
    ///
    /// # Returns
    /// - `Ok(item)` - Oldest queued item
    /// - `Err(LomError::Interrupted)` - Woken by [`interrupt_all`](Self::interrupt_all)
    /// - `Err(LomError::QueueClosed)` - Queue terminated and drained
    pub fn pop(&self) -> Result<T> {
        let mut inner = self.inner.lock();

        loop {
            if let Some(item) = inner.items.pop_front() {
                self.not_full.notify_one();
                return Ok(item);
            }

            if inner.terminated {
                return Err(LomError::QueueClosed);
            }

            let epoch = inner.interrupt_epoch;
            self.not_empty.wait(&mut inner);

            if inner.interrupt_epoch != epoch {
                return Err(LomError::Interrupted);
            }
        }
    }

    /// Non-blocking push
    ///
    /// Returns the item back when the queue is full or terminated.
    pub fn try_push(&self, item: T) -> std::result::Result<(), T> {
        let mut inner = self.inner.lock();

        if inner.terminated || inner.items.len() >= self.capacity {
            return Err(item);
        }

        inner.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking pop
    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();

        if item.is_some() {
            self.not_full.notify_one();
        }

        item
    }

    /// Wake every thread currently blocked on this queue
    ///
    /// Each woken thread observes the `Interrupted` outcome. The queue
    /// itself stays usable.
    pub fn interrupt_all(&self) {
        let mut inner = self.inner.lock();
        inner.interrupt_epoch += 1;
        log::debug!("transfer queue interrupted (epoch {})", inner.interrupt_epoch);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Terminate the queue permanently
    ///
    /// Wakes all blocked threads. Subsequent pushes fail; pops drain the
    /// remaining items and then fail.
    pub fn terminate(&self) {
        let mut inner = self.inner.lock();
        inner.terminated = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Whether the queue has been terminated
    pub fn is_terminated(&self) -> bool {
        self.inner.lock().terminated
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued items
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
