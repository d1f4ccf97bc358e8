//! Circular run queue of thread identifiers.

use crate::errors::ScheduleError;
use crate::thread::{ThreadId, MAX_THREADS};

/// FIFO of identifiers waiting for the processor, in scheduling order.
///
/// The queue never holds more than [`MAX_THREADS`] entries, one per slot of the
/// thread table.
#[derive(Debug, Clone)]
pub struct RunQueue {
    slots: [ThreadId; MAX_THREADS],
    head: usize,
    tail: usize,
    len: usize,
}

impl Default for RunQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RunQueue {
    pub const fn new() -> Self {
        Self {
            slots: [ThreadId::BOOTSTRAP; MAX_THREADS],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Empty the queue.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `id` at the tail.
    pub fn enqueue(&mut self, id: ThreadId) -> Result<(), ScheduleError> {
        if self.len == MAX_THREADS {
            return Err(ScheduleError::QueueFull);
        }
        self.slots[self.tail] = id;
        self.tail = (self.tail + 1) % MAX_THREADS;
        self.len += 1;
        Ok(())
    }

    /// Take the identifier at the head.
    pub fn dequeue(&mut self) -> Option<ThreadId> {
        if self.is_empty() {
            return None;
        }
        let id = self.slots[self.head];
        self.head = (self.head + 1) % MAX_THREADS;
        self.len -= 1;
        Some(id)
    }

    /// Remove the first occurrence of `id`, shifting everything behind it one
    /// place toward the head. Returns whether `id` was queued.
    pub fn remove(&mut self, id: ThreadId) -> bool {
        let Some(offset) = self.iter().position(|queued| queued == id) else {
            return false;
        };

        for i in offset..self.len - 1 {
            let to = (self.head + i) % MAX_THREADS;
            let from = (self.head + i + 1) % MAX_THREADS;
            self.slots[to] = self.slots[from];
        }
        self.tail = (self.tail + MAX_THREADS - 1) % MAX_THREADS;
        self.len -= 1;
        true
    }

    pub fn contains(&self, id: ThreadId) -> bool {
        self.iter().any(|queued| queued == id)
    }

    /// Identifiers from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        (0..self.len).map(move |i| self.slots[(self.head + i) % MAX_THREADS])
    }
}
