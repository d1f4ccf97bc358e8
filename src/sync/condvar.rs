//! Condition variables.
//!
//! A [`Condvar`] only records who is waiting; blocking and waking happen in
//! [`Kernel::cv_wait`](crate::Kernel::cv_wait) and
//! [`Kernel::cv_signal`](crate::Kernel::cv_signal). There is no associated
//! mutex: with cooperative scheduling nothing runs between a caller checking
//! its predicate and calling `cv_wait`.

use crate::errors::ScheduleError;
use crate::thread::{ThreadId, MAX_THREADS};
use spin::Mutex;

/// FIFO of waiting thread identifiers.
#[derive(Debug)]
struct WaitList {
    waiting: [ThreadId; MAX_THREADS],
    count: usize,
}

impl WaitList {
    const fn new() -> Self {
        Self {
            waiting: [ThreadId::BOOTSTRAP; MAX_THREADS],
            count: 0,
        }
    }

    fn push(&mut self, id: ThreadId) -> Result<(), ScheduleError> {
        if self.count == MAX_THREADS {
            return Err(ScheduleError::WaitListFull);
        }
        self.waiting[self.count] = id;
        self.count += 1;
        Ok(())
    }

    fn pop_front(&mut self) -> Option<ThreadId> {
        if self.count == 0 {
            return None;
        }
        let first = self.waiting[0];
        self.waiting.copy_within(1..self.count, 0);
        self.count -= 1;
        Some(first)
    }
}

/// A condition variable threads can block on until signaled.
#[derive(Debug)]
pub struct Condvar {
    list: Mutex<WaitList>,
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Condvar {
    /// A condition variable with nobody waiting.
    pub const fn new() -> Self {
        Self {
            list: Mutex::new(WaitList::new()),
        }
    }

    /// Forget every waiter.
    pub fn init(&self) {
        self.list.lock().count = 0;
    }

    /// Tear down the condition variable. Threads still waiting stay Blocked
    /// with nobody left to wake them.
    pub fn release(&self) {
        let mut list = self.list.lock();
        if list.count > 0 {
            log::warn!("releasing condition variable with {} waiting thread(s)", list.count);
        }
        list.count = 0;
    }

    /// Number of threads waiting.
    pub fn waiters(&self) -> usize {
        self.list.lock().count
    }

    pub(crate) fn push(&self, id: ThreadId) -> Result<(), ScheduleError> {
        self.list.lock().push(id)
    }

    pub(crate) fn pop_front(&self) -> Option<ThreadId> {
        self.list.lock().pop_front()
    }
}
