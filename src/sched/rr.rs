//! Round-robin scheduler over a single run queue.

use super::queue::RunQueue;
use super::Scheduler;
use crate::errors::ScheduleError;
use crate::thread::{ThreadId, ThreadState, ThreadTable};

/// Round-robin scheduler.
///
/// Fairness comes entirely from requeueing: the thread chosen to run is moved
/// to the tail, so it is not picked again until every other Runnable thread
/// ahead of it has had a turn.
#[derive(Debug, Default)]
pub struct RoundRobinScheduler {
    queue: RunQueue,
}

impl RoundRobinScheduler {
    pub const fn new() -> Self {
        Self {
            queue: RunQueue::new(),
        }
    }
}

impl Scheduler for RoundRobinScheduler {
    fn reset(&mut self) {
        self.queue.clear();
    }

    fn enqueue(&mut self, id: ThreadId) -> Result<(), ScheduleError> {
        self.queue.enqueue(id)
    }

    fn remove(&mut self, id: ThreadId) {
        self.queue.remove(id);
    }

    fn pick_next(&mut self, table: &ThreadTable) -> Option<ThreadId> {
        let next = self
            .queue
            .iter()
            .find(|&id| table.state(id) == ThreadState::Runnable)?;

        self.queue.remove(next);
        // Room was just made by the removal
        let _ = self.queue.enqueue(next);
        Some(next)
    }

    fn queue(&self) -> &RunQueue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{BumpAllocator, Stack};
    use alloc::boxed::Box;
    use alloc::vec;
    use alloc::vec::Vec;

    fn id(index: usize) -> ThreadId {
        ThreadId::new(index).unwrap()
    }

    fn table_with(states: &[ThreadState]) -> ThreadTable {
        let heap = BumpAllocator::from_region(Box::leak(vec![0u8; 16 * 1024].into_boxed_slice()));
        let mut table = ThreadTable::new();
        for (i, &state) in states.iter().enumerate() {
            let stack = Stack::reserve(&heap, 256).unwrap();
            table.activate(id(i), Box::new(|| {}), stack);
            table.set_state(id(i), state);
        }
        table
    }

    fn queued(sched: &RoundRobinScheduler) -> Vec<usize> {
        sched.queue().iter().map(ThreadId::index).collect()
    }

    #[test]
    fn pick_moves_choice_to_tail() {
        use ThreadState::*;
        let table = table_with(&[Runnable, Runnable, Runnable]);
        let mut sched = RoundRobinScheduler::new();
        for i in 0..3 {
            sched.enqueue(id(i)).unwrap();
        }

        assert_eq!(sched.pick_next(&table), Some(id(0)));
        assert_eq!(queued(&sched), [1, 2, 0]);
        assert_eq!(sched.pick_next(&table), Some(id(1)));
        assert_eq!(sched.pick_next(&table), Some(id(2)));
        assert_eq!(sched.pick_next(&table), Some(id(0)));
    }

    #[test]
    fn pick_skips_non_runnable() {
        use ThreadState::*;
        let table = table_with(&[Running, Blocked, Runnable]);
        let mut sched = RoundRobinScheduler::new();
        for i in 0..3 {
            sched.enqueue(id(i)).unwrap();
        }

        assert_eq!(sched.pick_next(&table), Some(id(2)));
        assert_eq!(queued(&sched), [0, 1, 2]);
    }

    #[test]
    fn nothing_runnable_leaves_queue_untouched() {
        use ThreadState::*;
        let table = table_with(&[Running, Blocked]);
        let mut sched = RoundRobinScheduler::new();
        sched.enqueue(id(0)).unwrap();
        sched.enqueue(id(1)).unwrap();

        assert_eq!(sched.pick_next(&table), None);
        assert_eq!(queued(&sched), [0, 1]);

        sched.reset();
        assert_eq!(sched.pick_next(&table), None);
    }

    #[test]
    fn stats_reflect_table() {
        use ThreadState::*;
        let table = table_with(&[Running, Runnable, Blocked, Runnable]);
        let sched = RoundRobinScheduler::new();

        let stats = sched.stats(&table);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.runnable, 3);
        assert_eq!(stats.blocked, 1);
    }
}
