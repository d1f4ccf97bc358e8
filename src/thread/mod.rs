//! Thread control blocks and the fixed thread table.
//!
//! The table is the ground truth for thread identity and status. A thread's
//! identifier is its slot index, stable for as long as the slot is in use and
//! reusable once the thread exits.

use crate::mem::Stack;
use alloc::boxed::Box;
use core::fmt;

/// Number of thread slots.
pub const MAX_THREADS: usize = 32;

/// Index of a slot in the thread table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    /// Slot of the thread started by [`Kernel::run`](crate::Kernel::run).
    pub const BOOTSTRAP: ThreadId = ThreadId(0);

    /// Identifier for slot `index`, if such a slot exists.
    pub const fn new(index: usize) -> Option<Self> {
        if index < MAX_THREADS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Get the raw slot index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadState {
    /// Slot is free
    #[default]
    Unused,
    /// Waiting in the run queue for its turn
    Runnable,
    /// Holding the processor
    Running,
    /// Waiting on a condition variable
    Blocked,
}

/// Body of a thread. Whatever the thread needs is captured by the closure.
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

pub struct ThreadControlBlock {
    id: ThreadId,
    state: ThreadState,
    entry: Option<ThreadEntry>,
    stack: Option<Stack>,
}

impl ThreadControlBlock {
    fn new(id: ThreadId) -> Self {
        Self {
            id,
            state: ThreadState::Unused,
            entry: None,
            stack: None,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Stack reserved for the thread, while the slot is in use.
    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }

    pub fn is_unused(&self) -> bool {
        self.state == ThreadState::Unused
    }
}

impl fmt::Debug for ThreadControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadControlBlock")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("has_entry", &self.entry.is_some())
            .field("stack", &self.stack)
            .finish()
    }
}

/// Fixed table of [`MAX_THREADS`] thread control blocks.
pub struct ThreadTable {
    slots: [ThreadControlBlock; MAX_THREADS],
}

impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadTable {
    /// A table with every slot Unused.
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|i| ThreadControlBlock::new(ThreadId(i))),
        }
    }

    /// Return every slot to Unused.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = ThreadControlBlock::new(slot.id);
        }
    }

    /// Lowest-numbered free slot.
    pub fn first_unused(&self) -> Option<ThreadId> {
        self.slots.iter().find(|tcb| tcb.is_unused()).map(|tcb| tcb.id)
    }

    /// Claim a slot for a new thread, leaving it Runnable.
    pub fn activate(&mut self, id: ThreadId, entry: ThreadEntry, stack: Stack) {
        let tcb = &mut self.slots[id.0];
        tcb.state = ThreadState::Runnable;
        tcb.entry = Some(entry);
        tcb.stack = Some(stack);
    }

    /// Hand out the thread's entry; a thread starts exactly once.
    pub fn take_entry(&mut self, id: ThreadId) -> Option<ThreadEntry> {
        self.slots[id.0].entry.take()
    }

    /// Free a slot. Its stack memory stays reserved.
    pub fn release(&mut self, id: ThreadId) {
        self.slots[id.0] = ThreadControlBlock::new(id);
    }

    pub fn get(&self, id: ThreadId) -> &ThreadControlBlock {
        &self.slots[id.0]
    }

    pub fn state(&self, id: ThreadId) -> ThreadState {
        self.slots[id.0].state
    }

    pub fn set_state(&mut self, id: ThreadId, state: ThreadState) {
        self.slots[id.0].state = state;
    }

    /// Number of slots in `state`.
    pub fn count(&self, state: ThreadState) -> usize {
        self.slots.iter().filter(|tcb| tcb.state == state).count()
    }

    /// Number of slots not Unused.
    pub fn in_use(&self) -> usize {
        MAX_THREADS - self.count(ThreadState::Unused)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThreadControlBlock> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::BumpAllocator;
    use alloc::vec;

    fn stack() -> Stack {
        let heap = BumpAllocator::from_region(Box::leak(vec![0u8; 4096].into_boxed_slice()));
        Stack::reserve(&heap, 1024).unwrap()
    }

    #[test]
    fn thread_id_bounds() {
        assert_eq!(ThreadId::new(0), Some(ThreadId::BOOTSTRAP));
        assert_eq!(ThreadId::new(MAX_THREADS - 1).map(ThreadId::index), Some(31));
        assert_eq!(ThreadId::new(MAX_THREADS), None);
    }

    #[test]
    fn new_table_is_all_unused() {
        let table = ThreadTable::new();
        assert_eq!(table.count(ThreadState::Unused), MAX_THREADS);
        assert_eq!(table.in_use(), 0);
        assert_eq!(table.first_unused(), Some(ThreadId(0)));
        assert!(table.iter().enumerate().all(|(i, tcb)| tcb.id().index() == i));
    }

    #[test]
    fn activate_take_release_cycle() {
        let mut table = ThreadTable::new();
        let id = table.first_unused().unwrap();

        table.activate(id, Box::new(|| {}), stack());
        assert_eq!(table.state(id), ThreadState::Runnable);
        assert!(table.get(id).stack().is_some());
        assert_eq!(table.first_unused(), Some(ThreadId(1)));

        assert!(table.take_entry(id).is_some());
        assert!(table.take_entry(id).is_none());

        table.release(id);
        assert!(table.get(id).is_unused());
        assert!(table.get(id).stack().is_none());
        assert_eq!(table.first_unused(), Some(id));
    }

    #[test]
    fn first_unused_skips_claimed_slots() {
        let mut table = ThreadTable::new();
        for i in 0..MAX_THREADS {
            let id = table.first_unused().unwrap();
            assert_eq!(id.index(), i);
            table.activate(id, Box::new(|| {}), stack());
        }
        assert_eq!(table.first_unused(), None);

        table.release(ThreadId(7));
        assert_eq!(table.first_unused(), Some(ThreadId(7)));
    }

    #[test]
    fn state_counts() {
        let mut table = ThreadTable::new();
        table.activate(ThreadId(0), Box::new(|| {}), stack());
        table.activate(ThreadId(1), Box::new(|| {}), stack());
        table.set_state(ThreadId(0), ThreadState::Running);
        table.set_state(ThreadId(1), ThreadState::Blocked);

        assert_eq!(table.count(ThreadState::Running), 1);
        assert_eq!(table.count(ThreadState::Blocked), 1);
        assert_eq!(table.in_use(), 2);

        table.reset();
        assert_eq!(table.in_use(), 0);
    }
}
