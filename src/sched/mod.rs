//! Thread scheduling.
//!
//! The scheduler only decides *who* runs next. It never switches contexts and
//! never halts; the kernel does both based on its answer.

pub mod queue;
pub mod rr;

pub use queue::RunQueue;
pub use rr::RoundRobinScheduler;

use crate::errors::ScheduleError;
use crate::thread::{ThreadId, ThreadState, ThreadTable};

/// Default scheduler type.
pub type DefaultScheduler = RoundRobinScheduler;

/// Snapshot of thread counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedStats {
    /// Slots in use
    pub total: usize,
    /// Runnable or Running threads
    pub runnable: usize,
    /// Threads waiting on a condition variable
    pub blocked: usize,
}

/// Selection policy over the run queue.
pub trait Scheduler {
    /// Drop every queued identifier.
    fn reset(&mut self);

    /// Queue a thread that is ready to run.
    fn enqueue(&mut self, id: ThreadId) -> Result<(), ScheduleError>;

    /// Take a thread out of the queue. No-op if it is not queued.
    fn remove(&mut self, id: ThreadId);

    /// Choose the next thread to run, or `None` if no queued thread is
    /// Runnable.
    fn pick_next(&mut self, table: &ThreadTable) -> Option<ThreadId>;

    /// The queue in scheduling order.
    fn queue(&self) -> &RunQueue;

    /// Thread counts for monitoring and debugging.
    fn stats(&self, table: &ThreadTable) -> SchedStats {
        let running = table.count(ThreadState::Running);
        SchedStats {
            total: table.in_use(),
            runnable: table.count(ThreadState::Runnable) + running,
            blocked: table.count(ThreadState::Blocked),
        }
    }
}
