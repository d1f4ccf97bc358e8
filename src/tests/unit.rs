//! Unit tests for core threading components working together.

mod state_machine_tests {
    use crate::mem::{BumpAllocator, Stack};
    use crate::sched::{RoundRobinScheduler, Scheduler};
    use crate::sync::Condvar;
    use crate::thread::{ThreadId, ThreadState, ThreadTable};
    use crate::tests::helpers::leaked_region;
    use alloc::boxed::Box;

    fn id(index: usize) -> ThreadId {
        ThreadId::new(index).unwrap()
    }

    /// Table and scheduler with `n` Runnable threads queued in slot order.
    fn populated(n: usize) -> (ThreadTable, RoundRobinScheduler) {
        let heap = BumpAllocator::from_region(leaked_region(n * 1024 + 16));
        let mut table = ThreadTable::new();
        let mut sched = RoundRobinScheduler::new();
        for i in 0..n {
            let stack = Stack::reserve(&heap, 1024).unwrap();
            table.activate(id(i), Box::new(|| {}), stack);
            sched.enqueue(id(i)).unwrap();
        }
        (table, sched)
    }

    #[test]
    fn test_wait_then_signal_requeues_at_tail() {
        let (mut table, mut sched) = populated(3);
        let cv = Condvar::new();

        // Thread 0 waits.
        cv.push(id(0)).unwrap();
        table.set_state(id(0), ThreadState::Blocked);
        sched.remove(id(0));
        assert_eq!(sched.pick_next(&table), Some(id(1)));

        // Signal: oldest waiter back to Runnable at the tail.
        let woken = cv.pop_front().unwrap();
        table.set_state(woken, ThreadState::Runnable);
        sched.enqueue(woken).unwrap();

        let order: alloc::vec::Vec<_> = sched.queue().iter().collect();
        assert_eq!(order, [id(2), id(1), id(0)]);
    }

    #[test]
    fn test_blocked_threads_are_never_picked() {
        let (mut table, mut sched) = populated(4);
        for i in 0..4 {
            table.set_state(id(i), ThreadState::Blocked);
        }

        assert_eq!(sched.pick_next(&table), None);
        assert_eq!(sched.stats(&table).blocked, 4);
        assert_eq!(sched.stats(&table).runnable, 0);
    }

    #[test]
    fn test_exit_frees_slot_for_reuse() {
        let (mut table, mut sched) = populated(3);

        table.release(id(1));
        sched.remove(id(1));

        assert!(!sched.queue().contains(id(1)));
        assert_eq!(table.first_unused(), Some(id(1)));
        assert_eq!(sched.stats(&table).total, 2);
    }
}

mod kernel_surface_tests {
    use crate::errors::{ScheduleError, SpawnError, ThreadError};
    use crate::kernel::Halt;
    use crate::sync::Condvar;
    use crate::tests::helpers::{shared, test_kernel};
    use crate::thread::ThreadId;
    use alloc::string::ToString;

    #[test]
    fn test_halt_display() {
        assert_eq!(Halt::Idle.to_string(), "all threads exited");
        assert_eq!(
            Halt::Deadlock { blocked: 2 }.to_string(),
            "2 thread(s) blocked forever"
        );
    }

    #[test]
    fn test_errors_compose() {
        let err: ThreadError = SpawnError::from(ScheduleError::QueueFull).into();
        assert_eq!(err, ThreadError::Spawn(SpawnError::SchedulerRejected));
        assert_eq!(
            ThreadError::from(ScheduleError::WaitListFull).to_string(),
            "Scheduling error: Condition variable wait list is full"
        );
    }

    #[test]
    fn test_condvar_lifecycle_through_kernel() {
        let k = test_kernel();
        let cv = shared(Condvar::new());

        k.cv_init(cv);
        assert_eq!(cv.waiters(), 0);
        k.cv_signal(cv);
        k.cv_release(cv);
        assert_eq!(cv.waiters(), 0);
    }

    #[test]
    fn test_release_with_waiters_strands_them() {
        let k = test_kernel();
        let cv = shared(Condvar::new());

        let halt = k.run(move || {
            k.create(move || k.cv_wait(cv)).ok();
            k.cv_release(cv);
            // Nothing left to wake: signaling is now a no-op.
            k.cv_signal(cv);
        });

        assert_eq!(halt, Ok(Halt::Deadlock { blocked: 1 }));
        assert_eq!(cv.waiters(), 0);
    }

    #[test]
    fn test_init_is_ignored_while_running() {
        let k = test_kernel();
        let count = shared(spin::Mutex::new(0));

        k.run(move || {
            k.create(|| {}).ok();
            k.init();
            *count.lock() = k.thread_count();
        })
        .ok();

        assert_eq!(*count.lock(), 1);
        assert_eq!(k.current(), None);
        assert_eq!(k.state_of(ThreadId::BOOTSTRAP), crate::thread::ThreadState::Unused);
    }
}
