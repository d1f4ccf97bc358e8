//! Kernel: thread lifecycle and condition variables.
//!
//! [`Kernel`] owns the thread table, the scheduler and the saved context of
//! every slot, and performs every switch between threads. Threads call back
//! into it to create siblings, yield, exit, and wait on or signal condition
//! variables; those calls are the only points where the processor changes
//! hands.

use crate::arch::Arch;
use crate::errors::SpawnError;
use crate::mem::{Stack, StackAllocator, DEFAULT_STACK_SIZE};
use crate::sched::{DefaultScheduler, SchedStats, Scheduler};
use crate::sync::Condvar;
use crate::thread::{ThreadId, ThreadState, ThreadTable, MAX_THREADS};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::fmt;
use portable_atomic::{AtomicBool, Ordering};
use spin::{Mutex, MutexGuard};

/// Runtime kernel settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Bytes reserved for each thread's stack
    pub stack_size: usize,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    pub const fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the system stopped running threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// Every thread exited
    Idle,
    /// Threads remain, all of them Blocked with nobody left to signal them
    Deadlock { blocked: usize },
}

impl fmt::Display for Halt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Halt::Idle => write!(f, "all threads exited"),
            Halt::Deadlock { blocked } => write!(f, "{} thread(s) blocked forever", blocked),
        }
    }
}

/// Scheduling state guarded by the kernel lock.
struct KernelState {
    table: ThreadTable,
    sched: DefaultScheduler,
    current: Option<ThreadId>,
    halted: Option<Halt>,
}

impl KernelState {
    fn new() -> Self {
        Self {
            table: ThreadTable::new(),
            sched: DefaultScheduler::new(),
            current: None,
            halted: None,
        }
    }

    fn pick_next(&mut self) -> Option<ThreadId> {
        self.sched.pick_next(&self.table)
    }
}

/// Cooperative threading kernel.
///
/// # Type Parameters
///
/// * `A` - Architecture implementation providing the context switch
/// * `M` - Source of thread stacks
///
/// The kernel lock is never held across a switch. With a single active
/// context it is never contended; it only hands out exclusive access to the
/// table and the run queue.
pub struct Kernel<A: Arch, M: StackAllocator> {
    state: Mutex<KernelState>,
    /// Saved context per slot, written only by the thread owning the slot
    contexts: [UnsafeCell<A::SavedContext>; MAX_THREADS],
    /// Where [`run`](Self::run) waits while threads execute
    boot: UnsafeCell<A::SavedContext>,
    stacks: M,
    config: KernelConfig,
    running: AtomicBool,
}

// Safety: contexts are only touched by the single thread currently switching,
// outside of which they are owned by suspended threads.
unsafe impl<A: Arch, M: StackAllocator + Sync> Sync for Kernel<A, M> {}

impl<A: Arch, M: StackAllocator> Kernel<A, M> {
    /// Create a kernel drawing thread stacks from `stacks`.
    pub fn new(stacks: M) -> Self {
        Self::with_config(stacks, KernelConfig::default())
    }

    pub fn with_config(stacks: M, config: KernelConfig) -> Self {
        Self {
            state: Mutex::new(KernelState::new()),
            contexts: core::array::from_fn(|_| UnsafeCell::new(A::SavedContext::default())),
            boot: UnsafeCell::new(A::SavedContext::default()),
            stacks,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Whether [`run`](Self::run) is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Reset the thread table and run queue: every slot Unused, nothing
    /// queued, no current thread.
    ///
    /// Ignored while a thread is running.
    pub fn init(&self) {
        let mut state = self.state.lock();
        if let Some(current) = state.current {
            log::warn!("init ignored: thread {} is running", current);
            return;
        }
        state.table.reset();
        state.sched.reset();
        state.halted = None;
    }

    /// Run `main` as the bootstrap thread (slot 0) and keep scheduling until no
    /// thread can run.
    ///
    /// Returns why the system stopped. Errors if the kernel is already running
    /// or no stack could be reserved for `main`.
    pub fn run<F>(&self, main: F) -> Result<Halt, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::error!("Thread creation failed: {}", SpawnError::AlreadyRunning);
            return Err(SpawnError::AlreadyRunning);
        }

        self.init();

        let Some(stack) = Stack::reserve(&self.stacks, self.config.stack_size) else {
            log::error!("Thread creation failed: {}", SpawnError::OutOfMemory);
            self.running.store(false, Ordering::Release);
            return Err(SpawnError::OutOfMemory);
        };

        let id = ThreadId::BOOTSTRAP;
        {
            let mut state = self.state.lock();
            state.table.activate(id, Box::new(main), stack);
            if let Err(err) = state.sched.enqueue(id) {
                state.table.release(id);
                log::error!("Thread creation failed: {}", err);
                self.running.store(false, Ordering::Release);
                return Err(err.into());
            }
            state.table.set_state(id, ThreadState::Running);
            state.current = Some(id);
        }
        log::debug!("starting bootstrap thread");

        // Safety: the boot context is only resumed by `halt_system`, and the
        // stack was just reserved for this thread alone.
        unsafe {
            A::switch_start(self.boot.get(), stack.top(), thread_start::<A, M>, self.as_arg());
        }

        let halt = self.state.lock().halted.take().unwrap_or(Halt::Idle);
        self.running.store(false, Ordering::Release);
        Ok(halt)
    }

    /// Create a thread running `entry` and switch to it immediately.
    ///
    /// The caller stays Runnable in the run queue and returns from here once
    /// the scheduler picks it again. Failures are logged and leave the kernel
    /// unchanged.
    pub fn create<F>(&self, entry: F) -> Result<ThreadId, SpawnError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        let Some(parent) = state.current else {
            log::error!("Thread creation failed: {}", SpawnError::NotInitialized);
            return Err(SpawnError::NotInitialized);
        };
        let Some(id) = state.table.first_unused() else {
            log::error!("Thread creation failed: {}", SpawnError::TooManyThreads);
            return Err(SpawnError::TooManyThreads);
        };
        let Some(stack) = Stack::reserve(&self.stacks, self.config.stack_size) else {
            log::error!("Thread creation failed: {}", SpawnError::OutOfMemory);
            return Err(SpawnError::OutOfMemory);
        };

        state.table.activate(id, Box::new(entry), stack);
        if let Err(err) = state.sched.enqueue(id) {
            state.table.release(id);
            log::error!("Thread creation failed: {}", err);
            return Err(err.into());
        }

        state.table.set_state(parent, ThreadState::Runnable);
        state.table.set_state(id, ThreadState::Running);
        // The trampoline looks up its entry through `current`.
        state.current = Some(id);
        drop(state);

        log::debug!("thread {} created by {}", id, parent);
        // Safety: `parent` is the running thread and owns its context slot;
        // the stack belongs to the new thread only.
        unsafe {
            A::switch_start(self.context(parent), stack.top(), thread_start::<A, M>, self.as_arg());
        }
        Ok(id)
    }

    /// Give every other Runnable thread a turn before continuing.
    ///
    /// Returns immediately if no other thread is Runnable.
    pub fn yield_now(&self) {
        let mut state = self.state.lock();
        let Some(from) = state.current else {
            return;
        };

        state.table.set_state(from, ThreadState::Runnable);
        let to = match state.pick_next() {
            Some(next) if next != from => next,
            _ => {
                state.table.set_state(from, ThreadState::Running);
                return;
            }
        };
        state.table.set_state(to, ThreadState::Running);
        state.current = Some(to);
        drop(state);

        log::trace!("yield {} -> {}", from, to);
        // Safety: `from` is the running thread; `to` was suspended in a
        // switch and has not been resumed since.
        unsafe { A::switch_to(self.context(from), self.context(to)) };
    }

    /// Terminate the calling thread and free its slot.
    ///
    /// Switches to the next Runnable thread, or stops the system if there is
    /// none.
    pub fn exit(&self) -> ! {
        let mut state = self.state.lock();
        let Some(from) = state.current else {
            drop(state);
            log::error!("exit called with no running thread");
            A::halt()
        };

        state.table.release(from);
        state.sched.remove(from);
        log::debug!("thread {} exited", from);

        self.switch_away(state, from);
        // An exited thread is never resumed.
        A::halt()
    }

    /// Reset `cv` to have no waiters.
    pub fn cv_init(&self, cv: &Condvar) {
        cv.init();
    }

    /// Tear down `cv`, warning if threads are still waiting on it.
    pub fn cv_release(&self, cv: &Condvar) {
        cv.release();
    }

    /// Block the calling thread until `cv` is signaled.
    ///
    /// There is no associated lock: the predicate a caller checked before
    /// waiting cannot change until the caller gives up the processor here.
    /// Callers re-check their predicate on return.
    pub fn cv_wait(&self, cv: &Condvar) {
        let mut state = self.state.lock();
        let Some(from) = state.current else {
            log::warn!("cv_wait called with no running thread");
            return;
        };
        if let Err(err) = cv.push(from) {
            log::error!("Thread {} cannot wait: {}", from, err);
            return;
        }

        state.table.set_state(from, ThreadState::Blocked);
        state.sched.remove(from);
        log::trace!("thread {} waiting", from);

        self.switch_away(state, from);
    }

    /// Wake the longest-waiting thread on `cv`, if any. Does not switch.
    pub fn cv_signal(&self, cv: &Condvar) {
        let mut state = self.state.lock();
        let Some(id) = cv.pop_front() else {
            return;
        };
        if state.table.state(id) != ThreadState::Blocked {
            log::warn!("signaled thread {} is not blocked", id);
            return;
        }

        state.table.set_state(id, ThreadState::Runnable);
        if let Err(err) = state.sched.enqueue(id) {
            log::error!("Cannot wake thread {}: {}", id, err);
            return;
        }
        log::trace!("thread {} woken", id);
    }

    /// Number of slots in use.
    pub fn thread_count(&self) -> usize {
        self.state.lock().table.in_use()
    }

    /// The Running thread.
    pub fn current(&self) -> Option<ThreadId> {
        self.state.lock().current
    }

    pub fn state_of(&self, id: ThreadId) -> ThreadState {
        self.state.lock().table.state(id)
    }

    pub fn stats(&self) -> SchedStats {
        let state = self.state.lock();
        state.sched.stats(&state.table)
    }

    /// Run queue contents from head to tail.
    pub fn queued(&self) -> Vec<ThreadId> {
        self.state.lock().sched.queue().iter().collect()
    }

    /// Hand the processor from `from`, which is no longer Running, to the next
    /// Runnable thread. Stops the system if there is none.
    fn switch_away(&self, mut state: MutexGuard<'_, KernelState>, from: ThreadId) {
        let Some(to) = state.pick_next() else {
            self.halt_system(state, from)
        };
        state.table.set_state(to, ThreadState::Running);
        state.current = Some(to);
        drop(state);

        log::trace!("switch {} -> {}", from, to);
        // Safety: `from` was the running thread; `to` was suspended in a
        // switch and has not been resumed since.
        unsafe { A::switch_to(self.context(from), self.context(to)) };
    }

    /// Nothing can run: record why and resume the caller of `run`.
    fn halt_system(&self, mut state: MutexGuard<'_, KernelState>, from: ThreadId) -> ! {
        let blocked = state.table.count(ThreadState::Blocked);
        let halt = if blocked == 0 {
            Halt::Idle
        } else {
            Halt::Deadlock { blocked }
        };
        log::error!("No runnable thread: {}", halt);

        state.halted = Some(halt);
        state.current = None;
        drop(state);

        // Safety: the boot context was saved by `run` and is resumed only here.
        unsafe { A::switch_to(self.context(from), self.boot.get()) };
        A::halt()
    }

    fn context(&self, id: ThreadId) -> *mut A::SavedContext {
        self.contexts[id.index()].get()
    }

    fn as_arg(&self) -> *const () {
        self as *const Self as *const ()
    }
}

/// First code run on every new stack: look up the current thread's entry,
/// run it, then exit the thread.
extern "C" fn thread_start<A: Arch, M: StackAllocator>(kernel: *const ()) -> ! {
    // Safety: `run` and `create` pass the kernel that outlives this thread.
    let kernel = unsafe { &*(kernel as *const Kernel<A, M>) };

    let entry = {
        let mut state = kernel.state.lock();
        match state.current {
            Some(id) => state.table.take_entry(id),
            None => None,
        }
    };
    match entry {
        Some(entry) => entry(),
        None => log::error!("thread started without an entry"),
    }

    kernel.exit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::hosted::HostedArch;
    use crate::mem::BumpAllocator;
    use alloc::vec;

    fn kernel(heap: usize) -> &'static Kernel<HostedArch, BumpAllocator> {
        let region = Box::leak(vec![0u8; heap].into_boxed_slice());
        Box::leak(Box::new(Kernel::new(BumpAllocator::from_region(region))))
    }

    #[test]
    fn config_defaults_to_sixteen_kib() {
        let config = KernelConfig::default();
        assert_eq!(config.stack_size, 16 * 1024);
        assert_eq!(config.with_stack_size(4096).stack_size, 4096);
    }

    #[test]
    fn operations_outside_run_are_harmless() {
        let k = kernel(64 * 1024);

        assert_eq!(k.create(|| {}), Err(SpawnError::NotInitialized));
        k.yield_now();
        k.cv_signal(&Condvar::new());
        assert_eq!(k.thread_count(), 0);
        assert_eq!(k.current(), None);
        assert!(!k.is_running());
    }

    #[test]
    fn bootstrap_runs_and_system_goes_idle() {
        let k = kernel(64 * 1024);
        let seen: &'static Mutex<Option<ThreadId>> = Box::leak(Box::new(Mutex::new(None)));

        let halt = k.run(move || {
            *seen.lock() = k.current();
        });

        assert_eq!(halt, Ok(Halt::Idle));
        assert_eq!(*seen.lock(), Some(ThreadId::BOOTSTRAP));
        assert_eq!(k.thread_count(), 0);
        assert!(k.queued().is_empty());
        assert!(!k.is_running());
    }

    #[test]
    fn run_without_stack_memory_fails() {
        let k = kernel(1024);
        assert_eq!(k.run(|| {}), Err(SpawnError::OutOfMemory));
        assert!(!k.is_running());
    }

    #[test]
    fn run_twice_reuses_kernel() {
        let k = kernel(64 * 1024);
        assert_eq!(k.run(|| {}), Ok(Halt::Idle));
        assert_eq!(k.run(|| {}), Ok(Halt::Idle));
    }

    #[test]
    fn nested_run_is_rejected() {
        let k = kernel(64 * 1024);
        let nested: &'static Mutex<Option<Result<Halt, SpawnError>>> =
            Box::leak(Box::new(Mutex::new(None)));

        k.run(move || {
            *nested.lock() = Some(k.run(|| {}));
        })
        .unwrap();

        assert_eq!(*nested.lock(), Some(Err(SpawnError::AlreadyRunning)));
    }

    #[test]
    fn lone_yield_returns_to_caller() {
        let k = kernel(64 * 1024);
        let after: &'static Mutex<Option<(ThreadState, SchedStats)>> =
            Box::leak(Box::new(Mutex::new(None)));

        assert_eq!(
            k.run(move || {
                k.yield_now();
                *after.lock() = Some((k.state_of(ThreadId::BOOTSTRAP), k.stats()));
            }),
            Ok(Halt::Idle)
        );

        let (state, stats) = after.lock().unwrap();
        assert_eq!(state, ThreadState::Running);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.runnable, 1);
    }
}
