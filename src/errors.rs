//! Error types for the threading system.
//!
//! None of these are fatal. Every failing operation has already been logged
//! and left kernel state untouched by the time the error reaches the caller,
//! so callers may treat them as advisory.

use core::fmt;

/// Result type for threading operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Any error reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// Thread creation errors
    Spawn(SpawnError),
    /// Run queue and wait list errors
    Schedule(ScheduleError),
}

/// Errors that can occur during thread creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// No kernel thread is running to create from
    NotInitialized,
    /// `run` was called while the kernel is already running
    AlreadyRunning,
    /// Every thread slot is in use
    TooManyThreads,
    /// The allocator could not provide a stack
    OutOfMemory,
    /// The run queue refused the new thread
    SchedulerRejected,
}

/// Errors from the run queue and condition variable wait lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// Run queue is full
    QueueFull,
    /// Condition variable wait list is full
    WaitListFull,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::Spawn(e) => write!(f, "Thread spawn error: {}", e),
            ThreadError::Schedule(e) => write!(f, "Scheduling error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::NotInitialized => write!(f, "Threading system not running"),
            SpawnError::AlreadyRunning => write!(f, "Threading system already running"),
            SpawnError::TooManyThreads => write!(f, "No available thread slot"),
            SpawnError::OutOfMemory => write!(f, "Failed to allocate stack memory"),
            SpawnError::SchedulerRejected => write!(f, "Scheduler rejected thread creation"),
        }
    }
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::QueueFull => write!(f, "Run queue is full"),
            ScheduleError::WaitListFull => write!(f, "Condition variable wait list is full"),
        }
    }
}

impl From<SpawnError> for ThreadError {
    fn from(error: SpawnError) -> Self {
        ThreadError::Spawn(error)
    }
}

impl From<ScheduleError> for ThreadError {
    fn from(error: ScheduleError) -> Self {
        ThreadError::Schedule(error)
    }
}

impl From<ScheduleError> for SpawnError {
    fn from(_: ScheduleError) -> Self {
        SpawnError::SchedulerRejected
    }
}
