#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

//! Cooperative multithreading for bare-metal targets.
//!
//! A fixed table of 32 threads, a round-robin run queue and condition
//! variables, with no operating system underneath. Threads are never
//! preempted: the processor changes hands only when the running thread
//! creates a thread, yields, exits, or waits on a condition variable.
//!
//! # Target Platforms
//!
//! - **riscv64** and **aarch64**, bare metal (QEMU `virt` boards in the demo)
//! - the host, through the hosted backend (`std-shim` feature), which runs
//!   every kernel thread on its own OS thread
//!
//! # Features
//!
//! - `full-fpu`: Save callee-saved floating point registers on switch (default)
//! - `std-shim`: Hosted context switching for running on a host OS
//!
//! # Quick Start
//!
//! ```ignore
//! use cooperative_threads::{BumpAllocator, Condvar, DefaultArch, Kernel};
//! use spin::Lazy;
//!
//! static HEAP: BumpAllocator = BumpAllocator::empty();
//! static KERNEL: Lazy<Kernel<DefaultArch, &BumpAllocator>> =
//!     Lazy::new(|| Kernel::new(&HEAP));
//!
//! fn kernel_main() -> ! {
//!     let halt = KERNEL.run(|| {
//!         KERNEL.create(|| {
//!             for i in 0..5 {
//!                 log::info!("worker {}", i);
//!                 KERNEL.yield_now();
//!             }
//!         }).ok();
//!     });
//!     log::info!("stopped: {:?}", halt);
//!     DefaultArch::halt()
//! }
//! ```
//!
//! # Architecture
//!
//! - [`arch`]: the context switch boundary, one backend per target
//! - [`thread`]: thread table and control blocks
//! - [`sched`]: run queue and round-robin selection
//! - [`sync`]: condition variables
//! - [`kernel`]: thread lifecycle tying the above together
//! - [`mem`], [`console`]: stack memory and diagnostic output

extern crate alloc;

#[cfg(any(test, feature = "std-shim"))]
extern crate std;

pub mod arch;
pub mod console;
pub mod errors;
pub mod kernel;
pub mod mem;
pub mod sched;
pub mod sync;
pub mod thread;

#[cfg(test)]
mod tests;

// Panic handler for bare-metal
#[cfg(all(target_os = "none", not(test), not(feature = "std-shim")))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("kernel panic: {}", info);
    loop {
        core::hint::spin_loop();
    }
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{Arch, ThreadStart};

#[cfg(any(target_arch = "riscv64", target_arch = "aarch64", feature = "std-shim"))]
pub use arch::DefaultArch;

// Kernel
pub use kernel::{Halt, Kernel, KernelConfig};

// Scheduling
pub use sched::{RoundRobinScheduler, RunQueue, SchedStats, Scheduler};

// Threads
pub use thread::{ThreadId, ThreadState, MAX_THREADS};

// Synchronization
pub use sync::Condvar;

// Memory management
pub use mem::{BumpAllocator, Stack, StackAllocator, DEFAULT_STACK_SIZE};

// Diagnostics
pub use console::{Console, ConsoleLogger};

// Errors
pub use errors::{ScheduleError, SpawnError, ThreadError, ThreadResult};
