//! Architecture abstraction layer for cooperative context switching.
//!
//! The kernel never touches registers itself. Every transfer of the processor
//! between threads goes through the two primitives of [`Arch`], so exactly one
//! logical stack is active at any instant and control only moves at explicit
//! call sites.

/// Entry trampoline handed to [`Arch::switch_start`].
///
/// It receives the kernel handle the thread was started for and never returns:
/// once the thread body finishes the trampoline exits the thread, which switches
/// to another thread or halts the system.
pub type ThreadStart = extern "C" fn(*const ()) -> !;

/// Architecture abstraction trait.
///
/// This trait must be implemented for each supported target to provide the
/// save/restore boundary the scheduler relies on.
///
/// # Safety
///
/// Implementations transfer control between stacks. A switch must preserve the
/// return point, the stack pointer and every register the calling convention
/// requires to survive a function call, must not allocate, and must never be
/// interleaved with another switch.
pub trait Arch {
    /// Saved execution state of a suspended thread.
    ///
    /// Meaningless until the owning thread has been switched away from at
    /// least once.
    type SavedContext: Send + Default;

    /// Save the caller's context into `save_into`, then begin executing `start`
    /// on the fresh stack ending at `stack_top`, passing it `arg`.
    ///
    /// Returns only when some later [`switch_to`](Arch::switch_to) resumes the
    /// context saved here.
    ///
    /// # Safety
    ///
    /// - `save_into` must be valid for writes and must not be read by anyone
    ///   else until this call returns
    /// - `stack_top` must be the 16-byte aligned upper end of a region that is
    ///   not used by any other thread
    /// - the kernel's current thread must already name the thread being started
    unsafe fn switch_start(
        save_into: *mut Self::SavedContext,
        stack_top: *mut u8,
        start: ThreadStart,
        arg: *const (),
    );

    /// Save the caller's context into `save_into`, then resume `target`.
    ///
    /// # Safety
    ///
    /// - `save_into` must be valid for writes
    /// - `target` must hold a context produced by an earlier `switch_start` or
    ///   `switch_to` that has not been resumed since
    unsafe fn switch_to(save_into: *mut Self::SavedContext, target: *const Self::SavedContext);

    /// Park the processor forever.
    fn halt() -> !;
}

#[cfg(target_arch = "riscv64")]
pub mod riscv64;

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

#[cfg(any(test, feature = "std-shim"))]
pub mod hosted;

pub mod uart;

#[cfg(all(target_arch = "riscv64", not(feature = "std-shim")))]
pub use riscv64::Riscv64Arch as DefaultArch;

#[cfg(all(target_arch = "aarch64", not(feature = "std-shim")))]
pub use aarch64::Aarch64Arch as DefaultArch;

// Host testing runs the same kernel on OS threads
#[cfg(feature = "std-shim")]
pub use hosted::HostedArch as DefaultArch;
