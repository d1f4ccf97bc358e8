//! Memory for thread stacks.
//!
//! The kernel only needs one thing from memory management: "reserve N bytes or
//! tell me you can't". That is [`StackAllocator`]; [`BumpAllocator`] is the
//! implementation used on bare metal.

pub mod bump;
pub mod stack;

pub use bump::BumpAllocator;
pub use stack::{Stack, DEFAULT_STACK_SIZE};

use core::ptr::NonNull;

/// Source of stack memory.
pub trait StackAllocator {
    /// Reserve `size` bytes, 16-byte aligned. `None` when the region is
    /// exhausted. Reservations are never released.
    fn reserve(&self, size: usize) -> Option<NonNull<u8>>;
}

impl<M: StackAllocator + ?Sized> StackAllocator for &M {
    fn reserve(&self, size: usize) -> Option<NonNull<u8>> {
        (**self).reserve(size)
    }
}
