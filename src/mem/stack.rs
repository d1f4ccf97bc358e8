//! Thread stacks.

use super::StackAllocator;
use core::ptr::NonNull;

/// Default stack size per thread: 16 KiB.
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024;

/// A reserved thread stack.
///
/// Stacks are never returned to their allocator; dropping a `Stack` only forgets
/// the handle.
#[derive(Debug, Clone, Copy)]
pub struct Stack {
    /// Start of the stack memory (lowest address)
    memory: NonNull<u8>,
    size: usize,
}

impl Stack {
    /// Reserve a stack of `size` bytes from `allocator`.
    pub fn reserve<M: StackAllocator + ?Sized>(allocator: &M, size: usize) -> Option<Self> {
        let memory = allocator.reserve(size)?;
        Some(Self { memory, size })
    }

    /// Usable stack size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Lowest address of the region.
    pub fn base(&self) -> *mut u8 {
        self.memory.as_ptr()
    }

    /// Initial stack pointer: the end of the region, aligned down to 16 bytes
    /// since stacks grow down.
    pub fn top(&self) -> *mut u8 {
        let end = self.memory.as_ptr() as usize + self.size;
        (end & !0xF) as *mut u8
    }
}

unsafe impl Send for Stack {}
unsafe impl Sync for Stack {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::BumpAllocator;
    use alloc::boxed::Box;
    use alloc::vec;

    #[test]
    fn stack_top_is_aligned_end_of_region() {
        let heap = BumpAllocator::from_region(Box::leak(vec![0u8; 64 * 1024].into_boxed_slice()));
        let stack = Stack::reserve(&heap, DEFAULT_STACK_SIZE).unwrap();

        assert_eq!(stack.size(), DEFAULT_STACK_SIZE);
        assert_eq!(stack.top() as usize % 16, 0);
        assert_eq!(stack.top() as usize, stack.base() as usize + DEFAULT_STACK_SIZE);
    }

    #[test]
    fn reserve_fails_when_allocator_is_exhausted() {
        let heap = BumpAllocator::from_region(Box::leak(vec![0u8; 1024].into_boxed_slice()));
        assert!(Stack::reserve(&heap, DEFAULT_STACK_SIZE).is_none());
    }
}
