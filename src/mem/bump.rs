//! Bump-pointer allocator for thread stacks and the kernel heap.
//!
//! Memory is handed out by advancing a single pointer through a fixed region
//! and is never given back. Exhaustion is reported as `None`/null, never as a
//! panic.

use super::StackAllocator;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};
use portable_atomic::{AtomicUsize, Ordering};

/// Alignment of every stack reservation.
pub const STACK_ALIGN: usize = 16;

pub struct BumpAllocator {
    next: AtomicUsize,
    start: AtomicUsize,
    end: AtomicUsize,
}

impl Default for BumpAllocator {
    fn default() -> Self {
        Self::empty()
    }
}

impl BumpAllocator {
    /// An allocator with no backing region. Every request fails until
    /// [`init`](Self::init) is called.
    pub const fn empty() -> Self {
        Self {
            next: AtomicUsize::new(0),
            start: AtomicUsize::new(0),
            end: AtomicUsize::new(0),
        }
    }

    /// Allocator over a region owned for the rest of the program.
    pub fn from_region(region: &'static mut [u8]) -> Self {
        let allocator = Self::empty();
        // Safety: the region is exclusively borrowed forever.
        unsafe { allocator.init(region.as_mut_ptr() as usize, region.len()) };
        allocator
    }

    /// Point the allocator at `[heap_start, heap_start + heap_size)`.
    ///
    /// # Safety
    ///
    /// The region must be valid for reads and writes, unused by anything else,
    /// and must outlive every allocation made from it.
    pub unsafe fn init(&self, heap_start: usize, heap_size: usize) {
        let end = heap_start.checked_add(heap_size).unwrap_or(heap_start);
        self.start.store(heap_start, Ordering::SeqCst);
        self.next.store(heap_start, Ordering::SeqCst);
        self.end.store(end, Ordering::SeqCst);
    }

    /// Reserve `size` bytes aligned to `align`, or `None` if the region is
    /// exhausted.
    pub fn reserve_aligned(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        loop {
            let current = self.next.load(Ordering::Acquire);
            let aligned = align_up(current, align)?;
            let new_next = aligned.checked_add(size)?;

            if new_next > self.end.load(Ordering::Acquire) {
                log::warn!(
                    "bump allocator exhausted: {} bytes requested, {} left",
                    size,
                    self.remaining()
                );
                return None;
            }

            if self
                .next
                .compare_exchange(current, new_next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return NonNull::new(aligned as *mut u8);
            }
        }
    }

    /// Bytes handed out so far, alignment padding included.
    pub fn used(&self) -> usize {
        self.next
            .load(Ordering::Acquire)
            .saturating_sub(self.start.load(Ordering::Acquire))
    }

    /// Bytes still available before alignment.
    pub fn remaining(&self) -> usize {
        self.end
            .load(Ordering::Acquire)
            .saturating_sub(self.next.load(Ordering::Acquire))
    }
}

impl StackAllocator for BumpAllocator {
    fn reserve(&self, size: usize) -> Option<NonNull<u8>> {
        self.reserve_aligned(size, STACK_ALIGN)
    }
}

unsafe impl GlobalAlloc for BumpAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.reserve_aligned(layout.size(), layout.align())
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    // Bump memory is never reclaimed.
    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {}
}

/// Align value up to the given alignment (a power of two).
#[inline]
fn align_up(value: usize, align: usize) -> Option<usize> {
    if align == 0 {
        return None;
    }
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}
