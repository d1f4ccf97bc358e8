//! Test helper utilities and common functionality.

use crate::arch::hosted::HostedArch;
use crate::kernel::{Kernel, KernelConfig};
use crate::mem::{BumpAllocator, DEFAULT_STACK_SIZE};
use crate::thread::MAX_THREADS;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

/// Kernel type every crate-level test runs.
pub type TestKernel = Kernel<HostedArch, BumpAllocator>;

/// Route kernel diagnostics to the test output.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Zeroed memory that lives for the rest of the test binary.
pub fn leaked_region(size: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; size].into_boxed_slice())
}

/// A kernel with room for a full thread table of default stacks.
pub fn test_kernel() -> &'static TestKernel {
    test_kernel_with_heap((MAX_THREADS + 1) * DEFAULT_STACK_SIZE)
}

/// A kernel whose stack allocator owns exactly `heap` bytes.
pub fn test_kernel_with_heap(heap: usize) -> &'static TestKernel {
    init_logging();
    let stacks = BumpAllocator::from_region(leaked_region(heap));
    Box::leak(Box::new(Kernel::with_config(stacks, KernelConfig::default())))
}

/// Leak `value` so kernel threads can share it.
pub fn shared<T: Send + Sync>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// Ordered record of what kernel threads did.
#[derive(Default)]
pub struct Transcript {
    lines: spin::Mutex<Vec<String>>,
}

impl Transcript {
    pub fn new() -> &'static Self {
        shared(Self::default())
    }

    pub fn record(&self, line: impl Into<String>) {
        self.lines.lock().push(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

/// Linear congruential generator for reproducible random workloads.
pub struct TestRng {
    state: u64,
}

impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 33
    }

    /// Uniform-ish value in `[min, max)`.
    pub fn gen_range(&mut self, min: usize, max: usize) -> usize {
        min + (self.next_u64() as usize % (max - min))
    }
}
