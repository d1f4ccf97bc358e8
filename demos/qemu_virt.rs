//! Demonstration kernel for the QEMU `virt` machine.
//!
//! Runs three workloads one after another, each as a fresh [`Kernel::run`]:
//! two counters interleaving with the bootstrap thread, a bounded
//! producer/consumer, and a three-party barrier.
//!
//! # Building
//!
//! ```bash
//! cargo build --release --example qemu_virt --target riscv64gc-unknown-none-elf
//! cargo build --release --example qemu_virt --target aarch64-unknown-none
//! ```
//!
//! The linker scripts in `demos/` are picked up through `.cargo/config.toml`.
//!
//! # Running
//!
//! ```bash
//! qemu-system-riscv64 -M virt -bios none -nographic \
//!     -kernel target/riscv64gc-unknown-none-elf/release/examples/qemu_virt
//!
//! qemu-system-aarch64 -M virt -cpu cortex-a72 -nographic \
//!     -kernel target/aarch64-unknown-none/release/examples/qemu_virt
//! ```
//!
//! Press Ctrl-A X to exit QEMU.
//!
//! On a host, `cargo run --example qemu_virt --features std-shim` runs the
//! same workloads on the hosted backend.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(any(target_os = "none", feature = "std-shim"))]
extern crate alloc;

/// The workloads, written against the public API only.
#[cfg(any(target_os = "none", feature = "std-shim"))]
mod workloads {
    use alloc::collections::VecDeque;
    use cooperative_threads::{BumpAllocator, Condvar, DefaultArch, Kernel};
    use spin::Mutex;

    pub type DemoKernel = Kernel<DefaultArch, &'static BumpAllocator>;

    pub const ALL: [(&str, fn(&'static DemoKernel)); 3] = [
        ("counters", counters),
        ("producer/consumer", producer_consumer),
        ("barrier", barrier),
    ];

    fn count(k: &'static DemoKernel, name: &str) {
        for i in 0..5 {
            log::info!("{} is running, count = {}", name, i);
            k.yield_now();
        }
    }

    /// Two threads and the bootstrap thread count to five, yielding after
    /// every step.
    pub fn counters(k: &'static DemoKernel) {
        if let Err(err) = k.create(move || count(k, "Thread 1")) {
            log::error!("counters: {}", err);
        }
        if let Err(err) = k.create(move || count(k, "Thread 2")) {
            log::error!("counters: {}", err);
        }
        count(k, "Main");
    }

    const CAPACITY: usize = 3;
    const PER_PRODUCER: usize = 5;

    struct Channel {
        items: Mutex<VecDeque<usize>>,
        not_full: Condvar,
        not_empty: Condvar,
    }

    static CHANNEL: Channel = Channel {
        items: Mutex::new(VecDeque::new()),
        not_full: Condvar::new(),
        not_empty: Condvar::new(),
    };

    fn produce(k: &'static DemoKernel, producer: usize) {
        for i in 0..PER_PRODUCER {
            while CHANNEL.items.lock().len() == CAPACITY {
                k.cv_wait(&CHANNEL.not_full);
            }
            let item = producer * 100 + i;
            let len = {
                let mut items = CHANNEL.items.lock();
                items.push_back(item);
                items.len()
            };
            log::info!("Producer {} produced {} (count = {})", producer, item, len);
            k.cv_signal(&CHANNEL.not_empty);
            k.yield_now();
        }
    }

    fn consume(k: &'static DemoKernel, total: usize) {
        for _ in 0..total {
            while CHANNEL.items.lock().is_empty() {
                k.cv_wait(&CHANNEL.not_empty);
            }
            let (item, len) = {
                let mut items = CHANNEL.items.lock();
                (items.pop_front(), items.len())
            };
            if let Some(item) = item {
                log::info!("Consumer consumed {} (count = {})", item, len);
            }
            k.cv_signal(&CHANNEL.not_full);
            k.yield_now();
        }
    }

    /// Two producers fill a three-slot buffer that one consumer drains.
    pub fn producer_consumer(k: &'static DemoKernel) {
        k.cv_init(&CHANNEL.not_full);
        k.cv_init(&CHANNEL.not_empty);
        CHANNEL.items.lock().clear();

        for producer in 1..=2 {
            if let Err(err) = k.create(move || produce(k, producer)) {
                log::error!("producer/consumer: {}", err);
            }
        }
        if let Err(err) = k.create(move || consume(k, 2 * PER_PRODUCER)) {
            log::error!("producer/consumer: {}", err);
        }
    }

    const PARTIES: usize = 3;

    static ARRIVED: Mutex<usize> = Mutex::new(0);
    static BARRIER: Condvar = Condvar::new();

    fn arrive(k: &'static DemoKernel, n: usize) {
        log::info!("Thread {} reached the barrier", n);
        let arrived = {
            let mut arrived = ARRIVED.lock();
            *arrived += 1;
            *arrived
        };
        if arrived == PARTIES {
            for _ in 1..PARTIES {
                k.cv_signal(&BARRIER);
            }
        } else {
            k.cv_wait(&BARRIER);
        }
        log::info!("Thread {} passed the barrier", n);
    }

    /// Three threads block until the last one arrives.
    pub fn barrier(k: &'static DemoKernel) {
        k.cv_init(&BARRIER);
        *ARRIVED.lock() = 0;

        for n in 1..=PARTIES {
            if let Err(err) = k.create(move || arrive(k, n)) {
                log::error!("barrier: {}", err);
            }
        }
    }

    pub fn run_all(k: &'static DemoKernel) {
        for (name, workload) in ALL {
            log::info!("=== {} ===", name);
            match k.run(move || workload(k)) {
                Ok(halt) => log::info!("{}: {}", name, halt),
                Err(err) => log::error!("{}: {}", name, err),
            }
        }
    }
}

#[cfg(target_os = "none")]
mod bare {
    use super::workloads::{self, DemoKernel};
    use core::cell::UnsafeCell;
    use cooperative_threads::arch::uart::UartWriter;
    use cooperative_threads::{uart_println, Arch, BumpAllocator, ConsoleLogger, DefaultArch, Kernel};
    use log::LevelFilter;
    use spin::Lazy;

    const HEAP_SIZE: usize = 4 * 1024 * 1024;

    #[repr(C, align(16))]
    struct HeapRegion(UnsafeCell<[u8; HEAP_SIZE]>);

    unsafe impl Sync for HeapRegion {}

    static HEAP_REGION: HeapRegion = HeapRegion(UnsafeCell::new([0; HEAP_SIZE]));

    /// Backs both `alloc` and thread stacks.
    #[global_allocator]
    static HEAP: BumpAllocator = BumpAllocator::empty();

    static LOGGER: ConsoleLogger<UartWriter> = ConsoleLogger::new(UartWriter, LevelFilter::Info);

    static KERNEL: Lazy<DemoKernel> = Lazy::new(|| Kernel::new(&HEAP));

    /// Entry from the boot code, on the boot stack with `.bss` cleared.
    #[no_mangle]
    extern "C" fn kernel_main() -> ! {
        // Safety: the region is only ever handed out through HEAP.
        unsafe { HEAP.init(HEAP_REGION.0.get() as usize, HEAP_SIZE) };
        let _ = LOGGER.install();

        uart_println!();
        uart_println!("========================================");
        uart_println!("  Cooperative Threads - QEMU virt demo");
        uart_println!("========================================");
        uart_println!();

        workloads::run_all(&KERNEL);

        uart_println!("[BOOT] All workloads finished, heap used = {} bytes", HEAP.used());
        DefaultArch::halt()
    }

    #[cfg(target_arch = "riscv64")]
    #[link_section = ".text.boot"]
    #[no_mangle]
    #[unsafe(naked)]
    pub unsafe extern "C" fn _start() -> ! {
        core::arch::naked_asm!(
            // Park every hart but the first
            "csrr t0, mhartid",
            "bnez t0, 3f",
            "la sp, __stack_top",
            // Clear .bss
            "la t0, __bss_start",
            "la t1, __bss_end",
            "1:",
            "bgeu t0, t1, 2f",
            "sd zero, 0(t0)",
            "addi t0, t0, 8",
            "j 1b",
            "2:",
            // FS = Initial, so floating point registers can be saved
            "li t0, 1 << 13",
            "csrs mstatus, t0",
            "call {main}",
            "3:",
            "wfi",
            "j 3b",
            main = sym kernel_main,
        )
    }

    #[cfg(target_arch = "aarch64")]
    #[link_section = ".text.boot"]
    #[no_mangle]
    #[unsafe(naked)]
    pub unsafe extern "C" fn _start() -> ! {
        core::arch::naked_asm!(
            // Park secondary CPUs
            "mrs x0, mpidr_el1",
            "and x0, x0, #0xFF",
            "cbnz x0, 3f",
            "adrp x0, __stack_top",
            "add x0, x0, :lo12:__stack_top",
            "mov sp, x0",
            // Clear .bss
            "adrp x0, __bss_start",
            "add x0, x0, :lo12:__bss_start",
            "adrp x1, __bss_end",
            "add x1, x1, :lo12:__bss_end",
            "1:",
            "cmp x0, x1",
            "b.ge 2f",
            "str xzr, [x0], #8",
            "b 1b",
            "2:",
            // Enable FP/SIMD at EL1
            "mrs x0, cpacr_el1",
            "orr x0, x0, #(3 << 20)",
            "msr cpacr_el1, x0",
            "isb",
            "bl {main}",
            "3:",
            "wfe",
            "b 3b",
            main = sym kernel_main,
        )
    }
}

#[cfg(all(not(target_os = "none"), feature = "std-shim"))]
fn main() {
    use cooperative_threads::{BumpAllocator, Kernel};

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let region: &'static mut [u8] = Box::leak(vec![0u8; 4 * 1024 * 1024].into_boxed_slice());
    let heap: &'static BumpAllocator = Box::leak(Box::new(BumpAllocator::from_region(region)));
    let kernel: &'static workloads::DemoKernel = Box::leak(Box::new(Kernel::new(heap)));

    workloads::run_all(kernel);
}

#[cfg(all(not(target_os = "none"), not(feature = "std-shim")))]
fn main() {
    eprintln!("qemu_virt targets bare metal; build it for riscv64gc-unknown-none-elf or aarch64-unknown-none,");
    eprintln!("or run it on the host with `--features std-shim`.");
}
