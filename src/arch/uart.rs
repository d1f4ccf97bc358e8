//! Console UART for QEMU `virt` machines.
//!
//! The RISC-V `virt` board exposes an NS16550A at `0x1000_0000`; the AArch64
//! `virt` board a PL011 at `0x0900_0000`. Both are used write-only, with the
//! firmware/QEMU defaults for baud rate and framing.

use crate::console::Console;
use core::fmt::{self, Write};
use core::ptr::{read_volatile, write_volatile};

#[cfg(not(target_arch = "aarch64"))]
mod regs {
    pub const UART_BASE: usize = 0x1000_0000;
    pub const THR: usize = UART_BASE; // Transmit Holding Register
    pub const LSR: usize = UART_BASE + 0x05; // Line Status Register
    pub const LSR_THRE: u8 = 1 << 5; // THR empty
}

#[cfg(target_arch = "aarch64")]
mod regs {
    pub const UART_BASE: usize = 0x0900_0000;
    pub const DR: usize = UART_BASE; // Data Register
    pub const FR: usize = UART_BASE + 0x18; // Flag Register
    pub const FR_TXFF: u32 = 1 << 5; // Transmit FIFO full
}

/// Send a single byte over UART.
#[cfg(not(target_arch = "aarch64"))]
pub fn send_byte(byte: u8) {
    unsafe {
        while read_volatile(regs::LSR as *const u8) & regs::LSR_THRE == 0 {
            core::hint::spin_loop();
        }
        write_volatile(regs::THR as *mut u8, byte);
    }
}

/// Send a single byte over UART.
#[cfg(target_arch = "aarch64")]
pub fn send_byte(byte: u8) {
    unsafe {
        while read_volatile(regs::FR as *const u32) & regs::FR_TXFF != 0 {
            core::hint::spin_loop();
        }
        write_volatile(regs::DR as *mut u32, byte as u32);
    }
}

/// Send raw bytes, adding a carriage return before each newline for terminals.
pub fn send_bytes(bytes: &[u8]) {
    for &byte in bytes {
        if byte == b'\n' {
            send_byte(b'\r');
        }
        send_byte(byte);
    }
}

/// Global UART writer for use with `write!` and as a log sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct UartWriter;

impl Console for UartWriter {
    fn write_bytes(&self, bytes: &[u8]) {
        send_bytes(bytes);
    }
}

impl Write for UartWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        send_bytes(s.as_bytes());
        Ok(())
    }
}

/// Print a formatted string to UART.
///
/// ```ignore
/// uart_print!("Thread {} is running, count = {}\n", name, i);
/// ```
#[macro_export]
macro_rules! uart_print {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::arch::uart::UartWriter, $($arg)*);
    }};
}

/// Print a formatted string to UART with a newline.
#[macro_export]
macro_rules! uart_println {
    () => {
        $crate::uart_print!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::uart_print!($($arg)*);
        $crate::uart_print!("\n");
    }};
}
