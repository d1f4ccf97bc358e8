//! RISC-V (RV64) context switching.
//!
//! A suspended thread is described by a single word: its stack pointer. The
//! callee-saved registers are pushed onto the thread's own stack before the
//! switch and popped from the target stack after it.
//!
//! Frame layout (208 bytes, 16-byte aligned):
//!
//! | offset  | contents                                   |
//! |---------|--------------------------------------------|
//! | 0       | `ra`                                       |
//! | 8..104  | `s0`..`s11`                                |
//! | 104..200| `fs0`..`fs11` (`full-fpu` with the D ext.) |

use super::{Arch, ThreadStart};
use core::arch::naked_asm;

/// Saved thread context: the stack pointer at the moment of the switch.
#[repr(C)]
#[derive(Debug, Default)]
pub struct Riscv64Context {
    pub sp: usize,
}

pub type SavedContext = Riscv64Context;

pub struct Riscv64Arch;

#[cfg(all(feature = "full-fpu", target_feature = "d"))]
macro_rules! save_fp {
    () => {
        "fsd fs0, 104(sp)
         fsd fs1, 112(sp)
         fsd fs2, 120(sp)
         fsd fs3, 128(sp)
         fsd fs4, 136(sp)
         fsd fs5, 144(sp)
         fsd fs6, 152(sp)
         fsd fs7, 160(sp)
         fsd fs8, 168(sp)
         fsd fs9, 176(sp)
         fsd fs10, 184(sp)
         fsd fs11, 192(sp)"
    };
}

#[cfg(all(feature = "full-fpu", target_feature = "d"))]
macro_rules! restore_fp {
    () => {
        "fld fs0, 104(sp)
         fld fs1, 112(sp)
         fld fs2, 120(sp)
         fld fs3, 128(sp)
         fld fs4, 136(sp)
         fld fs5, 144(sp)
         fld fs6, 152(sp)
         fld fs7, 160(sp)
         fld fs8, 168(sp)
         fld fs9, 176(sp)
         fld fs10, 184(sp)
         fld fs11, 192(sp)"
    };
}

#[cfg(not(all(feature = "full-fpu", target_feature = "d")))]
macro_rules! save_fp {
    () => {
        ""
    };
}

#[cfg(not(all(feature = "full-fpu", target_feature = "d")))]
macro_rules! restore_fp {
    () => {
        ""
    };
}

macro_rules! save_frame {
    () => {
        "addi sp, sp, -208
         sd ra, 0(sp)
         sd s0, 8(sp)
         sd s1, 16(sp)
         sd s2, 24(sp)
         sd s3, 32(sp)
         sd s4, 40(sp)
         sd s5, 48(sp)
         sd s6, 56(sp)
         sd s7, 64(sp)
         sd s8, 72(sp)
         sd s9, 80(sp)
         sd s10, 88(sp)
         sd s11, 96(sp)"
    };
}

/// `a0` = where to save, `a1` = context to resume.
#[unsafe(naked)]
unsafe extern "C" fn ctx_switch(_save_into: *mut Riscv64Context, _target: *const Riscv64Context) {
    naked_asm!(
        save_frame!(),
        save_fp!(),
        "sd sp, 0(a0)",
        "ld sp, 0(a1)",
        restore_fp!(),
        "ld ra, 0(sp)",
        "ld s0, 8(sp)",
        "ld s1, 16(sp)",
        "ld s2, 24(sp)",
        "ld s3, 32(sp)",
        "ld s4, 40(sp)",
        "ld s5, 48(sp)",
        "ld s6, 56(sp)",
        "ld s7, 64(sp)",
        "ld s8, 72(sp)",
        "ld s9, 80(sp)",
        "ld s10, 88(sp)",
        "ld s11, 96(sp)",
        "addi sp, sp, 208",
        "ret",
    );
}

/// `a0` = where to save, `a1` = new stack top, `a2` = trampoline, `a3` = its argument.
#[unsafe(naked)]
unsafe extern "C" fn ctx_start(
    _save_into: *mut Riscv64Context,
    _stack_top: *mut u8,
    _start: ThreadStart,
    _arg: *const (),
) {
    naked_asm!(
        save_frame!(),
        save_fp!(),
        "sd sp, 0(a0)",
        "mv sp, a1",
        "mv a0, a3",
        "li ra, 0",
        "li s0, 0",
        "jr a2",
    );
}

impl Arch for Riscv64Arch {
    type SavedContext = Riscv64Context;

    unsafe fn switch_start(
        save_into: *mut Self::SavedContext,
        stack_top: *mut u8,
        start: ThreadStart,
        arg: *const (),
    ) {
        unsafe { ctx_start(save_into, stack_top, start, arg) }
    }

    unsafe fn switch_to(save_into: *mut Self::SavedContext, target: *const Self::SavedContext) {
        unsafe { ctx_switch(save_into, target) }
    }

    fn halt() -> ! {
        loop {
            unsafe {
                core::arch::asm!("wfi", options(nomem, nostack));
            }
        }
    }
}
