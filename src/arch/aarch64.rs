//! AArch64 (ARM64) context switching.
//!
//! Same shape as the RISC-V backend: the callee-saved registers `x19`-`x30`
//! (and `d8`-`d15` with `full-fpu`) go onto the suspended thread's stack and the
//! context itself is only the stack pointer.

use super::{Arch, ThreadStart};
use core::arch::{asm, naked_asm};

#[repr(C)]
#[derive(Debug, Default)]
pub struct Aarch64Context {
    pub sp: u64,
}

pub type SavedContext = Aarch64Context;

pub struct Aarch64Arch;

#[cfg(all(feature = "full-fpu", target_feature = "neon"))]
macro_rules! save_fp {
    () => {
        "stp d8, d9, [sp, #96]
         stp d10, d11, [sp, #112]
         stp d12, d13, [sp, #128]
         stp d14, d15, [sp, #144]"
    };
}

#[cfg(all(feature = "full-fpu", target_feature = "neon"))]
macro_rules! restore_fp {
    () => {
        "ldp d8, d9, [sp, #96]
         ldp d10, d11, [sp, #112]
         ldp d12, d13, [sp, #128]
         ldp d14, d15, [sp, #144]"
    };
}

#[cfg(not(all(feature = "full-fpu", target_feature = "neon")))]
macro_rules! save_fp {
    () => {
        ""
    };
}

#[cfg(not(all(feature = "full-fpu", target_feature = "neon")))]
macro_rules! restore_fp {
    () => {
        ""
    };
}

macro_rules! save_frame {
    () => {
        "sub sp, sp, #160
         stp x19, x20, [sp, #0]
         stp x21, x22, [sp, #16]
         stp x23, x24, [sp, #32]
         stp x25, x26, [sp, #48]
         stp x27, x28, [sp, #64]
         stp x29, x30, [sp, #80]"
    };
}

/// `x0` = where to save, `x1` = context to resume.
#[unsafe(naked)]
unsafe extern "C" fn ctx_switch(_save_into: *mut Aarch64Context, _target: *const Aarch64Context) {
    naked_asm!(
        save_frame!(),
        save_fp!(),
        "mov x9, sp",
        "str x9, [x0]",
        "ldr x9, [x1]",
        "mov sp, x9",
        restore_fp!(),
        "ldp x19, x20, [sp, #0]",
        "ldp x21, x22, [sp, #16]",
        "ldp x23, x24, [sp, #32]",
        "ldp x25, x26, [sp, #48]",
        "ldp x27, x28, [sp, #64]",
        "ldp x29, x30, [sp, #80]",
        "add sp, sp, #160",
        "ret",
    );
}

/// `x0` = where to save, `x1` = new stack top, `x2` = trampoline, `x3` = its argument.
#[unsafe(naked)]
unsafe extern "C" fn ctx_start(
    _save_into: *mut Aarch64Context,
    _stack_top: *mut u8,
    _start: ThreadStart,
    _arg: *const (),
) {
    naked_asm!(
        save_frame!(),
        save_fp!(),
        "mov x9, sp",
        "str x9, [x0]",
        "mov sp, x1",
        "mov x0, x3",
        "mov x29, xzr",
        "mov x30, xzr",
        "br x2",
    );
}

impl Arch for Aarch64Arch {
    type SavedContext = Aarch64Context;

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
                asm!("wfe", options(nomem, nostack));
            }
        }
    }
}
