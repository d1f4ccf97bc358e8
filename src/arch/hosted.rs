//! Hosted context switching for running the kernel on a host OS.
//!
//! Every kernel thread is backed by an OS thread, and a baton is passed between
//! them so that exactly one is ever executing kernel code. A suspended context
//! is the baton its OS thread is parked on. The stack region handed to
//! [`switch_start`](Arch::switch_start) stays reserved but unused; the OS thread
//! brings its own stack.

use super::{Arch, ThreadStart};
use std::cell::OnceCell;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Stack size of the OS threads backing kernel threads.
pub const HOSTED_STACK_SIZE: usize = 256 * 1024;

struct Baton {
    held: Mutex<bool>,
    wake: Condvar,
}

impl Baton {
    fn new() -> Self {
        Self {
            held: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    /// Hand the processor to the thread parked on this baton.
    fn pass(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        *held = true;
        self.wake.notify_one();
    }

    /// Park until someone passes this baton.
    fn wait(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while !*held {
            held = self.wake.wait(held).unwrap_or_else(PoisonError::into_inner);
        }
        *held = false;
    }
}

std::thread_local! {
    static BATON: OnceCell<Arc<Baton>> = const { OnceCell::new() };
}

fn own_baton() -> Arc<Baton> {
    BATON.with(|cell| cell.get_or_init(|| Arc::new(Baton::new())).clone())
}

/// Saved context: the baton the suspended OS thread waits on.
#[derive(Default)]
pub struct HostedContext {
    baton: Option<Arc<Baton>>,
}

pub type SavedContext = HostedContext;

pub struct HostedArch;

impl Arch for HostedArch {
    type SavedContext = HostedContext;

    unsafe fn switch_start(
        save_into: *mut Self::SavedContext,
        _stack_top: *mut u8,
        start: ThreadStart,
        arg: *const (),
    ) {
        let me = own_baton();
        unsafe { (*save_into).baton = Some(me.clone()) };

        let child = Arc::new(Baton::new());
        let child_baton = child.clone();
        let arg = arg as usize;
        let spawned = std::thread::Builder::new()
            .name("kernel-thread".into())
            .stack_size(HOSTED_STACK_SIZE)
            .spawn(move || {
                BATON.with(|cell| {
                    let _ = cell.set(child_baton.clone());
                });
                child_baton.wait();
                let outcome = std::panic::catch_unwind(|| start(arg as *const ()));
                // `start` diverges, so only a panic gets here. Nobody else can
                // run once the baton is lost, so take the process down.
                if outcome.is_err() {
                    std::eprintln!("kernel thread panicked; aborting");
                }
                std::process::abort();
            });
        if let Err(err) = spawned {
            std::eprintln!("failed to spawn hosted kernel thread: {}", err);
            std::process::abort();
        }

        child.pass();
        me.wait();
    }

    unsafe fn switch_to(save_into: *mut Self::SavedContext, target: *const Self::SavedContext) {
        let me = own_baton();
        unsafe { (*save_into).baton = Some(me.clone()) };

        match unsafe { (*target).baton.clone() } {
            Some(next) => next.pass(),
            None => {
                std::eprintln!("switch to a context that was never saved");
                std::process::abort();
            }
        }
        me.wait();
    }

    fn halt() -> ! {
        loop {
            std::thread::park();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baton_pass_before_wait_is_not_lost() {
        let baton = Baton::new();
        baton.pass();
        baton.wait();
        assert!(!*baton.held.lock().unwrap());
    }

    #[test]
    fn own_baton_is_stable_per_thread() {
        let a = own_baton();
        let b = own_baton();
        assert!(Arc::ptr_eq(&a, &b));

        let other = std::thread::spawn(own_baton).join().unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
    }
}
