//! Blocking synchronization between kernel threads.

pub mod condvar;

pub use condvar::Condvar;
