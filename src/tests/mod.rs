//! Tests driving the real kernel through the hosted backend.
//!
//! Kernel threads run on OS threads here, and a panic inside one of them
//! aborts the whole test binary. Tests therefore only record what happens
//! inside threads and assert on the recording after `run` returns.

mod helpers;
mod unit;

/// Knobs shared by the heavier tests.
pub struct TestConfig {
    /// Number of random workloads each property test runs
    pub property_cases: usize,
    /// Most worker threads a single property case spawns
    pub max_workers: usize,
}

pub static TEST_CONFIG: spin::Mutex<TestConfig> = spin::Mutex::new(TestConfig {
    property_cases: 8,
    max_workers: 12,
});
