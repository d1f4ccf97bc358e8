//! Diagnostic output: a byte-sink console and a `log` backend on top of it.
//!
//! The kernel reports through the `log` facade only. An embedding binary picks
//! where records go by installing a [`ConsoleLogger`] over its console.

use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Byte sink for diagnostic output.
pub trait Console: Send + Sync {
    /// Write these bytes to the console.
    fn write_bytes(&self, bytes: &[u8]);
}

/// `core::fmt` adapter over a [`Console`].
pub struct ConsoleWriter<'a, C: Console + ?Sized>(pub &'a C);

impl<C: Console + ?Sized> Write for ConsoleWriter<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}

/// `log` backend writing one `[LEVEL] message` line per record.
pub struct ConsoleLogger<C> {
    console: C,
    level: LevelFilter,
}

impl<C: Console> ConsoleLogger<C> {
    pub const fn new(console: C, level: LevelFilter) -> Self {
        Self { console, level }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    /// Install this logger as the global `log` backend.
    pub fn install(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.level);
        Ok(())
    }
}

impl<C: Console> Log for ConsoleLogger<C> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = writeln!(
            ConsoleWriter(&self.console),
            "[{}] {}",
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}
