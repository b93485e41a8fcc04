//! Serial debug output (COM1 @ 0x3F8) and the `log` sink on top of it.
//!
//! No buffering, no interrupts, pure polling. Usable long before the heap or
//! any timer exists, which is exactly when the handoff runs.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

const COM1: u16 = 0x3F8;
const COM1_LSR: u16 = COM1 + 5;
const LSR_TX_EMPTY: u8 = 0x20;

/// Write byte to COM1. Bounded wait, gives up after ~100 spins.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn putc(b: u8) {
    unsafe {
        for _ in 0..100 {
            let status: u8;
            core::arch::asm!(
                "in al, dx",
                in("dx") COM1_LSR,
                out("al") status,
                options(nostack, preserves_flags)
            );
            if status & LSR_TX_EMPTY != 0 {
                core::arch::asm!(
                    "out dx, al",
                    in("dx") COM1,
                    in("al") b,
                    options(nostack, preserves_flags)
                );
                return;
            }
            core::hint::spin_loop();
        }
    }
}

/// Stub for non-x86_64 targets.
#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn putc(_b: u8) {}

/// Write string to COM1.
pub fn puts(s: &str) {
    for b in s.bytes() {
        putc(b);
    }
}

struct SerialWriter;

impl Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        puts(s);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LOG SINK
// ═══════════════════════════════════════════════════════════════════════════

/// `log` backend writing one line per record to COM1.
pub struct SerialLogger {
    line: Mutex<()>,
}

static LOGGER: SerialLogger = SerialLogger {
    line: Mutex::new(()),
};

/// Install the serial logger. Call once; later calls fail without side effects.
pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Format one record as `[XHCI] LEVEL target: message\n`.
fn write_record(
    out: &mut impl Write,
    level: log::Level,
    target: &str,
    args: &fmt::Arguments<'_>,
) -> fmt::Result {
    writeln!(out, "[XHCI] {:<5} {}: {}", level.as_str(), target, args)
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _guard = self.line.lock();
        let _ = write_record(&mut SerialWriter, record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}
