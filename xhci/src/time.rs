//! Monotonic millisecond time.
//!
//! The handoff wait spins against a [`Clock`]; it never sleeps, because it
//! runs before any scheduler or timer interrupt exists.
//!
//! # Safety
//! TSC reads are always safe. [`TscClock`] assumes an invariant TSC (verify
//! via CPUID at boot) and a frequency calibrated by the caller.

/// Monotonic milliseconds since an arbitrary epoch (usually boot).
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Read TSC (non-serializing).
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn read_tsc() -> u64 {
    let lo: u32;
    let hi: u32;
    unsafe {
        core::arch::asm!("rdtsc", out("eax") lo, out("edx") hi,
            options(nomem, nostack, preserves_flags));
    }
    ((hi as u64) << 32) | lo as u64
}

/// Stub for non-x86_64 targets.
#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn read_tsc() -> u64 {
    0
}

/// [`Clock`] backed by the TSC.
#[derive(Debug, Clone, Copy)]
pub struct TscClock {
    tsc_per_ms: u64,
}

impl TscClock {
    /// Build from a calibrated TSC frequency in Hz.
    ///
    /// Returns `None` for frequencies below 1 kHz, which means calibration failed.
    pub const fn from_frequency(tsc_hz: u64) -> Option<Self> {
        let tsc_per_ms = tsc_hz / 1000;
        if tsc_per_ms == 0 {
            None
        } else {
            Some(Self { tsc_per_ms })
        }
    }

    pub const fn ticks_per_ms(&self) -> u64 {
        self.tsc_per_ms
    }

    #[inline]
    pub const fn ticks_to_ms(&self, ticks: u64) -> u64 {
        ticks / self.tsc_per_ms
    }
}

impl Clock for TscClock {
    fn now_ms(&self) -> u64 {
        self.ticks_to_ms(read_tsc())
    }
}
