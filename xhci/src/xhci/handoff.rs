//! BIOS-to-OS ownership handoff through the legacy support register.
//!
//! The register lives in PCI configuration space at the offset resolved by
//! [`legacy_support_offset`](super::capability::legacy_support_offset). Only
//! two bits matter: the BIOS-owned and OS-owned semaphores. The dword right
//! after it controls SMI generation and is cleared on every path.
//!
//! Every write here is followed by a read of the same register so posted
//! writes land before any timing starts. Nothing is reported to the caller
//! beyond a diagnostic [`HandoffOutcome`]; controller init runs regardless.

use bitflags::bitflags;

use crate::pci::{ConfigAccess, ConfigAddress, DeviceFunction};
use crate::time::Clock;

use super::{LOG_TARGET, SMI_CONTROL_DELTA};

bitflags! {
    /// USBLEGSUP semaphore bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LegacySupport: u32 {
        const BIOS_OWNED = 1 << 16;
        const OS_OWNED = 1 << 24;
    }
}

/// Current owner, derived once from the semaphore bits.
///
/// BIOS ownership wins when both bits are set: the two coexist while a
/// transfer is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Firmware,
    Os,
    Unowned,
}

impl Owner {
    pub fn classify(usblegsup: u32) -> Self {
        let bits = LegacySupport::from_bits_truncate(usblegsup);
        if bits.contains(LegacySupport::BIOS_OWNED) {
            Self::Firmware
        } else if bits.contains(LegacySupport::OS_OWNED) {
            Self::Os
        } else {
            Self::Unowned
        }
    }
}

/// What the handoff did. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// Firmware dropped its semaphore within the budget.
    Released { waited_ms: u64 },
    /// Firmware held on; BIOS ownership was overwritten.
    Forced { waited_ms: u64 },
    /// OS semaphore was already set; nothing written.
    AlreadyOwned,
    /// Neither semaphore was set; OS ownership asserted without waiting.
    Claimed,
}

/// Take the controller away from firmware.
///
/// Blocks for up to `timeout_ms` in a spin loop when firmware owns the
/// controller. Always finishes by zeroing the SMI control register at
/// `offset + 4`.
pub fn take_ownership(
    access: &impl ConfigAccess,
    clock: &impl Clock,
    device: DeviceFunction,
    offset: u8,
    timeout_ms: u64,
) -> HandoffOutcome {
    let usblegsup_addr = ConfigAddress::new(device, offset as u16);
    let usblegsup = access.read32(usblegsup_addr);

    let outcome = match Owner::classify(usblegsup) {
        Owner::Firmware => {
            log::info!(target: LOG_TARGET, "taking ownership of xHCI controller");
            log::debug!(target: LOG_TARGET, "xHCI owned by: BIOS ({:#010x})", usblegsup);
            reclaim_from_firmware(access, clock, usblegsup_addr, usblegsup, timeout_ms)
        }
        Owner::Os => {
            log::debug!(target: LOG_TARGET, "xHCI owned by: OS");
            HandoffOutcome::AlreadyOwned
        }
        Owner::Unowned => {
            // Not seen on real hardware so far; claiming it is a best guess
            log::warn!(target: LOG_TARGET, "xHCI owned by: NONE, asserting OS ownership");
            write_and_flush(access, usblegsup_addr, LegacySupport::OS_OWNED.bits());
            HandoffOutcome::Claimed
        }
    };

    disable_smi(access, ConfigAddress::new(device, offset as u16 + SMI_CONTROL_DELTA));
    log::debug!(target: LOG_TARGET, "ownership OK ({:?})", outcome);
    outcome
}

fn reclaim_from_firmware(
    access: &impl ConfigAccess,
    clock: &impl Clock,
    addr: ConfigAddress,
    usblegsup: u32,
    timeout_ms: u64,
) -> HandoffOutcome {
    write_and_flush(access, addr, usblegsup | LegacySupport::OS_OWNED.bits());

    let start = clock.now_ms();
    let deadline = start.saturating_add(timeout_ms);
    while bios_owned(access.read32(addr)) && clock.now_ms() < deadline {
        core::hint::spin_loop();
    }
    let waited_ms = clock.now_ms().saturating_sub(start);

    if !bios_owned(access.read32(addr)) {
        return HandoffOutcome::Released { waited_ms };
    }

    log::warn!(
        target: LOG_TARGET,
        "{:?}: xHCI change ownership timeout after {} ms",
        addr.device,
        waited_ms
    );
    log::warn!(target: LOG_TARGET, "{:?}: forcing OS ownership", addr.device);
    write_and_flush(access, addr, LegacySupport::OS_OWNED.bits());
    HandoffOutcome::Forced { waited_ms }
}

fn disable_smi(access: &impl ConfigAccess, addr: ConfigAddress) {
    write_and_flush(access, addr, 0);
}

/// Write, then read back so the write is not left posted.
#[inline]
fn write_and_flush(access: &impl ConfigAccess, addr: ConfigAddress, value: u32) {
    access.write32(addr, value);
    let _ = access.read32(addr);
}

#[inline]
fn bios_owned(value: u32) -> bool {
    LegacySupport::from_bits_truncate(value).contains(LegacySupport::BIOS_OWNED)
}
