//! Extended capability pointer lookup.

use crate::mmio::RegisterWindow;

use super::{CAPPARAMS_OFFSET, LOG_TARGET, MIN_EXT_CAP_OFFSET};

/// Bits 15:8 of the capability-parameters dword.
pub fn extended_capability_pointer(window: &RegisterWindow) -> u8 {
    (window.read32(CAPPARAMS_OFFSET) >> 8) as u8
}

/// Resolve the config-space offset of the ownership register.
///
/// `None` means there is no reachable legacy-support register and the
/// handoff must be skipped as a whole, SMI disable included.
pub fn legacy_support_offset(window: &RegisterWindow, excluded: bool) -> Option<u8> {
    let eecp = extended_capability_pointer(window);
    if excluded || eecp < MIN_EXT_CAP_OFFSET {
        log::debug!(target: LOG_TARGET, "no EECP (offset {:#04x}), skipping handoff", eecp);
        return None;
    }
    Some(eecp)
}
