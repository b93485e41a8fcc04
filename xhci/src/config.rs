//! Qualifier configuration.
//!
//! Defaults reproduce the fixed protocol behaviour; the knobs exist for
//! platforms that need an extra excluded chipset or a different budget.

use crate::pci::PciId;
use crate::xhci::{CS5536_PCIID, HANDOFF_TIMEOUT_MS};

/// Tunables for [`XhciPciDriver`](crate::xhci::XhciPciDriver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifierConfig {
    /// How long firmware gets to drop BIOS ownership before it is forced.
    pub handoff_timeout_ms: u64,
    /// Identities rejected before any register access.
    pub excluded_ids: &'static [PciId],
}

const DEFAULT_EXCLUDED: &[PciId] = &[CS5536_PCIID];

impl QualifierConfig {
    pub const fn new() -> Self {
        Self {
            handoff_timeout_ms: HANDOFF_TIMEOUT_MS,
            excluded_ids: DEFAULT_EXCLUDED,
        }
    }

    pub const fn with_handoff_timeout(mut self, ms: u64) -> Self {
        self.handoff_timeout_ms = ms;
        self
    }

    pub const fn with_excluded_ids(mut self, ids: &'static [PciId]) -> Self {
        self.excluded_ids = ids;
        self
    }

    pub fn is_excluded(&self, id: PciId) -> bool {
        self.excluded_ids.contains(&id)
    }
}

impl Default for QualifierConfig {
    fn default() -> Self {
        Self::new()
    }
}
