//! xHCI discovery and BIOS handoff.
//!
//! ```text
//! enumerator ──► XhciPciDriver::qualify(device, id)
//!                  │ identity / class / SBRN / BAR checks
//!                  │ command |= MEM_SPACE | BUS_MASTER
//!                  ▼
//!                map 256-byte register window
//!                  │
//!                  ▼
//!                capability::legacy_support_offset ── none ──┐
//!                  │                                         │
//!                  ▼                                         │
//!                handoff::take_ownership                     │
//!                  │                                         │
//!                  ▼                                         ▼
//!                ControllerInit::init_device(window) ◄───────┘
//! ```
//!
//! Handoff is best effort: controller init runs even if firmware never let go.

pub mod capability;
pub mod handoff;
pub mod qualify;

use crate::pci::{pci_id, ClassCode, PciId};

pub use capability::{extended_capability_pointer, legacy_support_offset};
pub use handoff::{take_ownership, HandoffOutcome, LegacySupport, Owner};
pub use qualify::{scan, Accepted, ControllerInit, Verdict, XhciPciDriver};

/// `log` target for every diagnostic in this crate.
pub const LOG_TARGET: &str = "xhci";

/// Serial bus controller / USB / xHCI.
pub const XHCI_CLASS: ClassCode = ClassCode::new(0x0C, 0x03, 0x30);

/// AMD CS5536 companion chip; never an xHCI we can drive.
pub const CS5536_PCIID: PciId = pci_id(0x1022, 0x208F);

/// Serial Bus Release Number register (config space).
pub const SBRN_REG: u16 = 0x60;

/// USB 3.0, 3.1 and 3.2.
pub const SUPPORTED_RELEASES: [u8; 3] = [0x30, 0x31, 0x32];

pub const REGISTER_WINDOW_SIZE: usize = 0x100;
pub const WINDOW_ADDR_MASK: u32 = !0xFF;

/// Byte offset of the capability-parameters dword in the window.
pub const CAPPARAMS_OFFSET: usize = 0x08;

/// Lowest extended capability offset that can hold the legacy support register.
pub const MIN_EXT_CAP_OFFSET: u8 = 0x40;

/// SMI control register sits right after the ownership register.
pub const SMI_CONTROL_DELTA: u16 = 4;

pub const HANDOFF_TIMEOUT_MS: u64 = 1000;
