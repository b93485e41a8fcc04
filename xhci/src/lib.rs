//! xHCI Discovery and BIOS Handoff
//!
//! Finds USB 3.x host controllers on the PCI bus, makes sure their registers
//! are reachable below 4 GiB, and takes them away from platform firmware
//! before operational init runs.
//!
//! # Architecture
//!
//! ```text
//! PCI enumerator (BusScanner over ECAM or 0xCF8/0xCFC)
//!   │  (device, vendor/device id)
//!   ▼
//! XhciPciDriver::qualify
//!   - exclusion list, class 0C/03/30, SBRN 0x30..0x32
//!   - BAR must sit below 4 GiB and be non-zero
//!   - enable memory space + bus master
//!   - map 256 bytes of registers
//!   - USBLEGSUP handoff (1 s budget, forced on timeout), SMI off
//!   ▼
//! ControllerInit::init_device(window)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use morpheus_xhci::{BusScanner, EcamAccess, IdentityMapper, TscClock, XhciPciDriver};
//!
//! morpheus_xhci::serial::init_logger(log::LevelFilter::Debug).ok();
//!
//! let access = unsafe { EcamAccess::new(ecam_base) };
//! let clock = TscClock::from_frequency(tsc_hz).ok_or(Error::TscNotCalibrated)?;
//! let mut driver = XhciPciDriver::new(&access, clock, unsafe { IdentityMapper::new() }, |window| {
//!     controllers.push(window);
//! });
//!
//! let accepted = driver.scan(&mut BusScanner::new(&access));
//! ```
//!
//! # What This Crate Does Not Do
//!
//! - Rings, port reset, device enumeration on the USB side
//! - Controllers with registers above 4 GiB
//! - Reporting failures to the enumerator (scanning always continues)

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod mmio;
pub mod pci;
pub mod serial;
pub mod time;
pub mod xhci;

// ═══════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════

// Configuration and errors
pub use config::QualifierConfig;
pub use error::Rejection;

// PCI plumbing
#[cfg(target_arch = "x86_64")]
pub use pci::LegacyIoAccess;
pub use pci::{
    BusScanner, ConfigAccess, ConfigAddress, DeviceFunction, EcamAccess, Enumerator, IterControl,
    PciDevices, PciId,
};

// Collaborators
pub use mmio::{IdentityMapper, PhysMapper, RegisterWindow};
pub use time::{Clock, TscClock};

// Driver
pub use xhci::{
    scan, take_ownership, Accepted, ControllerInit, HandoffOutcome, Owner, Verdict, XhciPciDriver,
};
