//! PCI enumeration and configuration access.
//!
//! # Reference
//! - PCI Local Bus Spec 3.0

pub mod access;
pub mod config;
pub mod scan;

pub use access::EcamAccess;
#[cfg(target_arch = "x86_64")]
pub use access::LegacyIoAccess;
pub use config::{
    bar, enable_command_bits, offset, ClassCode, Command, ConfigAccess, ConfigAddress,
    DeviceFunction,
};
pub use scan::{pci_id, BusScanner, Enumerator, IterControl, PciDevices, PciId};
