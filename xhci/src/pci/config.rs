//! PCI configuration space access.
//!
//! Every access goes through a [`ConfigAddress`] built for that one access.
//! Implementations of [`ConfigAccess`] are synchronous and never fail; a
//! missing device simply reads back as all-ones.
//!
//! # Reference
//! - PCI Local Bus Spec 3.0 §6.1 (Configuration Space Organization)

use bitflags::bitflags;

// ═══════════════════════════════════════════════════════════════════════════
// ADDRESSING
// ═══════════════════════════════════════════════════════════════════════════

/// PCI device/function identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceFunction {
    /// Bus number (0-255).
    pub bus: u8,
    /// Device number (0-31).
    pub device: u8,
    /// Function number (0-7).
    pub function: u8,
}

impl DeviceFunction {
    /// Create a new device/function identifier.
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device,
            function,
        }
    }

    /// Offset of this function's 4 KiB window inside an ECAM region.
    pub const fn ecam_offset(&self) -> usize {
        ((self.bus as usize) << 20)
            | ((self.device as usize) << 15)
            | ((self.function as usize) << 12)
    }
}

/// One register of one device's configuration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigAddress {
    pub device: DeviceFunction,
    pub offset: u16,
}

impl ConfigAddress {
    pub const fn new(device: DeviceFunction, offset: u16) -> Self {
        Self { device, offset }
    }

    /// CF8 mechanism #1 address. Only bits 7:2 of the offset survive.
    pub const fn cf8(&self) -> u32 {
        0x8000_0000
            | ((self.device.bus as u32) << 16)
            | ((self.device.device as u32 & 0x1F) << 11)
            | ((self.device.function as u32 & 0x07) << 8)
            | (self.offset as u32 & 0xFC)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ACCESS TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration space accessor.
///
/// Only the dword operations are required. The narrow reads are derived by
/// shifting the containing dword; the narrow writes fall back to a dword
/// read-modify-write, which concrete accessors should override with a
/// native-width access whenever the bus supports it. The fallback never
/// writes pending Status bits back.
pub trait ConfigAccess {
    /// Read a 32-bit value.
    fn read32(&self, addr: ConfigAddress) -> u32;

    /// Write a 32-bit value.
    fn write32(&self, addr: ConfigAddress, value: u32);

    /// Read a 16-bit value.
    fn read16(&self, addr: ConfigAddress) -> u16 {
        let dword = self.read32(ConfigAddress::new(addr.device, addr.offset & !0x3));
        let shift = (addr.offset & 0x2) * 8;
        (dword >> shift) as u16
    }

    /// Read an 8-bit value.
    fn read8(&self, addr: ConfigAddress) -> u8 {
        let dword = self.read32(ConfigAddress::new(addr.device, addr.offset & !0x3));
        let shift = (addr.offset & 0x3) * 8;
        (dword >> shift) as u8
    }

    /// Write a 16-bit value.
    fn write16(&self, addr: ConfigAddress, value: u16) {
        let aligned = ConfigAddress::new(addr.device, addr.offset & !0x3);
        let shift = (addr.offset & 0x2) * 8;
        let dword = self.read32(aligned) & !(0xFFFF << shift) & fallback_keep_mask(aligned.offset);
        self.write32(aligned, dword | ((value as u32) << shift));
    }

    /// Write an 8-bit value.
    fn write8(&self, addr: ConfigAddress, value: u8) {
        let aligned = ConfigAddress::new(addr.device, addr.offset & !0x3);
        let shift = (addr.offset & 0x3) * 8;
        let dword = self.read32(aligned) & !(0xFF << shift) & fallback_keep_mask(aligned.offset);
        self.write32(aligned, dword | ((value as u32) << shift));
    }
}

/// Bits of the dword at `aligned` that a narrow fallback write may write back.
///
/// Writing back a pending Status error bit would clear it, so the Status
/// half of the command dword always goes out as zero.
const fn fallback_keep_mask(aligned: u16) -> u32 {
    if aligned == offset::COMMAND {
        !(0xFFFF << ((offset::STATUS & 0x2) * 8))
    } else {
        !0
    }
}

impl<A: ConfigAccess + ?Sized> ConfigAccess for &A {
    fn read32(&self, addr: ConfigAddress) -> u32 {
        (**self).read32(addr)
    }

    fn write32(&self, addr: ConfigAddress, value: u32) {
        (**self).write32(addr, value)
    }

    fn read16(&self, addr: ConfigAddress) -> u16 {
        (**self).read16(addr)
    }

    fn read8(&self, addr: ConfigAddress) -> u8 {
        (**self).read8(addr)
    }

    fn write16(&self, addr: ConfigAddress, value: u16) {
        (**self).write16(addr, value)
    }

    fn write8(&self, addr: ConfigAddress, value: u8) {
        (**self).write8(addr, value)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PCI STANDARD OFFSETS
// ═══════════════════════════════════════════════════════════════════════════

/// PCI configuration space standard offsets.
pub mod offset {
    pub const VENDOR_ID: u16 = 0x00;
    pub const COMMAND: u16 = 0x04;
    /// Write-1-to-clear error bits; shares a dword with [`COMMAND`].
    pub const STATUS: u16 = 0x06;
    /// Revision ID in bits 7:0, class code in bits 31:8.
    pub const CLASS_REVISION: u16 = 0x08;
    pub const HEADER_TYPE: u16 = 0x0E;
    pub const BAR0: u16 = 0x10;
    pub const BAR1: u16 = 0x14;
}

/// Memory BAR encoding.
pub mod bar {
    /// Bits 2:1, memory decoder type.
    pub const MEM_TYPE_MASK: u32 = 0x6;
    pub const MEM_TYPE_32: u32 = 0x0;
    /// Strips the space/type/prefetch bits.
    pub const MEM_ADDR_MASK: u32 = !0xF;
}

bitflags! {
    /// PCI command register bits touched by this crate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Command: u16 {
        const MEM_SPACE = 1 << 1;
        const BUS_MASTER = 1 << 2;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CLASS CODE
// ═══════════════════════════════════════════════════════════════════════════

/// Base class / subclass / programming interface triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassCode {
    pub class: u8,
    pub subclass: u8,
    pub interface: u8,
}

impl ClassCode {
    pub const fn new(class: u8, subclass: u8, interface: u8) -> Self {
        Self {
            class,
            subclass,
            interface,
        }
    }

    /// Decode from the dword at [`offset::CLASS_REVISION`].
    pub const fn from_class_revision(raw: u32) -> Self {
        let code = raw >> 8;
        Self {
            class: (code >> 16) as u8,
            subclass: (code >> 8) as u8,
            interface: code as u8,
        }
    }

    pub fn read(access: &impl ConfigAccess, device: DeviceFunction) -> Self {
        Self::from_class_revision(
            access.read32(ConfigAddress::new(device, offset::CLASS_REVISION)),
        )
    }
}

/// Read-modify-write the command register, setting `bits` and keeping the rest.
///
/// Returns the value written.
pub fn enable_command_bits(
    access: &impl ConfigAccess,
    device: DeviceFunction,
    bits: Command,
) -> u16 {
    let addr = ConfigAddress::new(device, offset::COMMAND);
    let value = access.read16(addr) | bits.bits();
    access.write16(addr, value);
    value
}
