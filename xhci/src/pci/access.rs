//! Concrete configuration space accessors.
//!
//! - **ECAM** - memory-mapped PCIe config space, 4 KiB per function
//! - **Legacy I/O** - mechanism #1 via ports 0xCF8/0xCFC, 256 bytes per function

use super::config::{ConfigAccess, ConfigAddress};

// ═══════════════════════════════════════════════════════════════════════════
// ECAM
// ═══════════════════════════════════════════════════════════════════════════

/// ECAM (PCIe Enhanced Configuration Access Mechanism) accessor.
pub struct EcamAccess {
    base: *mut u8,
}

impl EcamAccess {
    /// Create a new ECAM accessor.
    ///
    /// # Safety
    ///
    /// - `base` must point to a mapped ECAM region covering every bus that
    ///   will be addressed through this accessor.
    /// - The mapping must be uncached.
    pub unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }

    pub fn base(&self) -> *mut u8 {
        self.base
    }

    fn ptr(&self, addr: ConfigAddress) -> *mut u8 {
        let offset = addr.device.ecam_offset() + (addr.offset & 0xFFF) as usize;
        self.base.wrapping_add(offset)
    }
}

impl ConfigAccess for EcamAccess {
    fn read32(&self, addr: ConfigAddress) -> u32 {
        // SAFETY: constructor guarantees the region is mapped
        unsafe { core::ptr::read_volatile(self.ptr(addr) as *const u32) }
    }

    fn write32(&self, addr: ConfigAddress, value: u32) {
        // SAFETY: constructor guarantees the region is mapped
        unsafe { core::ptr::write_volatile(self.ptr(addr) as *mut u32, value) }
    }

    fn read16(&self, addr: ConfigAddress) -> u16 {
        unsafe { core::ptr::read_volatile(self.ptr(addr) as *const u16) }
    }

    fn read8(&self, addr: ConfigAddress) -> u8 {
        unsafe { core::ptr::read_volatile(self.ptr(addr) as *const u8) }
    }

    fn write16(&self, addr: ConfigAddress, value: u16) {
        unsafe { core::ptr::write_volatile(self.ptr(addr) as *mut u16, value) }
    }

    fn write8(&self, addr: ConfigAddress, value: u8) {
        unsafe { core::ptr::write_volatile(self.ptr(addr), value) }
    }
}

// SAFETY: ECAM access is thread-safe if properly synchronized externally
unsafe impl Send for EcamAccess {}
unsafe impl Sync for EcamAccess {}

// ═══════════════════════════════════════════════════════════════════════════
// LEGACY I/O (0xCF8 / 0xCFC)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(target_arch = "x86_64")]
mod pio {
    pub const CONFIG_ADDRESS: u16 = 0xCF8;
    pub const CONFIG_DATA: u16 = 0xCFC;

    #[inline]
    pub unsafe fn outl(port: u16, value: u32) {
        core::arch::asm!("out dx, eax", in("dx") port, in("eax") value,
            options(nomem, nostack, preserves_flags));
    }

    #[inline]
    pub unsafe fn inl(port: u16) -> u32 {
        let value: u32;
        core::arch::asm!("in eax, dx", in("dx") port, out("eax") value,
            options(nomem, nostack, preserves_flags));
        value
    }

    #[inline]
    pub unsafe fn outw(port: u16, value: u16) {
        core::arch::asm!("out dx, ax", in("dx") port, in("ax") value,
            options(nomem, nostack, preserves_flags));
    }

    #[inline]
    pub unsafe fn inw(port: u16) -> u16 {
        let value: u16;
        core::arch::asm!("in ax, dx", in("dx") port, out("ax") value,
            options(nomem, nostack, preserves_flags));
        value
    }

    #[inline]
    pub unsafe fn outb(port: u16, value: u8) {
        core::arch::asm!("out dx, al", in("dx") port, in("al") value,
            options(nomem, nostack, preserves_flags));
    }

    #[inline]
    pub unsafe fn inb(port: u16) -> u8 {
        let value: u8;
        core::arch::asm!("in al, dx", in("dx") port, out("al") value,
            options(nomem, nostack, preserves_flags));
        value
    }
}

/// Legacy I/O port configuration access (mechanism #1).
///
/// Registers above 0xFF are out of reach: reads return all-ones and writes
/// are dropped.
#[cfg(target_arch = "x86_64")]
pub struct LegacyIoAccess {
    _private: (),
}

#[cfg(target_arch = "x86_64")]
impl LegacyIoAccess {
    /// Create a new legacy I/O accessor.
    ///
    /// # Safety
    ///
    /// Caller must own ports 0xCF8-0xCFF; the address/data pair is not
    /// locked against concurrent users.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    /// Select `addr` and return the data port for its byte lane.
    #[inline]
    unsafe fn select(addr: ConfigAddress) -> u16 {
        pio::outl(pio::CONFIG_ADDRESS, addr.cf8());
        pio::CONFIG_DATA + (addr.offset & 0x3)
    }
}

#[cfg(target_arch = "x86_64")]
impl ConfigAccess for LegacyIoAccess {
    fn read32(&self, addr: ConfigAddress) -> u32 {
        if addr.offset > 0xFF {
            return 0xFFFF_FFFF;
        }
        unsafe { pio::inl(Self::select(addr)) }
    }

    fn write32(&self, addr: ConfigAddress, value: u32) {
        if addr.offset > 0xFF {
            return;
        }
        unsafe { pio::outl(Self::select(addr), value) }
    }

    fn read16(&self, addr: ConfigAddress) -> u16 {
        if addr.offset > 0xFF {
            return 0xFFFF;
        }
        unsafe { pio::inw(Self::select(addr)) }
    }

    fn read8(&self, addr: ConfigAddress) -> u8 {
        if addr.offset > 0xFF {
            return 0xFF;
        }
        unsafe { pio::inb(Self::select(addr)) }
    }

    fn write16(&self, addr: ConfigAddress, value: u16) {
        if addr.offset > 0xFF {
            return;
        }
        unsafe { pio::outw(Self::select(addr), value) }
    }

    fn write8(&self, addr: ConfigAddress, value: u8) {
        if addr.offset > 0xFF {
            return;
        }
        unsafe { pio::outb(Self::select(addr), value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pci::config::DeviceFunction;

    #[test]
    fn test_ecam_native_widths() {
        // Two functions' worth of config space
        let mut region = vec![0u32; 2 * 4096 / 4];
        let ecam = unsafe { EcamAccess::new(region.as_mut_ptr() as *mut u8) };
        let f0 = DeviceFunction::new(0, 0, 0);
        let f1 = DeviceFunction::new(0, 0, 1);

        ecam.write32(ConfigAddress::new(f1, 0x40), 0x0101_0001);
        ecam.write16(ConfigAddress::new(f0, 0x04), 0x0006);
        ecam.write8(ConfigAddress::new(f0, 0x60), 0x31);

        assert_eq!(ecam.read32(ConfigAddress::new(f1, 0x40)), 0x0101_0001);
        assert_eq!(ecam.read16(ConfigAddress::new(f0, 0x04)), 0x0006);
        assert_eq!(ecam.read8(ConfigAddress::new(f0, 0x60)), 0x31);
        assert_eq!(ecam.read32(ConfigAddress::new(f0, 0x40)), 0);
        drop(ecam);
        assert_eq!(region[1024 + 0x40 / 4], 0x0101_0001);
    }
}
