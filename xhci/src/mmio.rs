//! Memory-mapped register windows.
//!
//! A [`RegisterWindow`] is an exclusive, volatile view over a device's MMIO
//! registers. It is deliberately not `Clone`: whoever holds it owns the
//! registers, and handing it on transfers that ownership.

/// Volatile view over a span of MMIO registers.
pub struct RegisterWindow {
    cpu_ptr: *mut u8,
    phys_addr: u64,
    size: usize,
}

impl RegisterWindow {
    /// Create a window over already-mapped registers.
    ///
    /// # Safety
    /// - `cpu_ptr` must be a valid, uncached mapping of `size` bytes at `phys_addr`
    /// - `cpu_ptr` must be 4-byte aligned
    /// - No other live window may alias the same registers
    pub const unsafe fn new(cpu_ptr: *mut u8, phys_addr: u64, size: usize) -> Self {
        Self {
            cpu_ptr,
            phys_addr,
            size,
        }
    }

    #[inline]
    pub const fn cpu_base(&self) -> *mut u8 {
        self.cpu_ptr
    }

    #[inline]
    pub const fn phys_base(&self) -> u64 {
        self.phys_addr
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn in_bounds(&self, offset: usize) -> bool {
        offset % 4 == 0 && offset + 4 <= self.size
    }

    /// Read the little-endian dword at byte `offset`.
    ///
    /// Out-of-window offsets read as all-ones, like an aborted bus cycle.
    pub fn read32(&self, offset: usize) -> u32 {
        debug_assert!(self.in_bounds(offset), "MMIO read outside window");
        if !self.in_bounds(offset) {
            return 0xFFFF_FFFF;
        }
        // SAFETY: bounds checked, mapping guaranteed by constructor
        let raw = unsafe { core::ptr::read_volatile(self.cpu_ptr.add(offset) as *const u32) };
        u32::from_le(raw)
    }

    /// Write the little-endian dword at byte `offset`. Out-of-window writes are dropped.
    pub fn write32(&self, offset: usize, value: u32) {
        debug_assert!(self.in_bounds(offset), "MMIO write outside window");
        if !self.in_bounds(offset) {
            return;
        }
        // SAFETY: bounds checked, mapping guaranteed by constructor
        unsafe { core::ptr::write_volatile(self.cpu_ptr.add(offset) as *mut u32, value.to_le()) }
    }
}

unsafe impl Send for RegisterWindow {}

impl core::fmt::Debug for RegisterWindow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RegisterWindow")
            .field("cpu_ptr", &self.cpu_ptr)
            .field("phys_addr", &format_args!("{:#x}", self.phys_addr))
            .field("size", &format_args!("{:#x}", self.size))
            .finish()
    }
}

/// Physical-to-virtual mapping service.
pub trait PhysMapper {
    /// Map `len` bytes of device registers at `phys`, uncached.
    fn map_registers(&mut self, phys: u64, len: usize) -> RegisterWindow;
}

impl<M: PhysMapper + ?Sized> PhysMapper for &mut M {
    fn map_registers(&mut self, phys: u64, len: usize) -> RegisterWindow {
        (**self).map_registers(phys, len)
    }
}

/// Mapper for the flat identity map we run on after ExitBootServices.
#[derive(Debug)]
pub struct IdentityMapper {
    _private: (),
}

impl IdentityMapper {
    /// # Safety
    /// Physical memory, including MMIO holes below 4 GiB, must be
    /// identity-mapped and uncached for device ranges.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PhysMapper for IdentityMapper {
    fn map_registers(&mut self, phys: u64, len: usize) -> RegisterWindow {
        // SAFETY: constructor contract guarantees identity mapping
        unsafe { RegisterWindow::new(phys as usize as *mut u8, phys, len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_reads_and_writes_dwords() {
        let mut regs = [0u32; 64];
        regs[2] = 0x0000_4000u32.to_le();
        let window = unsafe { RegisterWindow::new(regs.as_mut_ptr() as *mut u8, 0x8000_0000, 0x100) };

        assert_eq!(window.read32(8), 0x4000);
        window.write32(0x20, 0xDEAD_BEEF);
        assert_eq!(window.read32(0x20), 0xDEAD_BEEF);
        assert_eq!(window.phys_base(), 0x8000_0000);
        assert_eq!(window.size(), 0x100);
    }

    #[test]
    fn test_identity_mapper_keeps_address() {
        let mut regs = [0u32; 64];
        let phys = regs.as_mut_ptr() as usize as u64;
        let mut mapper = unsafe { IdentityMapper::new() };
        let window = mapper.map_registers(phys, 0x100);
        assert_eq!(window.cpu_base() as usize as u64, phys);
        window.write32(4, 7);
        drop(window);
        assert_eq!(regs[1], 7u32.to_le());
    }
}
