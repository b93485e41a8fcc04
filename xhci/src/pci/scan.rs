//! PCI bus enumeration.
//!
//! [`PciDevices`] is a lazy walk over every present function. An
//! [`Enumerator`] drives a visitor over that walk; the visitor decides after
//! each device whether the scan goes on.

use super::config::{offset, ConfigAccess, ConfigAddress, DeviceFunction};

/// Visitor verdict after one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterControl {
    Continue,
    Stop,
}

/// Identity dword at offset 0: `(device_id << 16) | vendor_id`.
pub type PciId = u32;

/// Build a [`PciId`] from its halves.
pub const fn pci_id(vendor: u16, device: u16) -> PciId {
    ((device as u32) << 16) | vendor as u32
}

/// Source of candidate devices.
pub trait Enumerator {
    /// Call `visit` once per present function until it returns
    /// [`IterControl::Stop`] or the bus is exhausted.
    fn for_each_device(&mut self, visit: &mut dyn FnMut(DeviceFunction, PciId) -> IterControl);
}

// ═══════════════════════════════════════════════════════════════════════════
// LAZY WALK
// ═══════════════════════════════════════════════════════════════════════════

/// Iterator over present functions, bus 0 through 255.
///
/// Finite and not restartable; build a new one for a second pass.
pub struct PciDevices<'a, A: ConfigAccess + ?Sized> {
    access: &'a A,
    bus: u16,
    device: u8,
    function: u8,
    multifunction: bool,
}

impl<'a, A: ConfigAccess + ?Sized> PciDevices<'a, A> {
    pub fn new(access: &'a A) -> Self {
        Self {
            access,
            bus: 0,
            device: 0,
            function: 0,
            multifunction: false,
        }
    }

    fn advance(&mut self) {
        if self.function != 0 && self.multifunction && self.function < 7 {
            self.function += 1;
            return;
        }
        self.function = 0;
        self.multifunction = false;
        self.device += 1;
        if self.device == 32 {
            self.device = 0;
            self.bus += 1;
        }
    }
}

impl<'a, A: ConfigAccess + ?Sized> Iterator for PciDevices<'a, A> {
    type Item = (DeviceFunction, PciId);

    fn next(&mut self) -> Option<Self::Item> {
        while self.bus <= 0xFF {
            let location = DeviceFunction::new(self.bus as u8, self.device, self.function);
            let id = self.access.read32(ConfigAddress::new(location, offset::VENDOR_ID));
            let vendor = id as u16;
            let present = vendor != 0xFFFF && vendor != 0x0000;

            if self.function == 0 {
                if present {
                    let header = self
                        .access
                        .read8(ConfigAddress::new(location, offset::HEADER_TYPE));
                    self.multifunction = header & 0x80 != 0;
                }
                if present && self.multifunction {
                    // Functions 1-7 follow before the next device
                    self.function = 1;
                } else {
                    self.advance();
                }
            } else {
                self.advance();
            }

            if present {
                return Some((location, id));
            }
        }
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BUS SCANNER
// ═══════════════════════════════════════════════════════════════════════════

/// [`Enumerator`] backed by a brute-force walk of configuration space.
pub struct BusScanner<A: ConfigAccess> {
    access: A,
}

impl<A: ConfigAccess> BusScanner<A> {
    pub fn new(access: A) -> Self {
        Self { access }
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn devices(&self) -> PciDevices<'_, A> {
        PciDevices::new(&self.access)
    }
}

impl<A: ConfigAccess> Enumerator for BusScanner<A> {
    fn for_each_device(&mut self, visit: &mut dyn FnMut(DeviceFunction, PciId) -> IterControl) {
        for (location, id) in PciDevices::new(&self.access) {
            if visit(location, id) == IterControl::Stop {
                break;
            }
        }
    }
}
