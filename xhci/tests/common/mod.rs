//! Common test utilities: mock config space, clock, mapper and init sink

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use morpheus_xhci::{Clock, ConfigAccess, ConfigAddress, DeviceFunction, PhysMapper, RegisterWindow};

pub const BIOS_OWNED: u32 = 1 << 16;
pub const OS_OWNED: u32 = 1 << 24;

/// Intel Panther Point xHCI, a typical 32-bit controller.
pub const INTEL_XHCI_ID: u32 = 0x1E31_8086;

/// One recorded configuration-space access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read(DeviceFunction, u16),
    Write(DeviceFunction, u16, u32),
    /// Native 16-bit write, only issued through [`NarrowBus`].
    Write16(DeviceFunction, u16, u16),
}

impl Op {
    pub fn device(&self) -> DeviceFunction {
        match self {
            Op::Read(dev, _) | Op::Write(dev, _, _) | Op::Write16(dev, _, _) => *dev,
        }
    }

    pub fn offset(&self) -> u16 {
        match self {
            Op::Read(_, off) | Op::Write(_, off, _) | Op::Write16(_, off, _) => *off,
        }
    }
}

/// Firmware side of the ownership semaphore.
#[derive(Debug, Clone, Copy)]
struct Firmware {
    legsup: u16,
    /// Reads after the OS request before BIOS_OWNED drops; `None` never drops.
    release_after: Option<usize>,
    reads_since_request: usize,
}

/// Dword-granular configuration space for any number of devices.
///
/// Absent devices and out-of-range offsets read as all-ones. Every access is
/// logged in order.
#[derive(Default)]
pub struct MockBus {
    spaces: RefCell<BTreeMap<DeviceFunction, [u32; 64]>>,
    firmware: RefCell<BTreeMap<DeviceFunction, Firmware>>,
    ops: RefCell<Vec<Op>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bare device with the given identity dword.
    pub fn add_device(&self, dev: DeviceFunction, id: u32) {
        let mut space = [0u32; 64];
        space[0] = id;
        self.spaces.borrow_mut().insert(dev, space);
    }

    /// Add a device that looks like an xHCI controller.
    pub fn add_xhci(&self, dev: DeviceFunction, id: u32, sbrn: u8, bar0: u32, bar1: u32) {
        self.add_device(dev, id);
        self.set_class(dev, 0x0C, 0x03, 0x30);
        self.set32(dev, 0x60, sbrn as u32);
        self.set32(dev, 0x10, bar0);
        self.set32(dev, 0x14, bar1);
        // capabilities list present; a command update must not echo it back
        self.set32(dev, 0x04, 0x0010_0000);
    }

    pub fn set_class(&self, dev: DeviceFunction, class: u8, subclass: u8, interface: u8) {
        let raw = (class as u32) << 24 | (subclass as u32) << 16 | (interface as u32) << 8;
        self.set32(dev, 0x08, raw);
    }

    pub fn set_multifunction(&self, dev: DeviceFunction) {
        let header = self.get32(dev, 0x0C);
        self.set32(dev, 0x0C, header | 0x0080_0000);
    }

    /// Install firmware behaviour on the ownership register at `legsup`.
    pub fn set_firmware(&self, dev: DeviceFunction, legsup: u16, usblegsup: u32, release_after: Option<usize>) {
        self.set32(dev, legsup, usblegsup);
        self.set32(dev, legsup + 4, 0xE000_0001);
        self.firmware.borrow_mut().insert(
            dev,
            Firmware {
                legsup,
                release_after,
                reads_since_request: 0,
            },
        );
    }

    /// Set a dword without logging.
    pub fn set32(&self, dev: DeviceFunction, offset: u16, value: u32) {
        if let Some(space) = self.spaces.borrow_mut().get_mut(&dev) {
            space[(offset / 4) as usize] = value;
        }
    }

    /// Peek a dword without logging.
    pub fn get32(&self, dev: DeviceFunction, offset: u16) -> u32 {
        self.spaces
            .borrow()
            .get(&dev)
            .map_or(0xFFFF_FFFF, |space| space[(offset / 4) as usize])
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    /// Accesses to `dev` only.
    pub fn ops_for(&self, dev: DeviceFunction) -> Vec<Op> {
        self.ops.borrow().iter().copied().filter(|op| op.device() == dev).collect()
    }

    /// Values written to one register, in order.
    pub fn writes_to(&self, dev: DeviceFunction, offset: u16) -> Vec<u32> {
        self.ops
            .borrow()
            .iter()
            .filter_map(|op| match *op {
                Op::Write(d, o, v) if d == dev && o == offset => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn count_reads(&self, dev: DeviceFunction, offset: u16) -> usize {
        self.ops
            .borrow()
            .iter()
            .filter(|op| **op == Op::Read(dev, offset))
            .count()
    }

    fn observe_read(&self, dev: DeviceFunction, offset: u16, value: u32) -> u32 {
        let mut firmware = self.firmware.borrow_mut();
        let Some(fw) = firmware.get_mut(&dev) else {
            return value;
        };
        if fw.legsup != offset || value & OS_OWNED == 0 || value & BIOS_OWNED == 0 {
            return value;
        }
        fw.reads_since_request += 1;
        match fw.release_after {
            Some(limit) if fw.reads_since_request >= limit => {
                let released = value & !BIOS_OWNED;
                self.set32(dev, offset, released);
                released
            }
            _ => value,
        }
    }
}

impl ConfigAccess for MockBus {
    fn read32(&self, addr: ConfigAddress) -> u32 {
        self.ops.borrow_mut().push(Op::Read(addr.device, addr.offset));
        if addr.offset >= 0x100 {
            return 0xFFFF_FFFF;
        }
        let offset = addr.offset & !3;
        let value = self.get32(addr.device, offset);
        self.observe_read(addr.device, offset, value)
    }

    fn write32(&self, addr: ConfigAddress, value: u32) {
        self.ops.borrow_mut().push(Op::Write(addr.device, addr.offset, value));
        if addr.offset < 0x100 {
            self.set32(addr.device, addr.offset & !3, value);
        }
    }
}

/// [`MockBus`] view with native 16-bit writes, like ECAM or port I/O.
pub struct NarrowBus<'a>(pub &'a MockBus);

impl ConfigAccess for NarrowBus<'_> {
    fn read32(&self, addr: ConfigAddress) -> u32 {
        self.0.read32(addr)
    }

    fn write32(&self, addr: ConfigAddress, value: u32) {
        self.0.write32(addr, value)
    }

    fn write16(&self, addr: ConfigAddress, value: u16) {
        let bus = self.0;
        bus.ops.borrow_mut().push(Op::Write16(addr.device, addr.offset, value));
        let aligned = addr.offset & !3;
        let shift = (addr.offset & 2) * 8;
        let dword = bus.get32(addr.device, aligned) & !(0xFFFF << shift);
        bus.set32(addr.device, aligned, dword | (value as u32) << shift);
    }
}

/// Advances by `step` milliseconds on every query.
pub struct StepClock {
    now: Cell<u64>,
    step: u64,
    queries: Cell<usize>,
}

impl StepClock {
    pub fn new(step: u64) -> Self {
        Self {
            now: Cell::new(0),
            step,
            queries: Cell::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.get()
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u64 {
        self.queries.set(self.queries.get() + 1);
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

/// Hands out windows over owned buffers and remembers every mapping.
#[derive(Default)]
pub struct BufferMapper {
    buffers: BTreeMap<u64, Box<[u32; 64]>>,
    pub mappings: Vec<(u64, usize)>,
}

impl BufferMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload the capability-parameters dword of the registers at `phys`.
    pub fn with_capparams(mut self, phys: u64, capparams: u32) -> Self {
        let mut regs = Box::new([0u32; 64]);
        regs[2] = capparams.to_le();
        self.buffers.insert(phys, regs);
        self
    }
}

impl PhysMapper for BufferMapper {
    fn map_registers(&mut self, phys: u64, len: usize) -> RegisterWindow {
        self.mappings.push((phys, len));
        let regs = self.buffers.entry(phys).or_insert_with(|| Box::new([0u32; 64]));
        let len = len.min(core::mem::size_of::<[u32; 64]>());
        unsafe { RegisterWindow::new(regs.as_mut_ptr() as *mut u8, phys, len) }
    }
}

/// Controller init sink; clones share the same record.
#[derive(Clone, Default)]
pub struct RecordingInit {
    inits: Rc<RefCell<Vec<(u64, usize)>>>,
}

impl RecordingInit {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(phys_base, size)` of every window handed over.
    pub fn inits(&self) -> Vec<(u64, usize)> {
        self.inits.borrow().clone()
    }
}

impl morpheus_xhci::ControllerInit for RecordingInit {
    fn init_device(&mut self, window: RegisterWindow) {
        self.inits.borrow_mut().push((window.phys_base(), window.size()));
    }
}
