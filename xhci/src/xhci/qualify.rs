//! xHCI controller qualification.
//!
//! Decides, one candidate at a time, whether a PCI function is an xHCI
//! controller we can drive. Checks run cheapest-first and stop at the first
//! failure, so a device that is not ours is never written to.

use crate::config::QualifierConfig;
use crate::error::Rejection;
use crate::mmio::{PhysMapper, RegisterWindow};
use crate::pci::{
    bar, enable_command_bits, offset, ClassCode, Command, ConfigAccess, ConfigAddress,
    DeviceFunction, Enumerator, IterControl, PciId,
};
use crate::time::Clock;

use super::capability::legacy_support_offset;
use super::handoff::{take_ownership, HandoffOutcome};
use super::{
    LOG_TARGET, REGISTER_WINDOW_SIZE, SBRN_REG, SUPPORTED_RELEASES, WINDOW_ADDR_MASK, XHCI_CLASS,
};

/// Operational initialisation that takes over once ownership is settled.
pub trait ControllerInit {
    /// Receives the register window; it is never unmapped by this crate.
    fn init_device(&mut self, window: RegisterWindow);
}

impl<F: FnMut(RegisterWindow)> ControllerInit for F {
    fn init_device(&mut self, window: RegisterWindow) {
        self(window)
    }
}

/// A controller that passed qualification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub device: DeviceFunction,
    /// Physical base of the mapped register window.
    pub base: u32,
    pub release: u8,
    /// `None` when no legacy support register was found.
    pub handoff: Option<HandoffOutcome>,
}

/// Result of one qualification pass. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Skipped(Rejection),
    Accepted(Accepted),
}

/// Qualifies candidates and performs the BIOS handoff on the ones it keeps.
pub struct XhciPciDriver<A, C, M, I> {
    access: A,
    clock: C,
    mapper: M,
    init: I,
    config: QualifierConfig,
}

impl<A, C, M, I> XhciPciDriver<A, C, M, I>
where
    A: ConfigAccess,
    C: Clock,
    M: PhysMapper,
    I: ControllerInit,
{
    pub fn new(access: A, clock: C, mapper: M, init: I) -> Self {
        Self::with_config(access, clock, mapper, init, QualifierConfig::default())
    }

    pub fn with_config(access: A, clock: C, mapper: M, init: I, config: QualifierConfig) -> Self {
        Self {
            access,
            clock,
            mapper,
            init,
            config,
        }
    }

    pub fn config(&self) -> &QualifierConfig {
        &self.config
    }

    /// Enumerator callback. Whatever happens to the device, scanning goes on.
    pub fn qualify(&mut self, device: DeviceFunction, id: PciId) -> IterControl {
        let _ = self.probe(device, id);
        IterControl::Continue
    }

    /// Run every candidate from `enumerator` through [`qualify`](Self::qualify).
    ///
    /// Returns how many controllers were accepted.
    pub fn scan(&mut self, enumerator: &mut (impl Enumerator + ?Sized)) -> usize {
        let mut accepted = 0;
        enumerator.for_each_device(&mut |device, id| {
            if let Verdict::Accepted(_) = self.probe(device, id) {
                accepted += 1;
            }
            IterControl::Continue
        });
        accepted
    }

    /// Qualify one device and, if accepted, hand it off and initialise it.
    pub fn probe(&mut self, device: DeviceFunction, id: PciId) -> Verdict {
        log::trace!(target: LOG_TARGET, "probe {:?} id {:#010x}", device, id);

        let (base, release) = match self.check(device, id) {
            Ok(found) => found,
            Err(rejection) => return Verdict::Skipped(rejection),
        };

        let base = base & WINDOW_ADDR_MASK;
        log::debug!(target: LOG_TARGET, "iobase of XHCC: {:08x}", base);
        let window = self
            .mapper
            .map_registers(base as u64, REGISTER_WINDOW_SIZE);

        let handoff = legacy_support_offset(&window, self.config.is_excluded(id)).map(|eecp| {
            take_ownership(
                &self.access,
                &self.clock,
                device,
                eecp,
                self.config.handoff_timeout_ms,
            )
        });

        self.init.init_device(window);

        Verdict::Accepted(Accepted {
            device,
            base,
            release,
            handoff,
        })
    }

    /// Predicates in order; the command register is touched only after all pass.
    fn check(&self, device: DeviceFunction, id: PciId) -> Result<(u32, u8), Rejection> {
        if self.config.is_excluded(id) {
            log::warn!(target: LOG_TARGET, "device {:#010x} not supported", id);
            return Err(Rejection::ExcludedDevice { id });
        }

        let class = ClassCode::read(&self.access, device);
        if class != XHCI_CLASS {
            log::trace!(target: LOG_TARGET, "{:?}: not xHCI ({:?})", device, class);
            return Err(Rejection::NotXhci {
                class: class.class,
                subclass: class.subclass,
                interface: class.interface,
            });
        }
        log::debug!(target: LOG_TARGET, "{:?}: class OK", device);

        let release = self.access.read8(ConfigAddress::new(device, SBRN_REG));
        if !SUPPORTED_RELEASES.contains(&release) {
            log::debug!(target: LOG_TARGET, "{:?}: wrong SBRN: {:#04x}", device, release);
            return Err(Rejection::UnsupportedRelease(release));
        }
        log::debug!(target: LOG_TARGET, "{:?}: bus rev. num. OK", device);

        let low = self.access.read32(ConfigAddress::new(device, offset::BAR0));
        let high = self.access.read32(ConfigAddress::new(device, offset::BAR1));
        if low & bar::MEM_TYPE_MASK != bar::MEM_TYPE_32 && high != 0 {
            log::debug!(
                target: LOG_TARGET,
                "{:?}: registers above 4G are not supported",
                device
            );
            return Err(Rejection::Above4G { high });
        }

        let base = low & bar::MEM_ADDR_MASK;
        if base == 0 {
            log::debug!(target: LOG_TARGET, "{:?}: xHCI is not mapped", device);
            return Err(Rejection::NotMapped);
        }

        // coreboot, VMware and some BIOSes leave these off
        enable_command_bits(
            &self.access,
            device,
            Command::MEM_SPACE | Command::BUS_MASTER,
        );
        log::debug!(target: LOG_TARGET, "{:?}: 32-bit xHCI OK", device);

        Ok((base, release))
    }
}

/// Free-standing form of [`XhciPciDriver::scan`].
pub fn scan<A, C, M, I>(
    enumerator: &mut (impl Enumerator + ?Sized),
    driver: &mut XhciPciDriver<A, C, M, I>,
) -> usize
where
    A: ConfigAccess,
    C: Clock,
    M: PhysMapper,
    I: ControllerInit,
{
    let accepted = driver.scan(enumerator);
    log::debug!(target: LOG_TARGET, "scan done, {} controller(s) accepted", accepted);
    accepted
}
