//! Qualification failures.
//!
//! None of these ever reach the enumerator; they exist so every skipped
//! device leaves exactly one diagnostic behind.

use core::fmt;

use crate::pci::PciId;

/// Why a candidate device was not taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Identity is on the exclusion list (CS5536 by default).
    ExcludedDevice { id: PciId },
    /// Class triple is not serial-bus / USB / xHCI.
    NotXhci {
        class: u8,
        subclass: u8,
        interface: u8,
    },
    /// Serial Bus Release Number is not USB 3.0, 3.1 or 3.2.
    UnsupportedRelease(u8),
    /// 64-bit BAR with a non-zero high dword.
    Above4G { high: u32 },
    /// BAR reads back as zero once the flag bits are stripped.
    NotMapped,
}

impl Rejection {
    /// True for devices that are xHCI controllers we deliberately do not
    /// drive, as opposed to devices that are simply not ours.
    pub const fn is_unsupported_configuration(&self) -> bool {
        matches!(self, Self::Above4G { .. })
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExcludedDevice { id } => write!(f, "device {:#010x} not supported", id),
            Self::NotXhci {
                class,
                subclass,
                interface,
            } => write!(
                f,
                "class {:02x}/{:02x}/{:02x} is not xHCI",
                class, subclass, interface
            ),
            Self::UnsupportedRelease(sbrn) => write!(f, "wrong SBRN: {:#04x}", sbrn),
            Self::Above4G { high } => write!(
                f,
                "registers above 4G are not supported (high dword {:#010x})",
                high
            ),
            Self::NotMapped => write!(f, "controller is not mapped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_distinguishes_above_4g() {
        let msg = Rejection::Above4G { high: 0x1 }.to_string();
        assert!(msg.contains("above 4G"));
        assert_ne!(msg, Rejection::NotMapped.to_string());
    }

    #[test]
    fn test_unsupported_configuration_category() {
        assert!(Rejection::Above4G { high: 2 }.is_unsupported_configuration());
        assert!(!Rejection::NotMapped.is_unsupported_configuration());
        assert!(!Rejection::UnsupportedRelease(0x20).is_unsupported_configuration());
    }

    #[test]
    fn test_release_display() {
        assert_eq!(
            Rejection::UnsupportedRelease(0x20).to_string(),
            "wrong SBRN: 0x20"
        );
    }
}
