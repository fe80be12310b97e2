//! Device identification and quirk dispatch (`spec.md` §4.2).
//!
//! Decides *which* attached USB interface is an MTP responder and *how*
//! to talk to it: the static `(VID, PID) → quirks` table, interface/
//! endpoint selection, and the Microsoft OS-descriptor probe for devices
//! the table doesn't know about.

pub mod device_table;
pub mod enumerate;
pub mod probe;

pub use device_table::{DeviceEntry, UsbDeviceId, KNOWN_DEVICES};
pub use enumerate::{select_interface, InterfaceSelection};
pub use probe::probe_ms_os_descriptor;

use mtp_msg::QuirkFlags;

/// What enumeration decided about one attached USB device
/// (`spec.md` §4.2 "Enumeration").
#[derive(Debug, Clone)]
pub struct CandidateDevice {
    pub id: UsbDeviceId,
    pub name: Option<&'static str>,
    pub quirks: QuirkFlags,
}

impl CandidateDevice {
    /// A device recognized from [`KNOWN_DEVICES`]; no further probing.
    pub fn known(entry: &DeviceEntry) -> Self {
        CandidateDevice {
            id: entry.id,
            name: Some(entry.name),
            quirks: entry.quirks,
        }
    }

    /// A device identified only by a successful MS OS-descriptor probe:
    /// treated as MTP with zero quirk flags (`spec.md` §4.2, step 2).
    pub fn probed(id: UsbDeviceId) -> Self {
        CandidateDevice {
            id,
            name: None,
            quirks: QuirkFlags::empty(),
        }
    }
}

/// The interface/device classes worth probing for an unrecognized
/// `(VID, PID)` (`spec.md` §4.2, step 2).
///
/// Per-interface (0x00), communications (0x02), still-image/PTP (0x06),
/// interface-association (0xEF) and vendor-specific (0xFF).
pub fn class_is_probe_candidate(device_class: u8) -> bool {
    matches!(device_class, 0x00 | 0x02 | 0x06 | 0xEF | 0xFF)
}

/// Decides what to do with one attached device given its `(VID, PID)` and
/// declared `bDeviceClass`, driving the probe if needed (`spec.md` §4.2).
pub fn classify<P>(vid: u16, pid: u16, device_class: u8, mut probe: P) -> Option<CandidateDevice>
where
    P: FnMut() -> mtp_dtyp::Result<bool>,
{
    let id = UsbDeviceId { vid, pid };
    if let Some(entry) = device_table::lookup(id) {
        if !entry.quirks.contains(QuirkFlags::ALWAYS_PROBE_DESCRIPTOR) {
            return Some(CandidateDevice::known(entry));
        }
    }
    if class_is_probe_candidate(device_class) {
        match probe() {
            Ok(true) => return Some(CandidateDevice::probed(id)),
            Ok(false) => {}
            Err(e) => log::debug!("MS OS-descriptor probe failed for {id:?}: {e}"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_device_skips_probing() {
        let entry = &KNOWN_DEVICES[0];
        let mut probed = false;
        let result = classify(entry.id.vid, entry.id.pid, 0xFF, || {
            probed = true;
            Ok(true)
        });
        assert!(!probed);
        assert_eq!(result.unwrap().quirks, entry.quirks);
    }

    #[test]
    fn unrecognized_vendor_specific_device_is_probed() {
        let result = classify(0x9999, 0x9999, 0xFF, || Ok(true));
        assert!(result.is_some());
        assert!(result.unwrap().quirks.is_empty());
    }

    #[test]
    fn unrecognized_non_probe_class_is_skipped() {
        let result = classify(0x9999, 0x9999, 0x08 /* mass storage */, || Ok(true));
        assert!(result.is_none());
    }
}
