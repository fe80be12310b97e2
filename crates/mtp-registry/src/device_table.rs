//! Static `(VID, PID) → (name, quirks)` table (`spec.md` §1, §4.2).
//!
//! The full table a production build ships is a data-maintenance
//! exercise, not a design one (`spec.md` §1 lists it under Non-goals); a
//! representative slice covers the quirk combinations the rest of the
//! workspace is grounded against.

use mtp_msg::QuirkFlags;

/// A USB vendor/product id pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbDeviceId {
    pub vid: u16,
    pub pid: u16,
}

/// One row of the static device table.
#[derive(Debug, Clone, Copy)]
pub struct DeviceEntry {
    pub id: UsbDeviceId,
    pub name: &'static str,
    pub quirks: QuirkFlags,
}

macro_rules! device {
    ($vid:expr, $pid:expr, $name:expr, $quirks:expr) => {
        DeviceEntry {
            id: UsbDeviceId {
                vid: $vid,
                pid: $pid,
            },
            name: $name,
            quirks: $quirks,
        }
    };
}

/// A representative slice of known MTP devices and the quirks they need.
pub static KNOWN_DEVICES: &[DeviceEntry] = &[
    device!(0x041E, 0x4150, "Creative Zen Vision W", QuirkFlags::empty()),
    device!(
        0x4102,
        0x1006,
        "iRiver generic MTP device",
        QuirkFlags::from_bits_truncate(
            QuirkFlags::OGG_IS_UNKNOWN.bits() | QuirkFlags::NO_ZERO_READS.bits()
        )
    ),
    device!(
        0x0FCA,
        0x8004,
        "BlackBerry (mass storage mode)",
        QuirkFlags::from_bits_truncate(
            QuirkFlags::SWITCH_MODE_BLACKBERRY.bits() | QuirkFlags::ALWAYS_PROBE_DESCRIPTOR.bits()
        )
    ),
    device!(
        0x04E8,
        0x503A,
        "Samsung YP-series",
        QuirkFlags::from_bits_truncate(
            QuirkFlags::PLAYLIST_SPL_V2.bits() | QuirkFlags::BROKEN_OBJECT_PROP_LIST_ALL.bits()
        )
    ),
    device!(
        0x04E8,
        0x502E,
        "Samsung YH-series",
        QuirkFlags::from_bits_truncate(
            QuirkFlags::PLAYLIST_SPL_V1.bits() | QuirkFlags::ONLY_7BIT_FILENAMES.bits()
        )
    ),
    device!(
        0x0781,
        0x74D0,
        "SanDisk Sansa (Fuze-class)",
        QuirkFlags::from_bits_truncate(
            QuirkFlags::BROKEN_BATTERY_LEVEL.bits() | QuirkFlags::NO_RELEASE_INTERFACE.bits()
        )
    ),
    device!(
        0x0E79,
        0x1420,
        "Archos generic MTP device",
        QuirkFlags::LONG_TIMEOUT
    ),
];

/// Looks up `id` in [`KNOWN_DEVICES`].
pub fn lookup(id: UsbDeviceId) -> Option<&'static DeviceEntry> {
    KNOWN_DEVICES.iter().find(|e| e.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_device_is_found_by_exact_id() {
        let found = lookup(UsbDeviceId {
            vid: 0x4102,
            pid: 0x1006,
        })
        .unwrap();
        assert!(found.quirks.contains(QuirkFlags::OGG_IS_UNKNOWN));
    }

    #[test]
    fn unknown_device_is_not_found() {
        assert!(lookup(UsbDeviceId {
            vid: 0xFFFF,
            pid: 0xFFFF
        })
        .is_none());
    }

    #[test]
    fn table_has_no_duplicate_ids() {
        let mut seen = std::collections::HashSet::new();
        for entry in KNOWN_DEVICES {
            assert!(seen.insert(entry.id), "duplicate entry for {:?}", entry.id);
        }
    }
}
