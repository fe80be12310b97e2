//! Per-device quirk flags (`spec.md` §4.2).
//!
//! A bitset rather than a wire-packed bitfield: these bits never cross the
//! wire, they're read-only host-side configuration threaded into the
//! transport and session layers after device identification.

use bitflags::bitflags;

bitflags! {
    /// Behavioral deviations a specific `(VID, PID)` is known to need.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct QuirkFlags: u32 {
        /// Suppress the terminating zero-length IN read; read and discard
        /// one extra byte instead when the transfer length is an exact
        /// multiple of `inep_maxpacket`.
        const NO_ZERO_READS = 1 << 0;
        /// Repair a bogus Data/Response code or transaction id instead of
        /// failing.
        const IGNORE_HEADER_ERRORS = 1 << 1;
        /// Don't use `GetObjectPropList`; fall back to per-property
        /// `GetObjectPropValue`.
        const BROKEN_OBJECT_PROP_LIST_ALL = 1 << 2;
        /// Detach the kernel driver before claiming the interface.
        const UNLOAD_DRIVER = 1 << 3;
        /// Don't release the interface or clear stalls on close.
        const NO_RELEASE_INTERFACE = 1 << 4;
        /// Issue a USB device reset on close.
        const FORCE_RESET_ON_CLOSE = 1 << 5;
        /// Run the MS OS-descriptor probe even on a recognized device.
        const ALWAYS_PROBE_DESCRIPTOR = 1 << 6;
        /// Emit the BlackBerry MTP-mode-switch control transfers.
        const SWITCH_MODE_BLACKBERRY = 1 << 7;
        /// Use the 60s timeout instead of the 20s default.
        const LONG_TIMEOUT = 1 << 8;
        /// Playlists are `.spl` v1 text files.
        const PLAYLIST_SPL_V1 = 1 << 9;
        /// Playlists are `.spl` v2 text files.
        const PLAYLIST_SPL_V2 = 1 << 10;
        /// Send Ogg content under the "undefined audio" format code.
        const OGG_IS_UNKNOWN = 1 << 11;
        /// Send FLAC content under the "undefined audio" format code.
        const FLAC_IS_UNKNOWN = 1 << 12;
        /// Strip non-ASCII bytes from filenames before sending.
        const ONLY_7BIT_FILENAMES = 1 << 13;
        /// `GetBatteryLevel` is unreliable on this device; skip it.
        const BROKEN_BATTERY_LEVEL = 1 << 14;
    }
}

impl QuirkFlags {
    /// Whether any "store as `.spl`" quirk is set.
    pub fn uses_spl_playlists(self) -> bool {
        self.intersects(Self::PLAYLIST_SPL_V1 | Self::PLAYLIST_SPL_V2)
    }

    /// The effective bulk/interrupt transfer timeout for this device.
    pub fn transfer_timeout(self) -> std::time::Duration {
        if self.contains(Self::LONG_TIMEOUT) {
            std::time::Duration::from_secs(60)
        } else {
            std::time::Duration::from_secs(20)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_flags() {
        assert_eq!(QuirkFlags::default(), QuirkFlags::empty());
    }

    #[test]
    fn long_timeout_changes_duration() {
        assert_eq!(
            QuirkFlags::empty().transfer_timeout(),
            std::time::Duration::from_secs(20)
        );
        assert_eq!(
            QuirkFlags::LONG_TIMEOUT.transfer_timeout(),
            std::time::Duration::from_secs(60)
        );
    }

    #[test]
    fn spl_detection() {
        assert!(QuirkFlags::PLAYLIST_SPL_V1.uses_spl_playlists());
        assert!(QuirkFlags::PLAYLIST_SPL_V2.uses_spl_playlists());
        assert!(!QuirkFlags::ONLY_7BIT_FILENAMES.uses_spl_playlists());
    }
}
