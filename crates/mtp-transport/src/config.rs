//! Transfer timeouts (`spec.md` §4.3 "Timeouts").

use std::time::Duration;

use mtp_msg::QuirkFlags;

/// `USB_START_TIMEOUT`: used only for the first `OpenSession` attempt, so a
/// device that will never answer fails fast and a retry (after a USB
/// reset) can follow without a long stall.
pub const USB_START_TIMEOUT: Duration = Duration::from_secs(5);

/// `USB_TIMEOUT_DEFAULT`: every other transfer, absent `LongTimeout`.
pub const USB_TIMEOUT_DEFAULT: Duration = Duration::from_secs(20);

/// `USB_TIMEOUT_LONG`: applies when the device's quirk flags set `LongTimeout`.
pub const USB_TIMEOUT_LONG: Duration = Duration::from_secs(60);

/// The timeout drained while waiting out an in-flight transfer during
/// cancellation (`spec.md` §4.3 "Cancellation", step 3).
pub const USB_CANCEL_DRAIN_TIMEOUT: Duration = Duration::from_millis(300);

/// Sleep between `DeviceStatus` polls while cancelling.
pub const USB_CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Timeouts in effect for one transport instance, derived once from the
/// device's quirk flags.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub start: Duration,
    pub default: Duration,
}

impl Timeouts {
    pub fn for_quirks(quirks: QuirkFlags) -> Self {
        Timeouts {
            start: USB_START_TIMEOUT,
            default: quirks.transfer_timeout(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            start: USB_START_TIMEOUT,
            default: USB_TIMEOUT_DEFAULT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_timeout_quirk_widens_default() {
        let t = Timeouts::for_quirks(QuirkFlags::LONG_TIMEOUT);
        assert_eq!(t.default, USB_TIMEOUT_LONG);
        assert_eq!(t.start, USB_START_TIMEOUT);
    }

    #[test]
    fn no_quirks_uses_default_timeout() {
        let t = Timeouts::for_quirks(QuirkFlags::empty());
        assert_eq!(t.default, USB_TIMEOUT_DEFAULT);
    }
}
