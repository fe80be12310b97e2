//! The Microsoft OS-descriptor probe (`spec.md` §4.2, step 2).
//!
//! Devices outside the static table announce MTP support through a
//! vendor-specific string descriptor at index `0xEE` carrying the magic
//! `"MSFT"` and a one-byte vendor request code; following up on that
//! vendor code confirms the device with an ASCII `"MTP"` marker.
//! Grounded in `libusb1-glue.c`'s `probe_device_descriptor`.

use std::time::Duration;

use mtp_dtyp::{MtpError, Result};
use mtp_transport::UsbTransport;

/// String descriptor index devices publish the MS extended descriptor at.
pub const MS_OS_STRING_DESCRIPTOR_INDEX: u16 = 0xEE;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// `bmRequestType` for "get descriptor": device-to-host, standard, device.
const GET_DESCRIPTOR_REQUEST_TYPE: u8 = 0x80;
const GET_DESCRIPTOR: u8 = 0x06;
const DESCRIPTOR_TYPE_STRING: u16 = 0x03;

fn magic_byte_ok(buf: &[u8], offset: usize, expected: u8) -> bool {
    buf.get(offset).copied() == Some(expected)
}

/// Runs the MS OS-descriptor probe against `usb`, which must already have
/// the candidate interface claimed.
///
/// Returns `Ok(true)` if the device confirms MTP support, `Ok(false)` if
/// it plainly doesn't, and `Err` on a USB-level failure (the caller
/// should clear the control endpoint's halt and move on, per the
/// original implementation).
pub fn probe_ms_os_descriptor<T: UsbTransport>(usb: &mut T) -> Result<bool> {
    let mut buf = [0u8; 255];
    let w_value = (DESCRIPTOR_TYPE_STRING << 8) | MS_OS_STRING_DESCRIPTOR_INDEX;
    let n = usb.control(
        GET_DESCRIPTOR_REQUEST_TYPE,
        GET_DESCRIPTOR,
        w_value,
        0,
        &mut buf,
        PROBE_TIMEOUT,
    )?;

    if n < 10 {
        return Ok(false);
    }

    // UTF-16LE "MSFT": one ASCII byte per 16-bit code unit, at offsets
    // 2, 4, 6, 8 (offset 0 is bLength, offset 1 is bDescriptorType).
    let is_msft = magic_byte_ok(&buf, 2, b'M')
        && magic_byte_ok(&buf, 4, b'S')
        && magic_byte_ok(&buf, 6, b'F')
        && magic_byte_ok(&buf, 8, b'T');
    if !is_msft {
        return Ok(false);
    }

    let vendor_code = buf[16];

    let mut reply = [0u8; 255];
    let m = usb.control(
        0xC0, // vendor, device-to-host, device recipient
        vendor_code,
        0,
        4,
        &mut reply,
        PROBE_TIMEOUT,
    )?;

    if m <= 0x15 {
        return Ok(false);
    }

    Ok(reply.get(0x12..0x15) == Some(b"MTP".as_slice()))
}
