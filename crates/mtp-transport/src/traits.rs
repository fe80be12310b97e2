//! The abstract USB transport capability (`spec.md` §4.1).
//!
//! This crate never talks to a real USB stack. Whatever sits underneath
//! (libusb, a kernel character device, a mock for tests) implements this
//! trait once; everything above it — framing, chunking, quirks — is
//! written against the trait alone.

use std::time::Duration;

use mtp_dtyp::Result;

/// Three typed endpoint transfers plus the handful of control operations
/// [`crate::PtpTransport`] needs to drive a session.
///
/// Implementors report timeouts as `MtpError::Timeout` and cancellation as
/// `MtpError::Cancelled`; anything else maps to `MtpError::UsbIo`.
pub trait UsbTransport: Send {
    /// Reads up to `buf.len()` bytes from the bulk IN endpoint.
    fn bulk_in(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Writes `buf` to the bulk OUT endpoint.
    fn bulk_out(&mut self, buf: &[u8], timeout: Duration) -> Result<usize>;

    /// Reads one interrupt IN transfer (events).
    fn interrupt_in(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Issues a control transfer on the default endpoint. `buf` is the
    /// data stage buffer; its direction is implied by `bm_request_type`.
    fn control(
        &mut self,
        bm_request_type: u8,
        b_request: u8,
        w_value: u16,
        w_index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize>;

    /// Issues a USB device reset.
    fn reset(&mut self) -> Result<()>;

    /// Clears a halt condition on `endpoint`.
    fn clear_halt(&mut self, endpoint: u8) -> Result<()>;

    /// Claims the interface selected during enumeration (`spec.md` §4.2).
    fn claim(&mut self) -> Result<()>;

    /// Releases the interface.
    fn release(&mut self) -> Result<()>;

    /// `wMaxPacketSize` of the bulk IN endpoint.
    fn in_ep_max_packet(&self) -> usize;

    /// `wMaxPacketSize` of the bulk OUT endpoint.
    fn out_ep_max_packet(&self) -> usize;
}
