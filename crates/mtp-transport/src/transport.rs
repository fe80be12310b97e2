//! The PTP container transaction state machine (`spec.md` §4.3).
//!
//! [`PtpTransport`] owns one [`UsbTransport`] and drives every Command /
//! Data / Response exchange over it: transaction id allocation, chunking,
//! the split-header and surplus-data quirks, stream sends, and
//! cancellation. Nothing above this layer touches raw bytes.

use std::io::{Read, Write};

use mtp_dtyp::ids::TransactionId;
use mtp_dtyp::{MtpError, Result};
use mtp_msg::{ContainerHeader, ContainerKind, ParamContainer, QuirkFlags, HEADER_LEN};

use crate::chunking::{self, ContextBlock};
use crate::config::{Timeouts, USB_CANCEL_DRAIN_TIMEOUT, USB_CANCEL_POLL_INTERVAL};
use crate::events::PtpEvent;
use crate::traits::UsbTransport;

/// Class-specific control requests used outside the bulk/interrupt
/// endpoints (`spec.md` §4.3 "Cancellation", "BlackBerry mode switch").
mod control {
    pub const CANCEL_TRANSACTION: u8 = 0x64;
    pub const GET_DEVICE_STATUS: u8 = 0x67;
    pub const DEVICE_STATUS_BUSY: u16 = 0x2019;

    pub const BLACKBERRY_SWITCH: [(u8, u8, u16); 4] =
        [(0xAA, 0, 0), (0xA5, 0, 1), (0xA8, 0, 2), (0xA8, 0, 3)];
}

/// A completed Response container: code plus its (possibly empty) params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub params: Vec<u32>,
}

/// Optional reporting/cancellation hook for a data phase. Returning `true`
/// requests cancellation (`spec.md` §4.3 "Cancellation").
pub type ProgressFn<'a> = dyn FnMut(u64, u64) -> bool + 'a;

pub struct PtpTransport<T: UsbTransport> {
    usb: T,
    quirks: QuirkFlags,
    timeouts: Timeouts,
    next_tid: TransactionId,
    context_block: ContextBlock,
    /// Set once a Data container's header is observed arriving in its own
    /// short IN packet, separate from the payload (`spec.md` §4.3
    /// "Split-header devices").
    split_header_data: bool,
    /// Bytes read past a Data payload's declared length, buffered for the
    /// next `get_packet`-equivalent read (`spec.md` §4.3 "Surplus data").
    surplus: Option<Vec<u8>>,
}

impl<T: UsbTransport> PtpTransport<T> {
    pub fn new(usb: T, quirks: QuirkFlags, vid: u16, pid: u16) -> Self {
        let context_block = chunking::context_block_for(vid, pid, usb.in_ep_max_packet());
        PtpTransport {
            usb,
            quirks,
            timeouts: Timeouts::for_quirks(quirks),
            next_tid: TransactionId::zero(),
            context_block,
            split_header_data: false,
            surplus: None,
        }
    }

    pub fn quirks(&self) -> QuirkFlags {
        self.quirks
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Reports whether the split-header quirk has been observed on this
    /// connection yet.
    pub fn split_header_data(&self) -> bool {
        self.split_header_data
    }

    /// Issues the four BlackBerry mode-switch control transfers
    /// (`spec.md` §4.3 "BlackBerry mode switch"). Their payloads are
    /// logged and otherwise discarded.
    pub fn switch_mode_blackberry(&mut self) -> Result<()> {
        for (b_request, w_value, w_index) in control::BLACKBERRY_SWITCH {
            let mut buf = [0u8; 16];
            let n = self.usb.control(
                0xC0, // vendor, device-to-host, device recipient
                b_request,
                w_value,
                w_index,
                &mut buf,
                self.timeouts.default,
            )?;
            log::debug!(
                "blackberry switch: req={b_request:#04x} idx={w_index} -> {:?}",
                &buf[..n]
            );
        }
        Ok(())
    }

    /// Runs a Command with no data phase.
    ///
    /// On `InvalidTransactionID`, the id counter is nudged forward and the
    /// command is retried once (`spec.md` §3, §4.3) — this is the path
    /// `mtp`'s session-open handshake relies on. Data-bearing commands
    /// don't get this automatic retry: re-running a data phase after it
    /// has already moved bytes has no well-defined meaning, so a mismatch
    /// there is surfaced to the caller instead.
    pub fn command(&mut self, code: u16, params: &[u32]) -> Result<Response> {
        let tid = self.alloc_tid();
        self.write_command(code, tid.value(), params)?;
        let resp = self.read_response(tid.value(), "command")?;
        if resp.code == mtp_msg::ResponseCode::InvalidTransactionId.value() {
            self.next_tid.nudge();
            let retry_tid = self.alloc_tid();
            self.write_command(code, retry_tid.value(), params)?;
            return self.read_response(retry_tid.value(), "command retry");
        }
        Ok(resp)
    }

    /// Runs a Command with an outbound data phase carrying `payload` in
    /// full (size known up front).
    pub fn command_send_data(&mut self, code: u16, params: &[u32], payload: &[u8]) -> Result<Response> {
        self.command_send_data_progress(code, params, payload, None)
    }

    /// As [`PtpTransport::command_send_data`], but polls `progress` with
    /// `(bytes_sent, total)` between chunks; returning `true` cancels the
    /// transfer (`spec.md` §4.4 "Send / receive content" installs this on
    /// `send_file`).
    pub fn command_send_data_progress(
        &mut self,
        code: u16,
        params: &[u32],
        payload: &[u8],
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<Response> {
        let tid = self.alloc_tid();
        self.write_command(code, tid.value(), params)?;
        self.send_data_fixed(code, tid.value(), payload, &mut progress)?;
        self.read_response(tid.value(), "command_send_data_progress")
    }

    /// Runs a Command whose outbound data phase is of unknown length
    /// (`spec.md` §4.3 "Stream sends"). `reader` is read to EOF.
    pub fn command_send_stream(
        &mut self,
        code: u16,
        params: &[u32],
        reader: &mut dyn Read,
    ) -> Result<Response> {
        let tid = self.alloc_tid();
        self.write_command(code, tid.value(), params)?;
        self.send_data_stream(code, tid.value(), reader)?;
        self.read_response(tid.value(), "command_send_stream")
    }

    /// Runs a Command with an inbound data phase, streaming the payload to
    /// `sink`. `progress` is polled with `(bytes_so_far, total_hint)` and
    /// may request cancellation.
    pub fn command_receive_data(
        &mut self,
        code: u16,
        params: &[u32],
        sink: &mut dyn Write,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<Response> {
        let tid = self.alloc_tid();
        self.write_command(code, tid.value(), params)?;
        self.receive_data(tid.value(), sink, &mut progress)?;
        self.read_response(tid.value(), "command_receive_data")
    }

    fn alloc_tid(&mut self) -> TransactionId {
        self.next_tid.next()
    }

    fn write_command(&mut self, code: u16, tid: u32, params: &[u32]) -> Result<()> {
        let container = ParamContainer::new(ContainerKind::Command, code, tid, params);
        let bytes = container.to_bytes();
        self.usb.bulk_out(&bytes, self.timeouts.default)?;
        Ok(())
    }

    fn read_response(&mut self, expected_tid: u32, context: &'static str) -> Result<Response> {
        // A prior data phase may have over-read into the next container
        // (`spec.md` §4.3 "Surplus data") — consume that before issuing a
        // fresh bulk IN.
        let mut buf = if let Some(surplus) = self.surplus.take() {
            surplus
        } else {
            let mut b = vec![0u8; HEADER_LEN + 4 * mtp_msg::MAX_PARAMS];
            let n = self.usb.bulk_in(&mut b, self.timeouts.default)?;
            b.truncate(n);
            b
        };
        let mut container = ParamContainer::from_bytes(&buf)
            .ok_or_else(|| MtpError::protocol(format!("malformed response container ({context})")))?;

        if container.kind != ContainerKind::Response {
            return Err(MtpError::protocol(format!(
                "expected Response container, got {:?} ({context})",
                container.kind
            )));
        }

        if container.transaction_id != expected_tid {
            if self.quirks.contains(QuirkFlags::IGNORE_HEADER_ERRORS) {
                container.transaction_id = expected_tid;
            } else {
                return Err(MtpError::protocol(format!(
                    "response transaction id {} != expected {expected_tid} ({context})",
                    container.transaction_id
                )));
            }
        }

        Ok(Response {
            code: container.code,
            params: container.params,
        })
    }

    fn send_data_fixed(
        &mut self,
        code: u16,
        tid: u32,
        payload: &[u8],
        progress: &mut Option<&mut ProgressFn<'_>>,
    ) -> Result<()> {
        let header = ContainerHeader {
            length: (HEADER_LEN + payload.len()) as u32,
            kind: ContainerKind::Data,
            code,
            transaction_id: tid,
        };
        self.usb.bulk_out(&header.to_bytes(), self.timeouts.default)?;

        let out_max = self.usb.out_ep_max_packet();
        let (chunks, needs_zlp) = chunking::plan_send(payload.len(), out_max);
        let total = payload.len() as u64;
        let mut offset = 0;
        for len in chunks {
            if let Some(cb) = progress.as_mut() {
                if cb(offset as u64, total) {
                    self.cancel(tid)?;
                    return Err(MtpError::Cancelled);
                }
            }
            self.usb
                .bulk_out(&payload[offset..offset + len], self.timeouts.default)?;
            offset += len;
        }
        if needs_zlp {
            self.usb.bulk_out(&[], self.timeouts.default)?;
        }
        if let Some(cb) = progress.as_mut() {
            cb(offset as u64, total);
        }
        Ok(())
    }

    fn send_data_stream(&mut self, code: u16, tid: u32, reader: &mut dyn Read) -> Result<()> {
        // Sentinel length per `spec.md` §4.3 "Stream sends": the real size
        // is unknown up front, so a dummy `1` is sent in the header.
        let header = ContainerHeader {
            length: 1,
            kind: ContainerKind::Data,
            code,
            transaction_id: tid,
        };
        self.usb.bulk_out(&header.to_bytes(), self.timeouts.default)?;

        const MAX_CHUNK: usize = 0xFFFF_FFFF - HEADER_LEN;
        let mut chunk = vec![0u8; self.context_block.major.max(1).min(MAX_CHUNK)];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                // An `Io` error from the final read is a normal end-of-stream
                // signal for unknown-length sends (`spec.md` §4.3).
                Err(_) => break,
            };
            self.usb.bulk_out(&chunk[..n], self.timeouts.default)?;
        }
        Ok(())
    }

    fn receive_data(
        &mut self,
        expected_tid: u32,
        sink: &mut dyn Write,
        progress: &mut Option<&mut ProgressFn<'_>>,
    ) -> Result<()> {
        let in_max = self.usb.in_ep_max_packet();
        let mut header_buf = vec![0u8; HEADER_LEN + self.context_block.major];

        let n = self.usb.bulk_in(&mut header_buf, self.timeouts.default)?;
        header_buf.truncate(n);

        if header_buf.len() == HEADER_LEN {
            // Header arrived alone: the split-header quirk (`spec.md` §4.3).
            self.split_header_data = true;
        }

        let header = ContainerHeader::from_bytes(
            header_buf[0..HEADER_LEN]
                .try_into()
                .map_err(|_| MtpError::protocol("data container shorter than header"))?,
        )
        .ok_or_else(|| MtpError::protocol("data container has unknown type"))?;

        if header.kind != ContainerKind::Data {
            return Err(MtpError::protocol("expected Data container"));
        }
        if header.transaction_id != expected_tid && !self.quirks.contains(QuirkFlags::IGNORE_HEADER_ERRORS) {
            return Err(MtpError::protocol(format!(
                "data transaction id {} != expected {expected_tid}",
                header.transaction_id
            )));
        }

        let total_len = header.length as usize;
        let payload_len = total_len.saturating_sub(HEADER_LEN);

        let mut received: u64 = 0;
        if header_buf.len() > HEADER_LEN {
            let first_chunk = &header_buf[HEADER_LEN..];
            sink.write_all(first_chunk).map_err(MtpError::UsbIo)?;
            received += first_chunk.len() as u64;
        }

        while (received as usize) < payload_len {
            if let Some(cb) = progress.as_mut() {
                if cb(received, payload_len as u64) {
                    self.cancel(expected_tid)?;
                    return Err(MtpError::Cancelled);
                }
            }
            let want = (payload_len - received as usize).min(self.context_block.major);
            let mut chunk = vec![0u8; want];
            let n = self.usb.bulk_in(&mut chunk, self.timeouts.default)?;
            chunk.truncate(n);

            if (received as usize) + n > payload_len {
                let keep = payload_len - received as usize;
                let (payload_part, surplus_part) = chunk.split_at(keep);
                sink.write_all(payload_part).map_err(MtpError::UsbIo)?;
                received += payload_part.len() as u64;
                if surplus_part.len() >= HEADER_LEN {
                    self.surplus = Some(surplus_part.to_vec());
                }
            } else {
                sink.write_all(&chunk).map_err(MtpError::UsbIo)?;
                received += n as u64;
            }
        }

        // Terminating zero-length read, unless the device's quirk instead
        // appends one extra byte to discard (`spec.md` §4.3).
        if payload_len > 0 && payload_len % in_max == 0 {
            if self.quirks.contains(QuirkFlags::NO_ZERO_READS) {
                let mut extra = [0u8; 1];
                let _ = self.usb.bulk_in(&mut extra, self.timeouts.default);
            } else {
                let mut zlp = [0u8; 1];
                let _ = self.usb.bulk_in(&mut zlp, self.timeouts.default);
            }
        }

        if let Some(cb) = progress.as_mut() {
            cb(received, payload_len as u64);
        }

        Ok(())
    }

    /// Cancels an in-flight operation (`spec.md` §4.3 "Cancellation").
    pub fn cancel(&mut self, transaction_id: u32) -> Result<()> {
        let mut payload = transaction_id.to_le_bytes().to_vec();
        self.usb.control(
            0x21, // class, host-to-device, interface recipient
            control::CANCEL_TRANSACTION,
            0,
            0,
            &mut payload,
            self.timeouts.default,
        )?;

        loop {
            let mut status = [0u8; 4];
            let _ = self
                .usb
                .control(0xA1, control::GET_DEVICE_STATUS, 0, 0, &mut status, self.timeouts.default);
            let code = u16::from_le_bytes([status[0], status[1]]);
            if code != control::DEVICE_STATUS_BUSY {
                break;
            }
            std::thread::sleep(USB_CANCEL_POLL_INTERVAL);
        }

        let mut drain = vec![0u8; self.usb.in_ep_max_packet().max(64)];
        while self.usb.bulk_in(&mut drain, USB_CANCEL_DRAIN_TIMEOUT).is_ok() {}

        let mut event_buf = [0u8; 16];
        let _ = self
            .usb
            .interrupt_in(&mut event_buf, USB_CANCEL_DRAIN_TIMEOUT);

        Ok(())
    }

    /// Non-blocking-ish poll for a pending event; `Ok(None)` on timeout.
    pub fn poll_event(&mut self) -> Result<Option<PtpEvent>> {
        let mut buf = vec![0u8; 32];
        match self.usb.interrupt_in(&mut buf, self.timeouts.default) {
            Ok(n) => Ok(Some(PtpEvent::from_bytes(&buf[..n])?)),
            Err(MtpError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Blocks until an event arrives or the transport errors.
    pub fn wait_event(&mut self) -> Result<PtpEvent> {
        loop {
            if let Some(ev) = self.poll_event()? {
                return Ok(ev);
            }
        }
    }

    pub fn into_inner(self) -> T {
        self.usb
    }

    /// Claims the interface selected during enumeration.
    pub fn claim(&mut self) -> Result<()> {
        self.usb.claim()
    }

    /// Releases the interface.
    pub fn release(&mut self) -> Result<()> {
        self.usb.release()
    }

    /// Issues a USB device reset.
    pub fn reset_usb(&mut self) -> Result<()> {
        self.usb.reset()
    }

    /// Resets per-connection protocol state (transaction id counter,
    /// split-header/surplus tracking) without touching the underlying
    /// `UsbTransport` — used after a USB-level reset during the
    /// session-open retry (`spec.md` §4.3 "Session open robustness").
    pub fn reset_protocol_state(&mut self) {
        self.next_tid = TransactionId::zero();
        self.split_header_data = false;
        self.surplus = None;
    }

    /// Opens a session, tolerating the two rough edges `spec.md` §4.3
    /// "Session open robustness" calls out: a `SessionAlreadyOpened`
    /// response is treated as success, and a USB I/O failure gets one
    /// retry after a device reset and protocol-state reinit.
    /// `InvalidTransactionID` is already handled by `command`'s own retry.
    pub fn open_session(&mut self, session_id: u32) -> Result<()> {
        let normal_timeout = self.timeouts.default;
        self.timeouts.default = self.timeouts.start;
        let first = self.command(mtp_msg::OperationCode::OpenSession.value(), &[session_id]);
        self.timeouts.default = normal_timeout;

        match first {
            Ok(resp) => Self::check_open_session_response(resp),
            Err(MtpError::UsbIo(_)) => {
                self.usb.reset()?;
                self.reset_protocol_state();
                let resp = self.command(mtp_msg::OperationCode::OpenSession.value(), &[session_id])?;
                Self::check_open_session_response(resp)
            }
            Err(e) => Err(e),
        }
    }

    fn check_open_session_response(resp: Response) -> Result<()> {
        if resp.code == mtp_msg::ResponseCode::Ok.value()
            || resp.code == mtp_msg::ResponseCode::SessionAlreadyOpened.value()
        {
            Ok(())
        } else {
            Err(MtpError::ptp_response(resp.code, "OpenSession"))
        }
    }

    /// `CloseSession`, without interpreting the response — callers decide
    /// whether a non-`OK` close is worth surfacing (`spec.md` §4.4
    /// "Session lifecycle").
    pub fn close_session(&mut self) -> Result<Response> {
        self.command(mtp_msg::OperationCode::CloseSession.value(), &[])
    }

    /// Mutable access to the underlying transport, for tests that need to
    /// queue further scripted transfers into an already-wrapped mock
    /// (`mtp`'s own session tests build on this via the `test-support`
    /// feature).
    #[cfg(any(test, feature = "test-support"))]
    pub fn usb_mut(&mut self) -> &mut T {
        &mut self.usb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LoopbackTransport;
    use mtp_msg::ResponseCode;

    fn transport() -> PtpTransport<LoopbackTransport> {
        PtpTransport::new(LoopbackTransport::new(512, 512), QuirkFlags::empty(), 0, 0)
    }

    #[test]
    fn command_without_data_round_trips() {
        let mut t = transport();
        t.usb
            .queue_response(ResponseCode::Ok.value(), 0, &[42]);
        let resp = t.command(0x1001, &[]).unwrap();
        assert_eq!(resp.code, ResponseCode::Ok.value());
        assert_eq!(resp.params, vec![42]);
        let cmd = t.usb.take_last_command().unwrap();
        assert_eq!(cmd.code, 0x1001);
        assert_eq!(cmd.transaction_id, 0);
    }

    #[test]
    fn invalid_transaction_id_is_retried_with_nudge() {
        let mut t = transport();
        t.usb
            .queue_response(ResponseCode::InvalidTransactionId.value(), 0, &[]);
        // The retry uses a nudged id (>= +10 past the first attempt's 0).
        t.usb.queue_response(ResponseCode::Ok.value(), 11, &[]);
        let resp = t.command(0x1001, &[]).unwrap();
        assert_eq!(resp.code, ResponseCode::Ok.value());
        assert!(t.next_tid.value() >= 11);
    }

    #[test]
    fn send_data_emits_zlp_on_exact_multiple() {
        let mut t = PtpTransport::new(LoopbackTransport::new(8, 8), QuirkFlags::empty(), 0, 0);
        t.usb.queue_response(ResponseCode::Ok.value(), 0, &[]);
        let payload = vec![1u8; 16];
        t.command_send_data(0x100C, &[], &payload).unwrap();
        assert!(t.usb.last_send_had_zlp());
    }

    #[test]
    fn send_progress_reports_completion() {
        let mut t = PtpTransport::new(LoopbackTransport::new(8, 8), QuirkFlags::empty(), 0, 0);
        t.usb.queue_response(ResponseCode::Ok.value(), 0, &[]);
        let payload = vec![1u8; 16];
        let mut seen_total = 0u64;
        let mut track = |done: u64, total: u64| {
            seen_total = total;
            assert!(done <= total);
            false
        };
        t.command_send_data_progress(0x100C, &[], &payload, Some(&mut track))
            .unwrap();
        assert_eq!(seen_total, 16);
    }

    #[test]
    fn receive_data_reassembles_payload() {
        let mut t = transport();
        let payload = vec![7u8; 100];
        t.usb
            .queue_data_then_response(0x1009, 0, &payload, ResponseCode::Ok.value(), &[]);
        let mut out = Vec::new();
        let resp = t
            .command_receive_data(0x1009, &[1], &mut out, None)
            .unwrap();
        assert_eq!(resp.code, ResponseCode::Ok.value());
        assert_eq!(out, payload);
    }

    #[test]
    fn progress_callback_can_cancel_a_receive() {
        let mut t = transport();
        let payload = vec![9u8; 100];
        t.usb
            .queue_data_then_response(0x1009, 0, &payload, ResponseCode::Ok.value(), &[]);
        let mut out = Vec::new();
        let mut cancel = |_done: u64, _total: u64| true;
        let err = t
            .command_receive_data(0x1009, &[], &mut out, Some(&mut cancel))
            .unwrap_err();
        assert!(matches!(err, mtp_dtyp::MtpError::Cancelled));
    }

    #[test]
    fn open_session_accepts_already_opened() {
        let mut t = transport();
        t.usb
            .queue_response(ResponseCode::SessionAlreadyOpened.value(), 0, &[]);
        t.open_session(1).unwrap();
    }

    #[test]
    fn open_session_restores_default_timeout_after_start_attempt() {
        let mut t = transport();
        let normal = t.timeouts().default;
        assert_ne!(normal, crate::config::USB_START_TIMEOUT);

        t.usb.queue_response(ResponseCode::Ok.value(), 0, &[]);
        t.open_session(1).unwrap();

        assert_eq!(t.timeouts().default, normal);
    }

    #[test]
    fn split_header_quirk_is_detected() {
        let mut t = transport();
        let payload = vec![3u8; 40];
        t.usb
            .queue_split_header_data_then_response(0x1009, 0, &payload, ResponseCode::Ok.value(), &[]);
        let mut out = Vec::new();
        t.command_receive_data(0x1009, &[], &mut out, None).unwrap();
        assert!(t.split_header_data());
        assert_eq!(out, payload);
    }
}
