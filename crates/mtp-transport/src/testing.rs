//! An in-memory [`UsbTransport`] double for exercising [`crate::PtpTransport`]
//! without real hardware.
//!
//! Modeled the way the rest of this workspace tests its wire layers: queue
//! up exactly the transfers a device would produce, drive the code under
//! test, then assert on what it wrote.

use std::collections::VecDeque;
use std::time::Duration;

use mtp_dtyp::{MtpError, Result};
use mtp_msg::{ContainerHeader, ContainerKind, ParamContainer, HEADER_LEN};

use crate::traits::UsbTransport;

/// One discrete transfer a real device would complete in a single bulk IN.
type Transfer = Vec<u8>;

pub struct LoopbackTransport {
    in_max: usize,
    out_max: usize,
    in_queue: VecDeque<Transfer>,
    interrupt_queue: VecDeque<Transfer>,
    out_log: Vec<Vec<u8>>,
}

impl LoopbackTransport {
    pub fn new(in_max: usize, out_max: usize) -> Self {
        LoopbackTransport {
            in_max,
            out_max,
            in_queue: VecDeque::new(),
            interrupt_queue: VecDeque::new(),
            out_log: Vec::new(),
        }
    }

    /// Queues a Response container as the next bulk IN transfer.
    pub fn queue_response(&mut self, code: u16, tid: u32, params: &[u32]) {
        let c = ParamContainer::new(ContainerKind::Response, code, tid, params);
        self.in_queue.push_back(c.to_bytes());
    }

    /// Queues a Data container (header immediately followed by `payload`,
    /// as one transfer) and a following Response.
    pub fn queue_data_then_response(
        &mut self,
        code: u16,
        tid: u32,
        payload: &[u8],
        resp_code: u16,
        resp_params: &[u32],
    ) {
        let header = ContainerHeader {
            length: (HEADER_LEN + payload.len()) as u32,
            kind: ContainerKind::Data,
            code,
            transaction_id: tid,
        };
        let mut combined = header.to_bytes().to_vec();
        combined.extend_from_slice(payload);
        self.in_queue.push_back(combined);
        self.queue_response(resp_code, tid, resp_params);
    }

    /// Queues a Data container whose header arrives alone, in its own
    /// short transfer, followed by the payload in a separate transfer —
    /// the split-header device shape (`spec.md` §4.3).
    pub fn queue_split_header_data_then_response(
        &mut self,
        code: u16,
        tid: u32,
        payload: &[u8],
        resp_code: u16,
        resp_params: &[u32],
    ) {
        let header = ContainerHeader {
            length: (HEADER_LEN + payload.len()) as u32,
            kind: ContainerKind::Data,
            code,
            transaction_id: tid,
        };
        self.in_queue.push_back(header.to_bytes().to_vec());
        self.in_queue.push_back(payload.to_vec());
        self.queue_response(resp_code, tid, resp_params);
    }

    pub fn queue_interrupt(&mut self, bytes: Vec<u8>) {
        self.interrupt_queue.push_back(bytes);
    }

    /// The most recent write that parses as a Command container.
    pub fn take_last_command(&self) -> Option<ParamContainer> {
        self.out_log
            .iter()
            .rev()
            .find_map(|bytes| ParamContainer::from_bytes(bytes))
            .filter(|c| c.kind == ContainerKind::Command)
    }

    /// Whether the final bulk OUT write was a zero-length packet.
    pub fn last_send_had_zlp(&self) -> bool {
        matches!(self.out_log.last(), Some(v) if v.is_empty())
    }

    /// The payload bytes written for the most recent Data container
    /// carrying `code`, concatenated across whatever chunks carried it.
    pub fn sent_data_payload_for(&self, code: u16) -> Option<Vec<u8>> {
        let idx = self.out_log.iter().rposition(|bytes| {
            bytes.len() >= HEADER_LEN
                && ContainerHeader::from_bytes(bytes[..HEADER_LEN].try_into().unwrap())
                    .is_some_and(|h| h.kind == ContainerKind::Data && h.code == code)
        })?;
        Some(self.out_log[idx + 1..].concat())
    }
}

impl UsbTransport for LoopbackTransport {
    fn bulk_in(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let Some(mut transfer) = self.in_queue.pop_front() else {
            return Err(MtpError::Timeout);
        };
        if transfer.len() <= buf.len() {
            let n = transfer.len();
            buf[..n].copy_from_slice(&transfer);
            Ok(n)
        } else {
            let remainder = transfer.split_off(buf.len());
            buf.copy_from_slice(&transfer);
            self.in_queue.push_front(remainder);
            Ok(buf.len())
        }
    }

    fn bulk_out(&mut self, buf: &[u8], _timeout: Duration) -> Result<usize> {
        self.out_log.push(buf.to_vec());
        Ok(buf.len())
    }

    fn interrupt_in(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let Some(transfer) = self.interrupt_queue.pop_front() else {
            return Err(MtpError::Timeout);
        };
        let n = transfer.len().min(buf.len());
        buf[..n].copy_from_slice(&transfer[..n]);
        Ok(n)
    }

    fn control(
        &mut self,
        _bm_request_type: u8,
        _b_request: u8,
        _w_value: u16,
        _w_index: u16,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn clear_halt(&mut self, _endpoint: u8) -> Result<()> {
        Ok(())
    }

    fn claim(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }

    fn in_ep_max_packet(&self) -> usize {
        self.in_max
    }

    fn out_ep_max_packet(&self) -> usize {
        self.out_max
    }
}
