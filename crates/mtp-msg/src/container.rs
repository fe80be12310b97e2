//! The PTP USB container wire format (`spec.md` §3 "PtpContainer", §6).
//!
//! ```text
//! offset  size  field
//! 0       4     length (total container bytes incl. header)
//! 4       2     type  (1=Command, 2=Data, 3=Response, 4=Event)
//! 6       2     code  (operation | response | event code)
//! 8       4     transaction_id
//! 12      4*N   parameters (up to 5, Command/Response only)
//! ```
//!
//! `Data` containers carry no parameter words — the 12-byte header is
//! immediately followed by the payload. `Event` containers share the
//! Response shape but always carry exactly 3 parameters and travel on the
//! interrupt endpoint instead of bulk IN.

use binrw::prelude::*;

/// The 12-byte fixed header common to every container.
pub const HEADER_LEN: usize = 12;

/// The maximum number of `u32` parameters a Command or Response container
/// may carry (`spec.md` §3).
pub const MAX_PARAMS: usize = 5;

/// The container's role, from `spec.md` §3/§6.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(repr(u16))]
pub enum ContainerKind {
    Command = 1,
    Data = 2,
    Response = 3,
    Event = 4,
}

/// The fixed 12-byte container header, without parameters or payload.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct ContainerHeader {
    /// Total container length in bytes, including this header.
    pub length: u32,
    pub kind: ContainerKind,
    pub code: u16,
    pub transaction_id: u32,
}

impl ContainerHeader {
    /// Encodes this header to exactly [`HEADER_LEN`] bytes.
    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.length.to_le_bytes());
        out[4..6].copy_from_slice(&(self.kind as u16).to_le_bytes());
        out[6..8].copy_from_slice(&self.code.to_le_bytes());
        out[8..12].copy_from_slice(&self.transaction_id.to_le_bytes());
        out
    }

    /// Decodes a 12-byte header. Returns `None` if `kind` isn't one of the
    /// four known values (`spec.md` §7 `ProtocolViolation`).
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Option<Self> {
        let length = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let kind_raw = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        let kind = match kind_raw {
            1 => ContainerKind::Command,
            2 => ContainerKind::Data,
            3 => ContainerKind::Response,
            4 => ContainerKind::Event,
            _ => return None,
        };
        let code = u16::from_le_bytes(bytes[6..8].try_into().unwrap());
        let transaction_id = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        Some(ContainerHeader {
            length,
            kind,
            code,
            transaction_id,
        })
    }
}

/// A fully-assembled Command or Response container (header + up to 5
/// parameter words, no payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamContainer {
    pub kind: ContainerKind,
    pub code: u16,
    pub transaction_id: u32,
    pub params: Vec<u32>,
}

impl ParamContainer {
    pub fn new(kind: ContainerKind, code: u16, transaction_id: u32, params: &[u32]) -> Self {
        debug_assert!(params.len() <= MAX_PARAMS);
        ParamContainer {
            kind,
            code,
            transaction_id,
            params: params.to_vec(),
        }
    }

    /// Encodes the container onto the wire. Trailing unused parameter slots
    /// are omitted, not zero-padded (`spec.md` §4.3 "Command phase").
    ///
    /// A zero-parameter container is exactly 12 bytes; a five-parameter
    /// container is exactly 32 bytes (`spec.md` §8 "Boundary behaviors").
    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.params.len().min(MAX_PARAMS);
        let length = (HEADER_LEN + 4 * n) as u32;
        let header = ContainerHeader {
            length,
            kind: self.kind,
            code: self.code,
            transaction_id: self.transaction_id,
        };
        let mut out = Vec::with_capacity(length as usize);
        out.extend_from_slice(&header.to_bytes());
        for p in self.params.iter().take(n) {
            out.extend_from_slice(&p.to_le_bytes());
        }
        out
    }

    /// Decodes a complete Command/Response container from `bytes`, whose
    /// length must match the header's own `length` field.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let header = ContainerHeader::from_bytes(bytes[0..HEADER_LEN].try_into().unwrap())?;
        let param_bytes = &bytes[HEADER_LEN..];
        if param_bytes.len() % 4 != 0 {
            return None;
        }
        let params = param_bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        Some(ParamContainer {
            kind: header.kind,
            code: header.code,
            transaction_id: header.transaction_id,
            params,
        })
    }
}
