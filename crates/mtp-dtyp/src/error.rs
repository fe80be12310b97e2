//! Shared error model.
//!
//! All fallible operations across the workspace resolve to [`MtpError`]. The
//! variants mirror the error kinds of `spec.md` §7: transport failures,
//! non-`OK` device responses, wire-shape violations, cancellation, timeouts,
//! operations the device doesn't advertise, and bad caller input.

use std::io;

/// The result type used throughout the `mtp-rs` workspace.
pub type Result<T> = std::result::Result<T, MtpError>;

/// A structured error, as produced by the transport or session layers.
///
/// Mutating [`MtpSession`](https://docs.rs/mtp) operations record one of
/// these on the session's [`ErrorStack`] rather than panicking; callers can
/// drain the stack to render diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum MtpError {
    /// A USB transfer failed: timed out, stalled, or the endpoint closed.
    #[error("USB I/O error: {0}")]
    UsbIo(#[from] io::Error),

    /// The device returned a non-`OK` Response container.
    #[error("device returned response code {code:#06x} ({context})")]
    PtpResponse {
        /// The raw PTP response code.
        code: u16,
        /// What operation produced this response, for diagnostics.
        context: &'static str,
    },

    /// A container's shape, code, or transaction id didn't make sense, and
    /// the active quirk set didn't authorize repairing it.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A caller-installed progress callback requested cancellation.
    #[error("operation cancelled")]
    Cancelled,

    /// No data arrived within the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// The device's `DeviceInfo.operations_supported` doesn't list the
    /// requested operation; the layer failed fast without a round trip.
    #[error("operation {0:#06x} is not supported by this device")]
    Unsupported(u16),

    /// A caller passed a handle, path, or argument that can't be valid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failed to decode a `binrw`-framed structure.
    #[error("malformed container: {0}")]
    Decode(#[from] binrw::Error),
}

impl MtpError {
    /// Shorthand for [`MtpError::PtpResponse`].
    pub fn ptp_response(code: u16, context: &'static str) -> Self {
        MtpError::PtpResponse { code, context }
    }

    /// Shorthand for [`MtpError::ProtocolViolation`].
    pub fn protocol(msg: impl Into<String>) -> Self {
        MtpError::ProtocolViolation(msg.into())
    }

    /// Shorthand for [`MtpError::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        MtpError::InvalidArgument(msg.into())
    }

    /// The §7 "kind" discriminant, independent of the attached message —
    /// used by [`ErrorRecord`] so the stack can be inspected without
    /// matching on display text.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MtpError::UsbIo(_) => ErrorKind::UsbIo,
            MtpError::PtpResponse { .. } => ErrorKind::PtpResponse,
            MtpError::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            MtpError::Cancelled => ErrorKind::Cancelled,
            MtpError::Timeout => ErrorKind::Timeout,
            MtpError::Unsupported(_) => ErrorKind::Unsupported,
            MtpError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            MtpError::Decode(_) => ErrorKind::ProtocolViolation,
        }
    }
}

/// The §7 error kind, detached from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UsbIo,
    PtpResponse,
    ProtocolViolation,
    Cancelled,
    Timeout,
    Unsupported,
    InvalidArgument,
}

/// One entry on a session's [`ErrorStack`].
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub text: String,
    /// The raw PTP response code, when `kind == PtpResponse`.
    pub ptp_code: Option<u16>,
}

impl ErrorRecord {
    pub fn from_error(err: &MtpError) -> Self {
        let ptp_code = match err {
            MtpError::PtpResponse { code, .. } => Some(*code),
            _ => None,
        };
        ErrorRecord {
            kind: err.kind(),
            text: err.to_string(),
            ptp_code,
        }
    }
}

/// Per-session FIFO of structured error records (`spec.md` §2, §7).
///
/// Surrounding front-ends drain this to render diagnostics; the library
/// itself never panics on a recoverable device/protocol error.
#[derive(Debug, Default)]
pub struct ErrorStack {
    records: std::collections::VecDeque<ErrorRecord>,
}

impl ErrorStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `err` at the back of the stack and returns it unchanged, so
    /// call sites can `return Err(stack.push(err))`.
    pub fn push(&mut self, err: MtpError) -> MtpError {
        self.records.push_back(ErrorRecord::from_error(&err));
        err
    }

    /// Drains and returns every recorded error, oldest first.
    pub fn drain(&mut self) -> Vec<ErrorRecord> {
        self.records.drain(..).collect()
    }

    /// Returns the most recently pushed record without removing it.
    pub fn last(&self) -> Option<&ErrorRecord> {
        self.records.back()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_drain_preserve_order() {
        let mut stack = ErrorStack::new();
        stack.push(MtpError::Timeout);
        stack.push(MtpError::ptp_response(0x2009, "GetObjectInfo"));

        assert_eq!(stack.len(), 2);
        let drained = stack.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, ErrorKind::Timeout);
        assert_eq!(drained[1].kind, ErrorKind::PtpResponse);
        assert_eq!(drained[1].ptp_code, Some(0x2009));
        assert!(stack.is_empty());
    }

    #[test]
    fn last_does_not_remove() {
        let mut stack = ErrorStack::new();
        stack.push(MtpError::Cancelled);
        assert!(stack.last().is_some());
        assert_eq!(stack.len(), 1);
    }
}
