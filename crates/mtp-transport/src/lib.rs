//! USB endpoint abstraction and the PTP container transaction state machine
//! (`spec.md` §4.1, §4.3).
//!
//! [`UsbTransport`] is the only seam between this crate and a real USB
//! stack; [`PtpTransport`] drives it through the Command/Data/Response
//! framing, chunking, quirks and cancellation rules that make up the PTP
//! wire protocol.

pub mod chunking;
pub mod config;
pub mod events;
pub mod traits;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use chunking::{context_block_for, ContextBlock};
pub use config::Timeouts;
pub use events::{register_async_event, EventOutcome, InterruptSource, PtpEvent};
pub use traits::UsbTransport;
pub use transport::{PtpTransport, Response};
