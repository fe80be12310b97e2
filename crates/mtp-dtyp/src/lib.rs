//! Core data types shared across the `mtp-rs` workspace.
//!
//! This crate has no knowledge of USB or of specific PTP/MTP operations —
//! it is the home for identifier newtypes, the wire string encoding, and
//! the error model every other crate in the workspace builds on.

pub mod error;
pub mod ids;
pub mod strings;

pub use error::{ErrorKind, ErrorRecord, ErrorStack, MtpError, Result};
pub use ids::{ObjectHandle, SessionId, StorageId, TransactionId, ALL, STORAGE_ROOT_PARENT};
pub use strings::PtpString;
