//! PTP/MTP wire codes and container framing (`spec.md` §3, §6).
//!
//! This crate has no I/O of its own — it's the vocabulary `mtp-transport`
//! and `mtp` build the actual state machine from.

pub mod codes;
pub mod container;
pub mod quirks;

pub use codes::{DevicePropCode, EventCode, ObjectFormatCode, ObjectPropCode, OperationCode, ResponseCode};
pub use container::{ContainerHeader, ContainerKind, ParamContainer, HEADER_LEN, MAX_PARAMS};
pub use quirks::QuirkFlags;
