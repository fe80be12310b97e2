//! Host-side MTP session, object cache and Samsung `.spl` playlist codec
//! (`spec.md` §2 "Module map", layers L3/L4).
//!
//! [`MtpSession`] is the entry point: it owns a `PtpTransport` from
//! [`mtp_transport`], an identified device from [`mtp_registry`], and
//! drives everything above raw container framing — object listing,
//! metadata, playlist/album management, file transfer. The [`spl`] module
//! is a standalone codec the session doesn't call directly; callers read
//! and write `.spl` bytes through it the same way they'd hand raw file
//! content to [`MtpSession::send_file`]/[`MtpSession::get_file`].

pub mod cache;
pub mod device_info;
pub mod folder;
pub mod objectinfo;
pub mod objectprops;
pub mod playlist;
pub mod session;
pub mod spl;

pub use cache::{CacheSnapshot, ObjectCache, ObjectRecord, TrackMetadata};
pub use device_info::{DeviceInfo, StorageDescriptor, StorageSortKey};
pub use folder::{FolderNode, FolderTree, NodeIdx};
pub use objectinfo::ObjectInfo;
pub use objectprops::{PropListEntry, PropValue};
pub use playlist::{playlist_suffix, strip_playlist_suffix, TrackCollection, ALBUM_SUFFIX};
pub use session::{CollectionUpdate, DefaultFolders, MtpSession, SESSION_ID};
pub use spl::{is_spl_playlist, load_spl, save_spl, SplPlaylist};

pub use mtp_dtyp as dtyp;
pub use mtp_msg as msg;
pub use mtp_registry as registry;
pub use mtp_transport as transport;

pub use mtp_dtyp::{ErrorStack, MtpError, ObjectHandle, Result, SessionId, StorageId};
pub use mtp_msg::QuirkFlags;
pub use mtp_registry::CandidateDevice;
pub use mtp_transport::UsbTransport;
