//! The PTP `ObjectInfo` dataset: the payload of `GetObjectInfo`'s data
//! phase and of `SendObjectInfo`'s outbound data phase (`spec.md` §4.4
//! "Listing operations", "Send / receive content").

use std::io::Cursor;

use binrw::prelude::*;

use mtp_dtyp::{ObjectHandle, Result, StorageId, STORAGE_ROOT_PARENT};
use mtp_msg::ObjectFormatCode;

/// The standard PTP ObjectInfo dataset, field order per the PTP/MTP
/// standard (`spec.md` §3 "ObjectRecord" lists the subset this workspace
/// cares about; the rest round-trip unexamined).
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ObjectInfo {
    pub storage_id: u32,
    pub object_format: u16,
    pub protection_status: u16,
    pub object_compressed_size: u32,
    pub thumb_format: u16,
    pub thumb_compressed_size: u32,
    pub thumb_pix_width: u32,
    pub thumb_pix_height: u32,
    pub image_pix_width: u32,
    pub image_pix_height: u32,
    pub image_bit_depth: u32,
    pub parent_object: u32,
    pub association_type: u16,
    pub association_desc: u32,
    pub sequence_number: u32,
    pub filename: mtp_dtyp::PtpString,
    pub capture_date: mtp_dtyp::PtpString,
    pub modification_date: mtp_dtyp::PtpString,
    pub keywords: mtp_dtyp::PtpString,
}

impl ObjectInfo {
    /// Builds the dataset `SendObjectInfo` needs for a plain file/track
    /// send (`spec.md` §4.4 "Send / receive content").
    ///
    /// `compressed_size == 1` is the magic value the playlist/album
    /// creation dance uses (`spec.md` §4.4, step 2): a literal `0` fails
    /// on some devices, `u32::MAX` on others.
    pub fn new(filename: impl Into<String>, format: ObjectFormatCode, compressed_size: u64) -> Self {
        ObjectInfo {
            storage_id: 0,
            object_format: format.value(),
            protection_status: 0,
            object_compressed_size: compressed_size.min(u32::MAX as u64) as u32,
            thumb_format: 0,
            thumb_compressed_size: 0,
            thumb_pix_width: 0,
            thumb_pix_height: 0,
            image_pix_width: 0,
            image_pix_height: 0,
            image_bit_depth: 0,
            parent_object: 0,
            association_type: 0,
            association_desc: 0,
            sequence_number: 0,
            filename: filename.into().into(),
            capture_date: String::new().into(),
            modification_date: String::new().into(),
            keywords: String::new().into(),
        }
    }

    pub fn with_parent(mut self, parent: Option<ObjectHandle>) -> Self {
        self.parent_object = parent.map(|h| h.value()).unwrap_or(STORAGE_ROOT_PARENT);
        self
    }

    pub fn parent(&self) -> Option<ObjectHandle> {
        if self.parent_object == STORAGE_ROOT_PARENT || self.parent_object == 0 {
            None
        } else {
            Some(ObjectHandle::new(self.parent_object))
        }
    }

    pub fn storage(&self) -> StorageId {
        StorageId::new(self.storage_id)
    }

    pub fn format(&self) -> ObjectFormatCode {
        ObjectFormatCode::from(self.object_format)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);
        self.write(&mut cursor)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        Ok(ObjectInfo::read(&mut cursor)?)
    }
}
