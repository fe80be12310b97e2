//! Typed object property values, and the `GetObjectPropList` tagged-value
//! stream (`spec.md` §4.4 "Metadata get/set").
//!
//! Every object property this workspace touches (`spec.md` §3's metadata
//! fields) is either a string or a fixed-width unsigned integer; that
//! closed set is what [`PropValue`] models, keyed by the PTP datatype
//! codes the standard assigns them. We don't query `GetObjectPropDesc`
//! for the datatype of every property we touch — like `libmtp`, the
//! expected datatype per property code is hardcoded (`object_prop_datatype`
//! below), matching the MTP standard's fixed typing of these properties.

use std::io::Cursor;

use binrw::prelude::*;

use mtp_dtyp::{MtpError, ObjectHandle, PtpString, Result};
use mtp_msg::ObjectPropCode;

/// PTP datatype codes for the scalar types object properties use here.
pub mod datatype {
    pub const UINT8: u16 = 0x0002;
    pub const UINT16: u16 = 0x0004;
    pub const UINT32: u16 = 0x0006;
    pub const UINT64: u16 = 0x0008;
    pub const STR: u16 = 0xFFFF;
}

/// A typed object property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl PropValue {
    pub fn datatype(&self) -> u16 {
        match self {
            PropValue::Str(_) => datatype::STR,
            PropValue::U8(_) => datatype::UINT8,
            PropValue::U16(_) => datatype::UINT16,
            PropValue::U32(_) => datatype::UINT32,
            PropValue::U64(_) => datatype::UINT64,
        }
    }

    /// Encodes just the value (no datatype tag) — this is the whole
    /// payload of a `GetObjectPropValue`/`SetObjectPropValue` data phase,
    /// since both sides already agree on the datatype out of band.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            PropValue::Str(s) => {
                let mut buf = Vec::new();
                let mut cursor = Cursor::new(&mut buf);
                PtpString::new(s.as_str())
                    .write_le(&mut cursor)
                    .expect("writing to a Vec cannot fail");
                buf
            }
            PropValue::U8(v) => v.to_le_bytes().to_vec(),
            PropValue::U16(v) => v.to_le_bytes().to_vec(),
            PropValue::U32(v) => v.to_le_bytes().to_vec(),
            PropValue::U64(v) => v.to_le_bytes().to_vec(),
        }
    }

    pub fn decode(dtc: u16, bytes: &[u8]) -> Result<Self> {
        match dtc {
            datatype::STR => {
                let mut cursor = Cursor::new(bytes);
                let s = PtpString::read_le(&mut cursor)?;
                Ok(PropValue::Str(s.into_string()))
            }
            datatype::UINT8 => Ok(PropValue::U8(*bytes
                .first()
                .ok_or_else(|| MtpError::protocol("truncated UINT8 property value"))?)),
            datatype::UINT16 => {
                let arr: [u8; 2] = bytes
                    .get(0..2)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| MtpError::protocol("truncated UINT16 property value"))?;
                Ok(PropValue::U16(u16::from_le_bytes(arr)))
            }
            datatype::UINT32 => {
                let arr: [u8; 4] = bytes
                    .get(0..4)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| MtpError::protocol("truncated UINT32 property value"))?;
                Ok(PropValue::U32(u32::from_le_bytes(arr)))
            }
            datatype::UINT64 => {
                let arr: [u8; 8] = bytes
                    .get(0..8)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| MtpError::protocol("truncated UINT64 property value"))?;
                Ok(PropValue::U64(u64::from_le_bytes(arr)))
            }
            other => Err(MtpError::protocol(format!("unsupported property datatype {other:#06x}"))),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            PropValue::U8(v) => Some(v as u32),
            PropValue::U16(v) => Some(v as u32),
            PropValue::U32(v) => Some(v),
            PropValue::U64(v) => u32::try_from(v).ok(),
            PropValue::Str(_) => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match *self {
            PropValue::U8(v) => Some(v as u16),
            PropValue::U16(v) => Some(v),
            PropValue::U32(v) => u16::try_from(v).ok(),
            PropValue::U64(v) => u16::try_from(v).ok(),
            PropValue::Str(_) => None,
        }
    }
}

/// The hardcoded datatype for each object property this workspace reads
/// or writes (`spec.md` §3 metadata fields).
pub fn object_prop_datatype(code: ObjectPropCode) -> u16 {
    use ObjectPropCode as P;
    match code {
        P::StorageId | P::ParentObject | P::Duration | P::UseCount | P::AudioWaveCodec | P::AudioBitRate => {
            datatype::UINT32
        }
        P::ObjectFormat | P::Width | P::Height | P::Track | P::Rating | P::SampleRate
        | P::NumberOfChannels | P::BitrateType => datatype::UINT16,
        P::ObjectFileName
        | P::DateCreated
        | P::DateModified
        | P::Name
        | P::Artist
        | P::Genre
        | P::AlbumName
        | P::AlbumArtist
        | P::OriginalReleaseDate => datatype::STR,
        _ => datatype::STR,
    }
}

/// One entry of a `GetObjectPropList` response (`spec.md` §4.4 "Bulk").
#[derive(Debug, Clone, PartialEq)]
pub struct PropListEntry {
    pub handle: ObjectHandle,
    pub code: ObjectPropCode,
    pub value: PropValue,
}

/// Parses the `GetObjectPropList` tagged-value stream: a `u32` entry
/// count followed by, per entry, `{handle: u32, prop_code: u16,
/// datatype: u16, value: <datatype-tagged>}` (`spec.md` §4.4 "Bulk").
pub fn parse_object_prop_list(bytes: &[u8]) -> Result<Vec<PropListEntry>> {
    let mut cursor = Cursor::new(bytes);
    let count = u32::read_le(&mut cursor)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let handle = u32::read_le(&mut cursor)?;
        let code = u16::read_le(&mut cursor)?;
        let dtc = u16::read_le(&mut cursor)?;
        let value = match dtc {
            datatype::STR => {
                let s = PtpString::read_le(&mut cursor)?;
                PropValue::Str(s.into_string())
            }
            datatype::UINT8 => {
                let v = u8::read_le(&mut cursor)?;
                PropValue::U8(v)
            }
            datatype::UINT16 => {
                let v = u16::read_le(&mut cursor)?;
                PropValue::U16(v)
            }
            datatype::UINT32 => {
                let v = u32::read_le(&mut cursor)?;
                PropValue::U32(v)
            }
            datatype::UINT64 => {
                let v = u64::read_le(&mut cursor)?;
                PropValue::U64(v)
            }
            other => {
                return Err(MtpError::protocol(format!(
                    "GetObjectPropList: unsupported datatype {other:#06x}"
                )));
            }
        };
        out.push(PropListEntry {
            handle: ObjectHandle::new(handle),
            code: ObjectPropCode::from(code),
            value,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_value_roundtrips() {
        let v = PropValue::Str("Motörhead".to_string());
        let bytes = v.encode();
        let back = PropValue::decode(datatype::STR, &bytes).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn u32_value_roundtrips() {
        let v = PropValue::U32(123456);
        let bytes = v.encode();
        assert_eq!(PropValue::decode(datatype::UINT32, &bytes).unwrap(), v);
    }

    #[test]
    fn parses_prop_list_with_mixed_types() {
        let mut buf = Vec::new();
        2u32.write_le(&mut Cursor::new(&mut buf)).unwrap();

        let mut entry1 = Vec::new();
        10u32.write_le(&mut Cursor::new(&mut entry1)).unwrap();
        ObjectPropCode::Name.value().write_le(&mut Cursor::new(&mut entry1)).unwrap();
        datatype::STR.write_le(&mut Cursor::new(&mut entry1)).unwrap();
        PtpString::new("Party").write_le(&mut Cursor::new(&mut entry1)).unwrap();
        buf.extend_from_slice(&entry1);

        let mut entry2 = Vec::new();
        10u32.write_le(&mut Cursor::new(&mut entry2)).unwrap();
        ObjectPropCode::Duration.value().write_le(&mut Cursor::new(&mut entry2)).unwrap();
        datatype::UINT32.write_le(&mut Cursor::new(&mut entry2)).unwrap();
        180_000u32.write_le(&mut Cursor::new(&mut entry2)).unwrap();
        buf.extend_from_slice(&entry2);

        let entries = parse_object_prop_list(&buf).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value.as_str(), Some("Party"));
        assert_eq!(entries[1].value.as_u32(), Some(180_000));
    }
}
