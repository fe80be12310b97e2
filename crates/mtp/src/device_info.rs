//! Cached `GetDeviceInfo`/`GetStorageInfo` results (`spec.md` §3 "DeviceInfo",
//! "StorageDescriptor").

use std::io::Cursor;

use binrw::prelude::*;

use mtp_dtyp::{PtpString, Result, StorageId};

/// Cached result of `GetDeviceInfo`, fetched once per session on `open`.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub standard_version: u16,
    pub vendor_extension_id: u32,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub operations_supported: Vec<u16>,
    pub events_supported: Vec<u16>,
    pub device_properties_supported: Vec<u16>,
    /// The per-format list over which object-property introspection is
    /// valid (`spec.md` §3).
    pub image_formats: Vec<u16>,
    /// `GetDevicePropDesc(BatteryLevel)`, refreshed on demand; absent when
    /// the device doesn't support the property or `BrokenBatteryLevel` is
    /// set (`spec.md` §4.4 "Session lifecycle").
    pub battery_level: Option<u8>,
}

impl DeviceInfo {
    pub fn supports_operation(&self, code: u16) -> bool {
        self.operations_supported.contains(&code)
    }

    pub fn supports_event(&self, code: u16) -> bool {
        self.events_supported.contains(&code)
    }

    /// Parses a `GetDeviceInfo` data phase payload (`spec.md` §6).
    ///
    /// Field order is fixed by the PTP standard: a couple of scalars, a
    /// vendor-extension description string, three `u16`-element arrays, a
    /// capture-formats array (unused here), the image-formats array, and
    /// four identity strings.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let standard_version = u16::read_le(&mut cursor)?;
        let vendor_extension_id = u32::read_le(&mut cursor)?;
        let _vendor_extension_version = u16::read_le(&mut cursor)?;
        let _vendor_extension_desc = PtpString::read_le(&mut cursor)?;
        let _functional_mode = u16::read_le(&mut cursor)?;
        let operations_supported = read_u16_array(&mut cursor)?;
        let events_supported = read_u16_array(&mut cursor)?;
        let device_properties_supported = read_u16_array(&mut cursor)?;
        let _capture_formats = read_u16_array(&mut cursor)?;
        let image_formats = read_u16_array(&mut cursor)?;
        let manufacturer = PtpString::read_le(&mut cursor)?.into_string();
        let model = PtpString::read_le(&mut cursor)?.into_string();
        let firmware_version = PtpString::read_le(&mut cursor)?.into_string();
        let serial_number = PtpString::read_le(&mut cursor)?.into_string();

        Ok(DeviceInfo {
            standard_version,
            vendor_extension_id,
            manufacturer,
            model,
            serial_number,
            firmware_version,
            operations_supported,
            events_supported,
            device_properties_supported,
            image_formats,
            battery_level: None,
        })
    }
}

fn read_u16_array(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u16>> {
    let count = u32::read_le(cursor)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(u16::read_le(cursor)?);
    }
    Ok(out)
}

/// Sort key for [`StorageDescriptor`] ordering within a session
/// (`spec.md` §3 "A device may expose several [storages], ordered by an
/// enumerated sort key").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StorageSortKey(pub u32);

/// One storage (volume) the device exposes.
#[derive(Debug, Clone)]
pub struct StorageDescriptor {
    pub id: StorageId,
    pub description: String,
    pub volume_label: String,
    pub max_capacity: u64,
    pub free_bytes: u64,
    pub access: u16,
    pub storage_type: u16,
    pub filesystem_type: u16,
}

impl StorageDescriptor {
    /// The key storages are ordered by: ascending storage id, matching the
    /// order `GetStorageIDs` reports (`spec.md` §3).
    pub fn sort_key(&self) -> StorageSortKey {
        StorageSortKey(self.id.value())
    }

    /// Parses a `GetStorageInfo` data phase payload. `id` comes from the
    /// enclosing `GetStorageIDs` parameter, not the dataset itself.
    pub fn from_bytes(id: StorageId, bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let storage_type = u16::read_le(&mut cursor)?;
        let filesystem_type = u16::read_le(&mut cursor)?;
        let access = u16::read_le(&mut cursor)?;
        let max_capacity = u64::read_le(&mut cursor)?;
        let free_bytes = u64::read_le(&mut cursor)?;
        let _free_space_in_images = u32::read_le(&mut cursor)?;
        let description = PtpString::read_le(&mut cursor)?.into_string();
        let volume_label = PtpString::read_le(&mut cursor)?.into_string();

        Ok(StorageDescriptor {
            id,
            description,
            volume_label,
            max_capacity,
            free_bytes,
            access,
            storage_type,
            filesystem_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storages_sort_by_id_ascending() {
        let mut storages = vec![
            StorageDescriptor {
                id: StorageId::new(0x0002_0001),
                description: String::new(),
                volume_label: String::new(),
                max_capacity: 0,
                free_bytes: 0,
                access: 0,
                storage_type: 0,
                filesystem_type: 0,
            },
            StorageDescriptor {
                id: StorageId::new(0x0001_0001),
                description: String::new(),
                volume_label: String::new(),
                max_capacity: 0,
                free_bytes: 0,
                access: 0,
                storage_type: 0,
                filesystem_type: 0,
            },
        ];
        storages.sort_by_key(|s| s.sort_key());
        assert_eq!(storages[0].id.value(), 0x0001_0001);
    }

    fn write_array(buf: &mut Vec<u8>, values: &[u16]) {
        buf.extend_from_slice(&(values.len() as u32).to_le_bytes());
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn write_str(buf: &mut Vec<u8>, s: &str) {
        let mut tmp = Vec::new();
        PtpString::new(s).write_le(&mut Cursor::new(&mut tmp)).unwrap();
        buf.extend_from_slice(&tmp);
    }

    #[test]
    fn parses_device_info_payload() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&100u16.to_le_bytes()); // standard_version
        buf.extend_from_slice(&6u32.to_le_bytes()); // vendor_extension_id
        buf.extend_from_slice(&100u16.to_le_bytes()); // vendor_extension_version
        write_str(&mut buf, ""); // vendor_extension_desc
        buf.extend_from_slice(&1u16.to_le_bytes()); // functional_mode
        write_array(&mut buf, &[0x1001, 0x1002]); // operations_supported
        write_array(&mut buf, &[0x4002]); // events_supported
        write_array(&mut buf, &[0x5001]); // device_properties_supported
        write_array(&mut buf, &[]); // capture_formats
        write_array(&mut buf, &[0x3009]); // image_formats
        write_str(&mut buf, "Creative");
        write_str(&mut buf, "Zen Vision W");
        write_str(&mut buf, "1.0");
        write_str(&mut buf, "SN123");

        let info = DeviceInfo::from_bytes(&buf).unwrap();
        assert_eq!(info.model, "Zen Vision W");
        assert_eq!(info.operations_supported, vec![0x1001, 0x1002]);
        assert!(info.supports_operation(0x1002));
        assert_eq!(info.image_formats, vec![0x3009]);
    }

    #[test]
    fn parses_storage_info_payload() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&3u16.to_le_bytes()); // storage_type
        buf.extend_from_slice(&2u16.to_le_bytes()); // filesystem_type
        buf.extend_from_slice(&1u16.to_le_bytes()); // access
        buf.extend_from_slice(&1_000_000u64.to_le_bytes());
        buf.extend_from_slice(&500_000u64.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        write_str(&mut buf, "Internal storage");
        write_str(&mut buf, "MUSICPLAYER");

        let storage = StorageDescriptor::from_bytes(StorageId::new(0x00010001), &buf).unwrap();
        assert_eq!(storage.max_capacity, 1_000_000);
        assert_eq!(storage.volume_label, "MUSICPLAYER");
    }
}
