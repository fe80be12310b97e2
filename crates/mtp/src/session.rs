//! The MTP session layer (`spec.md` §4.4 "MtpSession").
//!
//! [`MtpSession`] owns one [`PtpTransport`], the object handle cache, the
//! per-session error stack, and the default-folder hints discovered on
//! open. It is the only layer that knows what a "playlist" or a "track" is
//! — everything below here just moves containers and bytes.

use std::collections::HashMap;
use std::io::Write;

use binrw::prelude::*;

use mtp_dtyp::{ErrorStack, MtpError, ObjectHandle, Result, StorageId, ALL, STORAGE_ROOT_PARENT};
use mtp_msg::{DevicePropCode, ObjectFormatCode, ObjectPropCode, OperationCode, QuirkFlags, ResponseCode};
use mtp_registry::CandidateDevice;
use mtp_transport::transport::ProgressFn;
use mtp_transport::{PtpTransport, Response, UsbTransport};

use crate::cache::{ObjectCache, ObjectRecord, TrackMetadata};
use crate::device_info::{DeviceInfo, StorageDescriptor};
use crate::folder::FolderTree;
use crate::objectinfo::ObjectInfo;
use crate::objectprops::{object_prop_datatype, parse_object_prop_list, PropListEntry, PropValue};
use crate::playlist::{playlist_suffix, strip_playlist_suffix, TrackCollection, ALBUM_SUFFIX};

/// The host-chosen session id this workspace always opens with (`spec.md`
/// §3 "SessionId": "a u32 chosen by the host, nonzero").
pub const SESSION_ID: u32 = 1;

/// Object property codes this workspace reads or writes as track metadata,
/// in the order the enhanced discovery path queries them (`spec.md` §4.4
/// "Metadata get/set").
const METADATA_PROP_CODES: &[ObjectPropCode] = &[
    ObjectPropCode::Name,
    ObjectPropCode::Artist,
    ObjectPropCode::AlbumName,
    ObjectPropCode::Genre,
    ObjectPropCode::OriginalReleaseDate,
    ObjectPropCode::DateCreated,
    ObjectPropCode::Duration,
    ObjectPropCode::Track,
    ObjectPropCode::SampleRate,
    ObjectPropCode::NumberOfChannels,
    ObjectPropCode::AudioBitRate,
    ObjectPropCode::Rating,
    ObjectPropCode::UseCount,
    ObjectPropCode::AudioWaveCodec,
    ObjectPropCode::BitrateType,
];

/// Default-folder hints discovered on `open` by name (`spec.md` §4.4
/// "Session lifecycle"; `SPEC_FULL.md` §4 "Default folder discovery").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultFolders {
    pub music: Option<ObjectHandle>,
    pub playlists: Option<ObjectHandle>,
    pub pictures: Option<ObjectHandle>,
    pub video: Option<ObjectHandle>,
    pub organizer: Option<ObjectHandle>,
    pub zencast: Option<ObjectHandle>,
}

/// Outcome of a playlist/album update (`spec.md` §4.4 "Playlist/album
/// update"): a pure rename leaves the handle untouched, a track-list change
/// deletes and recreates the object under a new handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionUpdate {
    Renamed,
    Recreated(ObjectHandle),
}

/// An open MTP session over one device (`spec.md` §2 "MtpSession").
pub struct MtpSession<T: UsbTransport> {
    transport: PtpTransport<T>,
    device_info: DeviceInfo,
    storages: Vec<StorageDescriptor>,
    cache: ObjectCache,
    /// The device's `GetObjectHandles` enumeration order from the last
    /// flush — the cache itself is unordered, but `FolderTree` sibling
    /// order and default-folder discovery both need it (`spec.md` §3
    /// "FolderTree").
    handle_order: Vec<ObjectHandle>,
    default_folders: DefaultFolders,
    /// `GetObjectPropsSupported` results, cached per format code for the
    /// lifetime of the session (`spec.md` §4.4 "Enhanced" discovery).
    props_supported: HashMap<u16, Vec<u16>>,
    errors: ErrorStack,
}

impl<T: UsbTransport> MtpSession<T> {
    /// Opens a session on `usb` against the identification `device`
    /// already decided on (`spec.md` §4.4 "Session lifecycle"): claim the
    /// interface, run the BlackBerry mode-switch quirk if flagged, open the
    /// PTP session, fetch `DeviceInfo` and storages, fetch the battery
    /// level unless broken, then flush handles once and scan for default
    /// folders.
    pub fn open(mut usb: T, device: &CandidateDevice) -> Result<Self> {
        usb.claim()?;
        let mut transport = PtpTransport::new(usb, device.quirks, device.id.vid, device.id.pid);

        if device.quirks.contains(QuirkFlags::SWITCH_MODE_BLACKBERRY) {
            transport.switch_mode_blackberry()?;
        }

        transport.open_session(SESSION_ID)?;

        let mut session = MtpSession {
            transport,
            device_info: DeviceInfo::default(),
            storages: Vec::new(),
            cache: ObjectCache::new(),
            handle_order: Vec::new(),
            default_folders: DefaultFolders::default(),
            props_supported: HashMap::new(),
            errors: ErrorStack::new(),
        };

        let info_bytes = session.get_data(OperationCode::GetDeviceInfo.value(), &[], "GetDeviceInfo")?;
        session.device_info = DeviceInfo::from_bytes(&info_bytes)?;

        session.fetch_storages()?;

        if !device.quirks.contains(QuirkFlags::BROKEN_BATTERY_LEVEL)
            && session
                .device_info
                .supports_operation(OperationCode::GetDevicePropDesc.value())
        {
            if let Ok(level) = session.fetch_battery_level() {
                session.device_info.battery_level = Some(level);
            }
        }

        session.flush_handles()?;
        session.discover_default_folders();

        Ok(session)
    }

    /// `CloseSession`, release per quirks, optional reset (`spec.md` §4.4
    /// "Session lifecycle"). Returns the underlying transport so the
    /// caller can reuse or drop it.
    pub fn close(mut self) -> Result<T> {
        let _ = self.transport.close_session();
        if !self.transport.quirks().contains(QuirkFlags::NO_RELEASE_INTERFACE) {
            let _ = self.transport.release();
        }
        if self.transport.quirks().contains(QuirkFlags::FORCE_RESET_ON_CLOSE) {
            let _ = self.transport.reset_usb();
        }
        Ok(self.transport.into_inner())
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn storages(&self) -> &[StorageDescriptor] {
        &self.storages
    }

    pub fn default_folders(&self) -> DefaultFolders {
        self.default_folders
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    pub fn errors(&mut self) -> &mut ErrorStack {
        &mut self.errors
    }

    /// The derived folder tree, rebuilt from the last flush's handle order
    /// (`spec.md` §3 "FolderTree").
    pub fn folder_tree(&self) -> FolderTree {
        FolderTree::build(&self.handle_order, &self.cache)
    }

    fn fail(&mut self, err: MtpError) -> MtpError {
        self.errors.push(err)
    }

    /// Runs a data-bearing command and checks for an `OK` response,
    /// pushing any failure onto the error stack (`spec.md` §4.4 "Failure
    /// semantics").
    fn get_data(&mut self, code: u16, params: &[u32], context: &'static str) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let resp = match self.transport.command_receive_data(code, params, &mut buf, None) {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };
        if resp.code != ResponseCode::Ok.value() {
            return Err(self.fail(MtpError::ptp_response(resp.code, context)));
        }
        Ok(buf)
    }

    fn cmd(&mut self, code: u16, params: &[u32], context: &'static str) -> Result<Response> {
        let resp = match self.transport.command(code, params) {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };
        if resp.code != ResponseCode::Ok.value() {
            return Err(self.fail(MtpError::ptp_response(resp.code, context)));
        }
        Ok(resp)
    }

    fn send_fixed(&mut self, code: u16, params: &[u32], payload: &[u8], context: &'static str) -> Result<Response> {
        let resp = match self.transport.command_send_data(code, params, payload) {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };
        if resp.code != ResponseCode::Ok.value() {
            return Err(self.fail(MtpError::ptp_response(resp.code, context)));
        }
        Ok(resp)
    }

    fn fetch_storages(&mut self) -> Result<()> {
        let bytes = self.get_data(OperationCode::GetStorageIDs.value(), &[], "GetStorageIDs")?;
        let ids = read_u32_array(&bytes)?;
        let mut storages = Vec::with_capacity(ids.len());
        for id in ids {
            let info_bytes = self.get_data(OperationCode::GetStorageInfo.value(), &[id], "GetStorageInfo")?;
            storages.push(StorageDescriptor::from_bytes(StorageId::new(id), &info_bytes)?);
        }
        storages.sort_by_key(|s| s.sort_key());
        self.storages = storages;
        Ok(())
    }

    fn fetch_battery_level(&mut self) -> Result<u8> {
        let bytes = self.get_data(
            OperationCode::GetDevicePropDesc.value(),
            &[DevicePropCode::BatteryLevel.value() as u32],
            "GetDevicePropDesc(BatteryLevel)",
        )?;
        parse_device_prop_current_u8(&bytes)
    }

    /// The "flush handles" procedure (`spec.md` §4.4 "Handle cache"):
    /// `GetObjectHandles(ALL, ALL, ALL)`, `GetObjectInfo` per handle, then
    /// drop anything the device no longer reports. Returns the device's
    /// enumeration order.
    pub fn flush_handles(&mut self) -> Result<Vec<ObjectHandle>> {
        let bytes = self.get_data(
            OperationCode::GetObjectHandles.value(),
            &[ALL, ALL, ALL],
            "GetObjectHandles",
        )?;
        let handles: Vec<ObjectHandle> = read_u32_array(&bytes)?.into_iter().map(ObjectHandle::new).collect();

        for &handle in &handles {
            match self.fetch_object_info(handle) {
                Ok(info) => self.cache.upsert(object_record_from_info(handle, info)),
                Err(MtpError::PtpResponse { code, .. }) if code == ResponseCode::InvalidObjectHandle.value() => {
                    log::warn!("flush_handles: device enumerated handle {handle} but GetObjectInfo rejected it");
                }
                Err(e) => return Err(e),
            }
        }

        self.cache.flush(&handles);
        self.handle_order = handles.clone();
        Ok(handles)
    }

    fn fetch_object_info(&mut self, handle: ObjectHandle) -> Result<ObjectInfo> {
        let bytes = self.get_data(OperationCode::GetObjectInfo.value(), &[handle.value()], "GetObjectInfo")?;
        ObjectInfo::from_bytes(&bytes)
    }

    /// Scans the last flush's handle order for folders named `Music`, `My
    /// Playlists`, `Pictures`, `Video`, `My Organizer`, `ZENcast`, stopping
    /// once all six are found (`spec.md` §4.4 "Session lifecycle").
    fn discover_default_folders(&mut self) {
        let mut folders = DefaultFolders::default();
        let mut remaining = 6u32;
        let order = self.handle_order.clone();

        for handle in order {
            if remaining == 0 {
                break;
            }
            let Some(record) = self.cache.get(handle) else {
                continue;
            };
            if !record.is_folder() {
                continue;
            }
            let name = record.filename.as_str();
            if folders.music.is_none() && name.eq_ignore_ascii_case("Music") {
                folders.music = Some(handle);
                remaining -= 1;
            } else if folders.playlists.is_none() && name.eq_ignore_ascii_case("My Playlists") {
                folders.playlists = Some(handle);
                remaining -= 1;
            } else if folders.pictures.is_none() && name.eq_ignore_ascii_case("Pictures") {
                folders.pictures = Some(handle);
                remaining -= 1;
            } else if folders.video.is_none() && name.eq_ignore_ascii_case("Video") {
                folders.video = Some(handle);
                remaining -= 1;
            } else if folders.organizer.is_none() && name.eq_ignore_ascii_case("My Organizer") {
                folders.organizer = Some(handle);
                remaining -= 1;
            } else if folders.zencast.is_none() && name.eq_ignore_ascii_case("ZENcast") {
                folders.zencast = Some(handle);
                remaining -= 1;
            }
        }

        self.default_folders = folders;
    }

    // --- Listing operations (`spec.md` §4.4 "Listing operations") ---

    pub fn list_files(&self) -> Vec<ObjectRecord> {
        self.cache.iter().filter(|r| !r.is_folder()).cloned().collect()
    }

    pub fn list_folders(&self) -> FolderTree {
        self.folder_tree()
    }

    /// Enriches every cached audio object with metadata before returning
    /// the list (`spec.md` §4.4 "list_tracks").
    pub fn list_tracks(&mut self) -> Result<Vec<ObjectRecord>> {
        let handles: Vec<ObjectHandle> = self.cache.iter().filter(|r| r.is_audio()).map(|r| r.handle).collect();
        for handle in handles {
            let metadata = self.get_track_metadata(handle)?;
            if let Some(record) = self.cache.get_mut(handle) {
                record.metadata = Some(metadata);
            }
        }
        Ok(self.cache.iter().filter(|r| r.is_audio()).cloned().collect())
    }

    pub fn list_playlists(&mut self) -> Result<Vec<TrackCollection>> {
        self.list_collections(ObjectRecord::is_playlist)
    }

    pub fn list_albums(&mut self) -> Result<Vec<TrackCollection>> {
        self.list_collections(ObjectRecord::is_album)
    }

    fn list_collections(&mut self, pred: fn(&ObjectRecord) -> bool) -> Result<Vec<TrackCollection>> {
        let handles: Vec<ObjectHandle> = self.cache.iter().filter(|r| pred(r)).map(|r| r.handle).collect();
        let mut out = Vec::with_capacity(handles.len());

        for handle in handles {
            let refs = self.get_object_references(handle)?;
            let record = self
                .cache
                .get(handle)
                .expect("handle was just listed from this same cache");
            out.push(TrackCollection {
                handle: Some(handle),
                name: strip_playlist_suffix(&record.filename).to_string(),
                parent: record.parent,
                storage_id: record.storage_id,
                tracks: refs.clone(),
            });
            if let Some(record) = self.cache.get_mut(handle) {
                record.references = Some(refs);
            }
        }

        Ok(out)
    }

    fn get_object_references(&mut self, handle: ObjectHandle) -> Result<Vec<ObjectHandle>> {
        let bytes = self.get_data(
            OperationCode::GetObjectReferences.value(),
            &[handle.value()],
            "GetObjectReferences",
        )?;
        Ok(read_u32_array(&bytes)?.into_iter().map(ObjectHandle::new).collect())
    }

    fn set_object_references(&mut self, handle: ObjectHandle, tracks: &[ObjectHandle]) -> Result<()> {
        let mut payload = Vec::with_capacity(4 + tracks.len() * 4);
        payload.extend_from_slice(&(tracks.len() as u32).to_le_bytes());
        for t in tracks {
            payload.extend_from_slice(&t.value().to_le_bytes());
        }
        self.send_fixed(
            OperationCode::SetObjectReferences.value(),
            &[handle.value()],
            &payload,
            "SetObjectReferences",
        )?;
        Ok(())
    }

    // --- Metadata get/set (`spec.md` §4.4 "Metadata get/set") ---

    /// Fetches one object's track metadata, preferring the bulk
    /// `GetObjectPropList` path unless `BrokenObjectPropListAll` is set or
    /// the device rejects it, in which case it falls back to the enhanced
    /// per-property path (`spec.md` §4.4 "Enhanced"/"Bulk").
    pub fn get_track_metadata(&mut self, handle: ObjectHandle) -> Result<TrackMetadata> {
        let format = self
            .cache
            .get(handle)
            .map(|r| r.format_code)
            .unwrap_or(ObjectFormatCode::Undefined);

        if !self.transport.quirks().contains(QuirkFlags::BROKEN_OBJECT_PROP_LIST_ALL) {
            if let Ok(entries) = self.get_object_prop_list_all(handle) {
                return Ok(track_metadata_from_entries(&entries));
            }
        }

        self.get_track_metadata_enhanced(handle, format)
    }

    fn get_object_prop_list_all(&mut self, handle: ObjectHandle) -> Result<Vec<PropListEntry>> {
        const ALL_PROPS: u32 = 0xFFFF_FFFF;
        let bytes = self.get_data(
            OperationCode::GetObjectPropList.value(),
            &[handle.value(), 0, ALL_PROPS, 0, 0],
            "GetObjectPropList",
        )?;
        parse_object_prop_list(&bytes)
    }

    fn get_track_metadata_enhanced(&mut self, handle: ObjectHandle, format: ObjectFormatCode) -> Result<TrackMetadata> {
        let supported = self.object_props_supported(format)?;
        let mut meta = TrackMetadata::default();

        for code in METADATA_PROP_CODES {
            if !supported.contains(&code.value()) {
                continue;
            }
            match self.get_object_prop_value(handle, *code) {
                Ok(value) => apply_prop_to_metadata(&mut meta, *code, &value),
                Err(MtpError::PtpResponse { code: rc, .. }) if rc == ResponseCode::OperationNotSupported.value() => {}
                Err(e) => return Err(e),
            }
        }

        Ok(meta)
    }

    fn object_props_supported(&mut self, format: ObjectFormatCode) -> Result<Vec<u16>> {
        if let Some(list) = self.props_supported.get(&format.value()) {
            return Ok(list.clone());
        }
        let bytes = self.get_data(
            OperationCode::GetObjectPropsSupported.value(),
            &[format.value() as u32],
            "GetObjectPropsSupported",
        )?;
        let list = read_u16_array(&bytes)?;
        self.props_supported.insert(format.value(), list.clone());
        Ok(list)
    }

    fn get_object_prop_value(&mut self, handle: ObjectHandle, code: ObjectPropCode) -> Result<PropValue> {
        let bytes = self.get_data(
            OperationCode::GetObjectPropValue.value(),
            &[handle.value(), code.value() as u32],
            "GetObjectPropValue",
        )?;
        PropValue::decode(object_prop_datatype(code), &bytes)
    }

    /// Sets one property and mirrors the change into the cached metadata,
    /// if any is held (`spec.md` §4.4 "Metadata get/set").
    pub fn set_object_prop_value(&mut self, handle: ObjectHandle, code: ObjectPropCode, value: &PropValue) -> Result<()> {
        let payload = value.encode();
        self.send_fixed(
            OperationCode::SetObjectPropValue.value(),
            &[handle.value(), code.value() as u32],
            &payload,
            "SetObjectPropValue",
        )?;

        if let Some(record) = self.cache.get_mut(handle) {
            let meta = record.metadata.get_or_insert_with(TrackMetadata::default);
            apply_prop_to_metadata(meta, code, value);
        }

        Ok(())
    }

    /// Sets every non-empty/non-zero field of `metadata` (`spec.md` §4.4
    /// "Setting metadata is symmetric").
    pub fn set_track_metadata(&mut self, handle: ObjectHandle, metadata: &TrackMetadata) -> Result<()> {
        if let Some(v) = metadata.title.as_ref().filter(|s| !s.is_empty()) {
            self.set_object_prop_value(handle, ObjectPropCode::Name, &PropValue::Str(v.clone()))?;
        }
        if let Some(v) = metadata.artist.as_ref().filter(|s| !s.is_empty()) {
            self.set_object_prop_value(handle, ObjectPropCode::Artist, &PropValue::Str(v.clone()))?;
        }
        if let Some(v) = metadata.album.as_ref().filter(|s| !s.is_empty()) {
            self.set_object_prop_value(handle, ObjectPropCode::AlbumName, &PropValue::Str(v.clone()))?;
        }
        if let Some(v) = metadata.genre.as_ref().filter(|s| !s.is_empty()) {
            self.set_object_prop_value(handle, ObjectPropCode::Genre, &PropValue::Str(v.clone()))?;
        }
        if let Some(v) = metadata.date.as_ref().filter(|s| !s.is_empty()) {
            self.set_object_prop_value(handle, ObjectPropCode::OriginalReleaseDate, &PropValue::Str(v.clone()))?;
        }
        if let Some(v) = metadata.duration_ms.filter(|v| *v != 0) {
            self.set_object_prop_value(handle, ObjectPropCode::Duration, &PropValue::U32(v))?;
        }
        if let Some(v) = metadata.tracknumber.filter(|v| *v != 0) {
            self.set_object_prop_value(handle, ObjectPropCode::Track, &PropValue::U16(v))?;
        }
        if let Some(v) = metadata.samplerate.filter(|v| *v != 0) {
            self.set_object_prop_value(handle, ObjectPropCode::SampleRate, &PropValue::U32(v))?;
        }
        if let Some(v) = metadata.channels.filter(|v| *v != 0) {
            self.set_object_prop_value(handle, ObjectPropCode::NumberOfChannels, &PropValue::U16(v))?;
        }
        if let Some(v) = metadata.bitrate.filter(|v| *v != 0) {
            self.set_object_prop_value(handle, ObjectPropCode::AudioBitRate, &PropValue::U32(v))?;
        }
        if let Some(v) = metadata.rating.filter(|v| *v != 0) {
            self.set_object_prop_value(handle, ObjectPropCode::Rating, &PropValue::U16(v))?;
        }
        Ok(())
    }

    // --- Playlist/album creation and update
    //     (`spec.md` §4.4 "Playlist/album creation protocol") ---

    pub fn create_playlist(
        &mut self,
        name: &str,
        parent: Option<ObjectHandle>,
        tracks: &[ObjectHandle],
    ) -> Result<ObjectHandle> {
        let parent = parent.or(self.default_folders.playlists);
        self.create_collection(name, ObjectFormatCode::AbstractAudioVideoPlaylist, parent, tracks)
    }

    pub fn create_album(&mut self, name: &str, parent: Option<ObjectHandle>, tracks: &[ObjectHandle]) -> Result<ObjectHandle> {
        let parent = parent.or(self.default_folders.music);
        self.create_collection(name, ObjectFormatCode::AbstractAudioAlbum, parent, tracks)
    }

    /// The five-step dance plus a final flush (`spec.md` §4.4): compose the
    /// suffixed filename, `SendObjectInfo` with the magic `compressed_size
    /// = 1`, `SendObject` with one zero byte, set the real `Name`, set
    /// references if any, flush handles.
    fn create_collection(
        &mut self,
        name: &str,
        format: ObjectFormatCode,
        parent: Option<ObjectHandle>,
        tracks: &[ObjectHandle],
    ) -> Result<ObjectHandle> {
        let suffix = if format == ObjectFormatCode::AbstractAudioAlbum {
            ALBUM_SUFFIX
        } else {
            playlist_suffix(self.transport.quirks())
        };
        let filename = format!("{name}{suffix}");
        let parent_param = parent.map(|h| h.value()).unwrap_or(STORAGE_ROOT_PARENT);

        let info = ObjectInfo::new(filename, format, 1).with_parent(parent);
        let send_info_resp = self.send_fixed(
            OperationCode::SendObjectInfo.value(),
            &[0, parent_param],
            &info.to_bytes()?,
            "SendObjectInfo",
        )?;
        let handle = *send_info_resp
            .params
            .get(2)
            .ok_or_else(|| MtpError::protocol("SendObjectInfo response missing new object handle"))?;
        let handle = ObjectHandle::new(handle);

        // Exactly one zero byte — omitting this causes the device to
        // discard the object silently (`spec.md` §4.4, step 3).
        self.send_fixed(OperationCode::SendObject.value(), &[], &[0u8], "SendObject")?;

        self.set_object_prop_value(handle, ObjectPropCode::Name, &PropValue::Str(name.to_string()))?;

        if !tracks.is_empty() {
            self.set_object_references(handle, tracks)?;
        }

        self.flush_handles()?;
        Ok(handle)
    }

    pub fn update_playlist(&mut self, collection: &TrackCollection, new_tracks: &[ObjectHandle]) -> Result<CollectionUpdate> {
        self.update_collection(collection, ObjectFormatCode::AbstractAudioVideoPlaylist, new_tracks)
    }

    pub fn update_album(&mut self, collection: &TrackCollection, new_tracks: &[ObjectHandle]) -> Result<CollectionUpdate> {
        self.update_collection(collection, ObjectFormatCode::AbstractAudioAlbum, new_tracks)
    }

    /// If the track list is unchanged, only the name is updated in place;
    /// otherwise the collection is deleted and recreated under a new
    /// handle, which the caller must adopt (`spec.md` §4.4 "Playlist/album
    /// update").
    fn update_collection(
        &mut self,
        collection: &TrackCollection,
        format: ObjectFormatCode,
        new_tracks: &[ObjectHandle],
    ) -> Result<CollectionUpdate> {
        let handle = collection
            .handle
            .ok_or_else(|| MtpError::invalid_argument("collection has no handle to update"))?;

        if new_tracks == collection.tracks.as_slice() {
            self.set_object_prop_value(handle, ObjectPropCode::Name, &PropValue::Str(collection.name.clone()))?;
            return Ok(CollectionUpdate::Renamed);
        }

        self.delete_object(handle)?;
        let new_handle = self.create_collection(&collection.name, format, collection.parent, new_tracks)?;
        Ok(CollectionUpdate::Recreated(new_handle))
    }

    /// `DeleteObject`, followed by a flush (`spec.md` §3 invariant: every
    /// mutating operation that adds or removes an object must flush).
    pub fn delete_object(&mut self, handle: ObjectHandle) -> Result<()> {
        self.cmd(OperationCode::DeleteObject.value(), &[handle.value(), 0], "DeleteObject")?;
        self.cache.remove(handle);
        self.flush_handles()?;
        Ok(())
    }

    /// Whether `handle` currently exists on the device, refreshing the
    /// cache first if it isn't already known.
    ///
    /// Conventional polarity: `true` means "exists". The C source this is
    /// grounded on (`LIBMTP_Track_Exists`) returns the opposite sense
    /// (`-1`/`0`); that inversion is not reproduced here (`spec.md` §9
    /// "Open Question", see `DESIGN.md`).
    pub fn object_exists(&mut self, handle: ObjectHandle) -> Result<bool> {
        if self.cache.contains(handle) {
            return Ok(true);
        }
        self.flush_handles()?;
        Ok(self.cache.contains(handle))
    }

    // --- Send / receive content
    //     (`spec.md` §4.4 "Send / receive content") ---

    /// Sends `data` as a new object (`spec.md` §4.4 "send_file"). The
    /// whole payload is taken in memory rather than as a generic `Read`:
    /// the wire protocol already requires the size up front in
    /// `ObjectInfo`, and the progress-reporting send path below is
    /// fixed-size only.
    ///
    /// `format` is remapped to `UndefinedAudio` under `OggIsUnknown`/
    /// `FlacIsUnknown`, and `filename` has non-ASCII bytes stripped under
    /// `Only7BitFilenames` (`spec.md` §4.2), before either reaches the
    /// `ObjectInfo` sent to the device.
    pub fn send_file(
        &mut self,
        data: &[u8],
        filename: &str,
        format: ObjectFormatCode,
        parent: Option<ObjectHandle>,
        metadata: Option<&TrackMetadata>,
        progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<ObjectHandle> {
        let parent = parent.or_else(|| self.default_parent_for(format));
        let parent_param = parent.map(|h| h.value()).unwrap_or(STORAGE_ROOT_PARENT);

        let quirks = self.transport.quirks();
        let format = match format {
            ObjectFormatCode::Ogg if quirks.contains(QuirkFlags::OGG_IS_UNKNOWN) => ObjectFormatCode::UndefinedAudio,
            ObjectFormatCode::Flac if quirks.contains(QuirkFlags::FLAC_IS_UNKNOWN) => ObjectFormatCode::UndefinedAudio,
            other => other,
        };
        let filename = if quirks.contains(QuirkFlags::ONLY_7BIT_FILENAMES) {
            filename.chars().filter(char::is_ascii).collect::<String>()
        } else {
            filename.to_string()
        };

        let info = ObjectInfo::new(filename, format, data.len() as u64).with_parent(parent);
        let send_info_resp = self.send_fixed(
            OperationCode::SendObjectInfo.value(),
            &[0, parent_param],
            &info.to_bytes()?,
            "SendObjectInfo",
        )?;
        let handle = ObjectHandle::new(
            *send_info_resp
                .params
                .get(2)
                .ok_or_else(|| MtpError::protocol("SendObjectInfo response missing new object handle"))?,
        );

        let send_resp = match self
            .transport
            .command_send_data_progress(OperationCode::SendObject.value(), &[], data, progress)
        {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };
        if send_resp.code != ResponseCode::Ok.value() {
            return Err(self.fail(MtpError::ptp_response(send_resp.code, "SendObject")));
        }

        if let Some(meta) = metadata {
            self.set_track_metadata(handle, meta)?;
        }

        self.flush_handles()?;
        Ok(handle)
    }

    /// The parent hint by content kind (`spec.md` §4.4 "send_file", step
    /// 1): only the audio → `default_music_folder` leg is backed by a
    /// format code this workspace's code table carries (§6 lists no video/
    /// image/vCalendar codes); anything else falls back to storage root
    /// (`spec.md` §4.4 "send_file", step 1, "else storage root").
    fn default_parent_for(&self, format: ObjectFormatCode) -> Option<ObjectHandle> {
        if format.is_known_audio() {
            self.default_folders.music
        } else {
            None
        }
    }

    /// Downloads `handle`'s content to `sink` (`spec.md` §4.4 "get_file").
    /// Refuses association (folder) objects.
    pub fn get_file(&mut self, handle: ObjectHandle, sink: &mut dyn Write, progress: Option<&mut ProgressFn<'_>>) -> Result<()> {
        let info = self.fetch_object_info(handle)?;
        if info.format() == ObjectFormatCode::Association {
            return Err(self.fail(MtpError::invalid_argument("cannot GetObject an Association (folder)")));
        }

        let resp = match self
            .transport
            .command_receive_data(OperationCode::GetObject.value(), &[handle.value()], sink, progress)
        {
            Ok(r) => r,
            Err(e) => return Err(self.fail(e)),
        };
        if resp.code != ResponseCode::Ok.value() {
            return Err(self.fail(MtpError::ptp_response(resp.code, "GetObject")));
        }
        Ok(())
    }
}

fn object_record_from_info(handle: ObjectHandle, info: ObjectInfo) -> ObjectRecord {
    ObjectRecord {
        handle,
        parent: info.parent(),
        storage_id: info.storage(),
        format_code: info.format(),
        compressed_size: info.object_compressed_size as u64,
        filename: info.filename.into_string(),
        metadata: None,
        references: None,
    }
}

fn track_metadata_from_entries(entries: &[PropListEntry]) -> TrackMetadata {
    let mut meta = TrackMetadata::default();
    for entry in entries {
        apply_prop_to_metadata(&mut meta, entry.code, &entry.value);
    }
    meta
}

fn apply_prop_to_metadata(meta: &mut TrackMetadata, code: ObjectPropCode, value: &PropValue) {
    use ObjectPropCode as P;
    match code {
        P::Name => meta.title = value.as_str().map(str::to_string),
        P::Artist => meta.artist = value.as_str().map(str::to_string),
        P::AlbumName => meta.album = value.as_str().map(str::to_string),
        P::Genre => meta.genre = value.as_str().map(str::to_string),
        // Prefer whichever of the two date properties arrives first; a
        // device that reports both isn't expected to disagree.
        P::OriginalReleaseDate | P::DateCreated => {
            if meta.date.is_none() {
                meta.date = value.as_str().map(str::to_string);
            }
        }
        P::Duration => meta.duration_ms = value.as_u32(),
        P::Track => meta.tracknumber = value.as_u16(),
        P::SampleRate => meta.samplerate = value.as_u32(),
        P::NumberOfChannels => meta.channels = value.as_u16(),
        P::AudioBitRate => meta.bitrate = value.as_u32(),
        P::Rating => meta.rating = value.as_u16(),
        P::UseCount => meta.usecount = value.as_u32(),
        P::AudioWaveCodec => meta.wave_codec = value.as_u32(),
        P::BitrateType => meta.bitrate_type = value.as_u16(),
        _ => {}
    }
}

/// Extracts just the `CurrentValue` of a `GetDevicePropDesc` dataset,
/// assuming a `UINT8` datatype — true for `BatteryLevel`, the only
/// device property this workspace reads — and ignoring the trailing form
/// descriptor entirely.
fn parse_device_prop_current_u8(bytes: &[u8]) -> Result<u8> {
    // prop_code: u16, datatype: u16, get_set: u8, factory_default: u8,
    // current_value: u8, [form...]
    bytes
        .get(6)
        .copied()
        .ok_or_else(|| MtpError::protocol("truncated GetDevicePropDesc dataset"))
}

fn read_u32_array(bytes: &[u8]) -> Result<Vec<u32>> {
    let mut cursor = std::io::Cursor::new(bytes);
    let count = u32::read_le(&mut cursor)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(u32::read_le(&mut cursor)?);
    }
    Ok(out)
}

fn read_u16_array(bytes: &[u8]) -> Result<Vec<u16>> {
    let mut cursor = std::io::Cursor::new(bytes);
    let count = u32::read_le(&mut cursor)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(u16::read_le(&mut cursor)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtp_registry::UsbDeviceId;
    use mtp_transport::testing::LoopbackTransport;

    fn candidate() -> CandidateDevice {
        candidate_with_quirks(QuirkFlags::empty())
    }

    fn candidate_with_quirks(quirks: QuirkFlags) -> CandidateDevice {
        CandidateDevice {
            id: UsbDeviceId { vid: 0x0000, pid: 0x0000 },
            name: None,
            quirks,
        }
    }

    fn device_info_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&100u16.to_le_bytes());
        buf.extend_from_slice(&6u32.to_le_bytes());
        buf.extend_from_slice(&100u16.to_le_bytes());
        write_str(&mut buf, "");
        buf.extend_from_slice(&1u16.to_le_bytes());
        write_u16_array(&mut buf, &[OperationCode::GetDevicePropDesc.value()]);
        write_u16_array(&mut buf, &[]);
        write_u16_array(&mut buf, &[DevicePropCode::BatteryLevel.value()]);
        write_u16_array(&mut buf, &[]);
        write_u16_array(&mut buf, &[ObjectFormatCode::Mp3.value()]);
        write_str(&mut buf, "TestCo");
        write_str(&mut buf, "Test Player");
        write_str(&mut buf, "1.0");
        write_str(&mut buf, "SN1");
        buf
    }

    fn write_u16_array(buf: &mut Vec<u8>, values: &[u16]) {
        buf.extend_from_slice(&(values.len() as u32).to_le_bytes());
        for v in values {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn write_str(buf: &mut Vec<u8>, s: &str) {
        let mut tmp = Vec::new();
        mtp_dtyp::PtpString::new(s)
            .write_le(&mut std::io::Cursor::new(&mut tmp))
            .unwrap();
        buf.extend_from_slice(&tmp);
    }

    fn object_info_bytes(filename: &str, format: ObjectFormatCode, parent: u32, size: u32) -> Vec<u8> {
        crate::objectinfo::ObjectInfo::new(filename, format, size as u64)
            .with_parent(if parent == STORAGE_ROOT_PARENT {
                None
            } else {
                Some(ObjectHandle::new(parent))
            })
            .to_bytes()
            .unwrap()
    }

    /// Queues every exchange `MtpSession::open` will issue, in order, onto
    /// a fresh [`LoopbackTransport`]: `OpenSession`, `GetDeviceInfo`,
    /// `GetStorageIDs` (empty), `GetDevicePropDesc(BatteryLevel)`,
    /// `GetObjectHandles` (one folder named `Music`), `GetObjectInfo` for
    /// it. Transaction ids are sequential starting at 0, one per exchange.
    fn queue_open_sequence(usb: &mut LoopbackTransport) {
        usb.queue_response(ResponseCode::Ok.value(), 0, &[]); // OpenSession
        usb.queue_data_then_response(
            OperationCode::GetDeviceInfo.value(),
            1,
            &device_info_bytes(),
            ResponseCode::Ok.value(),
            &[],
        );
        usb.queue_data_then_response(
            OperationCode::GetStorageIDs.value(),
            2,
            &[],
            ResponseCode::Ok.value(),
            &[],
        );
        let mut battery = Vec::new();
        battery.extend_from_slice(&DevicePropCode::BatteryLevel.value().to_le_bytes());
        battery.extend_from_slice(&0x0002u16.to_le_bytes()); // UINT8
        battery.push(1); // get_set
        battery.push(0); // factory default
        battery.push(77); // current value
        battery.push(0); // form flag (none)
        usb.queue_data_then_response(
            OperationCode::GetDevicePropDesc.value(),
            3,
            &battery,
            ResponseCode::Ok.value(),
            &[],
        );
        let mut handles = Vec::new();
        handles.extend_from_slice(&1u32.to_le_bytes());
        handles.extend_from_slice(&1u32.to_le_bytes());
        usb.queue_data_then_response(
            OperationCode::GetObjectHandles.value(),
            4,
            &handles,
            ResponseCode::Ok.value(),
            &[],
        );
        usb.queue_data_then_response(
            OperationCode::GetObjectInfo.value(),
            5,
            &object_info_bytes("Music", ObjectFormatCode::Association, STORAGE_ROOT_PARENT, 0),
            ResponseCode::Ok.value(),
            &[],
        );
    }

    fn opened_session() -> MtpSession<LoopbackTransport> {
        let mut usb = LoopbackTransport::new(512, 512);
        queue_open_sequence(&mut usb);
        MtpSession::open(usb, &candidate()).unwrap()
    }

    fn opened_session_with_quirks(quirks: QuirkFlags) -> MtpSession<LoopbackTransport> {
        let mut usb = LoopbackTransport::new(512, 512);
        queue_open_sequence(&mut usb);
        MtpSession::open(usb, &candidate_with_quirks(quirks)).unwrap()
    }

    #[test]
    fn open_populates_device_info_and_default_folders() {
        let session = opened_session();
        assert_eq!(session.device_info().model, "Test Player");
        assert_eq!(session.device_info().battery_level, Some(77));
        assert_eq!(session.default_folders().music, Some(ObjectHandle::new(1)));
        assert_eq!(session.cache().len(), 1);
    }

    #[test]
    fn list_folders_returns_the_discovered_tree() {
        let session = opened_session();
        let tree = session.list_folders();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.roots().len(), 1);
    }

    #[test]
    fn object_exists_is_true_for_cached_handle() {
        let mut session = opened_session();
        assert!(session.object_exists(ObjectHandle::new(1)).unwrap());
    }

    #[test]
    fn create_playlist_runs_the_five_step_dance() {
        let mut session = opened_session();
        let usb = session.transport.usb_mut();

        // tid 6: SendObjectInfo -> new handle 2
        usb.queue_response(ResponseCode::Ok.value(), 6, &[0, 0, 2]);
        // tid 7: SendObject (one zero byte)
        usb.queue_response(ResponseCode::Ok.value(), 7, &[]);
        // tid 8: SetObjectPropValue(Name)
        usb.queue_response(ResponseCode::Ok.value(), 8, &[]);
        // tid 9: re-flush GetObjectHandles
        let mut handles = Vec::new();
        handles.extend_from_slice(&2u32.to_le_bytes());
        handles.extend_from_slice(&1u32.to_le_bytes());
        handles.extend_from_slice(&2u32.to_le_bytes());
        usb.queue_data_then_response(
            OperationCode::GetObjectHandles.value(),
            9,
            &handles,
            ResponseCode::Ok.value(),
            &[],
        );
        // tid 10/11: GetObjectInfo(Music), GetObjectInfo(new playlist)
        usb.queue_data_then_response(
            OperationCode::GetObjectInfo.value(),
            10,
            &object_info_bytes("Music", ObjectFormatCode::Association, STORAGE_ROOT_PARENT, 0),
            ResponseCode::Ok.value(),
            &[],
        );
        usb.queue_data_then_response(
            OperationCode::GetObjectInfo.value(),
            11,
            &object_info_bytes(
                "Party.zpl",
                ObjectFormatCode::AbstractAudioVideoPlaylist,
                STORAGE_ROOT_PARENT,
                1,
            ),
            ResponseCode::Ok.value(),
            &[],
        );

        let handle = session.create_playlist("Party", None, &[]).unwrap();
        assert_eq!(handle, ObjectHandle::new(2));
        assert!(session.cache().contains(ObjectHandle::new(2)));
    }

    /// Queues the `flush_handles` round trip `send_file` triggers at the
    /// end of a successful send, re-reporting just the pre-existing `Music`
    /// folder so the new object itself doesn't need scripting.
    fn queue_post_send_flush(usb: &mut LoopbackTransport, handles_tid: u32, info_tid: u32) {
        let mut handles = Vec::new();
        handles.extend_from_slice(&1u32.to_le_bytes());
        handles.extend_from_slice(&1u32.to_le_bytes());
        usb.queue_data_then_response(
            OperationCode::GetObjectHandles.value(),
            handles_tid,
            &handles,
            ResponseCode::Ok.value(),
            &[],
        );
        usb.queue_data_then_response(
            OperationCode::GetObjectInfo.value(),
            info_tid,
            &object_info_bytes("Music", ObjectFormatCode::Association, STORAGE_ROOT_PARENT, 0),
            ResponseCode::Ok.value(),
            &[],
        );
    }

    #[test]
    fn send_file_remaps_ogg_under_ogg_is_unknown_quirk() {
        let mut session = opened_session_with_quirks(QuirkFlags::OGG_IS_UNKNOWN);
        let usb = session.transport.usb_mut();
        usb.queue_response(ResponseCode::Ok.value(), 6, &[0, 0, 2]); // SendObjectInfo -> handle 2
        usb.queue_response(ResponseCode::Ok.value(), 7, &[]); // SendObject
        queue_post_send_flush(usb, 8, 9);

        session.send_file(b"data", "track.ogg", ObjectFormatCode::Ogg, None, None, None).unwrap();

        let usb = session.transport.usb_mut();
        let sent = usb.sent_data_payload_for(OperationCode::SendObjectInfo.value()).unwrap();
        let info = crate::objectinfo::ObjectInfo::from_bytes(&sent).unwrap();
        assert_eq!(info.format(), ObjectFormatCode::UndefinedAudio);
    }

    #[test]
    fn send_file_strips_non_ascii_filenames_under_only_7bit_quirk() {
        let mut session = opened_session_with_quirks(QuirkFlags::ONLY_7BIT_FILENAMES);
        let usb = session.transport.usb_mut();
        usb.queue_response(ResponseCode::Ok.value(), 6, &[0, 0, 2]); // SendObjectInfo -> handle 2
        usb.queue_response(ResponseCode::Ok.value(), 7, &[]); // SendObject
        queue_post_send_flush(usb, 8, 9);

        session
            .send_file(b"data", "caf\u{e9}.mp3", ObjectFormatCode::Mp3, None, None, None)
            .unwrap();

        let usb = session.transport.usb_mut();
        let sent = usb.sent_data_payload_for(OperationCode::SendObjectInfo.value()).unwrap();
        let info = crate::objectinfo::ObjectInfo::from_bytes(&sent).unwrap();
        assert_eq!(info.filename.as_str(), "caf.mp3");
    }
}
