//! The per-session object handle cache (`spec.md` §3 "ObjectRecord", §4.4
//! "Handle cache", §9 "Handle cache staleness").
//!
//! The C source's `flush_handles()` discipline — re-fetch everything,
//! forget what you knew — is replaced here with an explicit
//! [`ObjectCache`] carrying a `generation` counter, per the Design Notes:
//! mutating operations bump the generation, and callers holding an older
//! [`CacheSnapshot`] can tell their view is stale without re-deriving it.

use std::collections::HashMap;

use mtp_dtyp::{ObjectHandle, StorageId};
use mtp_msg::ObjectFormatCode;

/// Audio-specific metadata, populated for objects enumerated as tracks
/// (`spec.md` §3 "ObjectRecord").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub date: Option<String>,
    pub duration_ms: Option<u32>,
    pub tracknumber: Option<u16>,
    pub samplerate: Option<u32>,
    pub channels: Option<u16>,
    pub bitrate: Option<u32>,
    pub rating: Option<u16>,
    pub usecount: Option<u32>,
    pub wave_codec: Option<u32>,
    pub bitrate_type: Option<u16>,
}

/// One cached object: a file, folder, playlist, album or track.
///
/// `parent` is `None` when the wire's sentinel `0xFFFFFFFF` parent was
/// observed — "storage root" — normalized away so nothing above this
/// layer has to special-case the sentinel (`spec.md` §3 invariants).
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub handle: ObjectHandle,
    pub parent: Option<ObjectHandle>,
    pub storage_id: StorageId,
    pub format_code: ObjectFormatCode,
    pub compressed_size: u64,
    pub filename: String,
    pub metadata: Option<TrackMetadata>,
    /// Track handles, in order, for Playlist/Album objects
    /// (`spec.md` §3 "Playlist / Album").
    pub references: Option<Vec<ObjectHandle>>,
}

impl ObjectRecord {
    pub fn is_folder(&self) -> bool {
        self.format_code.is_association()
    }

    pub fn is_audio(&self) -> bool {
        self.format_code.is_known_audio()
    }

    pub fn is_playlist(&self) -> bool {
        self.format_code == ObjectFormatCode::AbstractAudioVideoPlaylist
    }

    pub fn is_album(&self) -> bool {
        self.format_code == ObjectFormatCode::AbstractAudioAlbum
    }
}

/// A read-only view of the cache tagged with the generation it was taken
/// at. Holders can call [`ObjectCache::is_stale`] to learn whether the
/// cache has since been flushed out from under them (`spec.md` §9).
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub generation: u64,
    pub records: Vec<ObjectRecord>,
}

/// The session's object handle cache (`spec.md` §2 "MtpSession", §4.4
/// "Handle cache").
#[derive(Debug, Default)]
pub struct ObjectCache {
    generation: u64,
    records: HashMap<ObjectHandle, ObjectRecord>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a previously-taken generation number is no longer current.
    pub fn is_stale(&self, generation: u64) -> bool {
        generation != self.generation
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&ObjectRecord> {
        self.records.get(&handle)
    }

    /// Mutable access for refreshing a record in place (metadata/reference
    /// enrichment) without bumping the generation — the handle set itself
    /// hasn't changed, only what's cached about one member of it.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut ObjectRecord> {
        self.records.get_mut(&handle)
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.records.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.records.values()
    }

    /// Inserts or replaces one record, without touching the generation —
    /// used while (re)populating the cache from a batch of `GetObjectInfo`
    /// calls after a flush. Structural mutations (`spec.md` §3 "after any
    /// mutating operation...") go through [`ObjectCache::bump`] instead.
    pub fn upsert(&mut self, record: ObjectRecord) {
        self.records.insert(record.handle, record);
    }

    /// The "flush handles" procedure (`spec.md` §4.4): `authoritative` is
    /// the full handle list `GetObjectHandles(ALL, ALL, ALL)` just
    /// returned. Records for handles no longer present are dropped, and
    /// the generation is bumped regardless of whether anything changed —
    /// a flush always invalidates outstanding snapshots.
    pub fn flush(&mut self, authoritative: &[ObjectHandle]) {
        let keep: std::collections::HashSet<_> = authoritative.iter().copied().collect();
        self.records.retain(|h, _| keep.contains(h));
        self.generation = self.generation.wrapping_add(1);
    }

    /// Records that `handle` was deleted, dropping it from the cache and
    /// bumping the generation (`spec.md` §3 "destroyed either by (a)
    /// successful DeleteObject or (b) cache flush").
    pub fn remove(&mut self, handle: ObjectHandle) {
        self.records.remove(&handle);
        self.generation = self.generation.wrapping_add(1);
    }

    /// Bumps the generation without altering contents — used when a
    /// mutation (send/create/reference update) is about to invalidate
    /// outstanding snapshots ahead of the caller re-querying.
    pub fn bump(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            generation: self.generation,
            records: self.records.values().cloned().collect(),
        }
    }

    pub fn children(&self, parent: Option<ObjectHandle>) -> Vec<&ObjectRecord> {
        self.records
            .values()
            .filter(|r| r.parent == parent)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(handle: u32, parent: Option<u32>, format: ObjectFormatCode) -> ObjectRecord {
        ObjectRecord {
            handle: ObjectHandle::new(handle),
            parent: parent.map(ObjectHandle::new),
            storage_id: StorageId::new(1),
            format_code: format,
            compressed_size: 0,
            filename: format!("obj-{handle}"),
            metadata: None,
            references: None,
        }
    }

    #[test]
    fn flush_drops_stale_records_and_bumps_generation() {
        let mut cache = ObjectCache::new();
        cache.upsert(record(1, None, ObjectFormatCode::Mp3));
        cache.upsert(record(2, None, ObjectFormatCode::Mp3));
        let gen0 = cache.generation();

        cache.flush(&[ObjectHandle::new(1)]);

        assert!(cache.contains(ObjectHandle::new(1)));
        assert!(!cache.contains(ObjectHandle::new(2)));
        assert!(cache.is_stale(gen0));
    }

    #[test]
    fn snapshot_reports_its_generation() {
        let mut cache = ObjectCache::new();
        cache.upsert(record(1, None, ObjectFormatCode::Association));
        let snap = cache.snapshot();
        assert_eq!(snap.generation, cache.generation());
        assert!(!cache.is_stale(snap.generation));
        cache.bump();
        assert!(cache.is_stale(snap.generation));
    }

    #[test]
    fn children_filters_by_parent() {
        let mut cache = ObjectCache::new();
        cache.upsert(record(1, None, ObjectFormatCode::Association));
        cache.upsert(record(2, Some(1), ObjectFormatCode::Mp3));
        cache.upsert(record(3, None, ObjectFormatCode::Mp3));

        let kids = cache.children(Some(ObjectHandle::new(1)));
        assert_eq!(kids.len(), 1);
        assert_eq!(kids[0].handle, ObjectHandle::new(2));

        let roots = cache.children(None);
        assert_eq!(roots.len(), 2);
    }
}
