//! Playlist/album entities and the suffix convention their on-device
//! filenames carry (`spec.md` §3 "Playlist / Album").

use mtp_dtyp::{ObjectHandle, StorageId};
use mtp_msg::QuirkFlags;

/// A playlist or album, with the wire's filename suffix already stripped
/// (`spec.md` §3: "the cache exposes the suffix-stripped name and
/// re-applies the proper suffix when creating").
#[derive(Debug, Clone, PartialEq)]
pub struct TrackCollection {
    pub handle: Option<ObjectHandle>,
    pub name: String,
    pub parent: Option<ObjectHandle>,
    pub storage_id: StorageId,
    pub tracks: Vec<ObjectHandle>,
}

impl TrackCollection {
    pub fn new(name: impl Into<String>, tracks: Vec<ObjectHandle>) -> Self {
        TrackCollection {
            handle: None,
            name: name.into(),
            parent: None,
            storage_id: StorageId::new(0),
            tracks,
        }
    }
}

/// The suffix a newly-created playlist filename must carry, depending on
/// quirk flags (`spec.md` §4.4 "Playlist/album creation protocol", step 1;
/// §9 "`get_playlist_extension`").
pub fn playlist_suffix(quirks: QuirkFlags) -> &'static str {
    if quirks.uses_spl_playlists() {
        ".spl"
    } else {
        ".zpl"
    }
}

/// The suffix a newly-created album filename must carry.
pub const ALBUM_SUFFIX: &str = ".alb";

/// Strips a playlist/album suffix from a wire filename, if present, for
/// any of the suffixes this workspace recognizes.
pub fn strip_playlist_suffix(filename: &str) -> &str {
    const SUFFIXES: &[&str] = &[".spl", ".zpl", ".pla", ".alb"];
    for suffix in SUFFIXES {
        if let Some(stripped) = filename.strip_suffix(suffix) {
            if filename.len() > suffix.len() {
                return stripped;
            }
        }
    }
    filename
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spl_quirk_selects_spl_suffix() {
        assert_eq!(playlist_suffix(QuirkFlags::PLAYLIST_SPL_V2), ".spl");
        assert_eq!(playlist_suffix(QuirkFlags::empty()), ".zpl");
    }

    #[test]
    fn strip_suffix_handles_each_known_extension() {
        assert_eq!(strip_playlist_suffix("Party.spl"), "Party");
        assert_eq!(strip_playlist_suffix("Party.zpl"), "Party");
        assert_eq!(strip_playlist_suffix("My Faves.alb"), "My Faves");
        assert_eq!(strip_playlist_suffix("no-suffix"), "no-suffix");
    }
}
