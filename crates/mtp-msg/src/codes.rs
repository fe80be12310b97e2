//! PTP/MTP code tables (`spec.md` §6).
//!
//! PTP operation, response, event and object-format codes are not a closed
//! set — vendor extensions live above `0x9000`/`0xB000`/`0xC000` and a
//! conforming host must tolerate codes it doesn't recognize (it just can't
//! name them). So each code space is a thin `u16` newtype with associated
//! constants for the codes `spec.md` §6 calls out, rather than a `binrw`
//! enum that would fail to decode anything novel.

use std::fmt;

macro_rules! code_table {
    (
        $(#[$meta:meta])*
        $name:ident($repr:ty) {
            $($(#[$cmeta:meta])* $cname:ident = $cval:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub $repr);

        impl $name {
            $(
                $(#[$cmeta])*
                pub const $cname: $name = $name($cval);
            )+

            pub const fn value(self) -> $repr {
                self.0
            }

            /// The name of this code, if it's one `spec.md` §6 documents.
            pub fn name(self) -> Option<&'static str> {
                match self {
                    $(Self::$cname => Some(stringify!($cname)),)+
                    _ => None,
                }
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                $name(value)
            }
        }

        impl From<$name> for $repr {
            fn from(code: $name) -> $repr {
                code.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(n) => write!(f, "{}({:#06x})", n, self.0),
                    None => write!(f, "{}({:#06x})", stringify!($name), self.0),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.name() {
                    Some(n) => write!(f, "{n} ({:#06x})", self.0),
                    None => write!(f, "{:#06x}", self.0),
                }
            }
        }
    };
}

code_table! {
    /// PTP/MTP operation codes (`spec.md` §6).
    OperationCode(u16) {
        GetDeviceInfo = 0x1001,
        OpenSession = 0x1002,
        CloseSession = 0x1003,
        GetStorageIDs = 0x1004,
        GetStorageInfo = 0x1005,
        GetNumObjects = 0x1006,
        GetObjectHandles = 0x1007,
        GetObjectInfo = 0x1008,
        GetObject = 0x1009,
        DeleteObject = 0x100B,
        SendObjectInfo = 0x100C,
        SendObject = 0x100D,
        FormatStore = 0x100F,
        ResetDevice = 0x1010,
        GetDevicePropDesc = 0x1014,
        GetDevicePropValue = 0x1015,
        SetDevicePropValue = 0x1016,
        GetObjectReferences = 0x9810,
        SetObjectReferences = 0x9811,
        GetObjectPropsSupported = 0x9801,
        GetObjectPropDesc = 0x9802,
        GetObjectPropValue = 0x9803,
        SetObjectPropValue = 0x9804,
        GetObjectPropList = 0x9805,
    }
}

code_table! {
    /// PTP/MTP response codes (`spec.md` §6).
    ResponseCode(u16) {
        Ok = 0x2001,
        GeneralError = 0x2002,
        SessionNotOpen = 0x2003,
        InvalidTransactionId = 0x2004,
        OperationNotSupported = 0x2005,
        ParameterNotSupported = 0x2006,
        IncompleteTransfer = 0x2007,
        InvalidStorageId = 0x2008,
        InvalidObjectHandle = 0x2009,
        DeviceBusy = 0x2019,
        StoreFull = 0x200C,
        StoreNotAvailable = 0x2013,
        SpecificationByFormatUnsupported = 0x2014,
        InvalidParentObject = 0x2012,
        SessionAlreadyOpened = 0x201E,
        TransactionCancelled = 0x201F,
    }
}

code_table! {
    /// PTP/MTP event codes (`spec.md` §4.3 "Events").
    EventCode(u16) {
        CancelTransaction = 0x4001,
        ObjectAdded = 0x4002,
        ObjectRemoved = 0x4003,
        StoreAdded = 0x4004,
        StoreRemoved = 0x4005,
        DevicePropChanged = 0x4006,
        ObjectInfoChanged = 0x4007,
        DeviceInfoChanged = 0x4008,
        RequestObjectTransfer = 0x4009,
        StoreFull = 0x400A,
        DeviceReset = 0x400B,
        StorageInfoChanged = 0x400C,
        CapturedComplete = 0x400D,
        CancelledTransaction = 0x4010,
    }
}

code_table! {
    /// PTP/MTP object format codes (`spec.md` §3, §6).
    ///
    /// `M4a` files are sent under the `Mp4` container code (libmtp does the
    /// same — there is no distinct PTP format code for `.m4a`); callers
    /// identify the `M4a` *extension* separately in `mtp-session`.
    ObjectFormatCode(u16) {
        Undefined = 0x3000,
        Association = 0x3001,
        Text = 0x3004,
        Wav = 0x3008,
        Mp3 = 0x3009,
        UndefinedAudio = 0xB900,
        Wma = 0xB901,
        Ogg = 0xB902,
        Aac = 0xB903,
        Flac = 0xB906,
        Mp4 = 0xB982,
        AbstractAudioAlbum = 0xBA03,
        AbstractAudioVideoPlaylist = 0xBA05,
        SamsungPlaylist = 0xB109,
    }
}

code_table! {
    /// PTP/MTP device property codes referenced by this crate.
    DevicePropCode(u16) {
        BatteryLevel = 0x5001,
    }
}

code_table! {
    /// MTP object property codes (`spec.md` §3 metadata fields).
    ///
    /// Values per MTP's `0xDCxx`/`0xDExx` property range, as used by
    /// `libmtp`'s `mtp.h` (see `examples/original_source/src/mtp.h`).
    ObjectPropCode(u16) {
        StorageId = 0xDC01,
        ObjectFormat = 0xDC02,
        ObjectFileName = 0xDC07,
        DateCreated = 0xDC08,
        DateModified = 0xDC09,
        ParentObject = 0xDC0B,
        Name = 0xDC44,
        Artist = 0xDC46,
        Width = 0xDC87,
        Height = 0xDC88,
        Duration = 0xDC89,
        Rating = 0xDC8A,
        Track = 0xDC8B,
        Genre = 0xDC8C,
        UseCount = 0xDC91,
        OriginalReleaseDate = 0xDC99,
        AlbumName = 0xDC9A,
        AlbumArtist = 0xDC9B,
        SampleRate = 0xDE93,
        NumberOfChannels = 0xDE94,
        AudioWaveCodec = 0xDE99,
        AudioBitRate = 0xDE9A,
        BitrateType = 0xDE92,
    }
}

impl ObjectFormatCode {
    /// Known audio formats enumerated for `list_tracks` (`spec.md` §4.4).
    pub fn is_known_audio(self) -> bool {
        matches!(
            self,
            Self::Wav
                | Self::Mp3
                | Self::Wma
                | Self::Ogg
                | Self::Mp4
                | Self::Aac
                | Self::Flac
                | Self::UndefinedAudio
        )
    }

    pub fn is_association(self) -> bool {
        self == Self::Association
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_code_displays_name() {
        assert_eq!(format!("{}", ResponseCode::Ok), "Ok (0x2001)");
    }

    #[test]
    fn unknown_code_displays_hex_only() {
        let code = ResponseCode::from(0x9999);
        assert_eq!(format!("{code}"), "0x9999");
    }

    #[test]
    fn audio_format_detection() {
        assert!(ObjectFormatCode::Mp3.is_known_audio());
        assert!(!ObjectFormatCode::Association.is_known_audio());
    }
}
