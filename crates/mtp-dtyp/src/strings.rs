//! [`PtpString`]: the length-prefixed UTF-16LE string packing used
//! throughout PTP/MTP data structures (`spec.md` §6 "Sample UTF-16 string
//! packing").
//!
//! On the wire: one byte giving the character count *including* the null
//! terminator, followed by that many UTF-16LE code units, the last of which
//! is `0x0000`. An empty string is a single `0x00` byte (zero characters,
//! no terminator).

use binrw::{BinRead, BinWrite, Endian};
use std::io::{Read, Seek, Write};

/// An owned PTP wire string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PtpString(pub String);

impl PtpString {
    pub fn new(s: impl Into<String>) -> Self {
        PtpString(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for PtpString {
    fn from(value: String) -> Self {
        PtpString(value)
    }
}

impl From<&str> for PtpString {
    fn from(value: &str) -> Self {
        PtpString(value.to_string())
    }
}

impl From<PtpString> for String {
    fn from(value: PtpString) -> Self {
        value.0
    }
}

impl std::fmt::Display for PtpString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl BinRead for PtpString {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let count = u8::read_options(reader, Endian::Little, ())?;
        if count == 0 {
            return Ok(PtpString(String::new()));
        }

        let mut units = Vec::with_capacity(count as usize);
        for _ in 0..count {
            units.push(u16::read_options(reader, Endian::Little, ())?);
        }

        // Drop the trailing NUL the count includes.
        if units.last() == Some(&0) {
            units.pop();
        }

        let s = String::from_utf16_lossy(&units);
        Ok(PtpString(s))
    }
}

impl BinWrite for PtpString {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _endian: Endian,
        _args: Self::Args<'_>,
    ) -> binrw::BinResult<()> {
        if self.0.is_empty() {
            return 0u8.write_options(writer, Endian::Little, ());
        }

        let units: Vec<u16> = self.0.encode_utf16().chain(std::iter::once(0)).collect();
        let count: u8 = units.len().min(255) as u8;
        count.write_options(writer, Endian::Little, ())?;
        for unit in units.iter().take(count as usize) {
            unit.write_options(writer, Endian::Little, ())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(s: &str) -> PtpString {
        let mut buf = Vec::new();
        PtpString::new(s)
            .write_options(&mut Cursor::new(&mut buf), Endian::Little, ())
            .unwrap();
        PtpString::read_options(&mut Cursor::new(&buf), Endian::Little, ()).unwrap()
    }

    #[test]
    fn empty_string_is_single_zero_byte() {
        let mut buf = Vec::new();
        PtpString::new("")
            .write_options(&mut Cursor::new(&mut buf), Endian::Little, ())
            .unwrap();
        assert_eq!(buf, vec![0u8]);
    }

    #[test]
    fn ascii_roundtrips() {
        assert_eq!(roundtrip("track.mp3").as_str(), "track.mp3");
    }

    #[test]
    fn non_ascii_roundtrips() {
        assert_eq!(roundtrip("Motörhead").as_str(), "Motörhead");
    }

    #[test]
    fn encodes_count_including_null_terminator() {
        let mut buf = Vec::new();
        PtpString::new("ab")
            .write_options(&mut Cursor::new(&mut buf), Endian::Little, ())
            .unwrap();
        // count byte (3: 'a','b',NUL) + 3 * 2 bytes
        assert_eq!(buf[0], 3);
        assert_eq!(buf.len(), 1 + 3 * 2);
    }
}
