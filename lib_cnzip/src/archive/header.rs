//! Per-entry header fields.
//!
//! [`EntryHeader`] collects what both the local header and the central
//! directory record need: name bytes, method, timestamps and Unix
//! permissions. The byte layout itself lives in the container writer.

use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::encoding::transcode::EntryName;

/// Version 2.0: deflate and directories.
pub const VERSION_NEEDED: u16 = 20;
/// Unix host (3) in the high byte, format version 2.0 in the low byte.
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;

/// General-purpose bit 11: the name is UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

const MSDOS_DIR: u32 = 0x10;
const MSDOS_READONLY: u32 = 0x01;

/// Extended timestamp extra field id ("UT").
pub const EXTRA_EXT_TIMESTAMP: u16 = 0x5455;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflated,
}

impl CompressionMethod {
    /// Method id stored in the header.
    pub fn id(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
        }
    }

    /// Word used in per-entry log lines.
    pub fn label(self) -> &'static str {
        match self {
            CompressionMethod::Stored => "stored",
            CompressionMethod::Deflated => "deflated",
        }
    }
}

/// Everything the container needs to frame one entry.
#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub name: EntryName,
    pub is_dir: bool,
    pub method: CompressionMethod,
    /// Size reported by the filesystem; the written size is measured.
    pub size: u64,
    pub modified: SystemTime,
    /// `st_mode`, file type bits included.
    pub unix_mode: u32,
}

impl EntryHeader {
    /// Builds a header from filesystem metadata. Directories are always
    /// stored; files use `method`.
    pub fn from_metadata(name: EntryName, md: &Metadata, method: CompressionMethod) -> Self {
        let is_dir = md.is_dir();
        EntryHeader {
            name,
            is_dir,
            method: if is_dir { CompressionMethod::Stored } else { method },
            size: if is_dir { 0 } else { md.len() },
            modified: md.modified().unwrap_or(UNIX_EPOCH),
            unix_mode: mode_from(md),
        }
    }

    /// General-purpose flag bits.
    pub fn flags(&self) -> u16 {
        if self.name.is_utf8() { FLAG_UTF8 } else { 0 }
    }

    /// MS-DOS (time, date) pair in local time.
    pub fn dos_datetime(&self) -> (u16, u16) {
        to_dos_datetime(self.modified)
    }

    /// Modification time in Unix seconds, saturated to the 32-bit range.
    pub fn unix_mtime(&self) -> u32 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().min(u32::MAX as u64) as u32)
            .unwrap_or(0)
    }

    /// Unix mode in the high half, MS-DOS attributes in the low half.
    pub fn external_attributes(&self) -> u32 {
        let mut attrs = self.unix_mode << 16;
        if self.is_dir {
            attrs |= MSDOS_DIR;
        }
        if self.unix_mode & 0o200 == 0 {
            attrs |= MSDOS_READONLY;
        }
        attrs
    }

    /// The "UT" extra field carrying the modification time.
    pub fn extra_field(&self) -> [u8; 9] {
        let mut extra = [0u8; 9];
        extra[0..2].copy_from_slice(&EXTRA_EXT_TIMESTAMP.to_le_bytes());
        extra[2..4].copy_from_slice(&5u16.to_le_bytes());
        extra[4] = 1; // mtime present
        extra[5..9].copy_from_slice(&self.unix_mtime().to_le_bytes());
        extra
    }
}

fn mode_from(md: &Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        md.mode()
    }
    #[cfg(not(unix))]
    {
        let readonly = md.permissions().readonly();
        match (md.is_dir(), readonly) {
            (true, _) => 0o040755,
            (false, true) => 0o100444,
            (false, false) => 0o100644,
        }
    }
}

/// MS-DOS timestamps start in 1980 and have two-second resolution.
pub fn to_dos_datetime(t: SystemTime) -> (u16, u16) {
    let local: DateTime<Local> = t.into();
    if local.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    if local.year() > 2107 {
        return ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);
    }
    let time = ((local.hour() as u16) << 11)
        | ((local.minute() as u16) << 5)
        | ((local.second() as u16) / 2);
    let date = (((local.year() - 1980) as u16) << 9)
        | ((local.month() as u16) << 5)
        | (local.day() as u16);
    (time, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::transcode::{NameEncoding, encode_entry_name};
    use chrono::TimeZone;
    use std::time::Duration;

    fn header(name: &str, is_dir: bool, mode: u32) -> EntryHeader {
        EntryHeader {
            name: encode_entry_name(name, NameEncoding::Gb18030),
            is_dir,
            method: CompressionMethod::Deflated,
            size: 0,
            modified: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            unix_mode: mode,
        }
    }

    #[test]
    fn dos_datetime_matches_local_clock() {
        let local = Local.with_ymd_and_hms(2023, 11, 14, 22, 13, 21).unwrap();
        let (time, date) = to_dos_datetime(local.into());
        assert_eq!(date >> 9, 2023 - 1980);
        assert_eq!((date >> 5) & 0x0f, 11);
        assert_eq!(date & 0x1f, 14);
        assert_eq!(time >> 11, 22);
        assert_eq!((time >> 5) & 0x3f, 13);
        assert_eq!(time & 0x1f, 10);
    }

    #[test]
    fn pre_1980_clamps() {
        assert_eq!(to_dos_datetime(UNIX_EPOCH), (0, 0x21));
    }

    #[test]
    fn external_attributes_carry_mode_and_dos_bits() {
        let dir = header("p/", true, 0o040755);
        assert_eq!(dir.external_attributes(), (0o040755 << 16) | 0x10);

        let ro = header("p/a.txt", false, 0o100444);
        assert_eq!(ro.external_attributes(), (0o100444 << 16) | 0x01);

        let rw = header("p/a.txt", false, 0o100644);
        assert_eq!(rw.external_attributes(), 0o100644 << 16);
    }

    #[test]
    fn utf8_flag_follows_name() {
        assert_eq!(header("p/报告.txt", false, 0o100644).flags(), 0);
        assert_eq!(header("p/café.txt", false, 0o100644).flags(), FLAG_UTF8);
    }

    #[test]
    fn extra_field_layout() {
        let h = header("p/a.txt", false, 0o100644);
        let extra = h.extra_field();
        assert_eq!(&extra[0..2], &[0x55, 0x54]);
        assert_eq!(u16::from_le_bytes([extra[2], extra[3]]), 5);
        assert_eq!(extra[4], 1);
        assert_eq!(
            u32::from_le_bytes([extra[5], extra[6], extra[7], extra[8]]),
            1_700_000_000
        );
    }

    #[test]
    fn from_metadata_forces_stored_directories() {
        let dir = tempfile::tempdir().unwrap();
        let md = std::fs::metadata(dir.path()).unwrap();
        let name = encode_entry_name("x/", NameEncoding::Gb18030);
        let h = EntryHeader::from_metadata(name, &md, CompressionMethod::Deflated);
        assert!(h.is_dir);
        assert_eq!(h.method, CompressionMethod::Stored);
        assert_eq!(h.size, 0);
    }
}
