//! # Name Transcoder
//!
//! Older zip readers (notably the Windows shell on Chinese locales) ignore the
//! UTF-8 flag and decode entry names with the system code page. Names that
//! contain Han ideographs or CJK full-width punctuation are therefore stored
//! as GB18030 bytes, without the flag.
//!
//! Only archive entry names pass through here, never file contents.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

/// Han script plus the full-width punctuation that shows up in Chinese file
/// names: 。；，：“”（）、？《》
static CJK_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Han}\x{3002}\x{FF1B}\x{FF0C}\x{FF1A}\x{201C}\x{201D}\x{FF08}\x{FF09}\x{3001}\x{FF1F}\x{300A}\x{300B}]")
        .expect("CJK name pattern is a valid regex")
});

/// How archive entry names are encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameEncoding {
    /// CJK names become GB18030 bytes with no UTF-8 flag.
    #[default]
    Gb18030,
    /// Names are kept as UTF-8; non-ASCII names carry the UTF-8 flag.
    Utf8,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    #[error("'{0}' has characters GB18030 cannot represent")]
    Unmappable(String),
}

/// An archive entry name as it will be written: raw bytes plus whether the
/// header should advertise them as UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryName {
    bytes: Vec<u8>,
    utf8: bool,
    transcoded: bool,
}

impl EntryName {
    /// Bytes taken verbatim from the filesystem, for names that are not
    /// valid UTF-8. They carry no UTF-8 flag and are never transcoded.
    pub fn raw(bytes: Vec<u8>) -> Self {
        EntryName {
            bytes,
            utf8: false,
            transcoded: false,
        }
    }

    /// The bytes written to the header's name field.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True when the header must set general-purpose bit 11.
    pub fn is_utf8(&self) -> bool {
        self.utf8
    }

    /// True when the bytes are GB18030 rather than the original UTF-8.
    pub fn was_transcoded(&self) -> bool {
        self.transcoded
    }

    /// Directory names end with `/`.
    pub fn is_dir(&self) -> bool {
        self.bytes.last() == Some(&b'/')
    }

    /// Human-readable form for logs and errors.
    pub fn display(&self) -> Cow<'_, str> {
        if self.transcoded {
            let (decoded, _, _) = encoding_rs::GB18030.decode(&self.bytes);
            decoded
        } else {
            String::from_utf8_lossy(&self.bytes)
        }
    }
}

/// True when `name` contains a Han ideograph or CJK full-width punctuation.
pub fn needs_transcode(name: &str) -> bool {
    CJK_NAME.is_match(name)
}

/// Encodes `name` as GB18030.
pub fn try_transcode(name: &str) -> Result<Vec<u8>, TranscodeError> {
    let (encoded, _, had_errors) = encoding_rs::GB18030.encode(name);
    if had_errors {
        return Err(TranscodeError::Unmappable(name.to_string()));
    }
    Ok(encoded.into_owned())
}

/// Encodes `name` as GB18030, falling back to its UTF-8 bytes (with a
/// warning) when the conversion fails.
pub fn transcode(name: &str) -> Vec<u8> {
    match try_transcode(name) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("{}; keeping the UTF-8 name", e);
            name.as_bytes().to_vec()
        }
    }
}

/// Produces the stored form of an archive-internal name.
pub fn encode_entry_name(name: &str, encoding: NameEncoding) -> EntryName {
    if encoding == NameEncoding::Gb18030 && needs_transcode(name) {
        let bytes = transcode(name);
        // CJK text never has the same bytes in both encodings, so equal
        // bytes mean the fallback was taken.
        if bytes != name.as_bytes() {
            return EntryName {
                bytes,
                utf8: false,
                transcoded: true,
            };
        }
    }
    EntryName {
        bytes: name.as_bytes().to_vec(),
        utf8: !name.is_ascii(),
        transcoded: false,
    }
}

/// Like [`encode_entry_name`] for names read from the filesystem as bytes.
/// Valid UTF-8 goes through the usual rules; anything else is stored as is.
pub fn encode_entry_bytes(name: &[u8], encoding: NameEncoding) -> EntryName {
    match std::str::from_utf8(name) {
        Ok(text) => encode_entry_name(text, encoding),
        Err(_) => EntryName::raw(name.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_han_and_punctuation() {
        assert!(needs_transcode("报告.txt"));
        assert!(needs_transcode("docs/季度总结/a.md"));
        assert!(needs_transcode("report《final》.txt"));
        assert!(needs_transcode("a，b.txt"));
        assert!(needs_transcode("what？"));
        assert!(!needs_transcode("report.txt"));
        assert!(!needs_transcode("café/naïve.txt"));
        assert!(!needs_transcode("こんにちは"));
        assert!(!needs_transcode(""));
    }

    #[test]
    fn gb18030_round_trip() {
        let bytes = transcode("报告.txt");
        assert_ne!(bytes, "报告.txt".as_bytes());
        assert_eq!(bytes, vec![0xB1, 0xA8, 0xB8, 0xE6, b'.', b't', b'x', b't']);
        let (decoded, _, errors) = encoding_rs::GB18030.decode(&bytes);
        assert!(!errors);
        assert_eq!(decoded, "报告.txt");
    }

    #[test]
    fn ascii_is_unchanged() {
        assert_eq!(transcode("plain/name.txt"), b"plain/name.txt".to_vec());
    }

    #[test]
    fn entry_name_legacy_mode() {
        let name = encode_entry_name("proj/报告.txt", NameEncoding::Gb18030);
        assert!(name.was_transcoded());
        assert!(!name.is_utf8());
        assert_eq!(name.display(), "proj/报告.txt");

        let plain = encode_entry_name("proj/a.txt", NameEncoding::Gb18030);
        assert!(!plain.was_transcoded());
        assert!(!plain.is_utf8());
        assert_eq!(plain.as_bytes(), b"proj/a.txt");

        // Non-CJK, non-ASCII keeps UTF-8 and says so.
        let accented = encode_entry_name("proj/café.txt", NameEncoding::Gb18030);
        assert!(!accented.was_transcoded());
        assert!(accented.is_utf8());
    }

    #[test]
    fn entry_name_utf8_mode() {
        let name = encode_entry_name("proj/报告/", NameEncoding::Utf8);
        assert!(!name.was_transcoded());
        assert!(name.is_utf8());
        assert!(name.is_dir());
        assert_eq!(name.as_bytes(), "proj/报告/".as_bytes());
    }

    #[test]
    fn invalid_utf8_is_stored_verbatim() {
        let bytes = b"proj/a\xff.txt";
        let name = encode_entry_bytes(bytes, NameEncoding::Gb18030);
        assert_eq!(name.as_bytes(), bytes);
        assert!(!name.is_utf8());
        assert!(!name.was_transcoded());

        let other = encode_entry_bytes(b"proj/a\xfe.txt", NameEncoding::Gb18030);
        assert_ne!(name, other);
    }

    #[test]
    fn valid_utf8_bytes_follow_the_usual_rules() {
        let name = encode_entry_bytes("proj/报告.txt".as_bytes(), NameEncoding::Gb18030);
        assert!(name.was_transcoded());
        assert_eq!(name.display(), "proj/报告.txt");
    }
}
