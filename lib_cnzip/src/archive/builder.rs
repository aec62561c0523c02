//! # Archive Builder
//!
//! Turns a source directory (or a single file) into a zip archive:
//!
//! 1.  **Classify the source**: stat and canonicalize it. Directories are
//!     walked under a base folder named after them (which gets its own
//!     directory entry); a single file becomes a one-entry archive stored
//!     under its own name.
//! 2.  **Resolve the target**: create (or truncate) the archive file, creating
//!     its parent directory when needed, and wrap it in a [`ZipContainer`].
//! 3.  **Per entry**: compute the forward-slash relative path, prefix it with
//!     the base folder, append `/` for directories, encode the name, build the
//!     header from filesystem metadata and stream the content.
//! 4.  **Finalize**: write the central directory and close the file.
//!
//! Any I/O error ends the run. The partly written archive is left on disk
//! without a central directory.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use super::container::ZipContainer;
use super::header::EntryHeader;
use super::walker::{SourceEntry, component_name, walk_source};
use crate::configs::config_zip::{ZipConfig, base_prefix, lexical_absolute};
use crate::encoding::transcode::encode_entry_bytes;
use crate::error::{ArchiveError, Result};
use crate::filters::exclude::ExcludeSet;

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: u64,
    pub dirs: u64,
    /// Uncompressed bytes read from the source.
    pub bytes_in: u64,
    /// Compressed bytes written for file entries.
    pub bytes_out: u64,
    /// Entry names stored as GB18030.
    pub transcoded: u64,
}

impl ArchiveSummary {
    pub fn entries(&self) -> u64 {
        self.files + self.dirs
    }
}

impl fmt::Display for ArchiveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} directories, {} -> {} bytes, {} names transcoded",
            self.files, self.dirs, self.bytes_in, self.bytes_out, self.transcoded
        )
    }
}

/// Archives `source` into `target`, skipping paths that match any of
/// `exclude_patterns` (each string is split on whitespace). Uses the default
/// name encoding and compression level.
pub fn build_archive(
    source: &Path,
    target: &Path,
    exclude_patterns: &[String],
) -> Result<ArchiveSummary> {
    let config = ZipConfig::new(source, Some(target.to_path_buf()))?
        .with_excludes(ExcludeSet::parse_all(exclude_patterns));
    build_archive_with(&config)
}

/// Archives according to `config`.
pub fn build_archive_with(config: &ZipConfig) -> Result<ArchiveSummary> {
    debug!("archiving with {}", config);

    let source_err = |e: io::Error| ArchiveError::Source {
        path: config.source.clone(),
        source: e,
    };
    let source_md = fs::metadata(&config.source).map_err(source_err)?;
    // Walked and compared against the target in resolved form; named after
    // the path as given.
    let root = fs::canonicalize(&config.source).map_err(source_err)?;
    let named = lexical_absolute(&config.source).map_err(source_err)?;

    let file = create_target(config, &root, source_md.is_dir())?;
    let target_abs = fs::canonicalize(&config.target).ok();
    let mut zip = ZipContainer::with_level(BufWriter::new(file), config.level.get());
    let mut summary = ArchiveSummary::default();

    if source_md.is_dir() {
        let prefix = base_prefix(&named);
        if prefix.is_some() {
            // The base folder itself, so readers see an explicit top directory.
            let base = SourceEntry {
                path: root.clone(),
                rel: String::new(),
                name: Vec::new(),
                metadata: source_md,
            };
            write_entry(&mut zip, config, prefix.as_deref(), &base, &mut summary)?;
        }
        for entry in walk_source(&root, &config.excludes, target_abs.as_deref()) {
            let entry = entry?;
            write_entry(&mut zip, config, prefix.as_deref(), &entry, &mut summary)?;
        }
    } else {
        let file_name = named
            .file_name()
            .ok_or_else(|| ArchiveError::NoBaseName(config.source.clone()))?;
        let rel = file_name.to_string_lossy().into_owned();
        if config.excludes.should_skip(Path::new(file_name)) {
            warn!("{} matches an exclude pattern; the archive is empty", rel);
        } else {
            let entry = SourceEntry {
                path: root.clone(),
                name: component_name(file_name),
                rel,
                metadata: source_md,
            };
            write_entry(&mut zip, config, None, &entry, &mut summary)?;
        }
    }

    let sink = zip.finish()?;
    let file = sink.into_inner().map_err(|e| e.into_error())?;
    drop(file);

    info!("{}: {}", config.target.display(), summary);
    Ok(summary)
}

fn create_target(config: &ZipConfig, root: &Path, source_is_dir: bool) -> Result<File> {
    let target = &config.target;
    let create_err = |source: io::Error| ArchiveError::CreateTarget {
        path: target.clone(),
        source,
    };

    if !source_is_dir && fs::canonicalize(target).ok().as_deref() == Some(root) {
        return Err(create_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "target archive is the source file",
        )));
    }
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(create_err)?;
        }
    }
    File::create(target).map_err(create_err)
}

fn write_entry<W: Write + Seek>(
    zip: &mut ZipContainer<W>,
    config: &ZipConfig,
    prefix: Option<&[u8]>,
    entry: &SourceEntry,
    summary: &mut ArchiveSummary,
) -> Result<()> {
    let mut name = Vec::with_capacity(entry.name.len() + 16);
    if let Some(p) = prefix {
        name.extend_from_slice(p);
        if !entry.name.is_empty() {
            name.push(b'/');
        }
    }
    name.extend_from_slice(&entry.name);
    if entry.is_dir() {
        name.push(b'/');
    }

    let entry_name = encode_entry_bytes(&name, config.name_encoding);
    if entry_name.was_transcoded() {
        summary.transcoded += 1;
    }
    let name = entry_name.display().into_owned();
    let header = EntryHeader::from_metadata(entry_name, &entry.metadata, config.level.method());
    let method = header.method;

    if entry.is_dir() {
        zip.add_directory(header)?;
        summary.dirs += 1;
        info!("adding: {} (stored 0%)", name);
        return Ok(());
    }

    let mut src = File::open(&entry.path).map_err(|e| ArchiveError::io(&entry.path, e))?;
    let mut writer = zip.create_entry(header)?;
    io::copy(&mut src, &mut writer).map_err(|e| ArchiveError::io(&entry.path, e))?;
    let written = writer.close()?;

    summary.files += 1;
    summary.bytes_in += written.uncompressed;
    summary.bytes_out += written.compressed;
    info!(
        "adding: {} ({} {}%)",
        name,
        method.label(),
        saved_percent(written.uncompressed, written.compressed)
    );
    Ok(())
}

fn saved_percent(uncompressed: u64, compressed: u64) -> u64 {
    if uncompressed == 0 || compressed >= uncompressed {
        0
    } else {
        (uncompressed - compressed) * 100 / uncompressed
    }
}
