//! # lib_cnzip
//!
//! Archives a directory (or a single file) into a deflate-compressed zip,
//! skipping paths whose components match glob patterns and storing Chinese
//! entry names as GB18030 so legacy zip readers display them correctly.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let summary = lib_cnzip::build_archive(
//!     Path::new("proj"),
//!     Path::new("proj.zip"),
//!     &["node_modules *.log".to_string()],
//! )?;
//! println!("{summary}");
//! # Ok::<(), lib_cnzip::ArchiveError>(())
//! ```

#![forbid(unsafe_code)]

pub mod archive;
pub mod configs;
pub mod encoding;
pub mod error;
pub mod filters;
#[cfg(feature = "loggers")]
pub mod loggers;

// Re-exports: stable API surface
pub use archive::builder::{ArchiveSummary, build_archive, build_archive_with};
pub use configs::config_zip::{CompressionLevel, ZipConfig, default_target_for};
pub use encoding::transcode::{NameEncoding, needs_transcode, transcode};
pub use error::{ArchiveError, Result};
pub use filters::exclude::{ExcludeSet, should_skip};
