//! # `cnzip`: Zip a Directory with Legacy-Friendly Chinese File Names
//!
//! Archives one directory (or a single file) into a deflate-compressed zip.
//! Entry names containing Chinese characters are stored as GB18030 so that
//! zip readers which ignore the UTF-8 flag (the Windows shell on Chinese
//! locales, older unzip builds) show them correctly.
//!
//! ## Key Features:
//! - **Whole-tree archiving**: every file and directory under the source is
//!   nested under a top folder named after the source.
//! - **Exclusion patterns**: `-x` takes space-separated globs matched against
//!   each path component, so `-x node_modules` drops every `node_modules`
//!   directory and everything in it.
//! - **Default target**: without `-r`, `<source name>.zip` is written to the
//!   current directory.
//! - **Compression level**: `-l 0` stores, `-l 1`..`-l 9` deflate.
//!
//! ## Usage
//!
//! ```bash
//! cnzip [OPTIONS] [SOURCE]
//!
//! # Archive the current directory into ./<dirname>.zip
//! cnzip
//!
//! # Archive proj/ into release.zip without dependencies or logs
//! cnzip -r release.zip -x "node_modules *.log" proj
//!
//! # Keep UTF-8 names for modern readers
//! cnzip --utf8 -r docs.zip docs
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use lib_cnzip::loggers::init_logging;
use lib_cnzip::{CompressionLevel, ExcludeSet, NameEncoding, ZipConfig, build_archive_with};
use std::path::PathBuf;

/// # Command Line Arguments
///
/// Defines the command-line arguments and options for `cnzip`, using `clap`
/// for parsing and help generation.
#[derive(Parser, Debug)]
#[command(
    name = "cnzip",
    about = "Zip a directory, storing Chinese entry names as GB18030",
    version // Automatically pulls version from Cargo.toml.
)]
struct Args {
    /// Path of the zip file to create. Defaults to `<source name>.zip`.
    #[arg(short = 'r', long = "target", value_name = "PATH", value_hint = ValueHint::FilePath)]
    target: Option<PathBuf>,

    /// Space-separated glob patterns to exclude. May be given more than once.
    #[arg(
        short = 'x',
        long = "exclude",
        value_name = "PATTERNS",
        action = ArgAction::Append,
        env = "CNZIP_EXCLUDE"
    )]
    exclude: Vec<String>,

    /// Deflate level, 0 (store only) to 9 (smallest).
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u32).range(0..=9))]
    level: Option<u32>,

    /// Store entry names as UTF-8 instead of GB18030.
    #[arg(long)]
    utf8: bool,

    /// Show each entry as it is added.
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    verbose: bool,

    /// Print nothing on success.
    #[arg(short = 'q', long)]
    quiet: bool,

    /// File or directory to archive.
    #[arg(value_hint = ValueHint::AnyPath, default_value = ".")]
    source: PathBuf,
}

impl Args {
    fn log_level(&self) -> &'static str {
        if self.verbose {
            "lib_cnzip=info,warn"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    /// Builds the run configuration once; nothing below reads `Args` again.
    fn to_config(&self) -> Result<ZipConfig> {
        let mut config = ZipConfig::new(&self.source, self.target.clone())
            .with_context(|| format!("Cannot archive {}", self.source.display()))?
            .with_excludes(ExcludeSet::parse_all(&self.exclude));
        if self.utf8 {
            config = config.with_name_encoding(NameEncoding::Utf8);
        }
        if let Some(level) = self.level {
            config = config.with_level(CompressionLevel::new(level));
        }
        Ok(config)
    }
}

/// # Main Entry Point
///
/// Parses arguments, sets up logging, runs the archive and reports the
/// outcome. Any failure prints `Error: ...` to stderr and exits with 1.
fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_level()) {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.to_config()?;

    let summary = build_archive_with(&config)
        .with_context(|| format!("Failed to create {}", config.target.display()))?;
    tracing::debug!("{}", summary);

    if !args.quiet {
        println!("File zipped successfully!");
    }
    Ok(())
}
