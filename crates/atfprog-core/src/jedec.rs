//! JEDEC fuse map loading
//!
//! Only fuse data records are interpreted. A record looks like
//!
//! ```text
//! *L00264 000000000000000000000000000000000000000000000000
//! ```
//!
//! i.e. the `*L` marker, a 5-digit decimal base address, one delimiter
//! character and a run of fuse characters up to the end of the line. All other
//! lines (header, `*QF`, `*F`, `*C` checksum, notes) are skipped; fuses not
//! covered by any record stay cleared.
//!
//! Parsing is all-or-nothing: the first bad record fails the whole map.

use core::ops::Range;

use crate::error::{FormatError, FormatErrorKind, Result};
use crate::fuses::{FuseArray, FuseMap};

/// Marker that starts a fuse data record
pub const RECORD_MARKER: &str = "*L";

/// Columns holding the decimal base address
const ADDRESS_FIELD: Range<usize> = 2..7;

/// Column of the delimiter between address and fuse data
const DELIMITER: usize = 7;

/// Split a fuse record into base address and fuse run
fn parse_record(line: &str) -> core::result::Result<(usize, &str), FormatErrorKind> {
    let field = line
        .get(ADDRESS_FIELD)
        .filter(|f| f.bytes().all(|b| b.is_ascii_digit()))
        .ok_or(FormatErrorKind::InvalidAddress)?;
    let base = field
        .parse::<usize>()
        .map_err(|_| FormatErrorKind::InvalidAddress)?;

    let run = match line.as_bytes().get(DELIMITER) {
        None => "",
        Some(b) if b.is_ascii_whitespace() => line[DELIMITER + 1..].trim(),
        Some(_) => return Err(FormatErrorKind::InvalidDelimiter),
    };

    Ok((base, run))
}

/// Incremental JEDEC parser, fed one line at a time
#[derive(Debug, Default)]
pub struct JedecParser {
    fuses: FuseArray,
    line: usize,
    records: usize,
}

impl JedecParser {
    /// Start with a cleared fuse array
    pub fn new() -> Self {
        Self::default()
    }

    /// Process the next line of the file
    pub fn feed_line(&mut self, line: &str) -> core::result::Result<(), FormatError> {
        self.line += 1;
        if !line.starts_with(RECORD_MARKER) {
            return Ok(());
        }

        let line_no = self.line;
        let err = |kind| FormatError {
            line: line_no,
            kind,
        };

        let (base, run) = parse_record(line).map_err(err)?;
        self.fuses.apply_record(base, run).map_err(err)?;
        self.records += 1;

        log::trace!("jedec: line {}: {} fuses at {}", line_no, run.len(), base);
        Ok(())
    }

    /// The flat fuse array built so far
    pub fn fuses(&self) -> &FuseArray {
        &self.fuses
    }

    /// Finish parsing and project the fuses into their programmable form
    pub fn finish(self) -> FuseMap {
        log::debug!(
            "jedec: {} lines, {} fuse records, {} fuses set",
            self.line,
            self.records,
            self.fuses.count_set()
        );
        FuseMap::from_fuse_array(&self.fuses)
    }
}

impl FuseMap {
    /// Parse a JEDEC fuse map held in memory
    pub fn from_jedec_str(content: &str) -> Result<Self> {
        let mut parser = JedecParser::new();
        for line in content.lines() {
            parser.feed_line(line)?;
        }
        Ok(parser.finish())
    }
}

#[cfg(feature = "std")]
pub use self::file::{parse, LoadError};

#[cfg(feature = "std")]
mod file {
    use std::fs::File;
    use std::io::{BufRead, BufReader};
    use std::path::{Path, PathBuf};

    use super::JedecParser;
    use crate::error::FormatError;
    use crate::fuses::FuseMap;

    /// Failure to load a JEDEC file
    #[derive(Debug, thiserror::Error)]
    pub enum LoadError {
        /// The file could not be opened or read
        #[error("failed to read {}: {source}", .path.display())]
        Io {
            /// File being read
            path: PathBuf,
            /// Underlying I/O error
            #[source]
            source: std::io::Error,
        },

        /// The file contains a malformed fuse record
        #[error("{}: {source}", .path.display())]
        Format {
            /// File being parsed
            path: PathBuf,
            /// Offending record
            #[source]
            source: FormatError,
        },
    }

    /// Load and parse a JEDEC fuse map file
    pub fn parse(path: impl AsRef<Path>) -> Result<FuseMap, LoadError> {
        let path = path.as_ref();
        let io_err = |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };

        let reader = BufReader::new(File::open(path).map_err(io_err)?);
        let mut parser = JedecParser::new();
        for line in reader.lines() {
            let line = line.map_err(io_err)?;
            parser.feed_line(&line).map_err(|source| LoadError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        }

        log::info!("Loaded fuse map from {}", path.display());
        Ok(parser.finish())
    }
}
