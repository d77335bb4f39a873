//! Reading NEM12 files from disk.
//!
//! The parser works on lines already in memory; this module is the only
//! place that touches the filesystem.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::parser::{ContentErrorPolicy, Nem12Parser, ParseError, ParseResult};
use crate::reading::MeterRead;

/// Read every line of `path`, trimmed.
///
/// A line that is not valid UTF-8 fails with [`ParseError::Encoding`], kept
/// apart from [`ParseError::Io`] so bad content never looks like a missing file.
pub fn read_lines(path: &Path) -> ParseResult<Vec<String>> {
    let io_error = |source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    BufReader::new(file)
        .split(b'\n')
        .enumerate()
        .map(|(index, bytes)| {
            let bytes = bytes.map_err(io_error)?;
            String::from_utf8(bytes)
                .map(|line| line.trim().to_string())
                .map_err(|_| ParseError::Encoding {
                    path: path.to_path_buf(),
                    line: index + 1,
                })
        })
        .collect()
}

/// Parse a NEM12 file the lenient way.
///
/// A missing or unreadable file is logged and treated like an empty one, so
/// the result is `Ok(vec![])`. Encoding errors and content errors inside a
/// readable file are still returned, the latter according to `policy`. Use [`Nem12Parser::parse_file`] to tell the two apart.
pub fn parse_simple_nem12(
    path: impl AsRef<Path>,
    policy: ContentErrorPolicy,
) -> ParseResult<Vec<MeterRead>> {
    let parser = Nem12Parser::with_policy(policy);
    match parser.parse_file(path) {
        Err(ParseError::Io { path, source }) => {
            warn!("Could not read {}: {}", path.display(), source);
            Ok(Vec::new())
        }
        other => other,
    }
}
