//! Parser for simplified NEM12 metering files.
//!
//! A file is a sequence of comma-delimited records, each identified by a
//! numeric record-type prefix:
//!
//! ```text
//! 100,NEM12,201801211010,MYENERGY,OTHERENERGY
//! 200,1234567890,KWH
//! 300,20230101,12.5,A
//! 300,20230102,9.0,A
//! 900
//! ```
//!
//! The input is accepted only when its first line is a `100` record and its
//! last line ends with `900`. Between those markers, every `200` record opens
//! a new [`MeterRead`] and every following `300` record adds one dated volume
//! to it. Other record types are ignored.
//!
//! Structurally malformed lines (wrong field count, bad NMI length) are
//! skipped. Content errors (bad date, volume, unit or quality) are governed by
//! [`ContentErrorPolicy`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while_m_n},
    character::complete::{char, digit1, one_of},
    combinator::{all_consuming, map_res, opt, recognize, value},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticSink, EnvelopeViolation, TracingSink};
use crate::reading::{ContentError, EnergyUnit, MeterRead, MeterVolume, Quality};

pub const DELIMITER: char = ',';
pub const NMI_LENGTH: usize = 10;
pub const BLOCK_START_FIELDS: usize = 3;
pub const DETAIL_FIELDS: usize = 4;

pub const FILE_START: &str = "100";
pub const BLOCK_START: &str = "200";
pub const DETAIL: &str = "300";
pub const FILE_END: &str = "900";

/// Errors that abort a parse.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: {source}")]
    Content {
        line: usize,
        #[source]
        source: ContentError,
    },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: line {line} is not valid UTF-8", .path.display())]
    Encoding { path: PathBuf, line: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// What to do with a structurally valid line whose content cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentErrorPolicy {
    /// Fail the whole parse with no partial result.
    #[default]
    Abort,
    /// Drop the line, report it, and keep going.
    Skip,
}

impl FromStr for ContentErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(ContentErrorPolicy::Abort),
            "skip" => Ok(ContentErrorPolicy::Skip),
            other => Err(format!("unknown content error policy: {}", other)),
        }
    }
}

impl fmt::Display for ContentErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentErrorPolicy::Abort => write!(f, "abort"),
            ContentErrorPolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Record type, identified by the line's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    FileStart,
    BlockStart,
    Detail,
    FileEnd,
    Other,
}

fn parse_record_type(input: &str) -> IResult<&str, RecordType> {
    alt((
        value(RecordType::FileStart, tag(FILE_START)),
        value(RecordType::BlockStart, tag(BLOCK_START)),
        value(RecordType::Detail, tag(DETAIL)),
        value(RecordType::FileEnd, tag(FILE_END)),
    ))
    .parse(input)
}

/// Classify a line by its record-type prefix.
#[inline]
pub fn classify(line: &str) -> RecordType {
    parse_record_type(line.trim())
        .map(|(_, record_type)| record_type)
        .unwrap_or(RecordType::Other)
}

/// Parse an 8-digit `YYYYMMDD` date.
fn parse_read_date(input: &str) -> IResult<&str, NaiveDate> {
    map_res(take_while_m_n(8, 8, |c: char| c.is_ascii_digit()), |s: &str| {
        let year: i32 = s[0..4].parse().map_err(|_| "Invalid year")?;
        let month: u32 = s[4..6].parse().map_err(|_| "Invalid month")?;
        let day: u32 = s[6..8].parse().map_err(|_| "Invalid day")?;
        NaiveDate::from_ymd_opt(year, month, day).ok_or("Invalid date values")
    })
    .parse(input)
}

/// Parse the date field of a 300 record.
pub fn parse_date_field(field: &str) -> Result<NaiveDate, ContentError> {
    let field = field.trim();
    all_consuming(parse_read_date)
        .parse(field)
        .map(|(_, date)| date)
        .map_err(|_| ContentError::InvalidDate(field.to_string()))
}

/// Recognize a plain decimal literal: optional sign, digits, optional fraction.
fn parse_decimal_literal(input: &str) -> IResult<&str, &str> {
    recognize((opt(one_of("+-")), digit1, opt((char('.'), digit1)))).parse(input)
}

/// Parse the volume field of a 300 record as an exact decimal.
///
/// Values that cannot be held without rounding are rejected.
pub fn parse_volume_field(field: &str) -> Result<Decimal, ContentError> {
    let field = field.trim();
    let invalid = || ContentError::InvalidVolume(field.to_string());
    let (_, literal) = all_consuming(parse_decimal_literal)
        .parse(field)
        .map_err(|_| invalid())?;
    Decimal::from_str_exact(literal).map_err(|_| invalid())
}

/// Split a record into fields, dropping empty fields left by trailing delimiters.
fn split_fields(line: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = line.split(DELIMITER).collect();
    while fields.len() > 1 && fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// Build a meter read from a 200 record.
///
/// `Ok(None)` means the line was structurally malformed and has been reported.
fn parse_block_start<D>(
    line_no: usize,
    line: &str,
    sink: &mut D,
) -> Result<Option<MeterRead>, ContentError>
where
    D: DiagnosticSink + ?Sized,
{
    let fields = split_fields(line);
    if fields.len() != BLOCK_START_FIELDS {
        sink.report(&Diagnostic::MalformedBlockStart {
            line: line_no,
            fields: fields.len(),
        });
        return Ok(None);
    }

    let nmi = fields[1].trim();
    if nmi.chars().count() != NMI_LENGTH {
        sink.report(&Diagnostic::InvalidNmi {
            line: line_no,
            nmi: nmi.to_string(),
        });
        return Ok(None);
    }

    let unit: EnergyUnit = fields[2].parse()?;
    Ok(Some(MeterRead::new(nmi, unit)))
}

/// Build a dated volume from a 300 record.
fn parse_detail<D>(
    line_no: usize,
    line: &str,
    sink: &mut D,
) -> Result<Option<(NaiveDate, MeterVolume)>, ContentError>
where
    D: DiagnosticSink + ?Sized,
{
    let fields = split_fields(line);
    if fields.len() != DETAIL_FIELDS {
        sink.report(&Diagnostic::MalformedDetail {
            line: line_no,
            fields: fields.len(),
        });
        return Ok(None);
    }

    let date = parse_date_field(fields[1])?;
    let volume = parse_volume_field(fields[2])?;
    let quality: Quality = fields[3].parse()?;
    Ok(Some((date, MeterVolume::new(volume, quality))))
}

/// Assembles meter reads from the lines of a simplified NEM12 file.
///
/// The parser holds no state between calls; one instance can be reused for
/// any number of inputs.
///
/// # Example
///
/// ```
/// use nem12_parser::parser::Nem12Parser;
///
/// let lines = [
///     "100,NEM12,201801211010,MYENERGY,OTHERENERGY",
///     "200,1234567890,KWH",
///     "300,20230101,12.5,A",
///     "900",
/// ];
/// let reads = Nem12Parser::new().parse(&lines).unwrap();
/// assert_eq!(reads.len(), 1);
/// assert_eq!(reads[0].nmi, "1234567890");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Nem12Parser {
    policy: ContentErrorPolicy,
}

impl Nem12Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ContentErrorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ContentErrorPolicy {
        self.policy
    }

    /// Parse lines, sending diagnostics to `tracing`.
    pub fn parse<S: AsRef<str>>(&self, lines: &[S]) -> ParseResult<Vec<MeterRead>> {
        self.parse_with_sink(lines, &mut TracingSink)
    }

    /// Read a file and parse it. I/O failure is reported as [`ParseError::Io`].
    pub fn parse_file(&self, path: impl AsRef<Path>) -> ParseResult<Vec<MeterRead>> {
        let lines = crate::source::read_lines(path.as_ref())?;
        self.parse(&lines)
    }

    /// Parse lines, sending diagnostics to `sink`.
    ///
    /// Returns the meter reads in the order their 200 records appear. An
    /// input without a valid envelope yields an empty collection.
    pub fn parse_with_sink<S, D>(&self, lines: &[S], sink: &mut D) -> ParseResult<Vec<MeterRead>>
    where
        S: AsRef<str>,
        D: DiagnosticSink + ?Sized,
    {
        let mut reads: Vec<MeterRead> = Vec::new();

        let (Some(first), Some(last)) = (lines.first(), lines.last()) else {
            return Ok(reads);
        };
        if !first.as_ref().trim().starts_with(FILE_START) {
            sink.report(&Diagnostic::EnvelopeRejected(
                EnvelopeViolation::MissingFileStart,
            ));
            return Ok(reads);
        }
        if !last.as_ref().trim().ends_with(FILE_END) {
            sink.report(&Diagnostic::EnvelopeRejected(EnvelopeViolation::MissingFileEnd));
            return Ok(reads);
        }

        for (index, raw) in lines.iter().enumerate() {
            let line_no = index + 1;
            let line = raw.as_ref().trim();

            match classify(line) {
                RecordType::BlockStart => {
                    let outcome = parse_block_start(line_no, line, sink);
                    if let Some(read) = self.resolve(line_no, outcome, sink)? {
                        reads.push(read);
                    }
                }
                RecordType::Detail => {
                    // The open block is always the most recently appended read.
                    let Some(current) = reads.last_mut() else {
                        sink.report(&Diagnostic::OrphanDetail { line: line_no });
                        continue;
                    };
                    let outcome = parse_detail(line_no, line, sink);
                    if let Some((date, volume)) = self.resolve(line_no, outcome, sink)? {
                        current.append_volume(date, volume);
                    }
                }
                _ => {}
            }
        }

        debug!("Parsed {} meter read(s) from {} line(s)", reads.len(), lines.len());
        Ok(reads)
    }

    /// Apply the content error policy to a single line's outcome.
    fn resolve<T, D>(
        &self,
        line: usize,
        outcome: Result<Option<T>, ContentError>,
        sink: &mut D,
    ) -> ParseResult<Option<T>>
    where
        D: DiagnosticSink + ?Sized,
    {
        match outcome {
            Ok(parsed) => Ok(parsed),
            Err(error) => match self.policy {
                ContentErrorPolicy::Abort => Err(ParseError::Content {
                    line,
                    source: error,
                }),
                ContentErrorPolicy::Skip => {
                    sink.report(&Diagnostic::ContentSkipped { line, error });
                    Ok(None)
                }
            },
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::diagnostics::NullSink;
    use proptest::prelude::*;

    fn detail_line() -> impl Strategy<Value = String> {
        (
            2000i32..2030,
            1u32..=12,
            1u32..=28,
            0i64..1_000_000,
            0u32..4,
            prop::sample::select(vec!["A", "E", "F", "N", "S", "V"]),
        )
            .prop_map(|(y, m, d, mantissa, scale, quality)| {
                format!(
                    "300,{:04}{:02}{:02},{},{}",
                    y,
                    m,
                    d,
                    Decimal::new(mantissa, scale),
                    quality
                )
            })
    }

    fn file_with(body: Vec<String>) -> Vec<String> {
        let mut lines = vec!["100,NEM12".to_string(), "200,1234567890,KWH".to_string()];
        lines.extend(body);
        lines.push("900".to_string());
        lines
    }

    proptest! {
        #[test]
        fn rejects_inputs_without_file_start(
            first in "[0-9A-Za-z,. ]{0,16}".prop_filter("not a file start", |s| !s.trim().starts_with(FILE_START)),
            body in prop::collection::vec("[0-9A-Z,.]{0,24}", 0..8),
        ) {
            let mut lines = vec![first];
            lines.extend(body);
            lines.push("900".to_string());
            let reads = Nem12Parser::new().parse_with_sink(&lines, &mut NullSink).unwrap();
            prop_assert!(reads.is_empty());
        }

        #[test]
        fn rejects_inputs_without_file_end(
            body in prop::collection::vec("[0-9A-Z,.]{0,24}", 0..8),
            last in "[0-9A-Za-z,. ]{0,16}".prop_filter("not a file end", |s| !s.trim().ends_with(FILE_END)),
        ) {
            let mut lines = vec!["100,NEM12".to_string()];
            lines.extend(body);
            lines.push(last);
            let reads = Nem12Parser::new().parse_with_sink(&lines, &mut NullSink).unwrap();
            prop_assert!(reads.is_empty());
        }

        #[test]
        fn repeating_detail_lines_is_idempotent(body in prop::collection::vec(detail_line(), 0..20)) {
            let once = Nem12Parser::new().parse_with_sink(&file_with(body.clone()), &mut NullSink).unwrap();
            let twice_body: Vec<String> = body.iter().flat_map(|l| [l.clone(), l.clone()]).collect();
            let twice = Nem12Parser::new().parse_with_sink(&file_with(twice_body), &mut NullSink).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn last_detail_for_a_date_wins(body in prop::collection::vec(detail_line(), 1..20)) {
            let reads = Nem12Parser::new().parse_with_sink(&file_with(body.clone()), &mut NullSink).unwrap();
            prop_assert_eq!(reads.len(), 1);

            let last = body.last().unwrap();
            let fields: Vec<&str> = last.split(',').collect();
            let date = parse_date_field(fields[1]).unwrap();
            let expected = MeterVolume::new(
                parse_volume_field(fields[2]).unwrap(),
                fields[3].parse().unwrap(),
            );
            prop_assert_eq!(reads[0].volume(date), Some(&expected));
        }
    }
}
