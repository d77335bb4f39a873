//! Non-fatal notices emitted while assembling meter reads.
//!
//! The parser never prints. Anything worth reporting about a skipped line
//! goes to a [`DiagnosticSink`] supplied by the caller; the sink has no
//! influence on the parse result.

use std::fmt;

use tracing::{debug, warn};

use crate::reading::ContentError;

/// Why an input was rejected before any record was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeViolation {
    /// The first line does not start with `100`.
    MissingFileStart,
    /// The last line does not end with `900`.
    MissingFileEnd,
}

/// A notice about a line that was dropped or an input that was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    EnvelopeRejected(EnvelopeViolation),

    /// A 200 record without exactly 3 fields.
    MalformedBlockStart { line: usize, fields: usize },

    /// A 200 record whose NMI is not 10 characters long.
    InvalidNmi { line: usize, nmi: String },

    /// A 300 record without exactly 4 fields.
    MalformedDetail { line: usize, fields: usize },

    /// A 300 record seen before any block was opened.
    OrphanDetail { line: usize },

    /// A line dropped for bad content while skipping is enabled.
    ContentSkipped { line: usize, error: ContentError },
}

impl Diagnostic {
    /// The 1-based input line the notice refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Diagnostic::EnvelopeRejected(_) => None,
            Diagnostic::MalformedBlockStart { line, .. }
            | Diagnostic::InvalidNmi { line, .. }
            | Diagnostic::MalformedDetail { line, .. }
            | Diagnostic::OrphanDetail { line }
            | Diagnostic::ContentSkipped { line, .. } => Some(*line),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::EnvelopeRejected(EnvelopeViolation::MissingFileStart) => {
                write!(f, "input rejected: first line is not a 100 record")
            }
            Diagnostic::EnvelopeRejected(EnvelopeViolation::MissingFileEnd) => {
                write!(f, "input rejected: last line does not end with 900")
            }
            Diagnostic::MalformedBlockStart { line, fields } => {
                write!(f, "line {}: 200 record has {} fields, expected 3", line, fields)
            }
            Diagnostic::InvalidNmi { line, nmi } => {
                write!(f, "line {}: NMI {:?} is not 10 characters", line, nmi)
            }
            Diagnostic::MalformedDetail { line, fields } => {
                write!(f, "line {}: 300 record has {} fields, expected 4", line, fields)
            }
            Diagnostic::OrphanDetail { line } => {
                write!(f, "line {}: meter read is missing for 300 record", line)
            }
            Diagnostic::ContentSkipped { line, error } => {
                write!(f, "line {}: skipped, {}", line, error)
            }
        }
    }
}

/// Receiver for parser diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing`.
///
/// Orphan details and skipped content are warnings; structural leniency is
/// only visible at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::OrphanDetail { .. }
            | Diagnostic::ContentSkipped { .. }
            | Diagnostic::EnvelopeRejected(_) => warn!("{}", diagnostic),
            _ => debug!("{}", diagnostic),
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&mut self, _diagnostic: &Diagnostic) {}
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.push(diagnostic.clone());
    }
}

impl<F> DiagnosticSink for F
where
    F: FnMut(&Diagnostic),
{
    fn report(&mut self, diagnostic: &Diagnostic) {
        self(diagnostic)
    }
}

/// Fans one diagnostic out to two sinks.
#[derive(Debug)]
pub struct Tee<'a, A: DiagnosticSink, B: DiagnosticSink>(pub &'a mut A, pub &'a mut B);

impl<A: DiagnosticSink, B: DiagnosticSink> DiagnosticSink for Tee<'_, A, B> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.0.report(diagnostic);
        self.1.report(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_numbers() {
        assert_eq!(Diagnostic::OrphanDetail { line: 4 }.line(), Some(4));
        assert_eq!(
            Diagnostic::EnvelopeRejected(EnvelopeViolation::MissingFileEnd).line(),
            None
        );
    }

    #[test]
    fn test_display() {
        let d = Diagnostic::InvalidNmi {
            line: 2,
            nmi: "123".to_string(),
        };
        assert_eq!(d.to_string(), "line 2: NMI \"123\" is not 10 characters");

        let d = Diagnostic::ContentSkipped {
            line: 7,
            error: ContentError::UnknownQuality("X".to_string()),
        };
        assert_eq!(d.to_string(), "line 7: skipped, Unknown quality flag: \"X\"");
    }

    #[test]
    fn test_closure_and_tee_sinks() {
        let mut count = 0;
        let mut collected: Vec<Diagnostic> = Vec::new();
        {
            let mut counter = |_: &Diagnostic| count += 1;
            let mut tee = Tee(&mut counter, &mut collected);
            tee.report(&Diagnostic::OrphanDetail { line: 1 });
            tee.report(&Diagnostic::OrphanDetail { line: 2 });
        }
        assert_eq!(count, 2);
        assert_eq!(collected.len(), 2);
    }
}
