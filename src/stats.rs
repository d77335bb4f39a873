//! Statistics for a parse run.
//!
//! [`ParseStats`] is itself a [`DiagnosticSink`], so it counts every dropped
//! line as the parser reports it. The assembled reads are added afterwards
//! with [`ParseStats::record_reads`].

use std::collections::HashMap;

use hdrhistogram::Histogram;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::reading::MeterRead;

/// Counters for one or more parse runs.
#[derive(Debug)]
pub struct ParseStats {
    /// Lines handed to the parser
    pub lines: u64,

    /// Bytes of those lines
    pub bytes: u64,

    /// Meter reads produced
    pub meter_reads: u64,

    /// Dated volumes across all meter reads
    pub volumes: u64,

    /// Inputs rejected for a missing start or end marker
    pub envelope_rejections: u64,

    /// 200 records dropped for field count or NMI length
    pub malformed_block_starts: u64,

    /// 300 records dropped for field count
    pub malformed_details: u64,

    /// 300 records with no open block
    pub orphan_details: u64,

    /// Lines dropped for bad content
    pub content_skipped: u64,

    /// Distribution of volumes per meter read
    volumes_per_read: Histogram<u64>,

    /// Exact volume totals per energy unit; `None` once a total overflows
    totals_by_unit: HashMap<String, Option<Decimal>>,
}

impl ParseStats {
    pub fn new() -> Self {
        Self {
            lines: 0,
            bytes: 0,
            meter_reads: 0,
            volumes: 0,
            envelope_rejections: 0,
            malformed_block_starts: 0,
            malformed_details: 0,
            orphan_details: 0,
            content_skipped: 0,
            // Auto-resizing so a very long block never fails to record
            volumes_per_read: Histogram::new(3).expect("Failed to create volumes histogram"),
            totals_by_unit: HashMap::new(),
        }
    }

    /// Record the raw input handed to the parser.
    pub fn record_lines<S: AsRef<str>>(&mut self, lines: &[S]) {
        self.lines += lines.len() as u64;
        self.bytes += lines.iter().map(|l| l.as_ref().len() as u64).sum::<u64>();
    }

    /// Record the meter reads a parse produced.
    pub fn record_reads(&mut self, reads: &[MeterRead]) {
        for read in reads {
            let count = read.volumes.len() as u64;
            self.meter_reads += 1;
            self.volumes += count;
            let _ = self.volumes_per_read.record(count);
            let total = self
                .totals_by_unit
                .entry(read.energy_unit.to_string())
                .or_insert(Some(Decimal::ZERO));
            *total = total
                .zip(read.total_volume())
                .and_then(|(sum, volume)| sum.checked_add(volume));
        }
    }

    /// Total lines dropped for any reason.
    pub fn dropped_lines(&self) -> u64 {
        self.malformed_block_starts
            + self.malformed_details
            + self.orphan_details
            + self.content_skipped
    }

    /// Generate a summary report.
    pub fn summary(&self) -> StatsSummary {
        let volumes_per_read = (self.volumes_per_read.len() > 0).then(|| HistogramPercentiles {
            p50: self.volumes_per_read.value_at_quantile(0.50),
            p90: self.volumes_per_read.value_at_quantile(0.90),
            p99: self.volumes_per_read.value_at_quantile(0.99),
            min: self.volumes_per_read.min(),
            max: self.volumes_per_read.max(),
            mean: self.volumes_per_read.mean(),
        });

        let mut totals_by_unit: Vec<(String, Option<Decimal>)> = self
            .totals_by_unit
            .iter()
            .map(|(unit, total)| (unit.clone(), *total))
            .collect();
        totals_by_unit.sort_by(|a, b| a.0.cmp(&b.0));

        StatsSummary {
            lines: self.lines,
            bytes: self.bytes,
            meter_reads: self.meter_reads,
            volumes: self.volumes,
            envelope_rejections: self.envelope_rejections,
            malformed_block_starts: self.malformed_block_starts,
            malformed_details: self.malformed_details,
            orphan_details: self.orphan_details,
            content_skipped: self.content_skipped,
            volumes_per_read,
            totals_by_unit,
        }
    }
}

impl Default for ParseStats {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for ParseStats {
    fn report(&mut self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::EnvelopeRejected(_) => self.envelope_rejections += 1,
            Diagnostic::MalformedBlockStart { .. } | Diagnostic::InvalidNmi { .. } => {
                self.malformed_block_starts += 1
            }
            Diagnostic::MalformedDetail { .. } => self.malformed_details += 1,
            Diagnostic::OrphanDetail { .. } => self.orphan_details += 1,
            Diagnostic::ContentSkipped { .. } => self.content_skipped += 1,
        }
    }
}

/// Percentile values from a histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPercentiles {
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Summary of collected statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub lines: u64,
    pub bytes: u64,
    pub meter_reads: u64,
    pub volumes: u64,
    pub envelope_rejections: u64,
    pub malformed_block_starts: u64,
    pub malformed_details: u64,
    pub orphan_details: u64,
    pub content_skipped: u64,
    pub volumes_per_read: Option<HistogramPercentiles>,
    pub totals_by_unit: Vec<(String, Option<Decimal>)>,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "                  NEM12 PARSE STATISTICS")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Lines: {} ({} bytes)", self.lines, self.bytes)?;
        writeln!(f, "Meter reads: {}", self.meter_reads)?;
        writeln!(f, "Volumes: {}", self.volumes)?;
        if self.envelope_rejections > 0 {
            writeln!(f, "Rejected inputs: {}", self.envelope_rejections)?;
        }
        writeln!(f)?;

        writeln!(f, "Dropped lines:")?;
        writeln!(f, "  Malformed 200 records: {}", self.malformed_block_starts)?;
        writeln!(f, "  Malformed 300 records: {}", self.malformed_details)?;
        writeln!(f, "  Orphan 300 records: {}", self.orphan_details)?;
        writeln!(f, "  Bad content: {}", self.content_skipped)?;

        if let Some(ref p) = self.volumes_per_read {
            writeln!(f)?;
            writeln!(f, "Volumes per Meter Read:")?;
            writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
            writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
        }

        if !self.totals_by_unit.is_empty() {
            writeln!(f)?;
            writeln!(f, "Totals by Unit:")?;
            for (unit, total) in &self.totals_by_unit {
                match total {
                    Some(total) => writeln!(f, "  {}: {}", unit, total)?,
                    None => writeln!(f, "  {}: overflow", unit)?,
                }
            }
        }

        Ok(())
    }
}
