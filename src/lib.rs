//! NEM12 Parser - A Rust library and CLI for parsing simplified NEM12 metering files.
//!
//! This crate provides:
//! - A line parser that assembles meter reads from 200/300 records
//! - Exact decimal volumes keyed by read date
//! - Pluggable diagnostics for lines that had to be dropped
//! - Parse statistics with HDR histograms
//!
//! # Example
//!
//! ```rust,no_run
//! use nem12_parser::{parser::{ContentErrorPolicy, Nem12Parser}, stats::ParseStats};
//!
//! let lines = std::fs::read_to_string("reads.csv").expect("Failed to read file");
//! let lines: Vec<&str> = lines.lines().collect();
//!
//! let mut stats = ParseStats::new();
//! let reads = Nem12Parser::with_policy(ContentErrorPolicy::Skip)
//!     .parse_with_sink(&lines, &mut stats)
//!     .expect("Failed to parse file");
//! stats.record_reads(&reads);
//!
//! println!("{}", stats.summary());
//! ```

pub mod config;
pub mod diagnostics;
pub mod parser;
pub mod reading;
pub mod source;
pub mod stats;

pub use config::{Config, OutputFormat};
pub use diagnostics::{Diagnostic, DiagnosticSink, EnvelopeViolation, NullSink, TracingSink};
pub use parser::{ContentErrorPolicy, Nem12Parser, ParseError, ParseResult, RecordType, classify};
pub use reading::{ContentError, EnergyUnit, MeterRead, MeterVolume, Quality};
pub use source::{parse_simple_nem12, read_lines};
pub use stats::{ParseStats, StatsSummary};
