//! NEM12 Parser CLI - Parse a simplified NEM12 file and print its meter reads.

use anyhow::{Context, Result};
use clap::Parser;
use nem12_parser::{
    config::{Config, OutputFormat},
    diagnostics::{Tee, TracingSink},
    parser::{ContentErrorPolicy, Nem12Parser},
    reading::MeterRead,
    source::read_lines,
    stats::{ParseStats, StatsSummary},
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// NEM12 Parser - Parse simplified NEM12 metering files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// NEM12 file to parse
    file: PathBuf,

    /// Output format (text, json) [default: from config, else text]
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// What to do with unparseable dates, volumes, units or quality flags (abort, skip)
    #[arg(long)]
    on_content_error: Option<ContentErrorPolicy>,

    /// Print parse statistics to stderr, in the output format
    #[arg(short, long)]
    stats: bool,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match args.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let policy = args.on_content_error.unwrap_or(config.content_errors);
    let format = args.format.unwrap_or(config.format);
    let show_stats = args.stats || config.show_stats;

    info!("Parsing {} (content errors: {})", args.file.display(), policy);

    let lines = read_lines(&args.file)?;

    let mut stats = ParseStats::new();
    stats.record_lines(&lines);

    let reads = {
        let mut tracing_sink = TracingSink;
        let mut sink = Tee(&mut tracing_sink, &mut stats);
        Nem12Parser::with_policy(policy)
            .parse_with_sink(&lines, &mut sink)
            .with_context(|| format!("Failed to parse {}", args.file.display()))?
    };
    stats.record_reads(&reads);

    info!("Parsed {} meter read(s)", reads.len());
    println!("{}", render_reads(&reads, format)?);

    if show_stats {
        eprintln!("{}", render_stats(&stats.summary(), format)?);
    }

    Ok(())
}

/// Render meter reads in the requested format.
fn render_reads(reads: &[MeterRead], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(reads).context("Failed to serialize meter reads")
        }
        OutputFormat::Text => Ok(reads
            .iter()
            .map(|read| read.to_string())
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Render parse statistics in the requested format.
fn render_stats(summary: &StatsSummary, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(summary).context("Failed to serialize statistics")
        }
        OutputFormat::Text => Ok(format!("\n{}", summary)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nem12_parser::reading::{EnergyUnit, MeterVolume, Quality};
    use rust_decimal::Decimal;

    fn sample_reads() -> Vec<MeterRead> {
        let mut read = MeterRead::new("1234567890", EnergyUnit::Kwh);
        read.append_volume(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            MeterVolume::new(Decimal::new(125, 1), Quality::A),
        );
        vec![read, MeterRead::new("0987654321", EnergyUnit::Kwh)]
    }

    #[test]
    fn test_render_text() {
        let text = render_reads(&sample_reads(), OutputFormat::Text).unwrap();
        assert_eq!(
            text,
            "NMI 1234567890 [KWH] 1 reading(s), total 12.5\n  2023-01-01 12.5 (A)\n\
             NMI 0987654321 [KWH] 0 reading(s), total 0"
        );
    }

    #[test]
    fn test_render_json() {
        let json = render_reads(&sample_reads(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[0]["volumes"]["2023-01-01"]["volume"], "12.5");
    }

    #[test]
    fn test_render_stats() {
        let mut stats = ParseStats::new();
        stats.record_reads(&sample_reads());
        let summary = stats.summary();

        let json = render_stats(&summary, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["meter_reads"], 2);
        assert_eq!(value["volumes"], 1);
        assert_eq!(value["totals_by_unit"][0][1], "12.5");

        let text = render_stats(&summary, OutputFormat::Text).unwrap();
        assert!(text.contains("NEM12 PARSE STATISTICS"));
        assert!(text.contains("KWH: 12.5"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_reads(&[], OutputFormat::Text).unwrap(), "");
        assert_eq!(render_reads(&[], OutputFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "nem12-parser",
            "reads.csv",
            "--format",
            "json",
            "--on-content-error",
            "skip",
        ])
        .unwrap();
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.on_content_error, Some(ContentErrorPolicy::Skip));
        assert!(!args.stats);
    }
}
