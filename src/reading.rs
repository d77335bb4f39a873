//! Data structures representing parsed meter reads.
//!
//! This module defines the core types produced by the NEM12 parser: a
//! [`MeterRead`] per metering point block, holding dated [`MeterVolume`]
//! readings.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when a field has the right position but unusable content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("Invalid read date (expected YYYYMMDD): {0:?}")]
    InvalidDate(String),

    #[error("Invalid volume: {0:?}")]
    InvalidVolume(String),

    #[error("Unknown energy unit: {0:?}")]
    UnknownUnit(String),

    #[error("Unknown quality flag: {0:?}")]
    UnknownQuality(String),
}

/// Unit of the volumes recorded in a meter read block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyUnit {
    #[serde(rename = "KWH")]
    Kwh,
    #[serde(rename = "WH")]
    Wh,
    #[serde(rename = "MWH")]
    Mwh,
    #[serde(rename = "KVARH")]
    Kvarh,
    #[serde(rename = "KVAH")]
    Kvah,
    /// Import register
    E1,
    /// Export register
    B1,
}

impl EnergyUnit {
    /// The code as it appears in a 200 record.
    pub fn code(&self) -> &'static str {
        match self {
            EnergyUnit::Kwh => "KWH",
            EnergyUnit::Wh => "WH",
            EnergyUnit::Mwh => "MWH",
            EnergyUnit::Kvarh => "KVARH",
            EnergyUnit::Kvah => "KVAH",
            EnergyUnit::E1 => "E1",
            EnergyUnit::B1 => "B1",
        }
    }
}

impl FromStr for EnergyUnit {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "KWH" => Ok(EnergyUnit::Kwh),
            "WH" => Ok(EnergyUnit::Wh),
            "MWH" => Ok(EnergyUnit::Mwh),
            "KVARH" => Ok(EnergyUnit::Kvarh),
            "KVAH" => Ok(EnergyUnit::Kvah),
            "E1" => Ok(EnergyUnit::E1),
            "B1" => Ok(EnergyUnit::B1),
            other => Err(ContentError::UnknownUnit(other.to_string())),
        }
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Data quality flag attached to each reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    /// Actual read
    A,
    /// Estimated
    E,
    /// Final substituted
    F,
    /// Null data
    N,
    /// Substituted
    S,
    /// Variable
    V,
}

impl FromStr for Quality {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" => Ok(Quality::A),
            "E" => Ok(Quality::E),
            "F" => Ok(Quality::F),
            "N" => Ok(Quality::N),
            "S" => Ok(Quality::S),
            "V" => Ok(Quality::V),
            other => Err(ContentError::UnknownQuality(other.to_string())),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Quality::A => "A",
            Quality::E => "E",
            Quality::F => "F",
            Quality::N => "N",
            Quality::S => "S",
            Quality::V => "V",
        };
        f.write_str(code)
    }
}

/// A single dated reading.
///
/// Replacing a date's reading always replaces the whole value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterVolume {
    /// Exact quantity for the day, in the block's unit.
    pub volume: Decimal,

    /// How the quantity was obtained.
    pub quality: Quality,
}

impl MeterVolume {
    pub fn new(volume: Decimal, quality: Quality) -> Self {
        Self { volume, quality }
    }
}

impl fmt::Display for MeterVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.volume, self.quality)
    }
}

/// The full read history for one metering point, opened by a 200 record.
///
/// # Example
///
/// The lines:
/// ```text
/// 200,1234567890,KWH
/// 300,20230101,12.5,A
/// ```
///
/// produce a `MeterRead` with `nmi` "1234567890", `energy_unit`
/// `EnergyUnit::Kwh` and one volume keyed by 2023-01-01.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterRead {
    /// National Metering Identifier, always 10 characters.
    pub nmi: String,

    /// Unit of every volume in this block.
    pub energy_unit: EnergyUnit,

    /// Readings keyed by date; at most one per date.
    pub volumes: BTreeMap<NaiveDate, MeterVolume>,
}

impl MeterRead {
    pub fn new(nmi: impl Into<String>, energy_unit: EnergyUnit) -> Self {
        Self {
            nmi: nmi.into(),
            energy_unit,
            volumes: BTreeMap::new(),
        }
    }

    /// Insert the reading for `date`, returning the one it replaced.
    pub fn append_volume(&mut self, date: NaiveDate, volume: MeterVolume) -> Option<MeterVolume> {
        self.volumes.insert(date, volume)
    }

    pub fn volume(&self, date: NaiveDate) -> Option<&MeterVolume> {
        self.volumes.get(&date)
    }

    /// Earliest date with a reading.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.volumes.keys().next().copied()
    }

    /// Latest date with a reading.
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.volumes.keys().next_back().copied()
    }

    /// Exact sum of all volumes; zero for an empty block.
    ///
    /// `None` when the sum does not fit in a `Decimal`.
    pub fn total_volume(&self) -> Option<Decimal> {
        self.volumes
            .values()
            .try_fold(Decimal::ZERO, |total, v| total.checked_add(v.volume))
    }
}

impl fmt::Display for MeterRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NMI {} [{}] {} reading(s), total ",
            self.nmi,
            self.energy_unit,
            self.volumes.len()
        )?;
        match self.total_volume() {
            Some(total) => write!(f, "{}", total)?,
            None => write!(f, "overflow")?,
        }
        for (date, volume) in &self.volumes {
            write!(f, "\n  {} {}", date.format("%Y-%m-%d"), volume)?;
        }
        Ok(())
    }
}
