//! Canonical record shapes shared by every source.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    /// National statistics office (workbook weights, dataset API index).
    National,
    /// Multinational statistics API (SDMX-style JSON).
    Multinational,
    /// Keyed time-series API used when the national index API is unavailable.
    Supplementary,
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Source::National => "NATIONAL",
                Source::Multinational => "MULTINATIONAL",
                Source::Supplementary => "SUPPLEMENTARY",
            }
        )
    }
}

impl FromStr for Source {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NATIONAL" => Ok(Source::National),
            "MULTINATIONAL" => Ok(Source::Multinational),
            "SUPPLEMENTARY" => Ok(Source::Supplementary),
            _ => Err(anyhow::anyhow!("Invalid source: {}", s)),
        }
    }
}

/// One consumption-basket weight, in parts per 1000, for a category and year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRecord {
    pub source: Source,
    pub country: String,
    pub category_code: String,
    pub category_description: String,
    pub year: i32,
    pub weight: f64,
}

/// One monthly index value. Values keep the base year of their source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexObservation {
    pub date: NaiveDate,
    pub value: f64,
    pub country: String,
    pub source: Source,
}

/// Sorts observations by country, then date, the order every index table is returned in.
pub fn sort_observations(observations: &mut [IndexObservation]) {
    observations.sort_by(|a, b| a.country.cmp(&b.country).then(a.date.cmp(&b.date)));
}

/// Parses month labels used by the index sources into the first day of the month.
///
/// Accepted forms: `Jan-24` (national dataset API), `2024-01` and `2024M01`
/// (multinational API) and full ISO dates.
pub fn parse_month_label(label: &str) -> Option<NaiveDate> {
    let label = label.trim();
    if let Ok(date) = NaiveDate::parse_from_str(label, "%Y-%m-%d") {
        return date.with_day(1);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{label}-01"), "%Y-%m-%d") {
        return Some(date);
    }
    if let Some((year, month)) = label.split_once('M')
        && let (Ok(year), Ok(month)) = (year.parse::<i32>(), month.parse::<u32>())
    {
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    NaiveDate::parse_from_str(&format!("01-{label}"), "%d-%b-%y").ok()
}
