//! Rate-of-change analytics over index time series.
use crate::core::error::{AcquisitionError, Result};
use crate::core::record::IndexObservation;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Minimum observations a period window needs before a rate is reported.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 3;

/// A labelled, inclusive range of calendar years (January of `start_year`
/// through December of `end_year`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPeriod {
    pub label: String,
    pub start_year: i32,
    pub end_year: i32,
}

impl NamedPeriod {
    pub fn new(label: impl Into<String>, start_year: i32, end_year: i32) -> Self {
        Self {
            label: label.into(),
            start_year,
            end_year,
        }
    }

    fn contains(&self, observation: &IndexObservation) -> bool {
        let year = observation.date.year();
        year >= self.start_year && year <= self.end_year
    }
}

/// Country x period matrix of fractional changes. `None` marks a window with
/// too few observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateOfChangeResult {
    pub periods: Vec<String>,
    pub rows: BTreeMap<String, Vec<Option<f64>>>,
}

impl RateOfChangeResult {
    /// `None` when the country or period is unknown, `Some(None)` for a missing cell.
    pub fn get(&self, country: &str, period: &str) -> Option<Option<f64>> {
        let column = self.periods.iter().position(|p| p == period)?;
        self.rows.get(country).and_then(|row| row.get(column).copied())
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct RateOfChangeCalculator {
    min_observations: usize,
}

impl Default for RateOfChangeCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl RateOfChangeCalculator {
    pub fn new() -> Self {
        Self {
            min_observations: DEFAULT_MIN_OBSERVATIONS,
        }
    }

    pub fn with_min_observations(mut self, min_observations: usize) -> Self {
        self.min_observations = min_observations.max(2);
        self
    }

    /// Computes `(last - first) / first` per country and period, using the
    /// earliest and latest month-start observations inside each window.
    pub fn compute(
        &self,
        observations: &[IndexObservation],
        periods: &[NamedPeriod],
    ) -> Result<RateOfChangeResult> {
        if observations.is_empty() {
            return Err(AcquisitionError::InvalidInput(
                "No index observations supplied".to_string(),
            ));
        }
        if periods.is_empty() {
            return Err(AcquisitionError::InvalidInput(
                "No periods supplied".to_string(),
            ));
        }
        if let Some(period) = periods.iter().find(|p| p.start_year > p.end_year) {
            return Err(AcquisitionError::InvalidInput(format!(
                "Period '{}' starts after it ends ({} > {})",
                period.label, period.start_year, period.end_year
            )));
        }

        // Every country gets a row, even when none of its dates are month starts
        let mut by_country: BTreeMap<&str, Vec<&IndexObservation>> = BTreeMap::new();
        for observation in observations {
            let series = by_country.entry(observation.country.as_str()).or_default();
            if observation.date.day() == 1 {
                series.push(observation);
            }
        }

        let mut rows = BTreeMap::new();
        for (country, series) in by_country {
            let row = periods
                .iter()
                .map(|period| self.period_change(country, &series, period))
                .collect();
            rows.insert(country.to_string(), row);
        }

        Ok(RateOfChangeResult {
            periods: periods.iter().map(|p| p.label.clone()).collect(),
            rows,
        })
    }

    fn period_change(
        &self,
        country: &str,
        series: &[&IndexObservation],
        period: &NamedPeriod,
    ) -> Option<f64> {
        let window: Vec<_> = series.iter().filter(|o| period.contains(o)).collect();
        if window.len() < self.min_observations {
            warn!(
                "Insufficient data for {} in period '{}': {} observations, need {}",
                country,
                period.label,
                window.len(),
                self.min_observations
            );
            return None;
        }

        let first = window.iter().min_by_key(|o| o.date)?;
        let last = window.iter().max_by_key(|o| o.date)?;
        if first.value == 0.0 {
            warn!(
                "Zero base value for {} in period '{}'",
                country, period.label
            );
            return None;
        }

        let change = (last.value - first.value) / first.value;
        debug!(
            "{} {}: {} -> {} = {:.4}",
            country, period.label, first.date, last.date, change
        );
        Some(change)
    }
}
