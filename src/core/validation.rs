//! Invariant checks for weights tables.
//!
//! Validation never logs or fails by itself: it produces a [`ValidationReport`]
//! holding the soft warnings and, at most, one hard failure. Loaders turn the
//! report into a `Result` with [`ValidationReport::into_result`].

use crate::core::category;
use crate::core::config::ValidationConfig;
use crate::core::error::{AcquisitionError, Result};
use crate::core::record::{Source, WeightRecord};
use chrono::Datelike;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Display;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    SumDrift {
        country: String,
        year: i32,
        total: f64,
        expected: f64,
    },
    CategoryCount {
        country: String,
        year: i32,
        found: usize,
        expected: usize,
        missing: Vec<String>,
    },
    HighWeight {
        country: String,
        year: i32,
        category_code: String,
        weight: f64,
    },
    UnmappedCategory {
        country: String,
        category_code: String,
    },
    BlankDescription {
        country: String,
        category_code: String,
    },
}

impl Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::SumDrift {
                country,
                year,
                total,
                expected,
            } => write!(
                f,
                "Weights for {country} in {year} sum to {total:.2}, expected ~{expected}"
            ),
            ValidationWarning::CategoryCount {
                country,
                year,
                found,
                expected,
                missing,
            } => {
                write!(
                    f,
                    "Missing categories for {country} in {year}: found {found} of {expected}"
                )?;
                if !missing.is_empty() {
                    write!(f, " (missing {})", missing.join(", "))?;
                }
                Ok(())
            }
            ValidationWarning::HighWeight {
                country,
                year,
                category_code,
                weight,
            } => write!(
                f,
                "Unusually high weight {weight} for {category_code} ({country}, {year})"
            ),
            ValidationWarning::UnmappedCategory {
                country,
                category_code,
            } => write!(f, "Unmapped category {category_code} for {country}"),
            ValidationWarning::BlankDescription {
                country,
                category_code,
            } => write!(f, "Blank description for {category_code} ({country})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationFailure {
    Empty,
    InconsistentSource { expected: Source, found: Source },
    InconsistentCountry { expected: String, found: String },
    NegativeWeights { rows: Vec<(String, String, i32, f64)> },
    YearOutOfRange { min: i32, max: i32, allowed_max: i32 },
    Duplicates { rows: Vec<(String, String, i32)> },
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationFailure::Empty => write!(f, "No weights data retrieved"),
            ValidationFailure::InconsistentSource { expected, found } => {
                write!(f, "Inconsistent data source: expected {expected}, found {found}")
            }
            ValidationFailure::InconsistentCountry { expected, found } => {
                write!(f, "Inconsistent country: expected {expected}, found {found}")
            }
            ValidationFailure::NegativeWeights { rows } => {
                let listed: Vec<String> = rows
                    .iter()
                    .map(|(country, code, year, weight)| format!("{country}/{code}/{year}={weight}"))
                    .collect();
                write!(f, "Negative weights detected: {}", listed.join(", "))
            }
            ValidationFailure::YearOutOfRange {
                min,
                max,
                allowed_max,
            } => write!(
                f,
                "Invalid year range: {min} to {max} (allowed up to {allowed_max})"
            ),
            ValidationFailure::Duplicates { rows } => {
                let listed: Vec<String> = rows
                    .iter()
                    .map(|(country, code, year)| format!("{country}/{code}/{year}"))
                    .collect();
                write!(
                    f,
                    "Duplicate entries found for category-year combinations: {}",
                    listed.join(", ")
                )
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub warnings: Vec<ValidationWarning>,
    pub failure: Option<ValidationFailure>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.failure.is_none()
    }

    /// Logs every warning and converts a hard failure into `DataValidation`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>> {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
        match self.failure {
            Some(failure) => Err(AcquisitionError::validation(failure.to_string())),
            None => Ok(self.warnings),
        }
    }
}

/// Checks a weights batch coming from one source.
///
/// `expected_country` pins every row to one country (the national workbook);
/// without it rows are grouped per country and each group is checked alone.
pub struct WeightsValidator {
    expected_source: Source,
    expected_country: Option<String>,
    config: ValidationConfig,
    current_year: i32,
}

impl WeightsValidator {
    pub fn new(expected_source: Source, config: ValidationConfig) -> Self {
        Self {
            expected_source,
            expected_country: None,
            config,
            current_year: chrono::Utc::now().year(),
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.expected_country = Some(country.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    pub fn validate(&self, records: &[WeightRecord]) -> ValidationReport {
        let mut report = ValidationReport {
            warnings: Vec::new(),
            failure: self.hard_failure(records),
        };
        if records.is_empty() {
            return report;
        }

        // (country, year) -> (sum, codes)
        let mut groups: BTreeMap<(&str, i32), (f64, BTreeSet<&str>)> = BTreeMap::new();
        let mut unmapped: BTreeSet<(&str, &str)> = BTreeSet::new();
        let mut blank: BTreeSet<(&str, &str)> = BTreeSet::new();

        for record in records {
            let group = groups
                .entry((record.country.as_str(), record.year))
                .or_default();
            group.0 += record.weight;
            group.1.insert(record.category_code.as_str());

            if category::by_national_code(&record.category_code).is_none() {
                unmapped.insert((record.country.as_str(), record.category_code.as_str()));
            }
            if record.category_description.trim().is_empty() {
                blank.insert((record.country.as_str(), record.category_code.as_str()));
            }
            if record.weight > self.config.high_weight_threshold {
                report.warnings.push(ValidationWarning::HighWeight {
                    country: record.country.clone(),
                    year: record.year,
                    category_code: record.category_code.clone(),
                    weight: record.weight,
                });
            }
        }

        for ((country, year), (total, codes)) in &groups {
            if codes.len() != self.config.expected_categories {
                let missing = category::national_codes()
                    .filter(|code| !codes.contains(code))
                    .map(str::to_string)
                    .collect();
                report.warnings.push(ValidationWarning::CategoryCount {
                    country: country.to_string(),
                    year: *year,
                    found: codes.len(),
                    expected: self.config.expected_categories,
                    missing,
                });
            }
            if (total - self.config.weight_total).abs() > self.config.sum_tolerance {
                report.warnings.push(ValidationWarning::SumDrift {
                    country: country.to_string(),
                    year: *year,
                    total: *total,
                    expected: self.config.weight_total,
                });
            }
        }

        for (country, code) in unmapped {
            report.warnings.push(ValidationWarning::UnmappedCategory {
                country: country.to_string(),
                category_code: code.to_string(),
            });
        }
        for (country, code) in blank {
            report.warnings.push(ValidationWarning::BlankDescription {
                country: country.to_string(),
                category_code: code.to_string(),
            });
        }

        report
    }

    fn hard_failure(&self, records: &[WeightRecord]) -> Option<ValidationFailure> {
        let first = match records.first() {
            Some(first) => first,
            None => return Some(ValidationFailure::Empty),
        };

        if let Some(record) = records.iter().find(|r| r.source != self.expected_source) {
            return Some(ValidationFailure::InconsistentSource {
                expected: self.expected_source,
                found: record.source,
            });
        }

        let expected_country = self
            .expected_country
            .as_deref()
            .unwrap_or(first.country.as_str());
        let pinned = self.expected_country.is_some();
        if let Some(record) = records
            .iter()
            .find(|r| r.country.trim().is_empty() || (pinned && r.country != expected_country))
        {
            return Some(ValidationFailure::InconsistentCountry {
                expected: expected_country.to_string(),
                found: record.country.clone(),
            });
        }

        let negative: Vec<_> = records
            .iter()
            .filter(|r| r.weight < 0.0 || r.weight.is_nan())
            .map(|r| {
                (
                    r.country.clone(),
                    r.category_code.clone(),
                    r.year,
                    r.weight,
                )
            })
            .collect();
        if !negative.is_empty() {
            return Some(ValidationFailure::NegativeWeights { rows: negative });
        }

        let min = records.iter().map(|r| r.year).min().unwrap_or_default();
        let max = records.iter().map(|r| r.year).max().unwrap_or_default();
        let allowed_max = self.current_year + 1;
        if min < self.config.min_year || max > allowed_max {
            return Some(ValidationFailure::YearOutOfRange {
                min,
                max,
                allowed_max,
            });
        }

        let mut seen: HashMap<(&str, &str, i32), usize> = HashMap::new();
        for record in records {
            *seen
                .entry((
                    record.country.as_str(),
                    record.category_code.as_str(),
                    record.year,
                ))
                .or_default() += 1;
        }
        let mut duplicates: Vec<_> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|((country, code, year), _)| (country.to_string(), code.to_string(), year))
            .collect();
        if !duplicates.is_empty() {
            duplicates.sort();
            return Some(ValidationFailure::Duplicates { rows: duplicates });
        }

        None
    }
}
