use crate::core::category::OVERVIEW_CODE;
use crate::core::config::{AppConfig, ValidationConfig};
use crate::core::error::{AcquisitionError, Result};
use crate::core::record::{Source, WeightRecord};
use crate::core::validation::{ValidationWarning, WeightsValidator};
use crate::core::weights::WeightsProvider;
use crate::providers::util::{RetryPolicy, build_client, build_url, get_bytes};
use async_trait::async_trait;
use calamine::{Data, Range, Reader};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument, warn};

/// Sheet holding the division-level weights.
pub const WEIGHTS_SHEET: &str = "W1-CPI";
/// Zero-based row of the header carrying the year labels.
const HEADER_ROW: u32 = 4;
/// Columns B..=AB: code, description, then one column per year.
const FIRST_COL: u32 = 1;
const LAST_COL: u32 = 27;
/// The overview row plus twelve divisions.
const MAX_DATA_ROWS: u32 = 13;

/// Downloads and parses the national statistics office weights workbook.
pub struct NationalWeightsLoader {
    weights_url: String,
    country: String,
    cache_dir: PathBuf,
    download_ttl: Duration,
    client: reqwest::Client,
    retry: RetryPolicy,
    validation: ValidationConfig,
}

impl NationalWeightsLoader {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            weights_url: config.providers.ons.weights_url.clone(),
            country: config.national_code.clone(),
            cache_dir: config.cache.dir_or_temp(),
            download_ttl: config.cache.download_ttl(),
            client: build_client(config.request_timeout())?,
            retry: config.retry.into(),
            validation: config.validation,
        })
    }

    fn cache_file(&self, url: &str) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
        self.cache_dir
            .join(format!("national_weights_{}.xlsx", &digest[..16]))
    }

    fn is_fresh(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age < self.download_ttl)
    }

    /// Downloads the workbook at `url` into the cache directory, reusing a
    /// fresh copy downloaded earlier from the same URL.
    #[instrument(name = "NationalWorkbookDownload", skip(self))]
    pub async fn download(&self, url: &str) -> Result<PathBuf> {
        let cache_file = self.cache_file(url);
        if self.is_fresh(&cache_file) {
            debug!("Using cached workbook {}", cache_file.display());
            return Ok(cache_file);
        }

        let parsed = build_url(url, &[])?;
        let body = get_bytes(&self.client, &parsed, &self.retry).await?;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::write(&cache_file, &body).await?;
        info!(
            "Downloaded {} bytes to {}",
            body.len(),
            cache_file.display()
        );
        Ok(cache_file)
    }

    /// Reads the weights sheet of the workbook at `path`.
    pub fn parse(&self, path: &Path) -> Result<Vec<WeightRecord>> {
        let mut workbook = calamine::open_workbook_auto(path).map_err(|e| {
            AcquisitionError::validation(format!(
                "Failed to parse national workbook {}: {e}",
                path.display()
            ))
        })?;
        let range = workbook.worksheet_range(WEIGHTS_SHEET).map_err(|e| {
            AcquisitionError::validation(format!(
                "Failed to read sheet {WEIGHTS_SHEET} from {}: {e}",
                path.display()
            ))
        })?;
        self.parse_range(&range)
    }

    /// Reshapes the wide weights grid (one column per year) into long records.
    ///
    /// Positions are absolute sheet coordinates, independent of where the used
    /// range starts.
    pub fn parse_range(&self, range: &Range<Data>) -> Result<Vec<WeightRecord>> {
        let cell = |row: u32, col: u32| range.get_value((row, col));

        let mut year_columns: Vec<(i32, u32)> = Vec::new();
        for col in FIRST_COL + 2..=LAST_COL {
            let Some(year) = cell(HEADER_ROW, col).and_then(cell_text).and_then(|l| extract_year(&l))
            else {
                continue;
            };
            if year_columns.iter().any(|(y, _)| *y == year) {
                debug!("Dropping duplicate column {} for year {}", col, year);
                continue;
            }
            year_columns.push((year, col));
        }
        if year_columns.is_empty() {
            return Err(AcquisitionError::validation(format!(
                "No year columns found in header row of sheet {WEIGHTS_SHEET}"
            )));
        }

        let mut categories: Vec<(String, String, u32)> = Vec::new();
        for row in HEADER_ROW + 1..=HEADER_ROW + MAX_DATA_ROWS {
            let Some(code) = cell(row, FIRST_COL).and_then(cell_text) else {
                continue;
            };
            if code.starts_with(OVERVIEW_CODE) {
                self.check_overview(range, row, &year_columns);
                continue;
            }
            let description = cell(row, FIRST_COL + 1)
                .and_then(cell_text)
                .unwrap_or_default();
            categories.push((code, description, row));
        }
        if categories.is_empty() {
            return Err(AcquisitionError::validation(format!(
                "No category rows found in sheet {WEIGHTS_SHEET}"
            )));
        }

        let mut records = Vec::with_capacity(categories.len() * year_columns.len());
        for (year, col) in &year_columns {
            for (code, description, row) in &categories {
                // Blank cells are years the category was not published
                let Some(weight) = cell(*row, *col).and_then(cell_number) else {
                    continue;
                };
                records.push(WeightRecord {
                    source: Source::National,
                    country: self.country.clone(),
                    category_code: code.clone(),
                    category_description: description.clone(),
                    year: *year,
                    weight,
                });
            }
        }

        debug!(
            "Parsed {} weights over {} years",
            records.len(),
            year_columns.len()
        );
        Ok(records)
    }

    fn check_overview(&self, range: &Range<Data>, row: u32, year_columns: &[(i32, u32)]) {
        for (year, col) in year_columns {
            if let Some(total) = range.get_value((row, *col)).and_then(cell_number)
                && (total - self.validation.weight_total).abs() > self.validation.sum_tolerance
            {
                warn!(
                    "Overview row for {} is {}, expected {}",
                    year, total, self.validation.weight_total
                );
            }
        }
    }

    pub fn validator(&self) -> WeightsValidator {
        WeightsValidator::new(Source::National, self.validation).with_country(&self.country)
    }

    pub fn validate(&self, records: &[WeightRecord]) -> Result<Vec<ValidationWarning>> {
        self.validator().validate(records).into_result()
    }

    /// Download, parse and validate the configured workbook.
    pub async fn fetch(&self) -> Result<Vec<WeightRecord>> {
        let path = self.download(&self.weights_url).await?;
        let records = match self.parse(&path) {
            Ok(records) => records,
            Err(e) => {
                // An unreadable download must not be served again from the cache
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    warn!("Failed to remove {}: {}", path.display(), remove_err);
                }
                return Err(e);
            }
        };
        self.validate(&records)?;
        info!("Loaded {} national weights", records.len());
        Ok(records)
    }
}

#[async_trait]
impl WeightsProvider for NationalWeightsLoader {
    fn source(&self) -> Source {
        Source::National
    }

    async fn fetch_weights(&mut self, _countries: &[String]) -> Result<Vec<WeightRecord>> {
        self.fetch().await
    }
}

fn cell_text(data: &Data) -> Option<String> {
    let text = match data {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn cell_number(data: &Data) -> Option<f64> {
    match data {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First run of four consecutive digits in a header label.
fn extract_year(label: &str) -> Option<i32> {
    let start = label
        .as_bytes()
        .windows(4)
        .position(|w| w.iter().all(u8::is_ascii_digit))?;
    label[start..start + 4].parse().ok()
}
