use crate::core::analytics::{DEFAULT_MIN_OBSERVATIONS, NamedPeriod};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Upper bound on any single HTTP request.
pub const MAX_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct OnsProviderConfig {
    pub base_url: String,
    pub weights_url: String,
    pub dataset: String,
    pub edition: String,
    pub geography: String,
    pub aggregate: String,
}

impl Default for OnsProviderConfig {
    fn default() -> Self {
        OnsProviderConfig {
            base_url: "https://api.beta.ons.gov.uk/v1".to_string(),
            weights_url: "https://www.ons.gov.uk/file?uri=/economy/inflationandpriceindices/datasets/consumerpriceinflationupdatingweightsannexatablesw1tow3/annexatablesw1tow3weights2024/annexaw1w3weights2024.xlsx".to_string(),
            dataset: "cpih01".to_string(),
            edition: "time-series".to_string(),
            geography: "K02000001".to_string(),
            aggregate: "cpih1dim1A0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EurostatProviderConfig {
    pub base_url: String,
    pub weights_dataset: String,
    pub index_dataset: String,
    pub index_unit: String,
    pub index_coicop: String,
}

impl Default for EurostatProviderConfig {
    fn default() -> Self {
        EurostatProviderConfig {
            base_url: "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data"
                .to_string(),
            weights_dataset: "prc_hicp_inw".to_string(),
            index_dataset: "prc_hicp_midx".to_string(),
            index_unit: "I15".to_string(),
            index_coicop: "CP00".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FredProviderConfig {
    pub base_url: String,
    pub series_id: String,
    pub api_key: Option<String>,
}

impl Default for FredProviderConfig {
    fn default() -> Self {
        FredProviderConfig {
            base_url: "https://api.stlouisfed.org/fred".to_string(),
            series_id: "GBRCPIALLMINMEI".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ons: OnsProviderConfig,
    pub eurostat: EurostatProviderConfig,
    pub fred: FredProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_secs: u64,
    pub download_ttl_secs: u64,
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_entries: 100,
            ttl_secs: 3600,
            download_ttl_secs: 24 * 60 * 60,
            dir: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn download_ttl(&self) -> Duration {
        Duration::from_secs(self.download_ttl_secs)
    }

    pub fn dir_or_temp(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Tolerances for weights validation. The defaults are heuristics.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub weight_total: f64,
    pub sum_tolerance: f64,
    pub high_weight_threshold: f64,
    pub expected_categories: usize,
    pub min_year: i32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            weight_total: 1000.0,
            sum_tolerance: 2.0,
            high_weight_threshold: 1500.0,
            expected_categories: 12,
            min_year: 1900,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub national_code: String,
    pub start_date: NaiveDate,
    pub request_timeout_secs: u64,
    pub providers: ProvidersConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub validation: ValidationConfig,
    /// Periods reported by the rate-of-change table.
    pub periods: Vec<NamedPeriod>,
    /// Month-start observations a period needs before its rate is reported.
    pub min_observations: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            national_code: "UK".to_string(),
            start_date: NaiveDate::from_ymd_opt(1999, 1, 1).unwrap_or_default(),
            request_timeout_secs: MAX_REQUEST_TIMEOUT_SECS,
            providers: ProvidersConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            validation: ValidationConfig::default(),
            periods: vec![
                NamedPeriod::new("Pre-GFC", 2000, 2009),
                NamedPeriod::new("Post-GFC", 2010, 2019),
                NamedPeriod::new("Post-COVID", 2020, 2023),
            ],
            min_observations: DEFAULT_MIN_OBSERVATIONS,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            let mut config = Self::default();
            config.apply_env();
            return Ok(config);
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "cpidata", "cpidata")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = if config_str.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&config_str).with_context(|| {
                format!("Failed to parse config file: {}", path.as_ref().display())
            })?
        };
        config.apply_env();
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Applies `CPIDATA_CACHE_DIR` and `FRED_API_KEY` when set.
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("CPIDATA_CACHE_DIR")
            && !dir.trim().is_empty()
        {
            self.cache.dir = Some(PathBuf::from(dir));
        }
        if let Ok(key) = std::env::var("FRED_API_KEY")
            && !key.trim().is_empty()
        {
            self.providers.fred.api_key = Some(key);
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.clamp(1, MAX_REQUEST_TIMEOUT_SECS))
    }
}
