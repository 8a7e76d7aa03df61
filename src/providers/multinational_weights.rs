use crate::core::cache::BoundedCache;
use crate::core::category::{CATEGORY_MAPPINGS, CategoryMapping};
use crate::core::config::{AppConfig, ValidationConfig};
use crate::core::error::{AcquisitionError, Result};
use crate::core::record::{Source, WeightRecord};
use crate::core::validation::{ValidationWarning, WeightsValidator};
use crate::core::weights::WeightsProvider;
use crate::providers::sdmx::SdmxResponse;
use crate::providers::util::{RetryPolicy, build_client, build_url, get_json};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument, warn};

/// Fetches weights per country and COICOP division from the multinational API.
pub struct MultinationalWeightsLoader {
    endpoint: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    validation: ValidationConfig,
    cache: BoundedCache<String, Vec<WeightRecord>>,
}

impl MultinationalWeightsLoader {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let eurostat = &config.providers.eurostat;
        Ok(Self {
            endpoint: format!(
                "{}/{}",
                eurostat.base_url.trim_end_matches('/'),
                eurostat.weights_dataset
            ),
            client: build_client(config.request_timeout())?,
            retry: config.retry.into(),
            validation: config.validation,
            cache: BoundedCache::new(config.cache.max_entries, config.cache.ttl()),
        })
    }

    /// Weights by year for one country and division. Years without an
    /// observation are simply absent.
    #[instrument(name = "WeightsSeriesFetch", skip(self))]
    pub async fn fetch_category_series(
        &self,
        country: &str,
        category_id: &str,
    ) -> Result<BTreeMap<i32, f64>> {
        let url = build_url(
            &self.endpoint,
            &[
                ("format", "JSON"),
                ("lang", "en"),
                ("geo", country),
                ("coicop", category_id),
            ],
        )?;
        info!("Fetching {} weights for {}", category_id, country);

        let response: SdmxResponse = get_json(&self.client, &url, &self.retry).await?;
        let mut weights = BTreeMap::new();
        for (label, value) in response.time_series(url.path())? {
            match label.trim().parse::<i32>() {
                Ok(year) => {
                    weights.insert(year, value);
                }
                Err(_) => debug!("Skipping non-annual time label {}", label),
            }
        }
        Ok(weights)
    }

    /// All twelve divisions for `country`. Individual divisions may fail; the
    /// country fails only when none succeeded.
    pub async fn fetch_country(&self, country: &str) -> Result<Vec<WeightRecord>> {
        let mut raw: Vec<(&CategoryMapping, i32, f64)> = Vec::new();
        let mut succeeded = 0;
        let mut last_error = None;

        for mapping in &CATEGORY_MAPPINGS {
            match self
                .fetch_category_series(country, mapping.multinational_id)
                .await
            {
                Ok(series) => {
                    succeeded += 1;
                    raw.extend(series.into_iter().map(|(year, w)| (mapping, year, w)));
                }
                Err(e) => {
                    error!(
                        "Error fetching {} for {}: {}",
                        mapping.multinational_id, country, e
                    );
                    last_error = Some(e);
                }
            }
        }

        if succeeded == 0
            && let Some(e) = last_error
        {
            return Err(e);
        }
        if raw.is_empty() {
            return Err(AcquisitionError::validation(format!(
                "No data retrieved for {country}"
            )));
        }

        let mut totals: BTreeMap<i32, f64> = BTreeMap::new();
        for (_, year, weight) in &raw {
            *totals.entry(*year).or_default() += weight;
        }

        let mut records: Vec<WeightRecord> = raw
            .into_iter()
            .map(|(mapping, year, weight)| {
                let total = totals.get(&year).copied().unwrap_or_default();
                WeightRecord {
                    source: Source::Multinational,
                    country: country.to_string(),
                    category_code: mapping.national_code.to_string(),
                    category_description: mapping.description.to_string(),
                    year,
                    weight: self.round_weight(weight, total),
                }
            })
            .collect();
        records.sort_by(|a, b| {
            a.year
                .cmp(&b.year)
                .then_with(|| a.category_code.cmp(&b.category_code))
        });

        self.validate(&records)?;
        info!("Loaded {} weights for {}", records.len(), country);
        Ok(records)
    }

    // Whole units once a year already sums to the basket total, one decimal otherwise.
    fn round_weight(&self, weight: f64, year_total: f64) -> f64 {
        if (year_total - self.validation.weight_total).abs() <= self.validation.sum_tolerance {
            weight.round()
        } else {
            (weight * 10.0).round() / 10.0
        }
    }

    /// Weights for several countries, cached by the sorted country list.
    /// Countries that fail entirely are skipped.
    pub async fn fetch_many(&mut self, countries: &[String]) -> Result<Vec<WeightRecord>> {
        if countries.is_empty() {
            return Ok(Vec::new());
        }

        let mut sorted: Vec<&str> = countries.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        sorted.dedup();
        let cache_key = sorted.join("-");
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached);
        }

        let mut combined = Vec::new();
        let mut failed = Vec::new();
        for country in &sorted {
            match self.fetch_country(country).await {
                Ok(records) => combined.extend(records),
                Err(e) => {
                    error!("Error fetching data for {}: {}", country, e);
                    failed.push(*country);
                }
            }
        }

        if combined.is_empty() {
            return Err(AcquisitionError::validation(format!(
                "Failed to fetch weights for any country: {}",
                failed.join(", ")
            )));
        }
        if !failed.is_empty() {
            warn!("Weights unavailable for {}", failed.join(", "));
        }

        self.cache.put(cache_key, combined.clone());
        Ok(combined)
    }

    pub fn validate(&self, records: &[WeightRecord]) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();
        let mut by_country: BTreeMap<&str, Vec<WeightRecord>> = BTreeMap::new();
        for record in records {
            by_country
                .entry(record.country.as_str())
                .or_default()
                .push(record.clone());
        }
        if by_country.is_empty() {
            return Err(AcquisitionError::validation("No weights data retrieved"));
        }
        for (country, group) in by_country {
            let validator =
                WeightsValidator::new(Source::Multinational, self.validation).with_country(country);
            warnings.extend(validator.validate(&group).into_result()?);
        }
        Ok(warnings)
    }
}

#[async_trait]
impl WeightsProvider for MultinationalWeightsLoader {
    fn source(&self) -> Source {
        Source::Multinational
    }

    async fn fetch_weights(&mut self, countries: &[String]) -> Result<Vec<WeightRecord>> {
        self.fetch_many(countries).await
    }
}
