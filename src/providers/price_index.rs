use crate::core::config::AppConfig;
use crate::core::error::{AcquisitionError, Result};
use crate::core::record::{IndexObservation, Source, parse_month_label, sort_observations};
use crate::providers::fred::FredClient;
use crate::providers::sdmx::SdmxResponse;
use crate::providers::util::{RetryPolicy, build_client, build_url, get_json};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Deserialize)]
struct EditionResponse {
    links: EditionLinks,
}

#[derive(Debug, Deserialize)]
struct EditionLinks {
    latest_version: VersionLink,
}

#[derive(Debug, Deserialize)]
struct VersionLink {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<DatasetObservation>,
}

#[derive(Debug, Deserialize)]
struct DatasetObservation {
    dimensions: ObservationDimensions,
    observation: String,
}

#[derive(Debug, Deserialize)]
struct ObservationDimensions {
    #[serde(rename = "Time")]
    time: TimeDimension,
}

#[derive(Debug, Deserialize)]
struct TimeDimension {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

impl TimeDimension {
    fn month_label(&self) -> Option<&str> {
        self.label.as_deref().or(self.id.as_deref())
    }
}

/// Monthly headline index values from the national dataset API and the
/// multinational statistics API.
pub struct PriceIndexLoader {
    national_code: String,
    start_date: NaiveDate,
    ons_base_url: String,
    dataset: String,
    edition: String,
    geography: String,
    aggregate: String,
    eurostat_endpoint: String,
    index_unit: String,
    index_coicop: String,
    fred: Option<FredClient>,
    fred_series_id: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl PriceIndexLoader {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let ons = &config.providers.ons;
        let eurostat = &config.providers.eurostat;
        Ok(Self {
            national_code: config.national_code.clone(),
            start_date: config.start_date,
            ons_base_url: ons.base_url.trim_end_matches('/').to_string(),
            dataset: ons.dataset.clone(),
            edition: ons.edition.clone(),
            geography: ons.geography.clone(),
            aggregate: ons.aggregate.clone(),
            eurostat_endpoint: format!(
                "{}/{}",
                eurostat.base_url.trim_end_matches('/'),
                eurostat.index_dataset
            ),
            index_unit: eurostat.index_unit.clone(),
            index_coicop: eurostat.index_coicop.clone(),
            fred: FredClient::from_config(config)?,
            fred_series_id: config.providers.fred.series_id.clone(),
            client: build_client(config.request_timeout())?,
            retry: config.retry.into(),
        })
    }

    async fn latest_version(&self) -> Result<String> {
        let url = build_url(
            &format!(
                "{}/datasets/{}/editions/{}",
                self.ons_base_url, self.dataset, self.edition
            ),
            &[],
        )?;
        let edition: EditionResponse = get_json(&self.client, &url, &self.retry).await?;
        debug!("Latest version of {} is {}", self.dataset, edition.links.latest_version.id);
        Ok(edition.links.latest_version.id)
    }

    /// National index from `start_date` on. The latest published version is
    /// resolved first, then its observations are fetched.
    #[instrument(name = "NationalIndexFetch", skip(self))]
    pub async fn fetch_national_index(&self, start_date: NaiveDate) -> Result<Vec<IndexObservation>> {
        self.fetch_dataset_observations(start_date)
            .await
            .map_err(|e| {
                if e.is_network() {
                    e
                } else {
                    AcquisitionError::network_msg(
                        format!("{}/datasets/{}", self.ons_base_url, self.dataset),
                        format!("Failed to fetch national index: {e}"),
                    )
                }
            })
    }

    async fn fetch_dataset_observations(
        &self,
        start_date: NaiveDate,
    ) -> Result<Vec<IndexObservation>> {
        let version = self.latest_version().await?;
        let url = build_url(
            &format!(
                "{}/datasets/{}/editions/{}/versions/{}/observations",
                self.ons_base_url, self.dataset, self.edition, version
            ),
            &[
                ("time", "*"),
                ("geography", self.geography.as_str()),
                ("aggregate", self.aggregate.as_str()),
            ],
        )?;
        let response: ObservationsResponse = get_json(&self.client, &url, &self.retry).await?;

        let mut observations = Vec::with_capacity(response.observations.len());
        for obs in response.observations {
            let Some(date) = obs.dimensions.time.month_label().and_then(parse_month_label) else {
                debug!("Skipping observation with unreadable time {:?}", obs.dimensions.time);
                continue;
            };
            if date < start_date {
                continue;
            }
            let Ok(value) = obs.observation.trim().parse::<f64>() else {
                debug!("Skipping non-numeric observation {} for {}", obs.observation, date);
                continue;
            };
            observations.push(IndexObservation {
                date,
                value,
                country: self.national_code.clone(),
                source: Source::National,
            });
        }
        observations.sort_by_key(|o| o.date);
        info!("Fetched {} national index observations", observations.len());
        Ok(observations)
    }

    /// National index, falling back to the supplementary series when the
    /// national API fails and a key is configured.
    async fn national_with_fallback(&self) -> Result<Vec<IndexObservation>> {
        match self.fetch_national_index(self.start_date).await {
            Ok(observations) => Ok(observations),
            Err(e) => match &self.fred {
                Some(fred) => {
                    warn!("National index unavailable ({}), using supplementary series", e);
                    fred.fetch_series(&self.fred_series_id, self.start_date).await
                }
                None => Err(e),
            },
        }
    }

    async fn fetch_country_index(&self, country: &str) -> Result<Vec<IndexObservation>> {
        let url = build_url(
            &self.eurostat_endpoint,
            &[
                ("format", "JSON"),
                ("lang", "en"),
                ("unit", self.index_unit.as_str()),
                ("coicop", self.index_coicop.as_str()),
                ("geo", country),
            ],
        )?;
        let response: SdmxResponse = get_json(&self.client, &url, &self.retry).await?;
        Ok(response
            .time_series(url.path())?
            .into_iter()
            .filter_map(|(label, value)| {
                parse_month_label(&label).map(|date| IndexObservation {
                    date,
                    value,
                    country: country.to_string(),
                    source: Source::Multinational,
                })
            })
            .collect())
    }

    /// Index for every non-national country in `countries`. Countries that
    /// fail are logged and skipped.
    #[instrument(name = "MultinationalIndexFetch", skip(self))]
    pub async fn fetch_multinational_index(&self, countries: &[String]) -> Vec<IndexObservation> {
        let mut observations = Vec::new();
        for country in countries.iter().filter(|c| **c != self.national_code) {
            match self.fetch_country_index(country).await {
                Ok(series) => {
                    info!("Fetched {} index observations for {}", series.len(), country);
                    observations.extend(series);
                }
                Err(e) => warn!("Failed to fetch index for {}: {}", country, e),
            }
        }
        observations
    }

    /// Merged index for `countries`, sorted by country then date and limited
    /// to the configured start date. An empty result means every path failed
    /// or returned nothing; it is not an error.
    pub async fn get_index(&self, countries: &[String]) -> Vec<IndexObservation> {
        let mut observations = Vec::new();

        if countries.iter().any(|c| *c == self.national_code) {
            match self.national_with_fallback().await {
                Ok(series) => observations.extend(series),
                Err(e) => error!("Error fetching index for {}: {}", self.national_code, e),
            }
        }
        if countries.iter().any(|c| *c != self.national_code) {
            observations.extend(self.fetch_multinational_index(countries).await);
        }

        observations.retain(|o| o.date >= self.start_date);
        sort_observations(&mut observations);
        if observations.is_empty() {
            warn!("No index data retrieved for {}", countries.join(", "));
        }
        observations
    }
}
