//! Supplementary keyed time-series source, used for the national index when
//! the national statistics API is unavailable.

use crate::core::config::AppConfig;
use crate::core::error::Result;
use crate::core::record::{IndexObservation, Source};
use crate::providers::util::{RetryPolicy, build_client, build_url, get_json};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, instrument};

// The API marks missing observations with a single dot
const MISSING_VALUE: &str = ".";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

pub struct FredClient {
    base_url: String,
    api_key: String,
    country: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl FredClient {
    /// `None` when no API key is configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>> {
        let fred = &config.providers.fred;
        let Some(api_key) = fred.api_key.clone() else {
            return Ok(None);
        };
        Ok(Some(Self {
            base_url: fred.base_url.trim_end_matches('/').to_string(),
            api_key,
            country: config.national_code.clone(),
            client: build_client(config.request_timeout())?,
            retry: config.retry.into(),
        }))
    }

    /// Monthly observations of `series_id` from `start` on, tagged with the
    /// national country code.
    #[instrument(name = "FredSeriesFetch", skip(self))]
    pub async fn fetch_series(
        &self,
        series_id: &str,
        start: NaiveDate,
    ) -> Result<Vec<IndexObservation>> {
        let start_str = start.format("%Y-%m-%d").to_string();
        let url = build_url(
            &format!("{}/series/observations", self.base_url),
            &[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("observation_start", start_str.as_str()),
            ],
        )?;

        let response: ObservationsResponse = get_json(&self.client, &url, &self.retry).await?;
        let observations: Vec<IndexObservation> = response
            .observations
            .into_iter()
            .filter_map(|obs| {
                if obs.value.trim() == MISSING_VALUE {
                    return None;
                }
                let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").ok()?;
                match obs.value.trim().parse::<f64>() {
                    Ok(value) => Some(IndexObservation {
                        date,
                        value,
                        country: self.country.clone(),
                        source: Source::Supplementary,
                    }),
                    Err(_) => {
                        debug!("Skipping unparsable value {} on {}", obs.value, obs.date);
                        None
                    }
                }
            })
            .collect();

        info!("Fetched {} observations for {}", observations.len(), series_id);
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AcquisitionError;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(mock_server: &MockServer, api_key: Option<&str>) -> AppConfig {
        let mut config = AppConfig::default();
        config.providers.fred.base_url = mock_server.uri();
        config.providers.fred.api_key = api_key.map(str::to_string);
        config.retry.max_attempts = 1;
        config
    }

    #[tokio::test]
    async fn test_no_key_means_no_client() {
        let mock_server = MockServer::start().await;
        assert!(
            FredClient::from_config(&config(&mock_server, None))
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_fetch_series_skips_missing_values() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series/observations"))
            .and(query_param("series_id", "GBRCPIALLMINMEI"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("file_type", "json"))
            .and(query_param("observation_start", "2020-01-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "observations": [
                    {"date": "2020-01-01", "value": "108.2"},
                    {"date": "2020-02-01", "value": "."},
                    {"date": "2020-03-01", "value": "108.6"}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = FredClient::from_config(&config(&mock_server, Some("test-key")))
            .unwrap()
            .unwrap();
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let observations = client.fetch_series("GBRCPIALLMINMEI", start).await.unwrap();

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].value, 108.2);
        assert_eq!(observations[1].date, NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
        assert!(
            observations
                .iter()
                .all(|o| o.source == Source::Supplementary && o.country == "UK")
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_expose_api_key() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series/observations"))
            .and(query_param("api_key", "SUPERSECRETKEY"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = FredClient::from_config(&config(&mock_server, Some("SUPERSECRETKEY")))
            .unwrap()
            .unwrap();
        let err = client
            .fetch_series("GBRCPIALLMINMEI", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .await
            .unwrap_err();

        assert!(err.is_network());
        let text = err.to_string();
        assert!(!text.contains("SUPERSECRETKEY"), "{text}");
        assert!(text.contains("series_id=GBRCPIALLMINMEI"), "{text}");
        assert!(text.contains("HTTP error: 503"), "{text}");
    }

    #[tokio::test]
    async fn test_error_body_is_unexpected_shape() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/series/observations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error_code": 400,
                "error_message": "Bad Request.  The value for variable api_key is not registered."
            })))
            .mount(&mock_server)
            .await;

        let client = FredClient::from_config(&config(&mock_server, Some("bad")))
            .unwrap()
            .unwrap();
        let err = client
            .fetch_series("GBRCPIALLMINMEI", NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::UnexpectedResponse { .. }));
    }
}
