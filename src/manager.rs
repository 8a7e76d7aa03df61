//! Single entry point composing the weights loaders, the index loader and the
//! rate-of-change calculator.

use crate::core::analytics::{NamedPeriod, RateOfChangeCalculator, RateOfChangeResult};
use crate::core::config::AppConfig;
use crate::core::error::{AcquisitionError, Result};
use crate::core::record::{IndexObservation, Source, WeightRecord};
use crate::core::weights::WeightsProvider;
use crate::providers::multinational_weights::MultinationalWeightsLoader;
use crate::providers::national_weights::NationalWeightsLoader;
use crate::providers::price_index::PriceIndexLoader;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Everything the dashboard needs for one set of countries.
#[derive(Debug, Clone, Serialize)]
pub struct CompleteData {
    pub index: Vec<IndexObservation>,
    /// `None` when no index data could be retrieved.
    pub rate_of_change: Option<RateOfChangeResult>,
    pub weights: Vec<WeightRecord>,
}

pub struct UnifiedDataManager {
    national_code: String,
    national: Box<dyn WeightsProvider>,
    multinational: Box<dyn WeightsProvider>,
    index: PriceIndexLoader,
    calculator: RateOfChangeCalculator,
}

impl UnifiedDataManager {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Ok(Self::with_providers(
            config.national_code.clone(),
            Box::new(NationalWeightsLoader::new(config)?),
            Box::new(MultinationalWeightsLoader::new(config)?),
            PriceIndexLoader::new(config)?,
        )
        .with_calculator(
            RateOfChangeCalculator::new().with_min_observations(config.min_observations),
        ))
    }

    pub fn with_providers(
        national_code: impl Into<String>,
        national: Box<dyn WeightsProvider>,
        multinational: Box<dyn WeightsProvider>,
        index: PriceIndexLoader,
    ) -> Self {
        Self {
            national_code: national_code.into(),
            national,
            multinational,
            index,
            calculator: RateOfChangeCalculator::new(),
        }
    }

    pub fn with_calculator(mut self, calculator: RateOfChangeCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    /// Weights for `countries`. The national code goes to the national
    /// loader, everything else to the multinational one. A branch that fails
    /// is logged; the call fails only when every attempted branch failed.
    pub async fn get_weights(&mut self, countries: &[String]) -> Result<Vec<WeightRecord>> {
        let (national, others): (Vec<String>, Vec<String>) = countries
            .iter()
            .cloned()
            .partition(|c| *c == self.national_code);

        let mut weights = Vec::new();
        let mut failures: Vec<(Source, AcquisitionError)> = Vec::new();

        let branches = [
            (&mut self.national, national),
            (&mut self.multinational, others),
        ];
        for (provider, requested) in branches {
            if requested.is_empty() {
                continue;
            }
            let source = provider.source();
            match provider.fetch_weights(&requested).await {
                Ok(records) => {
                    debug!("{} weights: {} records", source, records.len());
                    weights.extend(records);
                }
                Err(e) => {
                    warn!("{} weights unavailable: {}", source, e);
                    failures.push((source, e));
                }
            }
        }

        if weights.is_empty() && !failures.is_empty() {
            let attempted = failures.len();
            let detail = failures
                .iter()
                .map(|(source, e)| format!("{source}: {e}"))
                .collect::<Vec<_>>()
                .join("; ");
            return match failures.pop() {
                Some((_, e)) if attempted == 1 => Err(e),
                _ => Err(AcquisitionError::validation(format!(
                    "No weights retrieved from any source: {detail}"
                ))),
            };
        }

        info!("Retrieved {} weight records", weights.len());
        Ok(weights)
    }

    pub async fn get_index(&self, countries: &[String]) -> Vec<IndexObservation> {
        self.index.get_index(countries).await
    }

    pub fn get_rate_of_change(
        &self,
        index: &[IndexObservation],
        periods: &[NamedPeriod],
    ) -> Result<RateOfChangeResult> {
        self.calculator.compute(index, periods)
    }

    /// Index, rate of change and weights in one result. Weights failures are
    /// propagated; an empty index leaves `rate_of_change` unset.
    pub async fn get_complete(
        &mut self,
        countries: &[String],
        periods: &[NamedPeriod],
    ) -> Result<CompleteData> {
        let index = self.get_index(countries).await;
        let rate_of_change = if index.is_empty() {
            warn!("Skipping rate of change, no index data");
            None
        } else {
            Some(self.get_rate_of_change(&index, periods)?)
        };
        let weights = self.get_weights(countries).await?;

        Ok(CompleteData {
            index,
            rate_of_change,
            weights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validation::tests::complete_year;
    use crate::providers::price_index::tests::{mount_multinational_index, mount_ons};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::MockServer;

    /// Returns fixed weights for the countries it knows, fails for the rest.
    struct StubProvider {
        source: Source,
        known: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl StubProvider {
        fn boxed(source: Source, known: &[&'static str]) -> (Box<dyn WeightsProvider>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let stub = StubProvider {
                source,
                known: known.to_vec(),
                calls: Arc::clone(&calls),
            };
            (Box::new(stub), calls)
        }
    }

    #[async_trait]
    impl WeightsProvider for StubProvider {
        fn source(&self) -> Source {
            self.source
        }

        async fn fetch_weights(&mut self, countries: &[String]) -> Result<Vec<WeightRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let records: Vec<WeightRecord> = countries
                .iter()
                .filter(|c| self.known.contains(&c.as_str()))
                .flat_map(|c| complete_year(self.source, c, 2024))
                .collect();
            if records.is_empty() {
                return Err(AcquisitionError::network_msg(
                    "http://stub",
                    format!("no data for {}", countries.join(",")),
                ));
            }
            Ok(records)
        }
    }

    fn manager(
        mock_server: &MockServer,
        national_known: &[&'static str],
        multinational_known: &[&'static str],
    ) -> (UnifiedDataManager, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let mut config = AppConfig::default();
        config.providers.ons.base_url = mock_server.uri();
        config.providers.eurostat.base_url = mock_server.uri();
        config.retry.max_attempts = 1;
        config.start_date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();

        let (national, national_calls) = StubProvider::boxed(Source::National, national_known);
        let (multinational, multinational_calls) =
            StubProvider::boxed(Source::Multinational, multinational_known);
        let manager = UnifiedDataManager::with_providers(
            "UK",
            national,
            multinational,
            PriceIndexLoader::new(&config).unwrap(),
        );
        (manager, national_calls, multinational_calls)
    }

    fn countries(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_get_weights_keeps_national_when_multinational_fails() {
        let mock_server = MockServer::start().await;
        let (mut manager, _, multinational_calls) = manager(&mock_server, &["UK"], &[]);

        let weights = manager.get_weights(&countries(&["UK", "DE"])).await.unwrap();

        assert_eq!(weights.len(), 12);
        assert!(weights.iter().all(|w| w.country == "UK" && w.source == Source::National));
        assert_eq!(multinational_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_weights_splits_by_source() {
        let mock_server = MockServer::start().await;
        let (mut manager, national_calls, _) = manager(&mock_server, &["UK"], &["DE", "FR"]);

        let weights = manager.get_weights(&countries(&["DE", "FR"])).await.unwrap();
        assert_eq!(weights.len(), 24);
        assert!(weights.iter().all(|w| w.source == Source::Multinational));
        assert_eq!(national_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_weights_empty_request() {
        let mock_server = MockServer::start().await;
        let (mut manager, national_calls, multinational_calls) = manager(&mock_server, &["UK"], &["DE"]);

        assert!(manager.get_weights(&[]).await.unwrap().is_empty());
        assert_eq!(national_calls.load(Ordering::SeqCst), 0);
        assert_eq!(multinational_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_weights_fails_when_every_branch_fails() {
        let mock_server = MockServer::start().await;
        let (mut manager, _, _) = manager(&mock_server, &[], &[]);

        let err = manager
            .get_weights(&countries(&["UK", "DE"]))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        let text = err.to_string();
        assert!(text.contains("No weights retrieved from any source"), "{text}");
        assert!(text.contains("NATIONAL: "), "{text}");
        assert!(text.contains("MULTINATIONAL: "), "{text}");

        // A single failed branch surfaces its own error
        let err = manager.get_weights(&countries(&["DE"])).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_get_complete_combines_outputs() {
        let mock_server = MockServer::start().await;
        mount_ons(
            &mock_server,
            &[("Jan-20", "100.0"), ("Jun-20", "105.0"), ("Dec-20", "110.0")],
        )
        .await;
        mount_multinational_index(
            &mock_server,
            "DE",
            &[("2020-01", Some(200.0)), ("2020-06", Some(210.0)), ("2020-12", Some(220.0))],
        )
        .await;
        let (mut manager, _, _) = manager(&mock_server, &["UK"], &["DE"]);

        let periods = vec![NamedPeriod::new("2020", 2020, 2020)];
        let data = manager
            .get_complete(&countries(&["UK", "DE"]), &periods)
            .await
            .unwrap();

        assert_eq!(data.index.len(), 6);
        assert_eq!(data.weights.len(), 24);
        let roc = data.rate_of_change.unwrap();
        let uk = roc.get("UK", "2020").unwrap().unwrap();
        let de = roc.get("DE", "2020").unwrap().unwrap();
        assert!((uk - 0.1).abs() < 1e-9);
        assert!((de - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_min_observations_comes_from_config() {
        let index: Vec<IndexObservation> = [(2000, 1, 100.0), (2009, 12, 150.0)]
            .iter()
            .map(|(y, m, v)| IndexObservation {
                date: NaiveDate::from_ymd_opt(*y, *m, 1).unwrap(),
                value: *v,
                country: "UK".to_string(),
                source: Source::National,
            })
            .collect();
        let periods = vec![NamedPeriod::new("P1", 2000, 2009)];
        let cache_dir = tempfile::tempdir().unwrap();

        let mut config = AppConfig::default();
        config.cache.dir = Some(cache_dir.path().to_path_buf());
        let strict = UnifiedDataManager::new(&config).unwrap();
        assert_eq!(
            strict.get_rate_of_change(&index, &periods).unwrap().get("UK", "P1"),
            Some(None)
        );

        config.min_observations = 2;
        let relaxed = UnifiedDataManager::new(&config).unwrap();
        let change = relaxed
            .get_rate_of_change(&index, &periods)
            .unwrap()
            .get("UK", "P1")
            .unwrap()
            .unwrap();
        assert!((change - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_get_complete_without_index_skips_rate_of_change() {
        let mock_server = MockServer::start().await;
        let (mut manager, _, _) = manager(&mock_server, &["UK"], &[]);

        let periods = vec![NamedPeriod::new("Post-COVID", 2020, 2023)];
        let data = manager
            .get_complete(&countries(&["UK"]), &periods)
            .await
            .unwrap();
        assert!(data.index.is_empty());
        assert!(data.rate_of_change.is_none());
        assert_eq!(data.weights.len(), 12);
    }
}
